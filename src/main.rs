use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use workpulse::models::PerformanceLevel;
use workpulse::{config, ingest, metrics, normalize, ranking, report, schema, trend};
use workpulse::{AliasTable, EmployeeIdentity, Role, TimelineStore};

#[derive(Parser)]
#[command(name = "workpulse")]
#[command(about = "Weekly survey report analytics for creative teams", long_about = None)]
struct Cli {
    /// JSON file with extra column aliases
    #[arg(long, global = true)]
    aliases: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Level {
    Excellent,
    Good,
    Average,
    NeedsImprovement,
}

impl From<Level> for PerformanceLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Excellent => PerformanceLevel::Excellent,
            Level::Good => PerformanceLevel::Good,
            Level::Average => PerformanceLevel::Average,
            Level::NeedsImprovement => PerformanceLevel::NeedsImprovement,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show how each CSV header resolves to a canonical field
    Columns {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Aggregate metrics as JSON
    Metrics {
        #[arg(long, required = true)]
        csv: Vec<PathBuf>,
        /// Only rows for this role, e.g. "Video Editor"
        #[arg(long)]
        role: Option<String>,
        /// Only rows with a rating in this band
        #[arg(long, value_enum)]
        level: Option<Level>,
    },
    /// Rank employees across all batches
    Rank {
        #[arg(long, required = true)]
        csv: Vec<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Report history and first-vs-last trend for one employee
    History {
        #[arg(long, required = true)]
        csv: Vec<PathBuf>,
        /// Identity as "Name (Role)"
        #[arg(long)]
        employee: String,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, required = true)]
        csv: Vec<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn load_timeline(paths: &[PathBuf], aliases: &AliasTable) -> anyhow::Result<TimelineStore> {
    let store = TimelineStore::new();
    for path in paths {
        let raw = ingest::read_csv(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let table = normalize::normalize_batch(&raw, aliases, 0);
        let receipt = store.append(table);
        info!(
            path = %path.display(),
            sequence = receipt.sequence,
            rows = receipt.rows,
            "loaded batch"
        );
        if receipt.unassignable > 0 {
            eprintln!(
                "{}: {} rows without name or role were not assigned to an employee.",
                path.display(),
                receipt.unassignable
            );
        }
    }
    Ok(store)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_columns(path: &Path, aliases: &AliasTable) -> anyhow::Result<()> {
    let raw = ingest::read_csv(path).with_context(|| format!("failed to read {}", path.display()))?;
    let map = schema::resolve(&raw.columns, aliases);
    for (column, field) in map.iter() {
        println!("{column} -> {field}");
    }
    for column in map.unmapped() {
        println!("{column} -> (ignored)");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("workpulse=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let aliases = config::alias_table(cli.aliases.as_deref()).context("failed to load aliases")?;

    match cli.command {
        Commands::Columns { csv } => show_columns(&csv, &aliases)?,
        Commands::Metrics { csv, role, level } => {
            let store = load_timeline(&csv, &aliases)?;
            let mut records = store.all_records();
            if let Some(level) = level {
                records = metrics::filter_by_level(&records, level.into());
            }
            let role = role.as_deref().map(Role::parse);
            print_json(&metrics::compute_metrics(&records, role.as_ref()))?;
        }
        Commands::Rank { csv, limit, json } => {
            let store = load_timeline(&csv, &aliases)?;
            let entries = ranking::rank(&store.snapshot());

            if json {
                let top: Vec<_> = entries.into_iter().take(limit).collect();
                print_json(&top)?;
                return Ok(());
            }
            if entries.is_empty() {
                println!("No employees found in these reports.");
                return Ok(());
            }

            println!("Top employees by composite score:");
            for entry in entries.iter().take(limit) {
                println!(
                    "{:>3}. {} score {:.2} ({:.0} {}, productivity {:.2}, {} reports)",
                    entry.rank,
                    entry.identity,
                    entry.composite_score,
                    entry.total_output,
                    entry.role.output_label(),
                    entry.avg_productivity,
                    entry.total_reports
                );
            }
        }
        Commands::History { csv, employee } => {
            let store = load_timeline(&csv, &aliases)?;
            let identity = EmployeeIdentity::from(employee.as_str());
            let history = store.history(&identity);
            if history.is_empty() {
                println!("No reports found for {identity}.");
                return Ok(());
            }

            let team = metrics::compute_metrics(&store.all_records(), Some(&history[0].role()));
            let own = metrics::compute_metrics(&history, Some(&history[0].role()));
            print_json(&serde_json::json!({
                "identity": identity,
                "reports": history,
                "metrics": own,
                "first_vs_last": trend::first_vs_last(&history),
                "vs_team": trend::compare_to_team(&own, &team),
            }))?;
        }
        Commands::Report { csv, limit, out } => {
            let store = load_timeline(&csv, &aliases)?;
            let markdown = report::build_report(&store.snapshot(), limit);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
