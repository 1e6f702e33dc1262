use std::fmt::Write;

use crate::feedback;
use crate::metrics::{self, compute_metrics};
use crate::models::{Metric, MetricsSnapshot, PerformanceLevel, RankingEntry};
use crate::ranking;
use crate::timeline::TimelineSnapshot;
use crate::trend;

fn write_overview(output: &mut String, snapshot: &MetricsSnapshot) {
    let _ = writeln!(output, "## Overview");
    if snapshot.is_empty() {
        let _ = writeln!(output, "No reports recorded yet.");
        return;
    }

    let _ = writeln!(output, "- Reports: {}", snapshot.record_count);
    for (field, stats) in &snapshot.fields {
        let _ = writeln!(
            output,
            "- {}: total {:.0}, average {:.1} (min {:.0}, max {:.0})",
            field, stats.sum, stats.mean, stats.min, stats.max
        );
    }
    if let Some(productivity) = snapshot.productivity {
        let _ = writeln!(
            output,
            "- Average productivity: {:.2}/5 ({}, std dev {:.2})",
            productivity.mean,
            PerformanceLevel::from_score(productivity.mean).label(),
            productivity.stddev
        );
        let dist = productivity.distribution;
        let _ = writeln!(
            output,
            "- Distribution: {} excellent, {} good, {} average, {} needs improvement",
            dist.excellent, dist.good, dist.average, dist.needs_improvement
        );
    }
}

fn write_rankings(output: &mut String, rankings: &[RankingEntry], limit: usize) {
    let _ = writeln!(output, "## Rankings");
    if rankings.is_empty() {
        let _ = writeln!(output, "No employees to rank.");
        return;
    }
    for entry in rankings.iter().take(limit) {
        let _ = writeln!(
            output,
            "{}. {} score {:.2} ({:.0} {} over {} reports, productivity {:.2})",
            entry.rank,
            entry.identity,
            entry.composite_score,
            entry.total_output,
            entry.role.output_label(),
            entry.total_reports,
            entry.avg_productivity
        );
    }
}

/// Markdown summary of the whole timeline.
pub fn build_report(snapshot: &TimelineSnapshot, limit: usize) -> String {
    let records = snapshot.all_records();
    let overview = compute_metrics(&records, None);
    let rankings = ranking::rank(snapshot);
    let roles = metrics::role_breakdown(&records);
    let issues = feedback::issue_frequency(&records, 5);
    let unassignable = records.iter().filter(|record| !record.is_assignable()).count();

    let mut output = String::new();
    let _ = writeln!(output, "# Team Performance Report");
    let _ = writeln!(
        output,
        "Built from {} batches, {} employees",
        snapshot.batches.len(),
        snapshot.histories.len()
    );
    let _ = writeln!(output);
    write_overview(&mut output, &overview);

    let _ = writeln!(output);
    write_rankings(&mut output, &rankings, limit);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Roles");
    if roles.is_empty() {
        let _ = writeln!(output, "No role data.");
    } else {
        for summary in &roles {
            let _ = writeln!(
                output,
                "- {}: {} people, productivity {:.2} (std dev {:.2}, range {:.0}-{:.0})",
                summary.role,
                summary.team_size,
                summary.avg_productivity,
                summary.productivity_stddev,
                summary.min_productivity,
                summary.max_productivity
            );
        }
    }

    if let Some(report) = trend::team_first_vs_last(snapshot).filter(|_| snapshot.batches.len() > 1) {
        let _ = writeln!(output);
        let _ = writeln!(output, "## First vs Last Batch");
        for delta in report
            .deltas
            .iter()
            .filter(|delta| !matches!(delta.metric, Metric::Average(_)))
        {
            let _ = writeln!(
                output,
                "- {}: {:.2} -> {:.2} ({:+.1}%)",
                delta.metric, delta.previous, delta.current, delta.percent
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Common Issues");
    if issues.is_empty() {
        let _ = writeln!(output, "No significant issues reported.");
    } else {
        for issue in &issues {
            let _ = writeln!(output, "- {} ({} reports)", issue.issue, issue.count);
        }
    }

    if unassignable > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "_{} rows had no name or role and were left out of per-employee results._",
            unassignable
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, RawTable};
    use crate::normalize::normalize_batch;
    use crate::schema::AliasTable;
    use crate::timeline::TimelineStore;

    #[test]
    fn empty_timeline_report_has_placeholders() {
        let report = build_report(&TimelineStore::new().snapshot(), 10);
        assert!(report.contains("No reports recorded yet."));
        assert!(report.contains("No employees to rank."));
        assert!(!report.contains("First vs Last"));
    }

    #[test]
    fn report_lists_rankings_and_issues() {
        let store = TimelineStore::new();
        for (videos, score) in [(4, 4), (8, 5)] {
            let raw = RawTable::new([
                "Name",
                "Role",
                "Videos Created",
                "Overall productivity this week",
                "Did you face any problems this week?",
            ])
            .with_row([
                CellValue::from("Sam"),
                CellValue::from("Video Editor"),
                CellValue::Int(videos),
                CellValue::Int(score),
                CellValue::from("Slow uploads"),
            ])
            .with_row([
                CellValue::Null,
                CellValue::from("Designer"),
                CellValue::Null,
                CellValue::Null,
                CellValue::Null,
            ]);
            store.append(normalize_batch(&raw, &AliasTable::default(), 0));
        }

        let report = build_report(&store.snapshot(), 10);
        assert!(report.contains("1. Sam (Video Editor)"));
        assert!(report.contains("Slow uploads (2 reports)"));
        assert!(report.contains("## First vs Last Batch"));
        assert!(report.contains("2 rows had no name or role"));
    }
}
