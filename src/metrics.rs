use std::collections::{HashMap, HashSet};

use crate::models::{
    Distribution, EmployeeIdentity, FieldStats, MetricsSnapshot, NormalizedRecord,
    PerformanceLevel, ProductivityStats, Role, RoleSummary,
};
use crate::schema::CanonicalField;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation; zero for an empty sample.
pub fn stddev(values: &[f64]) -> f64 {
    let Some(avg) = mean(values) else {
        return 0.0;
    };
    let variance = values
        .iter()
        .map(|value| (value - avg).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
            (lo.min(*value), hi.max(*value))
        })
}

pub fn field_stats(values: &[f64]) -> Option<FieldStats> {
    let avg = mean(values)?;
    let (min, max) = min_max(values);
    Some(FieldStats {
        count: values.len(),
        sum: values.iter().sum(),
        mean: avg,
        min,
        max,
        stddev: stddev(values),
    })
}

pub fn distribution(scores: &[f64]) -> Distribution {
    let mut buckets = Distribution::default();
    for score in scores {
        match PerformanceLevel::from_score(*score) {
            PerformanceLevel::Excellent => buckets.excellent += 1,
            PerformanceLevel::Good => buckets.good += 1,
            PerformanceLevel::Average => buckets.average += 1,
            PerformanceLevel::NeedsImprovement => buckets.needs_improvement += 1,
        }
    }
    buckets
}

pub fn productivity_stats(scores: &[f64]) -> Option<ProductivityStats> {
    let avg = mean(scores)?;
    let (min, max) = min_max(scores);
    Some(ProductivityStats {
        count: scores.len(),
        mean: avg,
        stddev: stddev(scores),
        min,
        max,
        distribution: distribution(scores),
    })
}

/// Every present productivity rating across the records, pooled.
pub fn pooled_scores<'a>(records: impl IntoIterator<Item = &'a NormalizedRecord>) -> Vec<f64> {
    records
        .into_iter()
        .flat_map(|record| record.scores().map(|(_, score)| score))
        .collect()
}

/// Aggregates a table (or the rows of one role). Statistics only cover
/// fields the input actually carried. Rows without an identity are left
/// out, so an empty or all-unassignable table gives an empty snapshot.
pub fn compute_metrics(records: &[NormalizedRecord], role: Option<&Role>) -> MetricsSnapshot {
    let selected: Vec<&NormalizedRecord> = records
        .iter()
        .filter(|record| record.is_assignable())
        .filter(|record| role.map_or(true, |role| record.role() == *role))
        .collect();
    if selected.is_empty() {
        return MetricsSnapshot::default();
    }

    let fields: Vec<CanonicalField> = match role {
        Some(role) => role.output_fields().to_vec(),
        None => CanonicalField::numeric_fields().collect(),
    };

    let mut snapshot = MetricsSnapshot {
        record_count: selected.len(),
        ..MetricsSnapshot::default()
    };
    for field in fields {
        let values: Vec<f64> = selected
            .iter()
            .filter_map(|record| record.present_number(field))
            .collect();
        if let Some(stats) = field_stats(&values) {
            snapshot.fields.insert(field, stats);
        }
    }
    snapshot.productivity = productivity_stats(&pooled_scores(selected.iter().copied()));

    snapshot
}

/// Productivity spread per role, roles in order of first appearance.
pub fn role_breakdown(records: &[NormalizedRecord]) -> Vec<RoleSummary> {
    let mut order: Vec<Role> = Vec::new();
    let mut grouped: HashMap<Role, (HashSet<&EmployeeIdentity>, Vec<f64>)> = HashMap::new();

    for record in records {
        let Some(identity) = record.identity.as_ref() else {
            continue;
        };
        let role = record.role();
        let entry = grouped.entry(role.clone()).or_insert_with(|| {
            order.push(role);
            (HashSet::new(), Vec::new())
        });
        entry.0.insert(identity);
        entry.1.extend(record.scores().map(|(_, score)| score));
    }

    order
        .into_iter()
        .filter_map(|role| {
            let (members, scores) = grouped.remove(&role)?;
            let stats = productivity_stats(&scores)?;
            Some(RoleSummary {
                role,
                team_size: members.len(),
                avg_productivity: stats.mean,
                productivity_stddev: stats.stddev,
                min_productivity: stats.min,
                max_productivity: stats.max,
            })
        })
        .collect()
}

/// Rows with at least one rating inside the level's bucket.
pub fn filter_by_level(records: &[NormalizedRecord], level: PerformanceLevel) -> Vec<NormalizedRecord> {
    records
        .iter()
        .filter(|record| {
            record
                .scores()
                .any(|(_, score)| PerformanceLevel::from_score(score) == level)
        })
        .cloned()
        .collect()
}

/// Pearson correlation of per-employee total output against average
/// productivity. `None` when it is undefined.
pub fn output_productivity_correlation(records: &[NormalizedRecord]) -> Option<f64> {
    let mut order: Vec<&EmployeeIdentity> = Vec::new();
    let mut per_employee: HashMap<&EmployeeIdentity, (f64, Vec<f64>)> = HashMap::new();

    for record in records {
        let Some(identity) = record.identity.as_ref() else {
            continue;
        };
        let entry = per_employee.entry(identity).or_insert_with(|| {
            order.push(identity);
            (0.0, Vec::new())
        });
        if let Some(field) = record.role().primary_output() {
            entry.0 += record.number(field);
        }
        entry.1.extend(record.scores().map(|(_, score)| score));
    }

    let (outputs, productivity): (Vec<f64>, Vec<f64>) = order
        .iter()
        .filter_map(|identity| {
            let (output, scores) = per_employee.get(identity)?;
            Some((*output, mean(scores).unwrap_or(0.0)))
        })
        .unzip();
    if outputs.len() < 2 {
        return None;
    }

    let (x_mean, y_mean) = (mean(&outputs)?, mean(&productivity)?);
    let covariance: f64 = outputs
        .iter()
        .zip(&productivity)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let x_spread: f64 = outputs.iter().map(|x| (x - x_mean).powi(2)).sum();
    let y_spread: f64 = productivity.iter().map(|y| (y - y_mean).powi(2)).sum();
    let denominator = (x_spread * y_spread).sqrt();
    (denominator > 0.0).then(|| (covariance / denominator).clamp(-1.0, 1.0))
}
