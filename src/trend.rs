use std::collections::{BTreeMap, HashSet};

use chrono::Datelike;

use crate::metrics::{compute_metrics, mean, pooled_scores};
use crate::models::{Metric, MetricDelta, MetricsSnapshot, NormalizedRecord, TrendReport, WeekSummary};
use crate::schema::CanonicalField;
use crate::timeline::TimelineSnapshot;

/// Percent change from `previous` to `current`. A non-positive baseline
/// reports 0 rather than an infinite or undefined change.
pub fn percent_change(previous: f64, current: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

pub fn metric_delta(metric: Metric, previous: f64, current: f64) -> MetricDelta {
    MetricDelta {
        metric,
        previous,
        current,
        absolute: current - previous,
        percent: percent_change(previous, current),
    }
}

/// Compares every metric both snapshots carry: total and mean of each
/// numeric field, then the mean pooled productivity.
pub fn delta(previous: &MetricsSnapshot, current: &MetricsSnapshot) -> TrendReport {
    let mut deltas = Vec::new();
    for (field, before) in &previous.fields {
        let Some(after) = current.fields.get(field) else {
            continue;
        };
        deltas.push(metric_delta(Metric::Total(*field), before.sum, after.sum));
        deltas.push(metric_delta(Metric::Average(*field), before.mean, after.mean));
    }
    if let (Some(before), Some(after)) = (previous.avg_productivity(), current.avg_productivity()) {
        deltas.push(metric_delta(Metric::AverageProductivity, before, after));
    }
    TrendReport { deltas }
}

/// Delta between the first and the last report of an ordered history.
pub fn first_vs_last(history: &[NormalizedRecord]) -> Option<TrendReport> {
    let first = history.first()?;
    let last = history.last()?;
    Some(delta(
        &compute_metrics(std::slice::from_ref(first), None),
        &compute_metrics(std::slice::from_ref(last), None),
    ))
}

/// Team-wide delta between the first and the last appended batch.
pub fn team_first_vs_last(snapshot: &TimelineSnapshot) -> Option<TrendReport> {
    let first = snapshot.batches.first()?;
    let last = snapshot.batches.last()?;
    Some(delta(
        &compute_metrics(&first.records, None),
        &compute_metrics(&last.records, None),
    ))
}

/// One report per pair of consecutive batches.
pub fn period_over_period(snapshot: &TimelineSnapshot) -> Vec<TrendReport> {
    let metrics: Vec<MetricsSnapshot> = snapshot
        .batches
        .iter()
        .map(|batch| compute_metrics(&batch.records, None))
        .collect();
    metrics
        .windows(2)
        .map(|pair| delta(&pair[0], &pair[1]))
        .collect()
}

/// Differences of an individual's averages against the team's, keyed the
/// same way as `delta` (current = individual, previous = team).
pub fn compare_to_team(individual: &MetricsSnapshot, team: &MetricsSnapshot) -> TrendReport {
    let deltas = delta(team, individual)
        .deltas
        .into_iter()
        .filter(|entry| !matches!(entry.metric, Metric::Total(_)))
        .collect();
    TrendReport { deltas }
}

/// Groups rows by the ISO week of their declared start date. Rows without
/// a parseable date are left out.
pub fn weekly_timeline(records: &[NormalizedRecord]) -> Vec<WeekSummary> {
    let mut weeks: BTreeMap<(i32, u32), Vec<&NormalizedRecord>> = BTreeMap::new();
    for record in records {
        if let Some(start) = record.date(CanonicalField::WeekStart) {
            let week = start.iso_week();
            weeks.entry((week.year(), week.week())).or_default().push(record);
        }
    }

    weeks
        .into_iter()
        .map(|((iso_year, iso_week), rows)| {
            let total_output = rows
                .iter()
                .filter_map(|record| record.role().primary_output().map(|field| record.number(field)))
                .sum();
            let scores = pooled_scores(rows.iter().copied());
            let team_size = rows
                .iter()
                .filter_map(|record| record.identity.as_ref())
                .collect::<HashSet<_>>()
                .len();
            WeekSummary {
                iso_year,
                iso_week,
                total_output,
                avg_productivity: mean(&scores),
                team_size,
            }
        })
        .collect()
}
