use std::collections::HashMap;

use crate::metrics::{mean, pooled_scores, stddev};
use crate::models::{EmployeeIdentity, NormalizedRecord, RankingEntry, Role};
use crate::timeline::TimelineSnapshot;

const OUTPUT_WEIGHT: f64 = 0.3;
const PRODUCTIVITY_WEIGHT: f64 = 0.4;
const CONSISTENCY_WEIGHT: f64 = 0.2;
const IMPROVEMENT_WEIGHT: f64 = 0.1;

/// Keeps `1 / (stddev + k)` finite for perfectly steady ratings.
const CONSISTENCY_SMOOTHING: f64 = 0.1;

pub fn consistency_score(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    1.0 / (stddev(scores) + CONSISTENCY_SMOOTHING)
}

/// Change between the first and the last report's average rating, scaled
/// by ten.
pub fn improvement_score(history: &[NormalizedRecord]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let first = history.first().and_then(NormalizedRecord::mean_score);
    let last = history.last().and_then(NormalizedRecord::mean_score);
    match (first, last) {
        (Some(first), Some(last)) => (last - first) * 10.0,
        _ => 0.0,
    }
}

pub fn composite_score(
    total_output: f64,
    avg_productivity: f64,
    consistency: f64,
    improvement: f64,
) -> f64 {
    OUTPUT_WEIGHT * total_output
        + PRODUCTIVITY_WEIGHT * (avg_productivity * 20.0)
        + CONSISTENCY_WEIGHT * (consistency * 10.0)
        + IMPROVEMENT_WEIGHT * improvement
}

/// Scores one employee's append-ordered history. Rank is left at zero
/// until the entries are sorted.
pub fn score_history(identity: &EmployeeIdentity, history: &[NormalizedRecord]) -> RankingEntry {
    let first = history.first();
    let name = first.map(|record| record.name().to_string()).unwrap_or_default();
    let role = first
        .map(NormalizedRecord::role)
        .unwrap_or_else(|| Role::Other(String::new()));

    let total_output = role
        .primary_output()
        .map(|field| history.iter().map(|record| record.number(field)).sum())
        .unwrap_or(0.0);
    let scores = pooled_scores(history);
    let avg_productivity = mean(&scores).unwrap_or(0.0);
    let consistency = consistency_score(&scores);
    let improvement = improvement_score(history);

    RankingEntry {
        identity: identity.clone(),
        name,
        role,
        total_reports: history.len(),
        total_output,
        avg_productivity,
        consistency_score: consistency,
        improvement_score: improvement,
        composite_score: composite_score(total_output, avg_productivity, consistency, improvement),
        rank: 0,
    }
}

/// Sorts by composite score, highest first, and assigns 1-based ranks.
/// The sort is stable, so ties keep their incoming order.
fn assign_ranks(mut entries: Vec<RankingEntry>) -> Vec<RankingEntry> {
    entries.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.rank = position + 1;
    }
    entries
}

pub fn rank(snapshot: &TimelineSnapshot) -> Vec<RankingEntry> {
    let entries = snapshot
        .histories
        .iter()
        .filter(|(_, history)| !history.is_empty())
        .map(|(identity, history)| score_history(identity, history))
        .collect();
    assign_ranks(entries)
}

/// Ranks an ad hoc table; rows are grouped by identity in table order and
/// unassignable rows are ignored.
pub fn rank_records(records: &[NormalizedRecord]) -> Vec<RankingEntry> {
    let mut order: Vec<&EmployeeIdentity> = Vec::new();
    let mut grouped: HashMap<&EmployeeIdentity, Vec<NormalizedRecord>> = HashMap::new();
    for record in records {
        if let Some(identity) = record.identity.as_ref() {
            grouped
                .entry(identity)
                .or_insert_with(|| {
                    order.push(identity);
                    Vec::new()
                })
                .push(record.clone());
        }
    }

    let entries = order
        .into_iter()
        .filter_map(|identity| {
            grouped
                .get(identity)
                .map(|history| score_history(identity, history))
        })
        .collect();
    assign_ranks(entries)
}

/// The best `limit` entries of each role, roles in order of their best
/// ranked member.
pub fn top_by_role(entries: &[RankingEntry], limit: usize) -> Vec<(Role, Vec<RankingEntry>)> {
    let mut groups: Vec<(Role, Vec<RankingEntry>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(role, _)| *role == entry.role) {
            Some((_, members)) => {
                if members.len() < limit {
                    members.push(entry.clone());
                }
            }
            None if limit > 0 => groups.push((entry.role.clone(), vec![entry.clone()])),
            None => {}
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, RawTable};
    use crate::normalize::normalize_batch;
    use crate::schema::AliasTable;
    use crate::timeline::TimelineStore;

    fn report(rows: &[(&str, &str, i64, i64)]) -> RawTable {
        let mut raw = RawTable::new([
            "Name",
            "Role",
            "How many videos did you create this week?",
            "How many designs did you create this week?",
            "Overall productivity this week",
        ]);
        for (name, role, output, score) in rows {
            let (videos, designs) = if *role == "Designer" {
                (CellValue::Null, CellValue::Int(*output))
            } else {
                (CellValue::Int(*output), CellValue::Null)
            };
            raw.push_row([
                CellValue::from(*name),
                CellValue::from(*role),
                videos,
                designs,
                CellValue::Int(*score),
            ]);
        }
        raw
    }

    fn store_with(batches: &[&[(&str, &str, i64, i64)]]) -> TimelineStore {
        let store = TimelineStore::new();
        for rows in batches {
            store.append(normalize_batch(&report(rows), &AliasTable::default(), 0));
        }
        store
    }

    #[test]
    fn composite_blends_weighted_components() {
        let store = store_with(&[
            &[("Sam", "Video Editor", 4, 4)],
            &[("Sam", "Video Editor", 8, 5)],
        ]);
        let entries = rank(&store.snapshot());
        assert_eq!(entries.len(), 1);

        let sam = &entries[0];
        let consistency = 1.0 / (0.5 + 0.1);
        assert_eq!(sam.rank, 1);
        assert_eq!(sam.total_reports, 2);
        assert_eq!(sam.total_output, 12.0);
        assert!((sam.avg_productivity - 4.5).abs() < 1e-9);
        assert!((sam.consistency_score - consistency).abs() < 1e-9);
        assert!((sam.improvement_score - 10.0).abs() < 1e-9);
        let expected = 0.3 * 12.0 + 0.4 * (4.5 * 20.0) + 0.2 * (consistency * 10.0) + 0.1 * 10.0;
        assert!((sam.composite_score - expected).abs() < 1e-9);
    }

    #[test]
    fn single_report_has_no_improvement() {
        let store = store_with(&[&[("Kim", "Designer", 3, 4)]]);
        let entries = rank(&store.snapshot());
        assert_eq!(entries[0].improvement_score, 0.0);
        assert!((entries[0].consistency_score - 10.0).abs() < 1e-9);
        assert_eq!(entries[0].total_output, 3.0);
    }

    #[test]
    fn ranking_orders_descending_and_is_repeatable() {
        let store = store_with(&[&[
            ("Low", "Video Editor", 1, 2),
            ("High", "Video Editor", 20, 5),
            ("Mid", "Designer", 6, 4),
        ]]);
        let snapshot = store.snapshot();
        let first = rank(&snapshot);
        let second = rank(&snapshot);
        assert_eq!(first, second);

        let names: Vec<&str> = first.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["High", "Mid", "Low"]);
        assert_eq!(
            first.iter().map(|entry| entry.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn ties_keep_first_appearance_order() {
        let store = store_with(&[&[
            ("Bea", "Video Editor", 3, 4),
            ("Ari", "Video Editor", 3, 4),
        ]]);
        let entries = rank(&store.snapshot());
        assert_eq!(entries[0].name, "Bea");
        assert_eq!(entries[1].name, "Ari");
        assert_eq!(entries[0].composite_score, entries[1].composite_score);
    }

    #[test]
    fn team_leaders_have_no_output() {
        let store = store_with(&[&[("Lee", "Team Leader", 9, 3)]]);
        let entries = rank(&store.snapshot());
        assert_eq!(entries[0].total_output, 0.0);
    }

    #[test]
    fn empty_timeline_ranks_nobody() {
        assert!(rank(&TimelineStore::new().snapshot()).is_empty());
        assert!(rank_records(&[]).is_empty());
    }

    #[test]
    fn ad_hoc_ranking_matches_timeline_ranking() {
        let store = store_with(&[
            &[("Sam", "Video Editor", 4, 4), ("Kim", "Designer", 2, 3)],
            &[("Sam", "Video Editor", 8, 5)],
        ]);
        let snapshot = store.snapshot();
        assert_eq!(rank_records(&snapshot.all_records()), rank(&snapshot));
    }

    #[test]
    fn top_by_role_limits_each_group() {
        let store = store_with(&[&[
            ("A", "Video Editor", 9, 5),
            ("B", "Designer", 9, 5),
            ("C", "Video Editor", 5, 4),
            ("D", "Video Editor", 1, 2),
        ]]);
        let grouped = top_by_role(&rank(&store.snapshot()), 2);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, Role::VideoEditor);
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].1.len(), 1);
    }
}
