use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::{BatchReceipt, EmployeeIdentity, NormalizedRecord, NormalizedTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub id: Uuid,
    pub sequence: u64,
    pub appended_at: DateTime<Utc>,
    pub records: Vec<NormalizedRecord>,
}

/// Record positions as (batch index, row index).
type Position = (usize, usize);

#[derive(Debug, Default)]
struct TimelineState {
    last_sequence: u64,
    batches: Vec<Batch>,
    order: Vec<EmployeeIdentity>,
    histories: HashMap<EmployeeIdentity, Vec<Position>>,
    unassignable: Vec<Position>,
}

impl TimelineState {
    fn resolve(&self, positions: &[Position]) -> Vec<NormalizedRecord> {
        positions
            .iter()
            .map(|&(batch, row)| self.batches[batch].records[row].clone())
            .collect()
    }
}

/// Append-only ledger of normalized batches, grouped per employee in
/// ingestion order. All writes go through `append` and `clear`.
#[derive(Debug, Default)]
pub struct TimelineStore {
    state: RwLock<TimelineState>,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Writers never leave the state half-updated, so a poisoned lock is
    // still safe to read.
    fn read(&self) -> RwLockReadGuard<'_, TimelineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TimelineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the batch under the next sequence number. Rows are restamped
    /// with that number, so it is authoritative over whatever the
    /// normalizer was given.
    pub fn append(&self, table: NormalizedTable) -> BatchReceipt {
        let mut records = table.records;
        let appended_at = Utc::now();
        let id = Uuid::new_v4();

        let mut state = self.write();
        let sequence = state.last_sequence + 1;
        let batch_index = state.batches.len();

        let mut assignable = 0usize;
        let mut positions: Vec<(Option<EmployeeIdentity>, Position)> = Vec::with_capacity(records.len());
        for (row, record) in records.iter_mut().enumerate() {
            record.sequence = sequence;
            if record.identity.is_some() {
                assignable += 1;
            }
            positions.push((record.identity.clone(), (batch_index, row)));
        }
        let rows = records.len();

        for (identity, position) in positions {
            match identity {
                Some(identity) => {
                    if !state.histories.contains_key(&identity) {
                        state.order.push(identity.clone());
                    }
                    state.histories.entry(identity).or_default().push(position);
                }
                None => state.unassignable.push(position),
            }
        }
        state.batches.push(Batch {
            id,
            sequence,
            appended_at,
            records,
        });
        state.last_sequence = sequence;
        drop(state);

        info!(
            batch_id = %id,
            sequence,
            rows,
            unassignable = rows - assignable,
            "appended batch"
        );

        BatchReceipt {
            batch_id: id,
            sequence,
            rows,
            assignable,
            unassignable: rows - assignable,
        }
    }

    /// Every stored row, batches in append order.
    pub fn all_records(&self) -> Vec<NormalizedRecord> {
        self.read()
            .batches
            .iter()
            .flat_map(|batch| batch.records.iter().cloned())
            .collect()
    }

    pub fn history(&self, identity: &EmployeeIdentity) -> Vec<NormalizedRecord> {
        let state = self.read();
        state
            .histories
            .get(identity)
            .map(|positions| state.resolve(positions))
            .unwrap_or_default()
    }

    pub fn unassignable(&self) -> Vec<NormalizedRecord> {
        let state = self.read();
        state.resolve(&state.unassignable)
    }

    /// Identities in order of first appearance.
    pub fn identities(&self) -> Vec<EmployeeIdentity> {
        self.read().order.clone()
    }

    pub fn batch_count(&self) -> usize {
        self.read().batches.len()
    }

    pub fn len(&self) -> usize {
        self.read()
            .batches
            .iter()
            .map(|batch| batch.records.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.read().batches.is_empty()
    }

    /// Drops every batch and restarts sequence numbering.
    pub fn clear(&self) {
        *self.write() = TimelineState::default();
        info!("timeline cleared");
    }

    /// A consistent copy of the whole timeline, taken under one read lock.
    pub fn snapshot(&self) -> TimelineSnapshot {
        let state = self.read();
        let histories = state
            .order
            .iter()
            .map(|identity| {
                let records = state
                    .histories
                    .get(identity)
                    .map(|positions| state.resolve(positions))
                    .unwrap_or_default();
                (identity.clone(), records)
            })
            .collect();

        TimelineSnapshot {
            batches: state.batches.clone(),
            histories,
        }
    }
}

/// Immutable view of a `TimelineStore` at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelineSnapshot {
    pub batches: Vec<Batch>,
    /// Per-identity histories, identities in order of first appearance.
    pub histories: Vec<(EmployeeIdentity, Vec<NormalizedRecord>)>,
}

impl TimelineSnapshot {
    pub fn history(&self, identity: &EmployeeIdentity) -> &[NormalizedRecord] {
        self.histories
            .iter()
            .find(|(known, _)| known == identity)
            .map(|(_, records)| records.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_records(&self) -> Vec<NormalizedRecord> {
        self.batches
            .iter()
            .flat_map(|batch| batch.records.iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, RawTable};
    use crate::normalize::normalize_batch;
    use crate::schema::{AliasTable, CanonicalField};

    fn batch(rows: &[(&str, &str, i64, &str)]) -> NormalizedTable {
        let mut raw = RawTable::new(["Name", "Role", "Videos Created", "Week Start Date"]);
        for (name, role, videos, week) in rows {
            raw.push_row([
                CellValue::from(*name),
                CellValue::from(*role),
                CellValue::Int(*videos),
                CellValue::from(*week),
            ]);
        }
        normalize_batch(&raw, &AliasTable::default(), 0)
    }

    #[test]
    fn sequences_increase_per_batch() {
        let store = TimelineStore::new();
        let first = store.append(batch(&[("Sam", "Video Editor", 1, "2025-03-03")]));
        let second = store.append(batch(&[("Sam", "Video Editor", 2, "2025-03-10")]));
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_ne!(first.batch_id, second.batch_id);
        assert_eq!(store.batch_count(), 2);
        assert!(store.all_records().iter().all(|record| record.sequence >= 1));
    }

    #[test]
    fn history_follows_append_order_not_week_dates() {
        let store = TimelineStore::new();
        store.append(batch(&[("Sam", "Video Editor", 5, "2025-03-10")]));
        store.append(batch(&[("Sam", "Video Editor", 3, "2025-03-03")]));

        let history = store.history(&EmployeeIdentity::from("Sam (Video Editor)"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].number(CanonicalField::VideosCreated), 5.0);
        assert_eq!(history[1].number(CanonicalField::VideosCreated), 3.0);
        assert!(history[0].sequence < history[1].sequence);
    }

    #[test]
    fn same_name_in_two_roles_has_two_histories() {
        let store = TimelineStore::new();
        store.append(batch(&[
            ("Alex", "Designer", 0, ""),
            ("Alex", "Video Editor", 2, ""),
        ]));
        assert_eq!(store.identities().len(), 2);
        assert_eq!(store.history(&EmployeeIdentity::from("Alex (Designer)")).len(), 1);
        assert_eq!(store.history(&EmployeeIdentity::from("Alex (Video Editor)")).len(), 1);
    }

    #[test]
    fn unknown_identity_has_empty_history() {
        let store = TimelineStore::new();
        assert!(store.history(&EmployeeIdentity::from("Nobody (Designer)")).is_empty());
    }

    #[test]
    fn unassignable_rows_stay_out_of_histories() {
        let store = TimelineStore::new();
        let receipt = store.append(batch(&[("", "Designer", 1, ""), ("Kim", "Designer", 2, "")]));
        assert_eq!(receipt.unassignable, 1);
        assert_eq!(receipt.assignable, 1);
        assert_eq!(store.all_records().len(), 2);
        assert_eq!(store.unassignable().len(), 1);
        assert_eq!(store.identities(), vec![EmployeeIdentity::from("Kim (Designer)")]);
    }

    #[test]
    fn clear_resets_sequence_and_history() {
        let store = TimelineStore::new();
        store.append(batch(&[("Sam", "Video Editor", 1, "")]));
        store.append(batch(&[("Sam", "Video Editor", 1, "")]));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.history(&EmployeeIdentity::from("Sam (Video Editor)")).is_empty());
        assert_eq!(store.append(batch(&[("Sam", "Video Editor", 1, "")])).sequence, 1);
    }

    #[test]
    fn snapshot_matches_store_reads() {
        let store = TimelineStore::new();
        store.append(batch(&[("Sam", "Video Editor", 1, ""), ("Kim", "Designer", 4, "")]));
        store.append(batch(&[("Kim", "Designer", 6, "")]));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.all_records(), store.all_records());
        assert_eq!(snapshot.histories.len(), 2);
        assert_eq!(snapshot.histories[0].0, EmployeeIdentity::from("Sam (Video Editor)"));
        let kim = EmployeeIdentity::from("Kim (Designer)");
        assert_eq!(snapshot.history(&kim), store.history(&kim).as_slice());
    }

    #[test]
    fn concurrent_appends_get_unique_sequences() {
        let store = std::sync::Arc::new(TimelineStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.append(batch(&[("Sam", "Video Editor", 1, "")])).sequence)
            })
            .collect();
        let mut sequences: Vec<u64> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=8).collect::<Vec<u64>>());
        assert_eq!(store.history(&EmployeeIdentity::from("Sam (Video Editor)")).len(), 8);
    }
}
