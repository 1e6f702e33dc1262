//! Survey report normalization and team performance analytics.
//!
//! Raw survey batches go through [`schema::resolve`] and
//! [`normalize::normalize`], accumulate in a [`timeline::TimelineStore`],
//! and are summarized by the [`metrics`], [`ranking`] and [`trend`]
//! modules.

pub mod config;
pub mod error;
pub mod feedback;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod ranking;
pub mod report;
pub mod schema;
pub mod timeline;
pub mod trend;

pub use error::{Error, Result};
pub use models::{
    CellValue, EmployeeIdentity, MetricsSnapshot, NormalizedRecord, NormalizedTable,
    RankingEntry, RawRecord, RawTable, Role,
};
pub use schema::{AliasTable, CanonicalField, ColumnMap};
pub use timeline::{TimelineSnapshot, TimelineStore};
