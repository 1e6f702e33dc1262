use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{CanonicalField, FieldKind, SCORE_DEFAULT};

/// One primitive cell as supplied by the CSV collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

static NULL_CELL: CellValue = CellValue::Null;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub cells: Vec<CellValue>,
}

impl RawRecord {
    /// Missing trailing cells read as null.
    pub fn get(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&NULL_CELL)
    }
}

/// An input batch with caller-supplied column labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<C: Into<CellValue>>(&mut self, cells: impl IntoIterator<Item = C>) {
        self.rows.push(RawRecord {
            cells: cells.into_iter().map(Into::into).collect(),
        });
    }

    pub fn with_row<C: Into<CellValue>>(mut self, cells: impl IntoIterator<Item = C>) -> Self {
        self.push_row(cells);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Roles compare case-insensitively, so `Other("Intern")` matches a row
/// that said "intern".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Role {
    VideoEditor,
    Designer,
    AccountManager,
    Filmmaker,
    TeamLeader,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Role {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        match collapsed.to_lowercase().as_str() {
            "video editor" => Role::VideoEditor,
            "designer" => Role::Designer,
            "account manager" => Role::AccountManager,
            "filmmaker" => Role::Filmmaker,
            "team leader" => Role::TeamLeader,
            _ => Role::Other(collapsed),
        }
    }

    /// Label used inside an `EmployeeIdentity`. Known roles use their
    /// display name and other roles are lowercased, so spelling variants of
    /// one role land on the same key.
    pub fn identity_label(&self) -> String {
        match self {
            Role::Other(label) => label.to_lowercase(),
            known => known.to_string(),
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            Role::VideoEditor => 0,
            Role::Designer => 1,
            Role::AccountManager => 2,
            Role::Filmmaker => 3,
            Role::TeamLeader => 4,
            Role::Other(_) => 5,
        }
    }

    /// Output fields reported by this role, primary field first.
    pub fn output_fields(&self) -> &'static [CanonicalField] {
        match self {
            Role::VideoEditor => &[CanonicalField::VideosCreated],
            Role::Designer => &[CanonicalField::DesignsCreated],
            Role::AccountManager => &[
                CanonicalField::ScriptsProduced,
                CanonicalField::PostsPublished,
                CanonicalField::ClientMeetings,
            ],
            Role::Filmmaker => &[
                CanonicalField::ProjectsWorked,
                CanonicalField::FilmmakerClientsCount,
            ],
            Role::TeamLeader => &[CanonicalField::LeaderMeetings],
            Role::Other(_) => &[],
        }
    }

    /// The single field counted as "output" when ranking. Team leaders
    /// report meetings rather than deliverables, so they have none.
    pub fn primary_output(&self) -> Option<CanonicalField> {
        match self {
            Role::VideoEditor => Some(CanonicalField::VideosCreated),
            Role::Designer => Some(CanonicalField::DesignsCreated),
            Role::AccountManager => Some(CanonicalField::ScriptsProduced),
            Role::Filmmaker => Some(CanonicalField::ProjectsWorked),
            Role::TeamLeader | Role::Other(_) => None,
        }
    }

    pub fn output_label(&self) -> &'static str {
        match self {
            Role::VideoEditor => "videos",
            Role::Designer => "designs",
            Role::AccountManager => "scripts",
            Role::Filmmaker => "projects",
            Role::TeamLeader | Role::Other(_) => "tasks",
        }
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Role::Other(a), Role::Other(b)) => a.to_lowercase() == b.to_lowercase(),
            _ => self.discriminant() == other.discriminant(),
        }
    }
}

impl Eq for Role {}

impl Hash for Role {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        if let Role::Other(label) = self {
            label.to_lowercase().hash(state);
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::VideoEditor => f.write_str("Video Editor"),
            Role::Designer => f.write_str("Designer"),
            Role::AccountManager => f.write_str("Account Manager"),
            Role::Filmmaker => f.write_str("Filmmaker"),
            Role::TeamLeader => f.write_str("Team Leader"),
            Role::Other(label) => f.write_str(label),
        }
    }
}

/// Composite `"Name (Role)"` key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeIdentity(String);

impl EmployeeIdentity {
    pub fn new(name: &str, role: &str) -> Self {
        Self(format!("{} ({})", name, role))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmployeeIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Date(Option<NaiveDate>),
}

impl FieldValue {
    pub fn default_for(kind: FieldKind) -> FieldValue {
        match kind {
            FieldKind::Identity | FieldKind::Text => FieldValue::Text(String::new()),
            FieldKind::Numeric => FieldValue::Number(0.0),
            FieldKind::BoundedScore => FieldValue::Number(SCORE_DEFAULT),
            FieldKind::Date => FieldValue::Date(None),
        }
    }
}

/// A cleaned row. `values` holds every canonical field; `present` names the
/// fields whose column existed in the batch, the rest carry their kind's
/// default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub identity: Option<EmployeeIdentity>,
    pub sequence: u64,
    pub ingested_at: DateTime<Utc>,
    pub values: BTreeMap<CanonicalField, FieldValue>,
    pub present: BTreeSet<CanonicalField>,
}

impl NormalizedRecord {
    /// A record with every field at its default and nothing present.
    pub fn blank(sequence: u64, ingested_at: DateTime<Utc>) -> Self {
        Self {
            identity: None,
            sequence,
            ingested_at,
            values: CanonicalField::ALL
                .into_iter()
                .map(|field| (field, FieldValue::default_for(field.kind())))
                .collect(),
            present: BTreeSet::new(),
        }
    }

    /// Stores a value read from the input and marks the field present.
    pub fn set(&mut self, field: CanonicalField, value: FieldValue) {
        self.values.insert(field, value);
        self.present.insert(field);
    }

    pub fn is_assignable(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_present(&self, field: CanonicalField) -> bool {
        self.present.contains(&field)
    }

    pub fn name(&self) -> &str {
        self.text(CanonicalField::Name)
    }

    pub fn role_label(&self) -> &str {
        self.text(CanonicalField::Role)
    }

    pub fn role(&self) -> Role {
        Role::parse(self.role_label())
    }

    pub fn number(&self, field: CanonicalField) -> f64 {
        match self.values.get(&field) {
            Some(FieldValue::Number(value)) => *value,
            _ => match field.kind() {
                FieldKind::BoundedScore => SCORE_DEFAULT,
                _ => 0.0,
            },
        }
    }

    /// The field's number, only when its column was in the input.
    pub fn present_number(&self, field: CanonicalField) -> Option<f64> {
        self.is_present(field).then(|| self.number(field))
    }

    pub fn text(&self, field: CanonicalField) -> &str {
        match self.values.get(&field) {
            Some(FieldValue::Text(value)) => value,
            _ => "",
        }
    }

    pub fn date(&self, field: CanonicalField) -> Option<NaiveDate> {
        match self.values.get(&field) {
            Some(FieldValue::Date(value)) => *value,
            _ => None,
        }
    }

    /// Productivity ratings that came from the input.
    pub fn scores(&self) -> impl Iterator<Item = (CanonicalField, f64)> + '_ {
        CanonicalField::score_fields()
            .filter_map(move |field| self.present_number(field).map(|score| (field, score)))
    }

    pub fn mean_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self.scores().map(|(_, score)| score).collect();
        crate::metrics::mean(&scores)
    }
}

/// Output of one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedTable {
    pub records: Vec<NormalizedRecord>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn assignable(&self) -> impl Iterator<Item = &NormalizedRecord> {
        self.records.iter().filter(|record| record.is_assignable())
    }

    /// Rows without a Name or Role; kept so callers can report them.
    pub fn unassignable(&self) -> impl Iterator<Item = &NormalizedRecord> {
        self.records.iter().filter(|record| !record.is_assignable())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldStats {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub excellent: usize,
    pub good: usize,
    pub average: usize,
    pub needs_improvement: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductivityStats {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub distribution: Distribution,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub record_count: usize,
    pub fields: BTreeMap<CanonicalField, FieldStats>,
    pub productivity: Option<ProductivityStats>,
}

impl MetricsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.productivity.is_none()
    }

    pub fn field(&self, field: CanonicalField) -> Option<&FieldStats> {
        self.fields.get(&field)
    }

    pub fn avg_productivity(&self) -> Option<f64> {
        self.productivity.map(|stats| stats.mean)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    NeedsImprovement,
}

impl PerformanceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 4.5 {
            PerformanceLevel::Excellent
        } else if score >= 3.5 {
            PerformanceLevel::Good
        } else if score >= 2.5 {
            PerformanceLevel::Average
        } else {
            PerformanceLevel::NeedsImprovement
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PerformanceLevel::Excellent => "Excellent",
            PerformanceLevel::Good => "Good",
            PerformanceLevel::Average => "Average",
            PerformanceLevel::NeedsImprovement => "Needs Improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub identity: EmployeeIdentity,
    pub name: String,
    pub role: Role,
    pub total_reports: usize,
    pub total_output: f64,
    pub avg_productivity: f64,
    pub consistency_score: f64,
    pub improvement_score: f64,
    pub composite_score: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleSummary {
    pub role: Role,
    pub team_size: usize,
    pub avg_productivity: f64,
    pub productivity_stddev: f64,
    pub min_productivity: f64,
    pub max_productivity: f64,
}

/// What a delta compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "field")]
pub enum Metric {
    Total(CanonicalField),
    Average(CanonicalField),
    AverageProductivity,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Total(field) => write!(f, "total {}", field),
            Metric::Average(field) => write!(f, "average {}", field),
            Metric::AverageProductivity => f.write_str("average productivity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDelta {
    pub metric: Metric,
    pub previous: f64,
    pub current: f64,
    pub absolute: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendReport {
    pub deltas: Vec<MetricDelta>,
}

impl TrendReport {
    pub fn get(&self, metric: Metric) -> Option<&MetricDelta> {
        self.deltas.iter().find(|delta| delta.metric == metric)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    pub iso_year: i32,
    pub iso_week: u32,
    pub total_output: f64,
    pub avg_productivity: Option<f64>,
    pub team_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueCount {
    pub issue: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprovementArea {
    pub identity: EmployeeIdentity,
    pub area: String,
    pub score: f64,
}

/// Summary of one `TimelineStore::append`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReceipt {
    pub batch_id: Uuid,
    pub sequence: u64,
    pub rows: usize,
    pub assignable: usize,
    pub unassignable: usize,
}
