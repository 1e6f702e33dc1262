use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::models::{
    CellValue, EmployeeIdentity, FieldValue, NormalizedRecord, NormalizedTable, RawTable, Role,
};
use crate::schema::{self, AliasTable, CanonicalField, ColumnMap, FieldKind};

const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

pub fn parse_number_or_default(cell: &CellValue, default: f64) -> f64 {
    let parsed = match cell {
        CellValue::Null => None,
        CellValue::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
        CellValue::Int(value) => Some(*value as f64),
        CellValue::Float(value) => Some(*value),
        CellValue::Text(text) => text.trim().parse::<f64>().ok(),
    };
    parsed.filter(|value| value.is_finite()).unwrap_or(default)
}

/// Parses a 1-5 rating. Out-of-range input is clamped rather than rejected.
pub fn parse_score_clamped_or_default(cell: &CellValue) -> f64 {
    parse_number_or_default(cell, schema::SCORE_DEFAULT).clamp(schema::SCORE_MIN, schema::SCORE_MAX)
}

pub fn parse_text_or_default(cell: &CellValue) -> String {
    match cell {
        CellValue::Null => String::new(),
        CellValue::Bool(value) => value.to_string(),
        CellValue::Int(value) => value.to_string(),
        CellValue::Float(value) => value.to_string(),
        CellValue::Text(text) => text.clone(),
    }
}

pub fn parse_date_or_null(cell: &CellValue) -> Option<NaiveDate> {
    let CellValue::Text(text) = cell else {
        return None;
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|parsed| parsed.date())
        })
}

fn identity_part(cell: &CellValue) -> Option<String> {
    let text = parse_text_or_default(cell);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Cleans a raw batch into typed records. Malformed cells fall back to the
/// field's default; rows without Name or Role come back without an identity.
pub fn normalize(raw: &RawTable, column_map: &ColumnMap, ingestion_seq: u64) -> NormalizedTable {
    let projection: Vec<(usize, CanonicalField)> = column_map.indexed().collect();
    let ingested_at = Utc::now();

    let records: Vec<NormalizedRecord> = raw
        .rows
        .iter()
        .map(|row| {
            let mut record = NormalizedRecord::blank(ingestion_seq, ingested_at);
            let mut name = None;
            let mut role = None;

            for &(idx, field) in &projection {
                let cell = row.get(idx);
                let value = match field.kind() {
                    FieldKind::Identity => {
                        let part = identity_part(cell);
                        let text = part.clone().unwrap_or_default();
                        match field {
                            CanonicalField::Name => name = part,
                            _ => role = part,
                        }
                        FieldValue::Text(text)
                    }
                    FieldKind::Numeric => FieldValue::Number(parse_number_or_default(cell, 0.0)),
                    FieldKind::BoundedScore => {
                        FieldValue::Number(parse_score_clamped_or_default(cell))
                    }
                    FieldKind::Date => FieldValue::Date(parse_date_or_null(cell)),
                    FieldKind::Text => FieldValue::Text(parse_text_or_default(cell)),
                };
                record.set(field, value);
            }

            record.identity = match (name, role) {
                (Some(name), Some(role)) => {
                    Some(EmployeeIdentity::new(&name, &Role::parse(&role).identity_label()))
                }
                _ => None,
            };
            record
        })
        .collect();

    let table = NormalizedTable { records };
    let unassignable = table.unassignable().count();
    debug!(
        rows = table.len(),
        mapped_columns = projection.len(),
        dropped_columns = column_map.unmapped().len(),
        "normalized batch"
    );
    if unassignable > 0 {
        warn!(unassignable, "rows without name or role cannot be assigned to an employee");
    }

    table
}

/// Resolves the batch's headers and normalizes it in one step.
pub fn normalize_batch(raw: &RawTable, aliases: &AliasTable, ingestion_seq: u64) -> NormalizedTable {
    let column_map = schema::resolve(&raw.columns, aliases);
    normalize(raw, &column_map, ingestion_seq)
}
