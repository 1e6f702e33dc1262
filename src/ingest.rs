use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::models::{CellValue, RawTable};

/// Reads a survey export. Empty cells become nulls; everything else is kept
/// as text for the normalizer to coerce.
pub fn read_csv_from<R: Read>(reader: R) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = RawTable::new(columns);

    for result in reader.records() {
        let record = result?;
        table.push_row(record.iter().map(|cell| {
            if cell.trim().is_empty() {
                CellValue::Null
            } else {
                CellValue::Text(cell.to_string())
            }
        }));
    }

    debug!(columns = table.columns.len(), rows = table.rows.len(), "read csv");
    Ok(table)
}

pub fn read_csv(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path)?;
    read_csv_from(file)
}
