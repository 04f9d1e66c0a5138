//! Conversion between roster sheet rows and `Soldier` records.
//!
//! Layout (row 1 is a header):
//!
//! | A  | B          | C         | D       | E      | F     |
//! |----|------------|-----------|---------|--------|-------|
//! | id | first name | last name | platoon | status | notes |

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::models::Soldier;
use crate::status::map_raw_status_to_structured;

/// Number of header rows above the data.
pub const HEADER_ROWS: usize = 1;

pub const FIRST_COLUMN: char = 'A';
pub const LAST_COLUMN: char = 'F';

/// Quote a sheet title for A1 notation: `'name'`, with `'` doubled.
pub fn quote_sheet_name(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// Range covering every data row.
pub fn data_range(sheet: &str) -> String {
    format!(
        "{}!{}{}:{}",
        quote_sheet_name(sheet),
        FIRST_COLUMN,
        HEADER_ROWS + 1,
        LAST_COLUMN
    )
}

/// Range covering the id column, header included.
pub fn id_column_range(sheet: &str) -> String {
    format!("{}!{}:{}", quote_sheet_name(sheet), FIRST_COLUMN, FIRST_COLUMN)
}

/// Range of a single 1-based sheet row.
pub fn row_range(sheet: &str, row_number: usize) -> String {
    format!(
        "{}!{}{}:{}{}",
        quote_sheet_name(sheet),
        FIRST_COLUMN,
        row_number,
        LAST_COLUMN,
        row_number
    )
}

fn cell_text(row: &[Value], idx: usize) -> String {
    match row.get(idx) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Parse one data row. Short rows are padded; rows without an id yield `None`.
pub fn soldier_from_row(row: &[Value]) -> Option<Soldier> {
    let id = cell_text(row, 0).trim().to_string();
    if id.is_empty() {
        return None;
    }

    let status = map_raw_status_to_structured(&cell_text(row, 4));
    let mut soldier = Soldier::new(
        id,
        cell_text(row, 1).trim(),
        cell_text(row, 2).trim(),
        cell_text(row, 3).trim(),
        status,
    );
    let notes = cell_text(row, 5);
    soldier.notes = (!notes.trim().is_empty()).then_some(notes);
    Some(soldier)
}

pub fn soldiers_from_rows(rows: &[Vec<Value>]) -> Vec<Soldier> {
    let soldiers: Vec<Soldier> = rows.iter().filter_map(|r| soldier_from_row(r)).collect();
    if soldiers.len() != rows.len() {
        debug!(
            skipped = rows.len() - soldiers.len(),
            "Skipped roster rows without a personal number"
        );
    }
    soldiers
}

pub fn soldier_to_row(soldier: &Soldier) -> Vec<Value> {
    vec![
        Value::String(soldier.id.clone()),
        Value::String(soldier.first_name.clone()),
        Value::String(soldier.last_name.clone()),
        Value::String(soldier.platoon.clone()),
        Value::String(soldier.raw_status()),
        Value::String(soldier.notes.clone().unwrap_or_default()),
    ]
}

/// Map personal numbers to 1-based sheet row numbers from the values of the
/// id column (first entry is row 1). The first occurrence of an id wins.
pub fn row_numbers_by_id(id_column: &[Vec<Value>]) -> HashMap<String, usize> {
    let mut rows = HashMap::new();
    for (idx, row) in id_column.iter().enumerate().skip(HEADER_ROWS) {
        let id = cell_text(row, 0).trim().to_string();
        if !id.is_empty() {
            rows.entry(id).or_insert(idx + 1);
        }
    }
    rows
}
