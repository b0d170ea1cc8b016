use crate::error::{GammaError, Result};
use chrono::NaiveDate;

pub const RAW_TABLE: &str = "raw_daily";
pub const SUMMARY_TABLE: &str = "daily_summary";
pub const ENRICHED_TABLE: &str = "enriched_daily";

/// Column order of the raw snapshot table. Any drift is fatal.
pub const RAW_SCHEMA: [&str; 37] = [
    "date",
    "week",
    "symbol",
    "spot",
    "dnz_low",
    "dnz_mid",
    "dnz_high",
    "dnz_width",
    "spot_position",
    "spot_bucket",
    "gamma_bucket",
    "regime",
    "gamma_above",
    "gamma_below",
    "gamma_total",
    "gamma_diff",
    "gamma_ratio",
    "gamma_asym_strength",
    "effective_gamma_pressure",
    "egp_normalized",
    "gamma_peak_price",
    "gamma_concentration",
    "gamma_distance_from_spot",
    "close_t+1",
    "close_t+2",
    "close_t+5",
    "ret_t+1",
    "ret_t+2",
    "ret_t+5",
    "days_to_close_t+1",
    "days_to_close_t+2",
    "days_to_close_t+5",
    "data_ok",
    "event_flag",
    "is_event_day",
    "event_type",
    "event_phase",
];

pub const SUMMARY_SCHEMA: [&str; 5] = ["date", "dominant_regime", "share", "symbols", "created_at_utc"];

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// In-memory copy of a stored table. `version` identifies the stored state it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellUpdate {
    pub row: usize,
    pub column: usize,
    pub value: String,
}

/// All mutations of one run against one table, committed as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBatch {
    pub table: String,
    pub base_version: u64,
    /// Header to write when the table is still empty
    pub header: Option<Vec<String>>,
    pub updates: Vec<CellUpdate>,
    pub appends: Vec<Vec<String>>,
}

impl TableBatch {
    pub fn for_table(table: &Table) -> Self {
        Self {
            table: table.name.clone(),
            base_version: table.version,
            header: None,
            updates: Vec::new(),
            appends: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.updates.is_empty() && self.appends.is_empty()
    }

    pub fn set(&mut self, row: usize, column: usize, value: impl Into<String>) {
        self.updates.push(CellUpdate { row, column, value: value.into() });
    }

    pub fn append(&mut self, row: Vec<String>) {
        self.appends.push(row);
    }

    pub fn updated_rows(&self) -> usize {
        let mut rows: Vec<usize> = self.updates.iter().map(|u| u.row).collect();
        rows.sort_unstable();
        rows.dedup();
        rows.len()
    }
}

impl Table {
    pub fn new(name: impl Into<String>, header: Vec<String>, rows: Vec<Vec<String>>, version: u64) -> Self {
        Self { name: name.into(), header: normalize_header(&header), rows, version }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new(), Vec::new(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Cell text, empty for ragged rows
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn get(&self, row: usize, name: &str) -> &str {
        self.column(name).map(|c| self.cell(row, c)).unwrap_or("")
    }

    /// Fails unless the header matches `expected` exactly
    pub fn ensure_schema(&self, expected: &[&str]) -> Result<()> {
        if self.header.iter().map(String::as_str).eq(expected.iter().copied()) {
            Ok(())
        } else {
            Err(GammaError::SchemaViolation {
                table: self.name.clone(),
                expected: expected.iter().map(|s| s.to_string()).collect(),
                found: self.header.clone(),
            })
        }
    }

    /// Header to initialise an empty table with, or a schema check on a populated one
    pub fn schema_or_init(&self, expected: &[&str]) -> Result<Option<Vec<String>>> {
        if self.is_empty() {
            return Ok(Some(expected.iter().map(|s| s.to_string()).collect()));
        }
        self.ensure_schema(expected)?;
        Ok(None)
    }

    /// Apply a batch in memory. Rows are padded to the header width before cell writes.
    pub fn apply(&mut self, batch: &TableBatch) {
        if let Some(header) = &batch.header {
            if self.header.is_empty() {
                self.header = normalize_header(header);
            }
        }
        let width = self.header.len();
        for update in &batch.updates {
            if let Some(row) = self.rows.get_mut(update.row) {
                let needed = width.max(update.column + 1);
                if row.len() < needed {
                    row.resize(needed, String::new());
                }
                row[update.column] = update.value.clone();
            }
        }
        for row in &batch.appends {
            self.rows.push(row.clone());
        }
    }
}

/// Working copy of a table that records every effective cell change as a batch update.
///
/// Writing an empty value or the value already present records nothing, so a second pass over
/// the same data stages an empty batch.
#[derive(Debug, Clone)]
pub struct StagedTable<'a> {
    base: &'a Table,
    rows: Vec<Vec<String>>,
    batch: TableBatch,
}

impl<'a> StagedTable<'a> {
    pub fn new(base: &'a Table) -> Self {
        Self { base, rows: base.rows.clone(), batch: TableBatch::for_table(base) }
    }

    pub fn header(&self) -> &[String] {
        &self.base.header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, name: &str) -> &str {
        self.base
            .column(name)
            .and_then(|c| self.rows.get(row).and_then(|r| r.get(c)))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Stage `value` into `name`; unknown columns are ignored. Returns true if a change was recorded.
    pub fn set(&mut self, row: usize, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        let Some(column) = self.base.column(name) else {
            return false;
        };
        if is_blank(&value) || row >= self.rows.len() || self.get(row, name) == value {
            return false;
        }
        let cells = &mut self.rows[row];
        if cells.len() <= column {
            cells.resize(column + 1, String::new());
        }
        cells[column] = value.clone();
        self.batch.set(row, column, value);
        true
    }

    /// Stage `value` only when the cell is still blank
    pub fn fill(&mut self, row: usize, name: &str, value: impl Into<String>) -> bool {
        if !is_blank(self.get(row, name)) {
            return false;
        }
        self.set(row, name, value)
    }

    pub fn row(&self, row: usize) -> &[String] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn finish(self) -> (Vec<Vec<String>>, TableBatch) {
        (self.rows, self.batch)
    }
}

pub fn normalize_header(header: &[String]) -> Vec<String> {
    header.iter().map(|h| h.trim().to_lowercase()).collect()
}

// -----------------------------------------------
// CELL FORMATTING
// -----------------------------------------------

/// Non-finite values serialize as an empty cell, never "NaN" or "inf"
pub fn format_number(x: f64) -> String {
    if x.is_finite() { x.to_string() } else { String::new() }
}

pub fn format_opt(x: Option<f64>) -> String {
    x.map(format_number).unwrap_or_default()
}

pub fn format_bool(b: bool) -> String {
    if b { "TRUE".to_string() } else { "FALSE".to_string() }
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

pub fn is_blank(raw: &str) -> bool {
    raw.trim().is_empty()
}

/// Cleans a foreign cell: literal nan/inf spellings become empty
pub fn clean_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "nan" | "inf" | "-inf" | "+inf" | "infinity" | "-infinity" | "none" | "null" => String::new(),
        _ => trimmed.to_string(),
    }
}
