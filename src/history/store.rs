use super::table::{Table, TableBatch};
use crate::error::{GammaError, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub updated_cells: usize,
    pub updated_rows: usize,
    pub appended_rows: usize,
}

/// Backing store for the historical tables.
///
/// `commit` applies a whole batch or nothing, and refuses a batch built from a stale read.
pub trait TabularStore {
    fn load(&self, name: &str) -> Result<Table>;
    fn commit(&mut self, batch: &TableBatch) -> Result<CommitReport>;
    fn replace(&mut self, name: &str, header: &[String], rows: &[Vec<String>]) -> Result<()>;
}

/// One `<name>.csv` file per table under `root`
#[derive(Debug, Clone)]
pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.csv", name))
    }
}

impl TabularStore for CsvStore {
    fn load(&self, name: &str) -> Result<Table> {
        let path = self.table_path(name);
        if !path.exists() {
            debug!(table = name, "table file missing, starting empty");
            return Ok(Table::empty(name));
        }
        read_csv_table(name, &path)
    }

    fn commit(&mut self, batch: &TableBatch) -> Result<CommitReport> {
        let mut current = self.load(&batch.table)?;
        if current.version != batch.base_version {
            return Err(GammaError::StoreConflict {
                table: batch.table.clone(),
                expected: batch.base_version,
                found: current.version,
            });
        }
        if batch.is_empty() {
            return Ok(CommitReport::default());
        }

        current.apply(batch);
        write_csv_file(&self.table_path(&batch.table), &current.header, &current.rows)?;

        let report = CommitReport {
            updated_cells: batch.updates.len(),
            updated_rows: batch.updated_rows(),
            appended_rows: batch.appends.len(),
        };
        info!(
            table = %batch.table,
            cells = report.updated_cells,
            rows = report.updated_rows,
            appended = report.appended_rows,
            "batch committed"
        );
        Ok(report)
    }

    fn replace(&mut self, name: &str, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        write_csv_file(&self.table_path(name), header, rows)
    }
}

/// Read a headed CSV file into a table; version is a content hash
pub fn read_csv_table(name: &str, path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path)?;
    let version = content_version(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut records = reader.records();
    let header: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(|s| s.to_string()).collect(),
        None => Vec::new(),
    };
    let rows = records
        .map(|r| r.map(|rec| rec.iter().map(|s| s.to_string()).collect::<Vec<String>>()))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Table::new(name, header, rows, version))
}

/// Write header + rows through a temp file and rename, so readers never see half a table
pub fn write_csv_file(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&tmp)?;
        if !header.is_empty() {
            writer.write_record(header)?;
        }
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn content_version(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    // 0 is reserved for "table does not exist"
    hasher.finish().max(1)
}
