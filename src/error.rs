use thiserror::Error;

#[derive(Debug, Error)]
pub enum GammaError {
    #[error("Schema drift in '{table}'. Expected: {expected:?} Found: {found:?}")]
    SchemaViolation {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Table '{table}' changed since it was read (version {expected} -> {found})")]
    StoreConflict {
        table: String,
        expected: u64,
        found: u64,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GammaError>;
