pub mod api_server_axum;
pub mod error;
pub mod gamma;
pub mod history;
pub mod logging;
pub mod utility;

// Re-exports for convenience
pub use error::{GammaError, Result};
pub use gamma::{ExposureSnapshot, GammaCommands, OptionChainSource, RunConfig, YahooClient, build_snapshot};
pub use history::{CsvStore, Enrichment, EventCalendar, Table, TableBatch, TabularStore, enrich};
