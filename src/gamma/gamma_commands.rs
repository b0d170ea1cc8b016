use super::config;
use super::models::ChainSnapshot;
use super::rules::StructureTags;
use super::snapshot::{ExposureSnapshot, build_snapshot};
use super::yahoo_client::OptionChainSource;
use crate::history::store::{read_csv_table, write_csv_file};
use crate::history::table::{DATE_FORMAT, clean_cell, is_blank, parse_number};
use crate::history::{
    CommitReport, CsvStore, ENRICHED_TABLE, EventCalendar, RAW_SCHEMA, RAW_TABLE, SUMMARY_TABLE, TableBatch,
    TabularStore, enrich, summarize_latest, summary_batch,
};
use crate::utility::Timer;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Paths and knobs shared by every batch command
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub symbols: Vec<String>,
    pub data_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub calendar_dir: PathBuf,
    pub risk_free_rate: f64,
    pub max_concurrent: usize,
}

impl RunConfig {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(std::env::var("GAMMA_DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        let snapshot_dir = std::env::var("GAMMA_SNAPSHOT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("snapshots"));
        let calendar_dir = std::env::var("GAMMA_CALENDAR_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("calendars"));

        Self {
            symbols: config::get_symbols(),
            data_dir,
            snapshot_dir,
            calendar_dir,
            risk_free_rate: config::get_risk_free_rate(),
            max_concurrent: config::get_max_concurrent(),
        }
    }

    /// Everything under one root, as used by tests and local runs
    pub fn rooted(root: &Path, symbols: &[&str]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            data_dir: root.to_path_buf(),
            snapshot_dir: root.join("snapshots"),
            calendar_dir: root.join("calendars"),
            risk_free_rate: config::DEFAULT_RISK_FREE_RATE,
            max_concurrent: config::DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn store(&self) -> CsvStore {
        CsvStore::new(&self.data_dir)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendReport {
    pub files_read: usize,
    pub files_skipped: usize,
    pub duplicates: usize,
    pub appended: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostprocessReport {
    pub raw: CommitReport,
    pub enriched_rows: usize,
    pub summary_appended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolStructure {
    pub date: String,
    pub symbol: String,
    pub structure_tags: String,
}

/// Gamma Command Handler - encapsulates the batch operations
pub struct GammaCommands;

impl GammaCommands {
    /// Fetch every chain with bounded concurrency. Results come back sorted by symbol.
    pub async fn fetch_chains<S: OptionChainSource>(
        source: &S,
        symbols: &[String],
        max_concurrent: usize,
    ) -> Vec<(String, Result<ChainSnapshot>)> {
        let mut results: Vec<(String, Result<ChainSnapshot>)> = stream::iter(symbols)
            .map(move |symbol| async move { (symbol.clone(), source.fetch_chain(symbol).await) })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await;
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// Compute today's exposure snapshot per symbol and write `{date}_{symbol}.csv`
    pub async fn run_snapshot<S: OptionChainSource>(source: &S, cfg: &RunConfig) -> Result<SnapshotReport> {
        Self::banner("Gamma Snapshot");

        let calendar = EventCalendar::load_dir(&cfg.calendar_dir)?;
        println!("{} Symbols: {}", "ℹ".blue(), cfg.symbols.join(", ").yellow());
        println!("{} Max concurrent requests: {}", "ℹ".blue(), cfg.max_concurrent);
        println!();

        let results = Timer::measure_async("fetch option chains", || {
            Self::fetch_chains(source, &cfg.symbols, cfg.max_concurrent)
        })
        .await;

        let mut report = SnapshotReport::default();
        for (symbol, result) in results {
            let chain = match result {
                Ok(chain) => chain,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "chain fetch failed");
                    println!("{} {} → {}", "✗".red(), symbol.yellow(), e);
                    report.failed.push((symbol, e.to_string()));
                    continue;
                }
            };

            let Some(snapshot) = build_snapshot(&chain, cfg.risk_free_rate) else {
                println!("{} {} → no usable contracts", "✗".red(), symbol.yellow());
                report.failed.push((symbol, "no usable contracts".to_string()));
                continue;
            };

            let (event_flag, _) = calendar.resolve_event(snapshot.date);
            let path = Self::write_snapshot_file(&cfg.snapshot_dir, &snapshot, event_flag)?;
            println!(
                "{} {} {} spot={:.2} dnz={:.2} [{}]",
                "✓".green(),
                snapshot.symbol.yellow(),
                snapshot.date,
                snapshot.spot,
                snapshot.dnz_mid,
                snapshot.regime
            );
            report.written.push(path);
        }

        info!(written = report.written.len(), failed = report.failed.len(), "snapshot finished");
        println!();
        println!("{} Written: {}", "✓".green(), report.written.len());
        println!("{} Failed: {}", "✗".red(), report.failed.len());
        Ok(report)
    }

    pub fn snapshot_file_name(date: NaiveDate, symbol: &str) -> String {
        format!("{}_{}.csv", date.format(DATE_FORMAT), symbol)
    }

    fn write_snapshot_file(dir: &Path, snapshot: &ExposureSnapshot, event_flag: bool) -> Result<PathBuf> {
        let path = dir.join(Self::snapshot_file_name(snapshot.date, &snapshot.symbol));
        let header: Vec<String> = RAW_SCHEMA.iter().map(|s| s.to_string()).collect();
        write_csv_file(&path, &header, &[snapshot.to_record(event_flag)])
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        Ok(path)
    }

    /// Append unseen (date, symbol) rows from every snapshot file to the raw table in one batch
    pub fn run_append(cfg: &RunConfig) -> Result<AppendReport> {
        Self::banner("Append Snapshots");

        let mut store = cfg.store();
        let raw = store.load(RAW_TABLE)?;
        // header drift is fatal before anything is read from the snapshot folder
        let init_header = raw.schema_or_init(&RAW_SCHEMA)?;

        let mut keys: HashSet<(String, String)> = (0..raw.rows.len())
            .map(|row| (raw.get(row, "date").trim().to_string(), raw.get(row, "symbol").trim().to_string()))
            .collect();

        let mut report = AppendReport::default();
        let mut batch = TableBatch::for_table(&raw);
        batch.header = init_header;

        for path in Self::snapshot_files(&cfg.snapshot_dir)? {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            let file = match read_csv_table(&name, &path) {
                Ok(table) => table,
                Err(e) => {
                    warn!(file = %name, error = %e, "cannot read snapshot, skipped");
                    println!("{} {}: cannot read CSV ({})", "[SKIP]".yellow(), name, e);
                    report.files_skipped += 1;
                    continue;
                }
            };
            if file.column("date").is_none() || file.column("symbol").is_none() {
                warn!(file = %name, "snapshot lacks date/symbol columns, skipped");
                println!("{} {}: missing date/symbol columns", "[SKIP]".yellow(), name);
                report.files_skipped += 1;
                continue;
            }
            report.files_read += 1;

            for row in 0..file.rows.len() {
                let key = (file.get(row, "date").trim().to_string(), file.get(row, "symbol").trim().to_string());
                if is_blank(&key.0) || is_blank(&key.1) || keys.contains(&key) {
                    report.duplicates += 1;
                    continue;
                }
                batch.append(RAW_SCHEMA.iter().map(|col| clean_cell(file.get(row, col))).collect());
                keys.insert(key);
            }
        }

        if batch.appends.is_empty() {
            println!("{} No new snapshot rows to append", "✓".green());
            return Ok(report);
        }

        let commit = store.commit(&batch)?;
        report.appended = commit.appended_rows;
        info!(appended = report.appended, duplicates = report.duplicates, "raw table appended");
        println!("{} Appended {} new raw rows", "✓".green(), report.appended);
        Ok(report)
    }

    fn snapshot_files(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            warn!(dir = %dir.display(), "no snapshots directory");
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("listing {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Enrich the raw table, export the enriched frame and append today's summary.
    ///
    /// Every table is loaded and checked before the first write; a schema violation leaves all files untouched.
    pub fn run_postprocess(cfg: &RunConfig) -> Result<PostprocessReport> {
        Self::banner("Postprocess");

        let mut store = cfg.store();
        let raw = store.load(RAW_TABLE)?;
        if raw.is_empty() {
            println!("{} Raw table is empty, nothing to do", "ℹ".blue());
            return Ok(PostprocessReport::default());
        }
        let summary_table = store.load(SUMMARY_TABLE)?;
        let calendar = EventCalendar::load_dir(&cfg.calendar_dir)?;

        let enrichment = Timer::measure("enrichment", || enrich(&raw, &calendar))?;
        let arena = crate::history::SeriesArena::from_table(&raw);
        let summary_update = match summarize_latest(&raw, &arena, Utc::now()) {
            Some(summary) => summary_batch(&summary_table, &summary)?.map(|batch| (summary, batch)),
            None => None,
        };

        let raw_report = store.commit(&enrichment.batch)?;
        store.replace(ENRICHED_TABLE, &enrichment.enriched_header, &enrichment.enriched_rows)?;

        let summary_appended = match summary_update {
            Some((summary, batch)) => {
                store.commit(&batch)?;
                println!(
                    "{} Summary {}: {} ({:.2}, {} symbols)",
                    "✓".green(),
                    summary.date,
                    summary.dominant_regime.yellow(),
                    summary.share,
                    summary.symbols
                );
                true
            }
            None => {
                println!("{} Summary already up to date", "ℹ".blue());
                false
            }
        };

        println!(
            "{} Updated {} cells in {} rows ({} forward)",
            "✓".green(),
            raw_report.updated_cells,
            raw_report.updated_rows,
            enrichment.stats.forward_cells
        );
        if enrichment.stats.skipped_rows > 0 {
            println!("{} Rows without parsable date/spot: {}", "⚠".yellow(), enrichment.stats.skipped_rows);
        }

        Ok(PostprocessReport {
            raw: raw_report,
            enriched_rows: enrichment.enriched_rows.len(),
            summary_appended,
        })
    }

    /// Structure tags from each symbol's latest snapshot file
    pub fn run_structure(cfg: &RunConfig) -> Result<Vec<SymbolStructure>> {
        Self::banner("Structure Tags");

        let files = Self::snapshot_files(&cfg.snapshot_dir)?;
        let mut out = Vec::new();
        for symbol in &cfg.symbols {
            let suffix = format!("_{}.csv", symbol);
            let Some(latest) = files
                .iter()
                .filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy().ends_with(&suffix)))
                .max()
            else {
                println!("{} {} → no snapshot files", "ℹ".blue(), symbol.yellow());
                continue;
            };

            let table = read_csv_table(symbol, latest)?;
            if table.rows.is_empty() {
                continue;
            }
            let Some(tags) = Self::structure_from_row(&table, 0) else {
                warn!(symbol = %symbol, file = %latest.display(), "snapshot row lacks numeric fields");
                continue;
            };
            println!("{} {} {} → {}", "✓".green(), symbol.yellow(), table.get(0, "date"), tags);
            out.push(SymbolStructure {
                date: table.get(0, "date").to_string(),
                symbol: symbol.clone(),
                structure_tags: tags.to_string(),
            });
        }
        Ok(out)
    }

    fn structure_from_row(table: &crate::history::Table, row: usize) -> Option<StructureTags> {
        let num = |name: &str| parse_number(table.get(row, name));
        Some(super::rules::structure_tags(
            num("spot")?,
            num("dnz_low")?,
            num("dnz_high")?,
            num("gamma_above")?,
            num("gamma_below")?,
            num("effective_gamma_pressure").unwrap_or(0.0),
        ))
    }

    /// Snapshot, append, postprocess
    pub async fn run_pipeline<S: OptionChainSource>(source: &S, cfg: &RunConfig) -> Result<PostprocessReport> {
        let timer = Timer::start("pipeline").items(cfg.symbols.len());
        Self::run_snapshot(source, cfg).await?;
        Self::run_append(cfg)?;
        let report = Self::run_postprocess(cfg)?;
        timer.stop();

        println!();
        println!("{}", "=".repeat(60).blue());
        println!("{}", "Done!".green().bold());
        println!("{}", "=".repeat(60).blue());
        Ok(report)
    }

    fn banner(title: &str) {
        println!("{}", "=".repeat(60).blue());
        println!("{}", title.green().bold());
        println!("{}", "=".repeat(60).blue());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(GammaCommands::snapshot_file_name(date, "SPY"), "2025-01-15_SPY.csv");
    }

    #[test]
    fn test_rooted_config() {
        let cfg = RunConfig::rooted(Path::new("/tmp/x"), &["SPY"]);
        assert_eq!(cfg.snapshot_dir, PathBuf::from("/tmp/x/snapshots"));
        assert_eq!(cfg.calendar_dir, PathBuf::from("/tmp/x/calendars"));
        assert_eq!(cfg.symbols, vec!["SPY".to_string()]);
    }
}
