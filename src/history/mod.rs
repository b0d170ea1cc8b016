pub mod calendar;
pub mod forward;
pub mod store;
pub mod structure;
pub mod summary;
pub mod table;

pub use calendar::{EventCalendar, EventCalendarEntry, EventPhase};
pub use forward::{ForwardLabel, SeriesArena, SymbolSeries, forward_label};
pub use store::{CommitReport, CsvStore, TabularStore};
pub use structure::{DERIVED_COLUMNS, DerivedFields};
pub use summary::{DailySummary, summarize_latest, summary_batch};
pub use table::{ENRICHED_TABLE, RAW_SCHEMA, RAW_TABLE, SUMMARY_SCHEMA, SUMMARY_TABLE, Table, TableBatch};

use crate::error::Result;
use table::{StagedTable, format_bool};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub valid_rows: usize,
    pub skipped_rows: usize,
    pub symbols: usize,
    pub forward_cells: usize,
    pub quality_cells: usize,
    pub event_cells: usize,
}

/// Result of one enrichment pass over the raw table, computed fully in memory
#[derive(Debug, Clone)]
pub struct Enrichment {
    /// Cell updates for the raw table; empty when nothing changed
    pub batch: TableBatch,
    /// Raw columns followed by `DERIVED_COLUMNS`
    pub enriched_header: Vec<String>,
    /// One row per parsable raw row, ordered by symbol then date
    pub enriched_rows: Vec<Vec<String>>,
    pub stats: EnrichmentStats,
}

/// Forward labels, quality flag, event annotation and structural fields for the whole raw table.
///
/// Fails with a schema violation before anything is computed when the raw header drifted.
pub fn enrich(raw: &Table, calendar: &EventCalendar) -> Result<Enrichment> {
    if raw.is_empty() {
        return Ok(Enrichment {
            batch: TableBatch::for_table(raw),
            enriched_header: enriched_header(),
            enriched_rows: Vec::new(),
            stats: EnrichmentStats::default(),
        });
    }
    raw.ensure_schema(&RAW_SCHEMA)?;

    let arena = SeriesArena::from_table(raw);
    let mut staged = StagedTable::new(raw);

    let forward_cells = forward::fill_forward_labels(&arena, &mut staged);
    let quality_cells = forward::mark_data_quality(&arena, &mut staged);
    let event_cells = annotate_events(&arena, calendar, &mut staged);

    let derived = structure::derive_structure(&arena, &staged);
    let mut enriched_rows = Vec::with_capacity(arena.valid_rows());
    for point in arena.points() {
        let mut row = staged.row(point.row).to_vec();
        row.resize(RAW_SCHEMA.len(), String::new());
        if let Some(fields) = derived.get(&point.row) {
            row.extend(fields.to_cells());
        }
        enriched_rows.push(row);
    }

    let stats = EnrichmentStats {
        valid_rows: arena.valid_rows(),
        skipped_rows: arena.skipped(),
        symbols: arena.symbols(),
        forward_cells,
        quality_cells,
        event_cells,
    };
    let (_, batch) = staged.finish();

    info!(
        rows = stats.valid_rows,
        skipped = stats.skipped_rows,
        symbols = stats.symbols,
        updates = batch.updates.len(),
        "enrichment computed"
    );

    Ok(Enrichment { batch, enriched_header: enriched_header(), enriched_rows, stats })
}

fn annotate_events(arena: &SeriesArena, calendar: &EventCalendar, staged: &mut StagedTable) -> usize {
    let mut changed = 0;
    for point in arena.points() {
        let (is_event, event_type) = calendar.resolve_event(point.date);
        let phase = calendar.resolve_phase(point.date);

        changed += usize::from(staged.set(point.row, "is_event_day", format_bool(is_event)));
        changed += usize::from(staged.set(point.row, "event_type", event_type));
        changed += usize::from(staged.set(point.row, "event_phase", phase.to_string()));
        // event_flag is written at snapshot time; only backfill rows that lack it
        changed += usize::from(staged.fill(point.row, "event_flag", format_bool(is_event)));
    }
    debug!(changed, calendar_dates = calendar.len(), "event annotation");
    changed
}

pub fn enriched_header() -> Vec<String> {
    RAW_SCHEMA.iter().chain(DERIVED_COLUMNS.iter()).map(|s| s.to_string()).collect()
}
