use super::forward::SeriesArena;
use super::table::{DATE_FORMAT, SUMMARY_SCHEMA, Table, TableBatch, format_number, is_blank, parse_date};
use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub dominant_regime: String,
    pub share: f64,
    pub symbols: usize,
    pub created_at_utc: String,
}

impl DailySummary {
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.date.format(DATE_FORMAT).to_string(),
            self.dominant_regime.clone(),
            format_number(self.share),
            self.symbols.to_string(),
            self.created_at_utc.clone(),
        ]
    }
}

/// Regime mode on the latest market date. Equal counts resolve to the smallest label.
pub fn summarize_latest(raw: &Table, arena: &SeriesArena, created_at: DateTime<Utc>) -> Option<DailySummary> {
    let date = arena.latest_date()?;
    let rows: Vec<usize> = arena.points().filter(|p| p.date == date).map(|p| p.row).collect();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &row in &rows {
        let regime = raw.get(row, "regime").trim();
        if !is_blank(regime) {
            *counts.entry(regime).or_default() += 1;
        }
    }
    let total: usize = counts.values().sum();

    // BTreeMap iterates in label order; keep the first maximum
    let (dominant, top) = counts
        .iter()
        .fold(None::<(&str, usize)>, |best, (label, count)| match best {
            Some((_, c)) if c >= *count => best,
            _ => Some((*label, *count)),
        })?;

    Some(DailySummary {
        date,
        dominant_regime: dominant.to_string(),
        share: round2(top as f64 / total as f64),
        symbols: rows.len(),
        created_at_utc: created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

/// Batch appending `summary`, or `None` when its date is not after the newest stored date
pub fn summary_batch(summary_table: &Table, summary: &DailySummary) -> Result<Option<TableBatch>> {
    let header = summary_table.schema_or_init(&SUMMARY_SCHEMA)?;

    let latest_stored = (0..summary_table.rows.len())
        .filter_map(|row| parse_date(summary_table.get(row, "date")))
        .max();
    if latest_stored.is_some_and(|stored| summary.date <= stored) {
        return Ok(None);
    }

    let mut batch = TableBatch::for_table(summary_table);
    batch.header = header;
    batch.append(summary.to_record());
    Ok(Some(batch))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
