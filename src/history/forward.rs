use super::table::{StagedTable, Table, format_bool, format_number, parse_date, parse_number};
use crate::gamma::config;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One parsable snapshot row in a symbol's history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Index of the row in the backing table
    pub row: usize,
    pub date: NaiveDate,
    pub spot: f64,
}

/// A symbol's snapshots in chronological order
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSeries {
    pub symbol: String,
    pub points: Vec<SeriesPoint>,
}

/// Rows keyed by symbol, each series indexed by chronological position.
///
/// Rows with an unparsable date, a non-positive spot or no symbol are left out; they stay in the table untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesArena {
    series: BTreeMap<String, SymbolSeries>,
    skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardLabel {
    pub close: f64,
    pub ret: f64,
    pub days: usize,
}

impl SymbolSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl SeriesArena {
    pub fn from_table(table: &Table) -> Self {
        let mut series: BTreeMap<String, SymbolSeries> = BTreeMap::new();
        let mut skipped = 0;

        for row in 0..table.rows.len() {
            let symbol = table.get(row, "symbol").trim();
            let date = parse_date(table.get(row, "date"));
            let spot = parse_number(table.get(row, "spot")).filter(|s| *s > 0.0);

            match (symbol.is_empty(), date, spot) {
                (false, Some(date), Some(spot)) => {
                    series
                        .entry(symbol.to_string())
                        .or_insert_with(|| SymbolSeries { symbol: symbol.to_string(), points: Vec::new() })
                        .points
                        .push(SeriesPoint { row, date, spot });
                }
                _ => skipped += 1,
            }
        }

        for s in series.values_mut() {
            s.points.sort_by_key(|p| (p.date, p.row));
        }

        Self { series, skipped }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolSeries> {
        self.series.values()
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.series.get(symbol)
    }

    pub fn symbols(&self) -> usize {
        self.series.len()
    }

    /// Rows excluded for a missing date or symbol, or a missing/non-positive spot
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn valid_rows(&self) -> usize {
        self.series.values().map(SymbolSeries::len).sum()
    }

    pub fn points(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.series.values().flat_map(|s| s.points.iter())
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.points().map(|p| p.date).max()
    }

    /// Distinct symbols reporting each date
    pub fn symbols_per_date(&self) -> HashMap<NaiveDate, usize> {
        let mut seen: HashMap<NaiveDate, HashSet<&str>> = HashMap::new();
        for s in self.series.values() {
            for p in &s.points {
                seen.entry(p.date).or_default().insert(s.symbol.as_str());
            }
        }
        seen.into_iter().map(|(date, symbols)| (date, symbols.len())).collect()
    }
}

/// Label for `position` looking `horizon` sessions ahead, `None` until that session exists
pub fn forward_label(series: &SymbolSeries, position: usize, horizon: usize) -> Option<ForwardLabel> {
    let base = series.points.get(position)?;
    let future = series.points.get(position.checked_add(horizon)?)?;
    Some(ForwardLabel {
        close: future.spot,
        ret: future.spot / base.spot - 1.0,
        days: horizon,
    })
}

pub fn close_column(horizon: usize) -> String {
    format!("close_t+{}", horizon)
}

pub fn ret_column(horizon: usize) -> String {
    format!("ret_t+{}", horizon)
}

pub fn days_column(horizon: usize) -> String {
    format!("days_to_close_t+{}", horizon)
}

/// Fill every empty forward field that now has a future session. Returns cells staged.
pub fn fill_forward_labels(arena: &SeriesArena, staged: &mut StagedTable) -> usize {
    let mut filled = 0;
    for series in arena.iter() {
        for (position, point) in series.points.iter().enumerate() {
            for horizon in config::FORWARD_HORIZONS {
                let Some(label) = forward_label(series, position, horizon) else {
                    continue;
                };
                let cells = [
                    (close_column(horizon), format_number(label.close)),
                    (ret_column(horizon), format_number(label.ret)),
                    (days_column(horizon), label.days.to_string()),
                ];
                for (column, value) in cells {
                    if staged.fill(point.row, &column, value) {
                        filled += 1;
                    }
                }
            }
        }
    }
    filled
}

/// data_ok = distinct symbols on the row's date reach the quorum
pub fn mark_data_quality(arena: &SeriesArena, staged: &mut StagedTable) -> usize {
    let counts = arena.symbols_per_date();
    let mut changed = 0;
    for point in arena.points() {
        let ok = counts.get(&point.date).copied().unwrap_or(0) >= config::DATA_OK_QUORUM;
        if staged.set(point.row, "data_ok", format_bool(ok)) {
            changed += 1;
        }
    }
    changed
}
