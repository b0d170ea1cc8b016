use super::calendar::EventPhase;
use super::forward::SeriesArena;
use super::table::{StagedTable, format_bool, is_blank, parse_number};
use crate::gamma::config;
use crate::gamma::rules::{EgpLevel, GammaBucket};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

/// Derived columns of the enriched export, in order
pub const DERIVED_COLUMNS: [&str; 12] = [
    "day_direction",
    "range_expansion",
    "close_location",
    "spot_bucket_streak",
    "gamma_bucket_streak",
    "regime_streak",
    "symbols_same_spot_bucket",
    "symbols_same_gamma_bucket",
    "cross_symbol_alignment",
    "event_structure_tag",
    "event_risk_flag",
    "regime_quality_score",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseLocation {
    High,
    Mid,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRiskFlag {
    Avoid,
    Favorable,
    Neutral,
}

/// Event phase x gamma bucket x EGP against the table-wide median
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventStructureTag {
    pub phase: EventPhase,
    pub gamma: GammaBucket,
    pub egp: EgpLevel,
}

impl fmt::Display for EventStructureTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} | {} | {}", self.phase, self.gamma, self.egp)
    }
}

impl fmt::Display for DayDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            DayDirection::Up => "UP",
            DayDirection::Down => "DOWN",
            DayDirection::Flat => "FLAT",
        })
    }
}

impl fmt::Display for CloseLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            CloseLocation::High => "HIGH",
            CloseLocation::Mid => "MID",
            CloseLocation::Low => "LOW",
        })
    }
}

impl fmt::Display for AlignmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            AlignmentLevel::High => "HIGH",
            AlignmentLevel::Medium => "MEDIUM",
            AlignmentLevel::Low => "LOW",
        })
    }
}

impl fmt::Display for EventRiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            EventRiskFlag::Avoid => "AVOID",
            EventRiskFlag::Favorable => "FAVORABLE",
            EventRiskFlag::Neutral => "NEUTRAL",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFields {
    pub day_direction: Option<DayDirection>,
    pub range_expansion: bool,
    pub close_location: Option<CloseLocation>,
    pub spot_bucket_streak: usize,
    pub gamma_bucket_streak: usize,
    pub regime_streak: usize,
    pub symbols_same_spot_bucket: usize,
    pub symbols_same_gamma_bucket: usize,
    pub cross_symbol_alignment: AlignmentLevel,
    pub event_structure_tag: Option<EventStructureTag>,
    pub event_risk_flag: EventRiskFlag,
    pub regime_quality_score: i32,
}

impl DerivedFields {
    /// Cells in `DERIVED_COLUMNS` order
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.day_direction.map(|d| d.to_string()).unwrap_or_default(),
            format_bool(self.range_expansion),
            self.close_location.map(|c| c.to_string()).unwrap_or_default(),
            self.spot_bucket_streak.to_string(),
            self.gamma_bucket_streak.to_string(),
            self.regime_streak.to_string(),
            self.symbols_same_spot_bucket.to_string(),
            self.symbols_same_gamma_bucket.to_string(),
            self.cross_symbol_alignment.to_string(),
            self.event_structure_tag.map(|t| t.to_string()).unwrap_or_default(),
            self.event_risk_flag.to_string(),
            self.regime_quality_score.to_string(),
        ]
    }
}

// -----------------------------------------------
// PURE BUILDING BLOCKS
// -----------------------------------------------

pub fn day_direction(ret_next: Option<f64>) -> Option<DayDirection> {
    ret_next.map(|r| {
        if r > 0.0 {
            DayDirection::Up
        } else if r < 0.0 {
            DayDirection::Down
        } else {
            DayDirection::Flat
        }
    })
}

pub fn close_location(spot_position: Option<f64>) -> Option<CloseLocation> {
    spot_position.map(|x| {
        if x > config::CLOSE_LOCATION_LEVEL {
            CloseLocation::High
        } else if x < -config::CLOSE_LOCATION_LEVEL {
            CloseLocation::Low
        } else {
            CloseLocation::Mid
        }
    })
}

pub fn alignment_level(same_gamma_bucket: usize) -> AlignmentLevel {
    match same_gamma_bucket {
        n if n >= 3 => AlignmentLevel::High,
        2 => AlignmentLevel::Medium,
        _ => AlignmentLevel::Low,
    }
}

pub fn event_risk_flag(phase: Option<EventPhase>, egp: Option<f64>, asym_strength: Option<f64>) -> EventRiskFlag {
    match phase {
        Some(EventPhase::Event) if egp.is_some_and(|e| e < config::EVENT_LOW_EGP) => EventRiskFlag::Avoid,
        Some(EventPhase::PreEvent) if asym_strength.is_some_and(|a| a > config::PRE_EVENT_ASYM_LEVEL) => {
            EventRiskFlag::Favorable
        }
        _ => EventRiskFlag::Neutral,
    }
}

pub fn regime_quality_score(regime_streak: usize, same_gamma_bucket: usize, range_expansion: bool, risk: EventRiskFlag) -> i32 {
    i32::from(regime_streak >= 2) + i32::from(same_gamma_bucket >= 2) + i32::from(range_expansion)
        - i32::from(risk == EventRiskFlag::Avoid)
}

/// Median of the finite values, `None` when there are none
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Consecutive equal values ending at each position. Blank values never extend a run.
pub fn run_lengths(values: &[&str]) -> Vec<usize> {
    let mut out = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let streak = match i {
            0 => 1,
            _ if !is_blank(value) && values[i - 1] == *value => out[i - 1] + 1,
            _ => 1,
        };
        out.push(streak);
    }
    out
}

/// Width above the median of the trailing window (current row included, missing widths ignored)
pub fn range_expansion(widths: &[Option<f64>], window: usize) -> Vec<bool> {
    (0..widths.len())
        .map(|i| {
            let Some(current) = widths[i] else {
                return false;
            };
            let start = (i + 1).saturating_sub(window);
            let trailing: Vec<f64> = widths[start..=i].iter().flatten().copied().collect();
            median(&trailing).is_some_and(|m| current > m)
        })
        .collect()
}

/// Size of the most common non-blank value
fn majority_count<'a>(values: impl Iterator<Item = &'a str>) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.filter(|v| !is_blank(v)) {
        *counts.entry(v).or_default() += 1;
    }
    counts.into_values().max().unwrap_or(0)
}

// -----------------------------------------------
// TABLE PASS
// -----------------------------------------------

/// Derive the structural fields of every parsable row from the annotated table.
///
/// Streaks and range expansion follow each symbol's own chronology; cross-symbol counts
/// depend only on the date, so the result does not depend on symbol order.
pub fn derive_structure(arena: &SeriesArena, staged: &StagedTable) -> HashMap<usize, DerivedFields> {
    let num = |row: usize, column: &str| parse_number(staged.get(row, column));

    // cross-symbol majorities per date
    let mut by_date: HashMap<NaiveDate, Vec<usize>> = HashMap::new();
    for p in arena.points() {
        by_date.entry(p.date).or_default().push(p.row);
    }
    let mut same_spot: HashMap<NaiveDate, usize> = HashMap::new();
    let mut same_gamma: HashMap<NaiveDate, usize> = HashMap::new();
    for (date, rows) in &by_date {
        same_spot.insert(*date, majority_count(rows.iter().map(|&r| staged.get(r, "spot_bucket"))));
        same_gamma.insert(*date, majority_count(rows.iter().map(|&r| staged.get(r, "gamma_bucket"))));
    }

    let egp_values: Vec<f64> = arena.points().filter_map(|p| num(p.row, "effective_gamma_pressure")).collect();
    let egp_median = median(&egp_values);

    let mut derived = HashMap::new();
    for series in arena.iter() {
        let rows: Vec<usize> = series.points.iter().map(|p| p.row).collect();
        let column = |name: &str| rows.iter().map(|&r| staged.get(r, name)).collect::<Vec<&str>>();

        let spot_streaks = run_lengths(&column("spot_bucket"));
        let gamma_streaks = run_lengths(&column("gamma_bucket"));
        let regime_streaks = run_lengths(&column("regime"));
        let widths: Vec<Option<f64>> = rows.iter().map(|&r| num(r, "dnz_width")).collect();
        let expansion = range_expansion(&widths, config::RANGE_EXPANSION_WINDOW);

        for (i, point) in series.points.iter().enumerate() {
            let row = point.row;
            let egp = num(row, "effective_gamma_pressure");
            let phase = staged.get(row, "event_phase").parse::<EventPhase>().ok();
            let same_spot_bucket = same_spot.get(&point.date).copied().unwrap_or(0);
            let same_gamma_bucket = same_gamma.get(&point.date).copied().unwrap_or(0);

            let egp_level = match (egp, egp_median) {
                (Some(e), Some(m)) if e > m => EgpLevel::HighEgp,
                _ => EgpLevel::LowEgp,
            };
            let event_structure_tag = match (phase, staged.get(row, "gamma_bucket").parse::<GammaBucket>()) {
                (Some(phase), Ok(gamma)) => Some(EventStructureTag { phase, gamma, egp: egp_level }),
                _ => None,
            };

            let risk = event_risk_flag(phase, egp, num(row, "gamma_asym_strength"));

            derived.insert(
                row,
                DerivedFields {
                    day_direction: day_direction(num(row, "ret_t+1")),
                    range_expansion: expansion[i],
                    close_location: close_location(num(row, "spot_position")),
                    spot_bucket_streak: spot_streaks[i],
                    gamma_bucket_streak: gamma_streaks[i],
                    regime_streak: regime_streaks[i],
                    symbols_same_spot_bucket: same_spot_bucket,
                    symbols_same_gamma_bucket: same_gamma_bucket,
                    cross_symbol_alignment: alignment_level(same_gamma_bucket),
                    event_structure_tag,
                    event_risk_flag: risk,
                    regime_quality_score: regime_quality_score(
                        regime_streaks[i],
                        same_gamma_bucket,
                        expansion[i],
                        risk,
                    ),
                },
            );
        }
    }
    derived
}
