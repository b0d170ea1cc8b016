use super::dnz::locate_dnz;
use super::egp::{effective_gamma_pressure, normalize_egp};
use super::models::ChainSnapshot;
use super::processor::{aggregate_gamma, compute_exposures, gamma_profile};
use super::rules::{GammaBucket, Regime, SpotBucket, StructureTags, classify_regime, spot_position, structure_tags};
use crate::history::table::{DATE_FORMAT, RAW_SCHEMA, format_bool, format_number, format_opt};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One (date, symbol) row of exposure analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    pub date: NaiveDate,
    pub symbol: String,
    pub spot: f64,

    pub dnz_low: f64,
    pub dnz_mid: f64,
    pub dnz_high: f64,
    pub dnz_width: f64,
    pub spot_position: f64,

    pub spot_bucket: SpotBucket,
    pub gamma_bucket: GammaBucket,
    pub regime: Regime,

    pub gamma_above: f64,
    pub gamma_below: f64,
    pub gamma_total: f64,
    pub gamma_diff: f64,
    pub gamma_ratio: f64,
    pub gamma_asym_strength: f64,

    pub effective_gamma_pressure: f64,
    pub egp_normalized: f64,
    pub gamma_peak_price: Option<f64>,
    pub gamma_concentration: f64,
    pub gamma_distance_from_spot: Option<f64>,

    pub contracts: usize,
}

impl ExposureSnapshot {
    /// ISO year-week, e.g. `2025-W03`
    pub fn week(&self) -> String {
        iso_week(self.date)
    }

    pub fn structure_tags(&self) -> StructureTags {
        structure_tags(
            self.spot,
            self.dnz_low,
            self.dnz_high,
            self.gamma_above,
            self.gamma_below,
            self.effective_gamma_pressure,
        )
    }

    /// Row in raw-table column order; forward and quality fields are left for enrichment
    pub fn to_record(&self, event_flag: bool) -> Vec<String> {
        RAW_SCHEMA
            .iter()
            .map(|column| match *column {
                "date" => self.date.format(DATE_FORMAT).to_string(),
                "week" => self.week(),
                "symbol" => self.symbol.clone(),
                "spot" => format_number(self.spot),
                "dnz_low" => format_number(self.dnz_low),
                "dnz_mid" => format_number(self.dnz_mid),
                "dnz_high" => format_number(self.dnz_high),
                "dnz_width" => format_number(self.dnz_width),
                "spot_position" => format_number(self.spot_position),
                "spot_bucket" => self.spot_bucket.to_string(),
                "gamma_bucket" => self.gamma_bucket.to_string(),
                "regime" => self.regime.to_string(),
                "gamma_above" => format_number(self.gamma_above),
                "gamma_below" => format_number(self.gamma_below),
                "gamma_total" => format_number(self.gamma_total),
                "gamma_diff" => format_number(self.gamma_diff),
                "gamma_ratio" => format_number(self.gamma_ratio),
                "gamma_asym_strength" => format_number(self.gamma_asym_strength),
                "effective_gamma_pressure" => format_number(self.effective_gamma_pressure),
                "egp_normalized" => format_number(self.egp_normalized),
                "gamma_peak_price" => format_opt(self.gamma_peak_price),
                "gamma_concentration" => format_number(self.gamma_concentration),
                "gamma_distance_from_spot" => format_opt(self.gamma_distance_from_spot),
                "event_flag" => format_bool(event_flag),
                _ => String::new(),
            })
            .collect()
    }
}

pub fn iso_week(date: NaiveDate) -> String {
    date.format("%G-W%V").to_string()
}

/// Full exposure pipeline for one chain. `None` when no DNZ can be located (empty chain or bad spot).
pub fn build_snapshot(chain: &ChainSnapshot, rate: f64) -> Option<ExposureSnapshot> {
    let Some(dnz) = locate_dnz(&chain.contracts, chain.spot, rate) else {
        warn!(symbol = %chain.symbol, contracts = chain.contracts.len(), spot = chain.spot, "no DNZ, snapshot skipped");
        return None;
    };

    let exposures = compute_exposures(&chain.contracts, chain.spot, rate);
    let gamma = aggregate_gamma(&exposures, chain.spot);
    let profile = gamma_profile(&exposures, chain.spot);

    let egp = effective_gamma_pressure(&chain.contracts, chain.spot, rate);
    let position = spot_position(chain.spot, dnz.dnz_mid, dnz.dnz_width);
    let regime = classify_regime(position, gamma.gamma_ratio);

    debug!(
        symbol = %chain.symbol,
        dnz_mid = dnz.dnz_mid,
        gamma_ratio = gamma.gamma_ratio,
        egp,
        regime = %regime,
        "snapshot computed"
    );

    Some(ExposureSnapshot {
        date: chain.date,
        symbol: chain.symbol.clone(),
        spot: chain.spot,
        dnz_low: dnz.dnz_low,
        dnz_mid: dnz.dnz_mid,
        dnz_high: dnz.dnz_high,
        dnz_width: dnz.dnz_width,
        spot_position: position,
        spot_bucket: regime.spot,
        gamma_bucket: regime.gamma,
        regime,
        gamma_above: gamma.gamma_above,
        gamma_below: gamma.gamma_below,
        gamma_total: gamma.gamma_total,
        gamma_diff: gamma.gamma_diff,
        gamma_ratio: gamma.gamma_ratio,
        gamma_asym_strength: gamma.gamma_asym_strength,
        effective_gamma_pressure: egp,
        egp_normalized: normalize_egp(egp, dnz.dnz_width),
        gamma_peak_price: profile.gamma_peak_price,
        gamma_concentration: profile.gamma_concentration,
        gamma_distance_from_spot: profile.gamma_distance_from_spot,
        contracts: chain.contracts.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::models::{OptionContract, OptionSide};

    fn chain() -> ChainSnapshot {
        ChainSnapshot {
            symbol: "SPY".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            spot: 500.0,
            contracts: vec![
                OptionContract::new(OptionSide::Call, 510.0, 1000, 0.2, 5),
                OptionContract::new(OptionSide::Put, 490.0, 1000, 0.2, 5),
                OptionContract::new(OptionSide::Call, 520.0, 300, 0.22, 12),
            ],
            dropped: 0,
        }
    }

    #[test]
    fn test_iso_week() {
        assert_eq!(iso_week(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()), "2025-W03");
        // ISO year differs from calendar year at the boundary
        assert_eq!(iso_week(NaiveDate::from_ymd_opt(2024, 12, 30).unwrap()), "2025-W01");
    }

    #[test]
    fn test_build_snapshot_invariants() {
        let snap = build_snapshot(&chain(), 0.05).unwrap();
        assert!((snap.gamma_total - (snap.gamma_above + snap.gamma_below)).abs() < 1e-9);
        assert!(snap.dnz_low < snap.dnz_mid && snap.dnz_mid < snap.dnz_high);
        assert!(snap.spot_position.is_finite());
        assert!(snap.effective_gamma_pressure >= 0.0);
        assert!((0.0..=1.0).contains(&snap.gamma_ratio));
        assert_eq!(snap.regime.to_string(), format!("{} | {}", snap.spot_bucket, snap.gamma_bucket));
    }

    #[test]
    fn test_record_follows_raw_schema() {
        let snap = build_snapshot(&chain(), 0.05).unwrap();
        let record = snap.to_record(true);
        assert_eq!(record.len(), RAW_SCHEMA.len());

        let at = |name: &str| record[RAW_SCHEMA.iter().position(|c| *c == name).unwrap()].clone();
        assert_eq!(at("date"), "2025-01-15");
        assert_eq!(at("week"), "2025-W03");
        assert_eq!(at("symbol"), "SPY");
        assert_eq!(at("event_flag"), "TRUE");
        assert_eq!(at("close_t+1"), "");
        assert_eq!(at("data_ok"), "");
    }

    #[test]
    fn test_empty_chain_has_no_snapshot() {
        let mut empty = chain();
        empty.contracts.clear();
        assert!(build_snapshot(&empty, 0.05).is_none());
    }
}
