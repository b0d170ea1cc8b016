use super::config;
use super::greeks::greeks_or_neutral;
use super::models::{ContractExposure, OptionContract};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Above/below-spot gamma split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaAggregate {
    pub gamma_above: f64,
    pub gamma_below: f64,
    pub gamma_total: f64,
    pub gamma_diff: f64,
    pub gamma_ratio: f64,
    pub gamma_asym_strength: f64,
}

/// Strike-level shape of the gamma exposure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GammaProfile {
    /// (strike, summed gamma exposure), ranked by |gamma| descending
    pub by_strike: Vec<(f64, f64)>,
    pub gamma_peak_price: Option<f64>,
    pub gamma_concentration: f64,
    pub gamma_distance_from_spot: Option<f64>,
}

/// Time-decay weight, dte clamped to at least one day
pub fn decay_weight(days_to_expiry: i64) -> f64 {
    1.0 / (days_to_expiry.max(1) as f64).sqrt()
}

/// Weighted delta and gamma of one contract with the underlying at `price`
pub fn weighted_greeks(contract: &OptionContract, price: f64, rate: f64) -> (f64, f64) {
    let greeks = greeks_or_neutral(
        contract.side,
        price,
        contract.strike,
        contract.time_to_expiry_years(),
        rate,
        contract.implied_volatility,
    );
    let scale = contract.open_interest as f64 * decay_weight(contract.days_to_expiry);
    (greeks.delta * scale, greeks.gamma * scale)
}

/// Exposures of every contract at the real spot
pub fn compute_exposures(contracts: &[OptionContract], spot: f64, rate: f64) -> Vec<ContractExposure> {
    contracts
        .iter()
        .map(|contract| {
            let (delta_exposure, gamma_exposure) = weighted_greeks(contract, spot, rate);
            ContractExposure { contract: contract.clone(), delta_exposure, gamma_exposure }
        })
        .collect()
}

/// Net weighted delta of the whole chain re-evaluated with the underlying at `price`
pub fn net_delta_at(contracts: &[OptionContract], price: f64, rate: f64) -> f64 {
    contracts.iter().map(|c| weighted_greeks(c, price, rate).0).sum()
}

/// Split gamma exposure above and below spot. A strike exactly at spot counts on neither side.
pub fn aggregate_gamma(exposures: &[ContractExposure], spot: f64) -> GammaAggregate {
    let mut gamma_above = 0.0;
    let mut gamma_below = 0.0;

    for exp in exposures {
        if exp.contract.strike > spot {
            gamma_above += exp.gamma_exposure;
        } else if exp.contract.strike < spot {
            gamma_below += exp.gamma_exposure;
        }
    }

    let gamma_total = gamma_above + gamma_below;
    let gamma_diff = gamma_above - gamma_below;
    let (gamma_ratio, gamma_asym_strength) = if gamma_total != 0.0 {
        (
            (gamma_above / gamma_total).clamp(0.0, 1.0),
            (gamma_diff.abs() / gamma_total.abs()).min(1.0),
        )
    } else {
        (0.0, 0.0)
    };

    GammaAggregate { gamma_above, gamma_below, gamma_total, gamma_diff, gamma_ratio, gamma_asym_strength }
}

/// Group exposures by strike and rank by absolute gamma
pub fn gamma_profile(exposures: &[ContractExposure], spot: f64) -> GammaProfile {
    // f64 keys are not Ord; strikes are grouped on their bit pattern
    let mut grouped: BTreeMap<u64, (f64, f64)> = BTreeMap::new();
    for exp in exposures {
        let entry = grouped.entry(exp.contract.strike.to_bits()).or_insert((exp.contract.strike, 0.0));
        entry.1 += exp.gamma_exposure;
    }

    let mut by_strike: Vec<(f64, f64)> = grouped.into_values().collect();
    by_strike.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
    });

    let total_abs: f64 = by_strike.iter().map(|(_, g)| g.abs()).sum();
    let top_abs: f64 = by_strike
        .iter()
        .take(config::GAMMA_CONCENTRATION_TOP_N)
        .map(|(_, g)| g.abs())
        .sum();

    let gamma_concentration = if total_abs > 0.0 { (top_abs / total_abs).clamp(0.0, 1.0) } else { 0.0 };

    let gamma_peak_price = by_strike.first().map(|(strike, _)| *strike);
    let gamma_distance_from_spot = gamma_peak_price
        .filter(|_| spot != 0.0)
        .map(|peak| (peak - spot) / spot);

    GammaProfile { by_strike, gamma_peak_price, gamma_concentration, gamma_distance_from_spot }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::models::OptionSide;

    fn exposure(side: OptionSide, strike: f64, delta: f64, gamma: f64, oi: u64, dte: i64) -> ContractExposure {
        let w = decay_weight(dte);
        ContractExposure {
            contract: OptionContract::new(side, strike, oi, 0.2, dte),
            delta_exposure: delta * oi as f64 * w,
            gamma_exposure: gamma * oi as f64 * w,
        }
    }

    #[test]
    fn test_decay_weight() {
        assert_eq!(decay_weight(1), 1.0);
        assert_eq!(decay_weight(0), 1.0);
        assert_eq!(decay_weight(-3), 1.0);
        assert_eq!(decay_weight(4), 0.5);
        assert!(decay_weight(10) > decay_weight(20));
    }

    #[test]
    fn test_symmetric_chain_is_balanced() {
        let exposures = vec![
            exposure(OptionSide::Call, 510.0, 0.3, 0.02, 1000, 5),
            exposure(OptionSide::Put, 490.0, -0.3, 0.02, 1000, 5),
        ];
        let agg = aggregate_gamma(&exposures, 500.0);

        assert_eq!(agg.gamma_above, agg.gamma_below);
        assert!((agg.gamma_total - (agg.gamma_above + agg.gamma_below)).abs() < 1e-9);
        assert_eq!(agg.gamma_diff, 0.0);
        assert_eq!(agg.gamma_ratio, 0.5);
        assert_eq!(agg.gamma_asym_strength, 0.0);
    }

    #[test]
    fn test_strike_at_spot_counts_nowhere() {
        let exposures = vec![exposure(OptionSide::Call, 500.0, 0.5, 0.05, 100, 3)];
        let agg = aggregate_gamma(&exposures, 500.0);
        assert_eq!(agg.gamma_total, 0.0);
        assert_eq!(agg.gamma_ratio, 0.0);
    }

    #[test]
    fn test_gamma_profile_peak_and_concentration() {
        let exposures = vec![
            exposure(OptionSide::Call, 105.0, 0.4, 0.05, 100, 1),
            exposure(OptionSide::Put, 105.0, -0.6, 0.05, 100, 1),
            exposure(OptionSide::Call, 110.0, 0.2, 0.01, 100, 1),
            exposure(OptionSide::Put, 95.0, -0.2, 0.02, 100, 1),
            exposure(OptionSide::Put, 90.0, -0.1, 0.01, 100, 1),
        ];
        let profile = gamma_profile(&exposures, 100.0);

        // 105 groups call + put: 10.0
        assert_eq!(profile.gamma_peak_price, Some(105.0));
        assert_eq!(profile.by_strike.len(), 4);
        assert!((profile.by_strike[0].1 - 10.0).abs() < 1e-12);
        // top3 = 10 + 2 + 1, total = 14
        assert!((profile.gamma_concentration - 13.0 / 14.0).abs() < 1e-12);
        assert!((profile.gamma_distance_from_spot.unwrap() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_empty_profile() {
        let profile = gamma_profile(&[], 100.0);
        assert_eq!(profile.gamma_peak_price, None);
        assert_eq!(profile.gamma_concentration, 0.0);
        assert_eq!(profile.gamma_distance_from_spot, None);
    }

    #[test]
    fn test_compute_exposures_weights_by_oi_and_decay() {
        let contracts = vec![OptionContract::new(OptionSide::Call, 100.0, 400, 0.2, 4)];
        let exposures = compute_exposures(&contracts, 100.0, 0.05);
        let (d, g) = weighted_greeks(&contracts[0], 100.0, 0.05);

        assert_eq!(exposures[0].delta_exposure, d);
        assert_eq!(exposures[0].gamma_exposure, g);
        // 400 * 1/sqrt(4) = 200 contracts worth of delta, call delta ~0.5
        assert!(d > 90.0 && d < 110.0, "delta exposure {}", d);
    }
}
