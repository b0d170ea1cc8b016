use chrono::NaiveDate;
use gamma_log::gamma::{
    ChainSnapshot, ContractExposure, GammaBucket, OptionContract, OptionSide, aggregate_gamma, build_snapshot,
    classify_regime, compute_exposures, decay_weight, effective_gamma_pressure, gamma_profile, greeks_or_neutral,
    locate_dnz,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn exposure(side: OptionSide, strike: f64, delta: f64, gamma: f64, oi: u64, dte: i64) -> ContractExposure {
        let w = decay_weight(dte);
        ContractExposure {
            contract: OptionContract::new(side, strike, oi, 0.2, dte),
            delta_exposure: delta * oi as f64 * w,
            gamma_exposure: gamma * oi as f64 * w,
        }
    }

    fn chain(spot: f64, seed: u64) -> ChainSnapshot {
        let mut contracts = Vec::new();
        for i in 0..20u64 {
            let offset = (i as f64 - 10.0) * spot * 0.01;
            let oi = 100 + (seed * 37 + i * 53) % 900;
            let dte = 1 + ((seed + i) % 30) as i64;
            let side = if (i + seed) % 2 == 0 { OptionSide::Call } else { OptionSide::Put };
            contracts.push(OptionContract::new(side, spot + offset, oi, 0.15 + (i % 5) as f64 * 0.03, dte));
        }
        ChainSnapshot {
            symbol: "SPY".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            spot,
            contracts,
            dropped: 0,
        }
    }

    #[test]
    fn test_symmetric_spy_chain_is_gamma_neutral() {
        let exposures = vec![
            exposure(OptionSide::Call, 510.0, 0.3, 0.02, 1000, 5),
            exposure(OptionSide::Put, 490.0, -0.3, 0.02, 1000, 5),
        ];
        let agg = aggregate_gamma(&exposures, 500.0);

        assert_eq!(agg.gamma_above, agg.gamma_below);
        assert!((agg.gamma_total - (agg.gamma_above + agg.gamma_below)).abs() < 1e-9);
        assert_eq!(agg.gamma_diff, 0.0);
        assert_eq!(agg.gamma_ratio, 0.5);
        assert_eq!(classify_regime(0.0, agg.gamma_ratio).gamma, GammaBucket::GammaNeutral);
    }

    #[test]
    fn test_strike_at_spot_counts_on_neither_side() {
        let exposures = vec![
            exposure(OptionSide::Call, 500.0, 0.5, 0.05, 1000, 5),
            exposure(OptionSide::Call, 505.0, 0.4, 0.01, 100, 5),
        ];
        let agg = aggregate_gamma(&exposures, 500.0);
        assert_eq!(agg.gamma_below, 0.0);
        assert!((agg.gamma_total - agg.gamma_above).abs() < 1e-12);
        assert_eq!(agg.gamma_ratio, 1.0);
    }

    #[test]
    fn test_empty_aggregate_is_zero() {
        let agg = aggregate_gamma(&[], 500.0);
        assert_eq!(agg.gamma_total, 0.0);
        assert_eq!(agg.gamma_ratio, 0.0);
        assert_eq!(agg.gamma_asym_strength, 0.0);

        let profile = gamma_profile(&[], 500.0);
        assert_eq!(profile.gamma_concentration, 0.0);
        assert!(profile.gamma_peak_price.is_none());
    }

    #[test]
    fn test_snapshot_invariants_across_chains() {
        for (spot, seed) in [(500.0, 1), (95.5, 2), (4200.0, 3), (31.2, 4), (220.0, 5)] {
            let snap = build_snapshot(&chain(spot, seed), 0.05).unwrap();

            assert!((snap.gamma_total - (snap.gamma_above + snap.gamma_below)).abs() < 1e-9);
            assert!(snap.dnz_width > 0.0);
            assert!(snap.dnz_low < snap.dnz_mid && snap.dnz_mid < snap.dnz_high);
            assert!((snap.dnz_width - (snap.dnz_high - snap.dnz_low)).abs() < 1e-9);
            assert!(snap.spot_position.is_finite());
            assert!(snap.effective_gamma_pressure >= 0.0);
            assert!(snap.egp_normalized.is_finite());
            if snap.gamma_total != 0.0 {
                assert!((0.0..=1.0).contains(&snap.gamma_ratio));
            }
            assert!((0.0..=1.0).contains(&snap.gamma_concentration));
            assert_eq!(snap.regime.to_string(), format!("{} | {}", snap.spot_bucket, snap.gamma_bucket));
            // DNZ always lands on the +/-10% grid
            assert!(snap.dnz_mid >= spot * 0.9 - 1e-9 && snap.dnz_mid <= spot * 1.1 + 1e-9);
        }
    }

    #[test]
    fn test_dnz_is_deterministic() {
        let c = chain(500.0, 7);
        let a = locate_dnz(&c.contracts, c.spot, 0.05).unwrap();
        let b = locate_dnz(&c.contracts, c.spot, 0.05).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_degenerate_quote_is_neutral_not_fatal() {
        let mut c = chain(500.0, 9);
        c.contracts.push(OptionContract::new(OptionSide::Call, 505.0, 10, f64::NAN, 3));

        let g = greeks_or_neutral(OptionSide::Call, 500.0, 505.0, 3.0 / 365.0, 0.05, f64::NAN);
        assert_eq!((g.delta, g.gamma), (0.0, 0.0));

        let exposures = compute_exposures(&c.contracts, c.spot, 0.05);
        let last = exposures.last().unwrap();
        assert_eq!(last.gamma_exposure, 0.0);
        assert!(effective_gamma_pressure(&c.contracts, c.spot, 0.05).is_finite());
        assert!(build_snapshot(&c, 0.05).is_some());
    }
}
