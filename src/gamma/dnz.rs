use super::config;
use super::models::OptionContract;
use super::processor::net_delta_at;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Delta-neutral zone band around the grid minimum of |net delta|
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DnzBand {
    pub dnz_low: f64,
    pub dnz_mid: f64,
    pub dnz_high: f64,
    pub dnz_width: f64,
}

impl DnzBand {
    /// Band as a fixed percentage of the mid price on each side
    pub fn around(mid: f64) -> Self {
        let dnz_low = mid * (1.0 - config::DNZ_BAND_PCT);
        let dnz_high = mid * (1.0 + config::DNZ_BAND_PCT);
        Self { dnz_low, dnz_mid: mid, dnz_high, dnz_width: dnz_high - dnz_low }
    }
}

/// `points` evenly spaced prices from `low` to `high` inclusive
pub fn price_grid(low: f64, high: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![low],
        n => {
            let step = (high - low) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { high } else { low + step * i as f64 }).collect()
        }
    }
}

/// Grid search for the price where net dealer delta is closest to zero.
///
/// Returns `None` for an empty chain or a non-positive spot.
pub fn locate_dnz(contracts: &[OptionContract], spot: f64, rate: f64) -> Option<DnzBand> {
    if contracts.is_empty() || !(spot > 0.0) || !spot.is_finite() {
        return None;
    }

    let grid = price_grid(
        spot * config::DNZ_GRID_LOW,
        spot * config::DNZ_GRID_HIGH,
        config::DNZ_GRID_POINTS,
    );

    let net: Vec<f64> = grid.par_iter().map(|&p| net_delta_at(contracts, p, rate).abs()).collect();

    // first index wins on ties
    let mut best = 0;
    for (i, value) in net.iter().enumerate() {
        if *value < net[best] {
            best = i;
        }
    }

    Some(DnzBand::around(grid[best]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::models::OptionSide;

    #[test]
    fn test_price_grid_endpoints() {
        let grid = price_grid(90.0, 110.0, 200);
        assert_eq!(grid.len(), 200);
        assert_eq!(grid[0], 90.0);
        assert_eq!(grid[199], 110.0);
        assert!(grid.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_band_ordering() {
        let band = DnzBand::around(500.0);
        assert!(band.dnz_low < band.dnz_mid && band.dnz_mid < band.dnz_high);
        assert!((band.dnz_width - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_straddle_dnz_sits_near_strike() {
        // long call + long put at the same strike: net delta crosses zero near the strike
        let contracts = vec![
            OptionContract::new(OptionSide::Call, 100.0, 1000, 0.2, 10),
            OptionContract::new(OptionSide::Put, 100.0, 1000, 0.2, 10),
        ];
        let band = locate_dnz(&contracts, 102.0, 0.0).unwrap();
        assert!((band.dnz_mid - 100.0).abs() < 1.0, "mid {}", band.dnz_mid);
    }

    #[test]
    fn test_empty_chain_has_no_dnz() {
        assert!(locate_dnz(&[], 100.0, 0.05).is_none());
        let contracts = vec![OptionContract::new(OptionSide::Call, 100.0, 10, 0.2, 10)];
        assert!(locate_dnz(&contracts, 0.0, 0.05).is_none());
    }
}
