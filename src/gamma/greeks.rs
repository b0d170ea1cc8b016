//! Closed-form lognormal (Black-Scholes) delta and gamma for a single contract.

use super::models::OptionSide;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
}

impl Greeks {
    pub const NEUTRAL: Greeks = Greeks { delta: 0.0, gamma: 0.0 };
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DegenerateInputError {
    #[error("non-finite input: {0}")]
    NonFinite(&'static str),
    #[error("non-positive input: {0}")]
    NonPositive(&'static str),
    #[error("greeks evaluated to a non-finite value")]
    NonFiniteResult,
    #[error("standard normal unavailable")]
    Distribution,
}

/// Black-Scholes delta/gamma. `time` is in years and must be strictly positive.
pub fn black_scholes_greeks(
    side: OptionSide,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    volatility: f64,
) -> Result<Greeks, DegenerateInputError> {
    for (name, value) in [
        ("spot", spot),
        ("strike", strike),
        ("time", time),
        ("rate", rate),
        ("volatility", volatility),
    ] {
        if !value.is_finite() {
            return Err(DegenerateInputError::NonFinite(name));
        }
    }
    for (name, value) in [("spot", spot), ("strike", strike), ("time", time), ("volatility", volatility)] {
        if value <= 0.0 {
            return Err(DegenerateInputError::NonPositive(name));
        }
    }

    let normal = std_normal()?;
    let sqrt_t = time.sqrt();
    let d1 = ((spot / strike).ln() + (rate + volatility * volatility / 2.0) * time) / (volatility * sqrt_t);

    let delta = match side {
        OptionSide::Call => normal.cdf(d1),
        OptionSide::Put => normal.cdf(d1) - 1.0,
    };
    let gamma = norm_pdf(d1) / (spot * volatility * sqrt_t);

    if !delta.is_finite() || !gamma.is_finite() {
        return Err(DegenerateInputError::NonFiniteResult);
    }
    Ok(Greeks { delta, gamma })
}

/// A single bad quote must not abort a snapshot: degenerate inputs count as zero exposure.
pub fn greeks_or_neutral(side: OptionSide, spot: f64, strike: f64, time: f64, rate: f64, volatility: f64) -> Greeks {
    black_scholes_greeks(side, spot, strike, time, rate, volatility).unwrap_or(Greeks::NEUTRAL)
}

fn std_normal() -> Result<Normal, DegenerateInputError> {
    Normal::new(0.0, 1.0).map_err(|_| DegenerateInputError::Distribution)
}

fn norm_pdf(x: f64) -> f64 {
    (-(x * x) / 2.0).exp() / (2.0 * PI).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: f64 = 7.0 / 365.0;

    #[test]
    fn test_call_put_parity_of_delta() {
        let call = black_scholes_greeks(OptionSide::Call, 500.0, 505.0, T, 0.05, 0.2).unwrap();
        let put = black_scholes_greeks(OptionSide::Put, 500.0, 505.0, T, 0.05, 0.2).unwrap();

        assert!((call.delta - put.delta - 1.0).abs() < 1e-10);
        assert!((call.gamma - put.gamma).abs() < 1e-15);
        assert!(call.delta > 0.0 && call.delta < 1.0);
        assert!(put.delta < 0.0 && put.delta > -1.0);
    }

    #[test]
    fn test_atm_call_delta_near_half() {
        let g = black_scholes_greeks(OptionSide::Call, 100.0, 100.0, T, 0.0, 0.2).unwrap();
        assert!((g.delta - 0.5).abs() < 0.02, "delta was {}", g.delta);
        assert!(g.gamma > 0.0);
    }

    #[test]
    fn test_deep_itm_and_otm() {
        let itm = black_scholes_greeks(OptionSide::Call, 150.0, 100.0, T, 0.05, 0.2).unwrap();
        let otm = black_scholes_greeks(OptionSide::Call, 50.0, 100.0, T, 0.05, 0.2).unwrap();
        assert!(itm.delta > 0.999);
        assert!(otm.delta < 1e-6);
    }

    #[test]
    fn test_degenerate_inputs_are_errors() {
        assert_eq!(
            black_scholes_greeks(OptionSide::Call, 100.0, 100.0, 0.0, 0.05, 0.2),
            Err(DegenerateInputError::NonPositive("time"))
        );
        assert_eq!(
            black_scholes_greeks(OptionSide::Put, 100.0, 100.0, T, 0.05, 0.0),
            Err(DegenerateInputError::NonPositive("volatility"))
        );
        assert_eq!(
            black_scholes_greeks(OptionSide::Put, f64::NAN, 100.0, T, 0.05, 0.2),
            Err(DegenerateInputError::NonFinite("spot"))
        );
    }

    #[test]
    fn test_neutral_fallback() {
        let g = greeks_or_neutral(OptionSide::Call, 100.0, -5.0, T, 0.05, 0.2);
        assert_eq!(g, Greeks::NEUTRAL);
    }

    #[test]
    fn test_delta_matches_normal_table() {
        // d1 = 1 for spot=strike, r=0, sigma=2, t=1
        let g = black_scholes_greeks(OptionSide::Call, 100.0, 100.0, 1.0, 0.0, 2.0).unwrap();
        assert!((g.delta - 0.841_344_746_068_543).abs() < 1e-10);
        let g = black_scholes_greeks(OptionSide::Put, 100.0, 100.0, 1.0, 0.0, 2.0).unwrap();
        assert!((g.delta + 0.158_655_253_931_457).abs() < 1e-10);
    }
}
