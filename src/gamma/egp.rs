use super::config;
use super::models::OptionContract;
use super::processor::net_delta_at;

/// Effective gamma pressure: centered finite difference of net delta around spot.
pub fn effective_gamma_pressure(contracts: &[OptionContract], spot: f64, rate: f64) -> f64 {
    let eps = spot * config::EGP_EPS_PCT;
    if !(eps > 0.0) || !eps.is_finite() {
        return 0.0;
    }
    let up = net_delta_at(contracts, spot + eps, rate);
    let down = net_delta_at(contracts, spot - eps, rate);
    let egp = (up - down).abs() / (2.0 * eps);
    if egp.is_finite() { egp } else { 0.0 }
}

/// EGP per unit of DNZ width; the epsilon keeps a collapsed band finite
pub fn normalize_egp(egp: f64, dnz_width: f64) -> f64 {
    egp / (dnz_width + config::EGP_WIDTH_EPSILON)
}
