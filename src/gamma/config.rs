use std::time::Duration;

// -----------------------------------------------
// OPTION CHAIN FEED ENDPOINTS
// -----------------------------------------------
pub const FEED_COOKIE_URL: &str = "https://fc.yahoo.com";
pub const FEED_CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";
pub const FEED_BASE_URL: &str = "https://query2.finance.yahoo.com";

pub fn option_chain_url(symbol: &str, crumb: &str, expiration: Option<i64>) -> String {
    let mut url = format!(
        "{}/v7/finance/options/{}?crumb={}",
        FEED_BASE_URL,
        urlencoding::encode(symbol),
        urlencoding::encode(crumb)
    );
    if let Some(epoch) = expiration {
        url.push_str(&format!("&date={}", epoch));
    }
    url
}

// -----------------------------------------------
// DEFAULT UNDERLYINGS
// -----------------------------------------------
pub const DEFAULT_SYMBOLS: &[&str] = &["SPY", "QQQ", "IWM", "DIA"];

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                               AppleWebKit/537.36 (KHTML, like Gecko) \
                               Chrome/131.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGES: &[&str] = &["en-US,en;q=0.9", "en-GB,en;q=0.8"];

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);
pub const WARMUP_DELAY_MS: u64 = 200;

pub const RETRY_BASE_DELAY_MS: u64 = 100;
pub const RETRY_FACTOR: u64 = 2;
pub const RETRY_MAX_DELAY_SECS: u64 = 3;
pub const RETRY_MAX_ATTEMPTS: usize = 3;

pub const DEFAULT_MAX_CONCURRENT: usize = 4;

// -----------------------------------------------
// CONTRACT FILTER
// -----------------------------------------------
pub const MAX_DAYS_TO_EXPIRY: i64 = 30;
pub const DAYS_PER_YEAR: f64 = 365.0;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.05;

// -----------------------------------------------
// DNZ / EGP
// -----------------------------------------------
pub const DNZ_GRID_POINTS: usize = 200;
pub const DNZ_GRID_LOW: f64 = 0.9;
pub const DNZ_GRID_HIGH: f64 = 1.1;
/// Band half-width as a fraction of dnz_mid.
pub const DNZ_BAND_PCT: f64 = 0.005;

pub const EGP_EPS_PCT: f64 = 0.002;
pub const EGP_WIDTH_EPSILON: f64 = 1e-9;

// -----------------------------------------------
// CLASSIFICATION THRESHOLDS
// -----------------------------------------------
pub const SPOT_CENTER_BAND: f64 = 0.3;
pub const SPOT_BREAK_LEVEL: f64 = 1.0;
pub const GAMMA_UP_RATIO: f64 = 0.6;
pub const GAMMA_DOWN_RATIO: f64 = 0.4;
pub const GAMMA_CONCENTRATION_TOP_N: usize = 3;

pub const GAMMA_BALANCE_TOLERANCE: f64 = 1e-6;
pub const HIGH_EGP_LEVEL: f64 = 1e-4;

// -----------------------------------------------
// HISTORY ENRICHMENT
// -----------------------------------------------
pub const FORWARD_HORIZONS: [usize; 3] = [1, 2, 5];
pub const DATA_OK_QUORUM: usize = 3;
pub const RANGE_EXPANSION_WINDOW: usize = 5;
pub const CLOSE_LOCATION_LEVEL: f64 = 0.5;
pub const EVENT_LOW_EGP: f64 = 1e-4;
pub const PRE_EVENT_ASYM_LEVEL: f64 = 0.3;

pub const CALENDAR_FILES: &[&str] = &["fomc.csv", "cpi.csv", "opex.csv"];

// -----------------------------------------------
// RUNTIME CONFIGURATION
// -----------------------------------------------

/// Get the execution mode from environment or default to the full pipeline
pub fn get_execution_mode() -> String {
    std::env::var("GAMMA_MODE").unwrap_or_else(|_| "pipeline".to_string())
}

/// Underlyings to snapshot, `GAMMA_SYMBOLS=SPY,QQQ`
pub fn get_symbols() -> Vec<String> {
    std::env::var("GAMMA_SYMBOLS")
        .ok()
        .map(|raw| parse_symbol_list(&raw))
        .filter(|symbols| !symbols.is_empty())
        .unwrap_or_else(|| DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect())
}

pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn get_risk_free_rate() -> f64 {
    std::env::var("GAMMA_RISK_FREE_RATE")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|r| r.is_finite())
        .unwrap_or(DEFAULT_RISK_FREE_RATE)
}

/// Check if running in CI/automated environment
pub fn is_ci_environment() -> bool {
    std::env::var("CI").is_ok() || std::env::var("GITHUB_ACTIONS").is_ok()
}

pub fn get_max_concurrent() -> usize {
    if let Ok(val) = std::env::var("GAMMA_MAX_CONCURRENT") {
        if let Ok(num) = val.parse::<usize>() {
            return num.clamp(1, 16);
        }
    }
    DEFAULT_MAX_CONCURRENT
}
