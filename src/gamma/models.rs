use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

impl fmt::Display for OptionSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptionSide::Call => write!(f, "call"),
            OptionSide::Put => write!(f, "put"),
        }
    }
}

/// One listed contract, already filtered to positive OI/IV and 1..=30 days to expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    pub open_interest: u64,
    pub implied_volatility: f64,
    pub days_to_expiry: i64,
    pub side: OptionSide,
}

impl OptionContract {
    pub fn new(side: OptionSide, strike: f64, open_interest: u64, implied_volatility: f64, days_to_expiry: i64) -> Self {
        Self { strike, open_interest, implied_volatility, days_to_expiry, side }
    }

    pub fn time_to_expiry_years(&self) -> f64 {
        self.days_to_expiry as f64 / super::config::DAYS_PER_YEAR
    }
}

/// Contract plus its weighted exposures at the snapshot spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractExposure {
    #[serde(flatten)]
    pub contract: OptionContract,
    pub delta_exposure: f64,
    pub gamma_exposure: f64,
}

/// Parsed chain for one underlying on one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub symbol: String,
    pub date: NaiveDate,
    pub spot: f64,
    pub contracts: Vec<OptionContract>,
    /// Raw quotes discarded by the contract filter.
    pub dropped: usize,
}

// -----------------------------------------------
// FEED RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainResponse {
    #[serde(rename = "optionChain")]
    pub option_chain: OptionChainBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainBody {
    #[serde(default)]
    pub result: Vec<OptionChainResult>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainResult {
    #[serde(rename = "underlyingSymbol")]
    pub underlying_symbol: Option<String>,

    #[serde(rename = "expirationDates", default)]
    pub expiration_dates: Vec<i64>,

    pub quote: Option<UnderlyingQuote>,

    #[serde(default)]
    pub options: Vec<ExpirySlice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderlyingQuote {
    #[serde(rename = "regularMarketPrice")]
    pub regular_market_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySlice {
    #[serde(rename = "expirationDate")]
    pub expiration_date: Option<i64>,
    #[serde(default)]
    pub calls: Vec<OptionQuote>,
    #[serde(default)]
    pub puts: Vec<OptionQuote>,
}

/// Single quote as served by the feed; any field may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: Option<f64>,

    #[serde(rename = "openInterest")]
    pub open_interest: Option<f64>,

    #[serde(rename = "impliedVolatility")]
    pub implied_volatility: Option<f64>,

    pub expiration: Option<i64>,
}
