pub mod config;
pub mod dnz;
pub mod egp;
pub mod gamma_commands;
pub mod greeks;
pub mod models;
pub mod processor;
pub mod rules;
pub mod snapshot;
pub mod yahoo_client;

// Re-exports (public API)
pub use dnz::{DnzBand, locate_dnz};
pub use egp::{effective_gamma_pressure, normalize_egp};
pub use gamma_commands::{GammaCommands, RunConfig};
pub use greeks::{DegenerateInputError, Greeks, black_scholes_greeks, greeks_or_neutral};
pub use models::{ChainSnapshot, ContractExposure, OptionContract, OptionSide};
pub use processor::{GammaAggregate, GammaProfile, aggregate_gamma, compute_exposures, decay_weight, gamma_profile};
pub use rules::{GammaBucket, Regime, SpotBucket, StructureTags, classify_regime};
pub use snapshot::{ExposureSnapshot, build_snapshot};
pub use yahoo_client::{OptionChainSource, YahooClient};
