use anyhow::Result;
use colored::Colorize;
use gamma_log::gamma::config;
use gamma_log::{GammaError, RunConfig};
use std::path::PathBuf;

const MODES: &[&str] = &["snapshot", "append", "postprocess", "pipeline", "structure", "server"];

/// Application configuration handler
pub struct AppConfig {
    pub mode: String,
    pub port: u16,
    pub log_dir: PathBuf,
    pub run: RunConfig,
}

impl AppConfig {
    /// Create new configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            mode: config::get_execution_mode(),
            port: Self::get_port(),
            log_dir: PathBuf::from(std::env::var("GAMMA_LOG_DIR").unwrap_or_else(|_| "logs".to_string())),
            run: RunConfig::from_env(),
        }
    }

    /// Log configuration details for CI environments
    pub fn log_ci_config(&self) {
        if config::is_ci_environment() {
            println!("{}", "Running in CI environment (GitHub Actions)".blue().bold());
            println!("{} Mode: {}", "→".cyan(), self.mode.yellow());

            if self.mode == "server" {
                println!("{} Server mode not supported in CI - switching to pipeline", "⚠".yellow());
            }
            println!();
        }
    }

    /// Get port from environment or default
    fn get_port() -> u16 {
        std::env::var("GAMMA_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .unwrap_or(3001)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !MODES.contains(&self.mode.as_str()) {
            return Err(GammaError::Config(format!(
                "Invalid mode '{}'. Use one of: {}",
                self.mode,
                MODES.join(", ")
            ))
            .into());
        }
        if self.run.symbols.is_empty() {
            return Err(GammaError::Config("No symbols configured (GAMMA_SYMBOLS)".to_string()).into());
        }
        if !(self.run.risk_free_rate > -1.0 && self.run.risk_free_rate < 1.0) {
            return Err(GammaError::Config(format!("Implausible risk-free rate {}", self.run.risk_free_rate)).into());
        }
        Ok(())
    }
}
