//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    /// Model used for every oracle call: question generation, answer
    /// scoring, and growth-report production.
    pub oracle_model: String,
    /// How long an unread report record survives before the sweep reclaims it.
    pub report_expiry: Duration,
    /// How often the background sweep runs.
    pub report_sweep_interval: Duration,
    /// Minimum number of admissible bank records kept per
    /// (skill, depth, job type) combination.
    pub question_bank_floor: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Oracle Settings ---
        let oracle_model =
            std::env::var("ORACLE_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        // --- Load Engine Tuning ---
        let report_expiry = Duration::from_secs(parse_u64_var("REPORT_EXPIRY_SECS", 3600)?);
        let report_sweep_interval =
            Duration::from_secs(parse_u64_var("REPORT_SWEEP_SECS", 600)?);
        let question_bank_floor = parse_u64_var("QUESTION_BANK_FLOOR", 20)? as usize;

        Ok(Self {
            bind_address,
            log_level,
            openai_api_key,
            oracle_model,
            report_expiry,
            report_sweep_interval,
            question_bank_floor,
        })
    }
}

fn parse_u64_var(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
