//! Configuration management for the teletrada system.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_FILE: &str = "teletrada";
const ENV_PREFIX: &str = "TELETRADA";

/// Upper bound on the replay sampling period (one year).
pub const MAX_SAMPLE_FREQUENCY_SECS: u64 = 365 * 24 * 60 * 60;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Use the simulated exchange instead of a live one.
    pub use_mock: bool,
    /// Directory of price snapshots replayed into the archive at start-up.
    pub load_prices_dir: Option<PathBuf>,
    /// Directory every fetched price batch is written to, if set.
    pub snapshot_dir: Option<PathBuf>,
    /// Seconds between scheduled price updates.
    pub update_frequency_secs: u64,
    /// Seconds between replay samples in historical simulations.
    pub sample_frequency_secs: u64,
    /// Currency used to triangulate pairs with no direct quote.
    pub bridge_symbol: String,
    /// Quote currency assigned to newly discovered balances.
    pub default_quote: String,
    /// Maximum entries retained by the server status log.
    pub status_log_capacity: usize,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_mock: false,
            load_prices_dir: None,
            snapshot_dir: None,
            update_frequency_secs: 60,
            sample_frequency_secs: 300, // 5 minutes
            bridge_symbol: crate::types::BTC.to_string(),
            default_quote: crate::types::BTC.to_string(),
            status_log_capacity: 1000,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from `.env`, an optional `teletrada.toml` and
    /// `TELETRADA_*` environment variables, later sources winning.
    pub fn load() -> Result<Self> {
        Self::load_file(CONFIG_FILE)
    }

    /// Same as [`Config::load`] with a different config file.
    pub fn load_file(file: &str) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(file)
    }

    /// Load configuration using an explicit config file stem or path.
    pub fn load_from(file: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_frequency_secs == 0 {
            return Err(Error::Config {
                message: "update_frequency_secs must be greater than 0".to_string(),
            });
        }
        if self.sample_frequency_secs == 0 {
            return Err(Error::Config {
                message: "sample_frequency_secs must be greater than 0".to_string(),
            });
        }
        if self.sample_frequency_secs > MAX_SAMPLE_FREQUENCY_SECS {
            return Err(Error::Config {
                message: format!(
                    "sample_frequency_secs must be at most {}",
                    MAX_SAMPLE_FREQUENCY_SECS
                ),
            });
        }
        if self.bridge_symbol.is_empty() {
            return Err(Error::Config {
                message: "bridge_symbol cannot be blank".to_string(),
            });
        }
        if self.default_quote.is_empty() {
            return Err(Error::Config {
                message: "default_quote cannot be blank".to_string(),
            });
        }
        Ok(())
    }

    pub fn update_frequency(&self) -> Duration {
        Duration::from_secs(self.update_frequency_secs)
    }

    /// Replay sampling period, capped at [`MAX_SAMPLE_FREQUENCY_SECS`].
    pub fn sample_frequency(&self) -> chrono::Duration {
        let secs = self.sample_frequency_secs.min(MAX_SAMPLE_FREQUENCY_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
    }

    /// Load configuration for testing (with defaults).
    pub fn test_config() -> Self {
        Self {
            use_mock: true,
            update_frequency_secs: 3600,
            ..Default::default()
        }
    }
}
