//! Cart engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CART_SYNC_DEBOUNCE_MS` - quiet period before a remote push fires
//!   (default: 500, must be 1..=10000)
//! - `CART_STORAGE_KEY` - key under which the durable cart record is
//!   saved locally (default: `ramen-bae.cart`)
//!
//! Reward tiers are fixed store configuration, not environment data.

use std::time::Duration;

use ramen_bae_core::RewardTier;
use thiserror::Error;

const DEFAULT_DEBOUNCE_MS: u64 = 500;
const MAX_DEBOUNCE_MS: u64 = 10_000;
const DEFAULT_STORAGE_KEY: &str = "ramen-bae.cart";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Trailing-debounce quiet period for remote pushes.
    pub debounce: Duration,
    /// Local store key for the durable cart record.
    pub storage_key: String,
    /// Reward tiers in ascending threshold order.
    pub reward_tiers: Vec<RewardTier>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            reward_tiers: RewardTier::default_tiers(),
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `CART_SYNC_DEBOUNCE_MS` is
    /// not an integer in `1..=10000`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("CART_SYNC_DEBOUNCE_MS") {
            let ms: u64 = raw.parse().map_err(|_| {
                ConfigError::InvalidEnvVar(
                    "CART_SYNC_DEBOUNCE_MS".to_owned(),
                    format!("not an integer: {raw}"),
                )
            })?;
            if ms == 0 || ms > MAX_DEBOUNCE_MS {
                return Err(ConfigError::InvalidEnvVar(
                    "CART_SYNC_DEBOUNCE_MS".to_owned(),
                    format!("must be 1..={MAX_DEBOUNCE_MS}, got {ms}"),
                ));
            }
            config.debounce = Duration::from_millis(ms);
        }

        if let Ok(key) = std::env::var("CART_STORAGE_KEY")
            && !key.is_empty()
        {
            config.storage_key = key;
        }

        Ok(config)
    }
}
