//! Tracker configuration loaded from a TOML file.
//!
//! ```toml
//! [email]
//! sender = "alerts@example.com"
//! recipient = "me@example.com"
//!
//! [tracking]
//! run_mode = "continuous"
//! interval_minutes = 60
//!
//! [[products]]
//! name = "Laptop"
//! url = "https://www.amazon.com/dp/B0EXAMPLE"
//! target_price = 799.0
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Product;
use crate::retry::{DEFAULT_MAX_RETRIES, RetryConfig};
use crate::tracker::TrackerSettings;

/// Environment variable consulted when `[email] api_key` is absent.
pub const API_KEY_ENV: &str = "PRICEHAWK_SENDGRID_API_KEY";

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pricehawk.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub email: EmailConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub sender: String,
    pub recipient: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl EmailConfig {
    /// API key from the file, else from [`API_KEY_ENV`].
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Once,
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub run_mode: RunMode,
    pub interval_minutes: u64,
    /// Seconds; the mean pause between products.
    pub check_interval: u64,
    pub max_retries: u32,
    pub history_file: PathBuf,
    pub history_limit: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Once,
            interval_minutes: 60,
            check_interval: 30,
            max_retries: DEFAULT_MAX_RETRIES,
            history_file: PathBuf::from("price_history.json"),
            history_limit: 100,
        }
    }
}

impl TrackerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| AppError::ConfigError(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.sender.trim().is_empty() {
            return Err(AppError::ConfigError("email.sender must not be empty".into()));
        }
        if self.email.recipient.trim().is_empty() {
            return Err(AppError::ConfigError(
                "email.recipient must not be empty".into(),
            ));
        }
        if self.tracking.max_retries == 0 {
            return Err(AppError::ConfigError(
                "tracking.max_retries must be at least 1".into(),
            ));
        }
        if self.tracking.interval_minutes == 0 {
            return Err(AppError::ConfigError(
                "tracking.interval_minutes must be at least 1".into(),
            ));
        }
        if self.products.is_empty() {
            return Err(AppError::ConfigError(
                "products: at least one product is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, product) in self.products.iter().enumerate() {
            let name = product.name.trim();
            if name.is_empty() {
                return Err(AppError::ConfigError(format!(
                    "products[{i}].name must not be empty"
                )));
            }
            if !seen.insert(name) {
                return Err(AppError::ConfigError(format!(
                    "products[{i}].name '{name}' is duplicated"
                )));
            }
            let scheme_ok = url::Url::parse(&product.url)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !scheme_ok {
                return Err(AppError::ConfigError(format!(
                    "products[{i}].url '{}' is not an http(s) URL",
                    product.url
                )));
            }
            if !product.target_price.is_finite() || product.target_price <= 0.0 {
                return Err(AppError::ConfigError(format!(
                    "products[{i}].target_price must be a positive number"
                )));
            }
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default().with_max_retries(self.tracking.max_retries)
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            check_interval: Duration::from_secs(self.tracking.check_interval),
            cycle_interval: Duration::from_secs(self.tracking.interval_minutes * 60),
        }
    }

    pub fn product(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.name == name)
    }
}
