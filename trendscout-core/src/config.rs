//! Harvester configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.
//! Durations are stored as integer milliseconds/seconds and exposed through
//! `Duration` accessors.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Constant,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRateConfig {
    pub calls: u32,
    pub period_secs: u64,
}

impl Default for LoginRateConfig {
    fn default() -> Self {
        Self {
            calls: 5,
            period_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub scroll_wait_ms: u64,
    pub max_login_retries: u32,
    pub retry_backoff_ms: u64,
    pub backoff: BackoffKind,
    pub max_backoff_ms: u64,
    pub backoff_jitter: f64,
    pub max_posts: usize,
    pub cache_ttl_secs: u64,
    pub cache_dir: PathBuf,
    pub stagnation_threshold: u32,
    pub max_scroll_iterations: u32,
    pub login_timeout_ms: u64,
    pub element_timeout_ms: u64,
    pub login_rate: LoginRateConfig,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            scroll_wait_ms: 3000,
            max_login_retries: 3,
            retry_backoff_ms: 2000,
            backoff: BackoffKind::Constant,
            max_backoff_ms: 30_000,
            backoff_jitter: 0.0,
            max_posts: 1000,
            cache_ttl_secs: 3600,
            cache_dir: PathBuf::from("data/cache"),
            stagnation_threshold: 3,
            max_scroll_iterations: 200,
            login_timeout_ms: 30_000,
            element_timeout_ms: 10_000,
            login_rate: LoginRateConfig::default(),
        }
    }
}

impl HarvesterConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: HarvesterConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &str, value: impl ToString) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
            }
        }

        if self.max_login_retries == 0 {
            return Err(invalid("max_login_retries", self.max_login_retries));
        }
        if self.max_posts == 0 {
            return Err(invalid("max_posts", self.max_posts));
        }
        if self.stagnation_threshold == 0 {
            return Err(invalid("stagnation_threshold", self.stagnation_threshold));
        }
        if self.max_scroll_iterations == 0 {
            return Err(invalid("max_scroll_iterations", self.max_scroll_iterations));
        }
        if self.login_rate.calls == 0 {
            return Err(invalid("login_rate.calls", self.login_rate.calls));
        }
        if self.login_rate.period_secs == 0 {
            return Err(invalid("login_rate.period_secs", self.login_rate.period_secs));
        }
        if !(0.0..=1.0).contains(&self.backoff_jitter) {
            return Err(invalid("backoff_jitter", self.backoff_jitter));
        }
        if self.max_backoff_ms < self.retry_backoff_ms {
            return Err(invalid("max_backoff_ms", self.max_backoff_ms));
        }
        Ok(())
    }

    pub fn scroll_wait(&self) -> Duration {
        Duration::from_millis(self.scroll_wait_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn login_rate_period(&self) -> Duration {
        Duration::from_secs(self.login_rate.period_secs)
    }
}
