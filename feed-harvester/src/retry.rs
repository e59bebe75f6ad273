use std::time::Duration;
use trendscout_core::{BackoffKind, HarvesterConfig};

/// Configuration for login retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    pub backoff: BackoffKind,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff: BackoffKind::Constant,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryConfig {
    pub fn from_harvester_config(config: &HarvesterConfig) -> Self {
        Self {
            max_attempts: config.max_login_retries.max(1),
            base_delay: config.retry_backoff(),
            max_delay: config.max_backoff(),
            backoff: config.backoff,
            jitter_factor: config.backoff_jitter,
            ..Default::default()
        }
    }
}

/// Delay to sleep after the failed attempt with zero-based index `attempt`.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base = match config.backoff {
        BackoffKind::Constant => config.base_delay,
        BackoffKind::Exponential => {
            let multiplier = config.backoff_multiplier.powi(attempt as i32);
            let delay_ms = config.base_delay.as_millis() as f64 * multiplier;
            Duration::from_millis(delay_ms.min(config.max_delay.as_millis() as f64) as u64)
        }
    };

    if config.jitter_factor <= 0.0 {
        return base.min(config.max_delay.max(config.base_delay));
    }

    // Jitter keeps several harvesters from hammering the login page in lockstep
    let jitter_range = (base.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);
    (base + Duration::from_millis(jitter)).min(config.max_delay.max(config.base_delay))
}
