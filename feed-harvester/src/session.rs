//! Authenticated browsing context with a bounded login retry budget.

use crate::driver::PageDriver;
use crate::metrics::{HarvestEvent, HarvestObserver};
use crate::platform::Platform;
use crate::rate_limiter::RateLimiter;
use crate::retry::{calculate_delay, RetryConfig};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use trendscout_core::{Credentials, DriverError, LoginError};

pub struct AuthenticatedSession<'a> {
    platform: &'a dyn Platform,
    credentials: &'a Credentials,
    limiter: &'a RateLimiter,
    retry: RetryConfig,
    attempt_timeout: Duration,
    observer: &'a dyn HarvestObserver,
}

impl<'a> AuthenticatedSession<'a> {
    pub fn new(
        platform: &'a dyn Platform,
        credentials: &'a Credentials,
        limiter: &'a RateLimiter,
        observer: &'a dyn HarvestObserver,
    ) -> Self {
        Self {
            platform,
            credentials,
            limiter,
            retry: RetryConfig::default(),
            attempt_timeout: Duration::from_secs(30),
            observer,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Signs in on `driver`. Every attempt first passes the rate limiter.
    pub async fn login(&self, driver: &dyn PageDriver) -> Result<(), LoginError> {
        let platform = self.platform.name();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error: Option<DriverError> = None;

        for attempt in 1..=max_attempts {
            let permit = self.limiter.allow().await;
            if permit.delayed {
                debug!(
                    "Login attempt on {} held back {:?} by the rate limiter",
                    platform, permit.queue_wait_time
                );
                self.observer.on_event(&HarvestEvent::RateLimited {
                    platform: platform.to_string(),
                    waited: permit.queue_wait_time,
                });
            }

            self.observer.on_event(&HarvestEvent::LoginAttempt {
                platform: platform.to_string(),
                attempt,
            });

            let error = match self
                .platform
                .login(driver, self.credentials, self.attempt_timeout)
                .await
            {
                Ok(()) => {
                    info!("Logged in to {} (attempt {}/{})", platform, attempt, max_attempts);
                    self.observer.on_event(&HarvestEvent::LoginSucceeded {
                        platform: platform.to_string(),
                        attempts: attempt,
                    });
                    return Ok(());
                }
                Err(e) => e,
            };

            let timed_out = matches!(error, DriverError::Timeout { .. });
            if timed_out {
                warn!(
                    "Login attempt {}/{} on {} timed out after {:?} waiting for the feed",
                    attempt, max_attempts, platform, self.attempt_timeout
                );
            } else {
                warn!(
                    "Login attempt {}/{} on {} failed: {}",
                    attempt, max_attempts, platform, error
                );
            }
            self.observer.on_event(&HarvestEvent::LoginFailed {
                platform: platform.to_string(),
                attempt,
                timed_out,
            });
            last_error = Some(error);

            if attempt < max_attempts {
                let delay = calculate_delay(attempt - 1, &self.retry);
                debug!("Retrying login on {} in {:?}", platform, delay);
                sleep(delay).await;
            }
        }

        Err(LoginError::RetriesExhausted {
            platform: platform.to_string(),
            attempts: max_attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
