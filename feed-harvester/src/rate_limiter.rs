use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tokio::time::{sleep, Instant};
use trendscout_core::HarvesterConfig;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_calls: u32,
    pub period: Duration,
}

impl RateLimitConfig {
    pub fn from_harvester_config(config: &HarvesterConfig) -> Self {
        Self {
            max_calls: config.login_rate.calls.max(1),
            period: config.login_rate_period(),
        }
    }
}

/// Fixed-window call counter.
///
/// A window opens on the first call after the previous window expired and
/// closes exactly `period` later, no matter how the calls inside it were
/// spread out.
#[derive(Debug)]
pub struct WindowTracker {
    period: Duration,
    window_start: Option<Instant>,
    window_started_at: Option<SystemTime>,
    calls_in_window: u32,
    delayed_calls: u64,
}

impl WindowTracker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            window_start: None,
            window_started_at: None,
            calls_in_window: 0,
            delayed_calls: 0,
        }
    }

    fn refresh(&mut self, now: Instant) {
        if let Some(start) = self.window_start {
            if now.duration_since(start) >= self.period {
                self.window_start = None;
                self.window_started_at = None;
                self.calls_in_window = 0;
            }
        }
    }

    fn wait_needed(&self, now: Instant, max_calls: u32) -> Option<Duration> {
        if self.calls_in_window < max_calls {
            return None;
        }
        let start = self.window_start?;
        Some(self.period.saturating_sub(now.duration_since(start)))
    }

    fn record_call(&mut self, now: Instant) {
        if self.window_start.is_none() {
            self.window_start = Some(now);
            self.window_started_at = Some(SystemTime::now());
        }
        self.calls_in_window += 1;
    }

    fn time_until_reset(&self, now: Instant) -> Duration {
        match self.window_start {
            Some(start) => self.period.saturating_sub(now.duration_since(start)),
            None => Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    // Held across the sleep in `allow`. tokio's mutex queues waiters FIFO, so
    // an over-quota caller is served once the windows ahead of it have drained.
    turn: tokio::sync::Mutex<()>,
    // Only ever locked for a few instructions, never across an await, so
    // `status` answers while callers are parked in `allow`.
    window_tracker: Mutex<WindowTracker>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let window_tracker = Mutex::new(WindowTracker::new(config.period));
        Self {
            config: RateLimitConfig {
                max_calls: config.max_calls.max(1),
                ..config
            },
            turn: tokio::sync::Mutex::new(()),
            window_tracker,
        }
    }

    fn tracker(&self) -> MutexGuard<'_, WindowTracker> {
        self.window_tracker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Waits until one more call fits in the current window, then records it.
    pub async fn allow(&self) -> RateLimitPermit {
        let start_time = Instant::now();
        let _turn = self.turn.lock().await;
        let mut delayed = false;

        loop {
            let wait_time = {
                let mut tracker = self.tracker();
                let now = Instant::now();
                tracker.refresh(now);

                match tracker.wait_needed(now, self.config.max_calls) {
                    Some(wait_time) => {
                        if !delayed {
                            delayed = true;
                            tracker.delayed_calls += 1;
                        }
                        wait_time
                    }
                    None => {
                        tracker.record_call(now);
                        break;
                    }
                }
            };
            tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
            sleep(wait_time).await;
        }

        RateLimitPermit {
            queue_wait_time: start_time.elapsed(),
            delayed,
        }
    }

    /// Point-in-time view of the current window. Never waits on callers
    /// queued in [`RateLimiter::allow`].
    pub fn status(&self) -> RateLimitStatus {
        let mut tracker = self.tracker();
        let now = Instant::now();
        tracker.refresh(now);

        RateLimitStatus {
            max_calls: self.config.max_calls,
            calls_in_window: tracker.calls_in_window,
            period: self.config.period,
            window_started_at: tracker.window_started_at,
            time_until_reset: tracker.time_until_reset(now),
            delayed_calls: tracker.delayed_calls,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitPermit {
    pub queue_wait_time: Duration,
    pub delayed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub max_calls: u32,
    pub calls_in_window: u32,
    pub period: Duration,
    pub window_started_at: Option<SystemTime>,
    pub time_until_reset: Duration,
    pub delayed_calls: u64,
}

impl RateLimitStatus {
    pub fn remaining_calls(&self) -> u32 {
        self.max_calls.saturating_sub(self.calls_in_window)
    }

    pub fn utilization_percentage(&self) -> f64 {
        (self.calls_in_window as f64 / self.max_calls as f64) * 100.0
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_calls() == 0
    }
}
