use crate::collector::StopReason;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

/// Lifecycle events emitted while a harvester works.
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestEvent {
    CacheHit {
        platform: String,
    },
    CacheMiss {
        platform: String,
    },
    RateLimited {
        platform: String,
        waited: Duration,
    },
    LoginAttempt {
        platform: String,
        attempt: u32,
    },
    LoginFailed {
        platform: String,
        attempt: u32,
        timed_out: bool,
    },
    LoginSucceeded {
        platform: String,
        attempts: u32,
    },
    ScrollIteration {
        platform: String,
        iteration: u32,
        new_posts: usize,
        total_posts: usize,
    },
    RunSucceeded {
        platform: String,
        posts_collected: usize,
        iterations: u32,
        stop_reason: StopReason,
        elapsed: Duration,
    },
    RunFailed {
        platform: String,
        error_code: String,
        elapsed: Duration,
    },
}

impl HarvestEvent {
    pub fn platform(&self) -> &str {
        match self {
            HarvestEvent::CacheHit { platform }
            | HarvestEvent::CacheMiss { platform }
            | HarvestEvent::RateLimited { platform, .. }
            | HarvestEvent::LoginAttempt { platform, .. }
            | HarvestEvent::LoginFailed { platform, .. }
            | HarvestEvent::LoginSucceeded { platform, .. }
            | HarvestEvent::ScrollIteration { platform, .. }
            | HarvestEvent::RunSucceeded { platform, .. }
            | HarvestEvent::RunFailed { platform, .. } => platform,
        }
    }
}

/// Sink for [`HarvestEvent`]s, injected into a [`crate::Harvester`].
pub trait HarvestObserver: Send + Sync {
    fn on_event(&self, event: &HarvestEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl HarvestObserver for NoopObserver {
    fn on_event(&self, _event: &HarvestEvent) {}
}

/// Fans one event out to several observers.
#[derive(Default, Clone)]
pub struct ObserverSet {
    sinks: Vec<Arc<dyn HarvestObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Arc<dyn HarvestObserver>) {
        self.sinks.push(observer);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl HarvestObserver for ObserverSet {
    fn on_event(&self, event: &HarvestEvent) {
        for sink in &self.sinks {
            sink.on_event(event);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestMetrics {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub login_attempts: u64,
    pub login_failures: u64,
    pub login_timeouts: u64,
    pub rate_limited_logins: u64,
    pub scroll_iterations: u64,
    pub posts_collected: u64,
    pub average_run_time: Duration,
    pub last_run_time: Option<SystemTime>,
    pub runs_by_platform: HashMap<String, PlatformMetrics>,
    pub errors_by_code: HashMap<String, u64>,
}

impl HarvestMetrics {
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformMetrics {
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub posts_collected: u64,
    pub total_run_time: Duration,
    pub min_run_time: Duration,
    pub max_run_time: Duration,
    pub stop_reasons: HashMap<String, u64>,
}

impl PlatformMetrics {
    fn new() -> Self {
        Self {
            run_count: 0,
            success_count: 0,
            error_count: 0,
            posts_collected: 0,
            total_run_time: Duration::ZERO,
            min_run_time: Duration::MAX,
            max_run_time: Duration::ZERO,
            stop_reasons: HashMap::new(),
        }
    }

    fn record_run(&mut self, elapsed: Duration, success: bool) {
        self.run_count += 1;
        self.total_run_time += elapsed;
        self.min_run_time = self.min_run_time.min(elapsed);
        self.max_run_time = self.max_run_time.max(elapsed);

        if success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    pub fn average_run_time(&self) -> Duration {
        if self.run_count == 0 {
            Duration::ZERO
        } else {
            self.total_run_time / self.run_count as u32
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.run_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.run_count as f64
        }
    }
}

/// Observer aggregating events into [`HarvestMetrics`].
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RwLock<HarvestMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HarvestMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn platform_metrics(&self, platform: &str) -> Option<PlatformMetrics> {
        self.metrics
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .runs_by_platform
            .get(platform)
            .cloned()
    }

    pub fn reset(&self) {
        *self.metrics.write().unwrap_or_else(|e| e.into_inner()) = HarvestMetrics::default();
    }

    fn record_run(metrics: &mut HarvestMetrics, platform: &str, elapsed: Duration, success: bool) {
        metrics.total_runs += 1;
        metrics.last_run_time = Some(SystemTime::now());

        if success {
            metrics.successful_runs += 1;
        } else {
            metrics.failed_runs += 1;
        }

        // Running average over all runs
        let total_time = metrics.average_run_time * metrics.total_runs as u32
            - metrics.average_run_time
            + elapsed;
        metrics.average_run_time = total_time / metrics.total_runs as u32;

        metrics
            .runs_by_platform
            .entry(platform.to_string())
            .or_insert_with(PlatformMetrics::new)
            .record_run(elapsed, success);
    }
}

impl HarvestObserver for MetricsCollector {
    fn on_event(&self, event: &HarvestEvent) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());

        match event {
            HarvestEvent::CacheHit { .. } => metrics.cache_hits += 1,
            HarvestEvent::CacheMiss { .. } => metrics.cache_misses += 1,
            HarvestEvent::RateLimited { .. } => metrics.rate_limited_logins += 1,
            HarvestEvent::LoginAttempt { .. } => metrics.login_attempts += 1,
            HarvestEvent::LoginFailed { timed_out, .. } => {
                metrics.login_failures += 1;
                if *timed_out {
                    metrics.login_timeouts += 1;
                }
            }
            HarvestEvent::LoginSucceeded { .. } => {}
            HarvestEvent::ScrollIteration { .. } => metrics.scroll_iterations += 1,
            HarvestEvent::RunSucceeded {
                platform,
                posts_collected,
                stop_reason,
                elapsed,
                ..
            } => {
                metrics.posts_collected += *posts_collected as u64;
                Self::record_run(&mut metrics, platform, *elapsed, true);

                if let Some(platform_metrics) = metrics.runs_by_platform.get_mut(platform) {
                    platform_metrics.posts_collected += *posts_collected as u64;
                    *platform_metrics
                        .stop_reasons
                        .entry(stop_reason.to_string())
                        .or_insert(0) += 1;
                }
            }
            HarvestEvent::RunFailed {
                platform,
                error_code,
                elapsed,
            } => {
                Self::record_run(&mut metrics, platform, *elapsed, false);
                *metrics.errors_by_code.entry(error_code.clone()).or_insert(0) += 1;
            }
        }
    }
}
