//! The orchestrator: cache lookup, login, scroll collection, ranking.

use crate::cache::{CacheKey, CacheStore, FileCache};
use crate::collector::{CollectionOutcome, CollectorSettings, ScrollCollector, StopReason};
use crate::credentials::{self, CredentialSource, EnvCredentials};
use crate::driver::{BrowserLauncher, PageDriver};
use crate::metrics::{HarvestEvent, HarvestMetrics, HarvestObserver, MetricsCollector, ObserverSet};
use crate::platform::{Platform, PlatformRegistry};
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use crate::ranker;
use crate::retry::RetryConfig;
use crate::session::AuthenticatedSession;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use trendscout_core::{
    CoreError, Credentials, DataCollectionError, DriverError, ErrorExt, HarvesterConfig,
    PostRecord,
};

/// Number of posts read by [`Harvester::analyze_engagement`] when the caller
/// has no preference.
pub const DEFAULT_ENGAGEMENT_SAMPLE: usize = 5;

#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub platform: String,
    pub max_posts: usize,
    pub top_n: usize,
    /// Collection aborts at the first iteration boundary past this instant.
    pub deadline: Option<Instant>,
}

impl CollectRequest {
    pub fn new(platform: impl Into<String>, max_posts: usize, top_n: usize) -> Self {
        Self {
            platform: platform.into(),
            max_posts,
            top_n,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

struct RunReport {
    records: Vec<PostRecord>,
    posts_collected: usize,
    iterations: u32,
    stop_reason: StopReason,
}

/// Owns one browsing context for the length of a run.
///
/// [`BrowserGuard::release`] closes it in place. A guard dropped without
/// being released (the run future was cancelled or panicked) hands the close
/// to the current tokio runtime instead.
struct BrowserGuard {
    platform: String,
    driver: Arc<dyn PageDriver>,
    released: bool,
}

impl BrowserGuard {
    fn new(platform: &str, driver: Box<dyn PageDriver>) -> Self {
        Self {
            platform: platform.to_string(),
            driver: Arc::from(driver),
            released: false,
        }
    }

    fn driver(&self) -> &dyn PageDriver {
        self.driver.as_ref()
    }

    async fn release(mut self) {
        self.released = true;
        close_driver(&self.platform, self.driver.as_ref()).await;
    }
}

impl Drop for BrowserGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let platform = std::mem::take(&mut self.platform);
        let driver = self.driver.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Run for {} ended early, closing its browsing context", platform);
                handle.spawn(async move {
                    close_driver(&platform, driver.as_ref()).await;
                });
            }
            Err(_) => warn!(
                "No runtime left to close the browsing context for {}",
                platform
            ),
        }
    }
}

async fn close_driver(platform: &str, driver: &dyn PageDriver) {
    match driver.close().await {
        Ok(()) | Err(DriverError::SessionClosed) => {
            debug!("Released browsing context for {}", platform)
        }
        Err(e) => warn!("Failed to close browsing context for {}: {}", platform, e),
    }
}

pub struct Harvester {
    config: HarvesterConfig,
    registry: PlatformRegistry,
    launcher: Arc<dyn BrowserLauncher>,
    cache: Arc<dyn CacheStore>,
    credentials: Arc<dyn CredentialSource>,
    observers: ObserverSet,
    metrics: Option<Arc<MetricsCollector>>,
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl Harvester {
    /// Harvester with the built-in platforms, a file cache under
    /// `config.cache_dir` and credentials from the environment.
    pub fn new(config: HarvesterConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let cache = Arc::new(FileCache::new(config.cache_dir.clone(), config.cache_ttl()));
        Self {
            config,
            registry: PlatformRegistry::with_defaults(),
            launcher,
            cache,
            credentials: Arc::new(EnvCredentials),
            observers: ObserverSet::new(),
            metrics: None,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_registry(mut self, registry: PlatformRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn HarvestObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Installs a [`MetricsCollector`] whose snapshot [`Harvester::metrics`]
    /// returns.
    pub fn with_metrics(mut self) -> Self {
        let collector = Arc::new(MetricsCollector::new());
        self.observers.push(collector.clone());
        self.metrics = Some(collector);
        self
    }

    pub fn config(&self) -> &HarvesterConfig {
        &self.config
    }

    pub fn platforms(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn metrics(&self) -> Option<HarvestMetrics> {
        self.metrics.as_ref().map(|collector| collector.snapshot())
    }

    pub fn rate_limit_status(&self, platform: &str) -> Option<RateLimitStatus> {
        let platform = self.registry.get(platform)?;
        Some(self.limiter(platform.name()).status())
    }

    /// Top `top_n` posts out of up to `max_posts` collected from `platform`,
    /// served from the cache while a fresh entry exists.
    pub async fn collect(
        &self,
        platform: &str,
        max_posts: usize,
        top_n: usize,
    ) -> Result<Vec<PostRecord>, CoreError> {
        self.collect_request(CollectRequest::new(platform, max_posts, top_n))
            .await
    }

    pub async fn collect_request(
        &self,
        request: CollectRequest,
    ) -> Result<Vec<PostRecord>, CoreError> {
        let platform = self.resolve_platform(&request.platform)?;
        let name = platform.name().to_string();
        let max_posts = self.effective_max_posts(request.max_posts)?;
        if request.top_n == 0 {
            return Err(CoreError::InvalidInput {
                message: "top_n must be at least 1".to_string(),
            });
        }

        let key = CacheKey::new(&name, max_posts, request.top_n);
        if let Some(records) = self.cache.get(&key).await {
            info!("Serving {} cached posts for {}", records.len(), key);
            self.observers
                .on_event(&HarvestEvent::CacheHit { platform: name });
            return Ok(records);
        }
        self.observers
            .on_event(&HarvestEvent::CacheMiss { platform: name.clone() });

        let started = Instant::now();
        let result = self
            .run(platform.as_ref(), max_posts, request.top_n, request.deadline)
            .await;

        match result {
            Ok(report) => {
                self.cache.put(&key, &report.records).await;
                self.purge_cache().await;
                self.observers.on_event(&HarvestEvent::RunSucceeded {
                    platform: name,
                    posts_collected: report.posts_collected,
                    iterations: report.iterations,
                    stop_reason: report.stop_reason,
                    elapsed: started.elapsed(),
                });
                Ok(report.records)
            }
            Err(e) => {
                e.log_error();
                self.observers.on_event(&HarvestEvent::RunFailed {
                    platform: name,
                    error_code: e.error_code(),
                    elapsed: started.elapsed(),
                });
                Err(e)
            }
        }
    }

    /// Drops every expired cache entry. Runs after each cache write.
    pub async fn purge_cache(&self) -> usize {
        let purged = self.cache.purge_expired().await;
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
        purged
    }

    /// Engagement of the first `sample` posts on the feed, in page order.
    /// Never scrolls and never touches the cache.
    pub async fn analyze_engagement(
        &self,
        platform: &str,
        sample: usize,
    ) -> Result<Vec<PostRecord>, CoreError> {
        let platform = self.resolve_platform(platform)?;
        let credentials = credentials::resolve(self.credentials.as_ref(), platform.credential_vars())?;

        let browser = self.launch(platform.name()).await?;
        let result = self
            .sample_in_context(platform.as_ref(), &credentials, browser.driver(), sample)
            .await;
        browser.release().await;
        result
    }

    fn resolve_platform(&self, name: &str) -> Result<Arc<dyn Platform>, CoreError> {
        self.registry
            .get(name)
            .ok_or_else(|| CoreError::UnsupportedPlatform {
                platform: name.to_string(),
            })
    }

    fn effective_max_posts(&self, requested: usize) -> Result<usize, CoreError> {
        if requested == 0 {
            return Err(CoreError::InvalidInput {
                message: "max_posts must be at least 1".to_string(),
            });
        }
        if requested > self.config.max_posts {
            debug!(
                "Clamping max_posts {} to configured ceiling {}",
                requested, self.config.max_posts
            );
        }
        Ok(requested.min(self.config.max_posts))
    }

    fn limiter(&self, platform: &str) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
        limiters
            .entry(platform.to_string())
            .or_insert_with(|| {
                Arc::new(RateLimiter::new(RateLimitConfig::from_harvester_config(
                    &self.config,
                )))
            })
            .clone()
    }

    async fn launch(&self, platform: &str) -> Result<BrowserGuard, CoreError> {
        let driver = self.launcher.launch().await.map_err(|e| {
            CoreError::from(DataCollectionError::BrowserUnavailable {
                reason: e.to_string(),
            })
        })?;
        Ok(BrowserGuard::new(platform, driver))
    }

    async fn run(
        &self,
        platform: &dyn Platform,
        max_posts: usize,
        top_n: usize,
        deadline: Option<Instant>,
    ) -> Result<RunReport, CoreError> {
        let credentials = credentials::resolve(self.credentials.as_ref(), platform.credential_vars())?;

        let browser = self.launch(platform.name()).await?;
        let result = self
            .run_in_context(platform, &credentials, browser.driver(), max_posts, deadline)
            .await;
        browser.release().await;

        let CollectionOutcome {
            posts,
            iterations,
            stop_reason,
        } = result?;
        Ok(RunReport {
            posts_collected: posts.len(),
            records: ranker::rank(posts, top_n),
            iterations,
            stop_reason,
        })
    }

    async fn login(
        &self,
        platform: &dyn Platform,
        credentials: &Credentials,
        driver: &dyn PageDriver,
    ) -> Result<(), CoreError> {
        let limiter = self.limiter(platform.name());
        AuthenticatedSession::new(platform, credentials, &limiter, &self.observers)
            .with_retry(RetryConfig::from_harvester_config(&self.config))
            .with_attempt_timeout(self.config.login_timeout())
            .login(driver)
            .await?;
        Ok(())
    }

    async fn run_in_context(
        &self,
        platform: &dyn Platform,
        credentials: &Credentials,
        driver: &dyn PageDriver,
        max_posts: usize,
        deadline: Option<Instant>,
    ) -> Result<CollectionOutcome, CoreError> {
        self.login(platform, credentials, driver).await?;

        let settings = CollectorSettings::from_config(&self.config, max_posts).with_deadline(deadline);
        let outcome = ScrollCollector::new(platform, settings, &self.observers)
            .collect(driver)
            .await?;
        Ok(outcome)
    }

    async fn sample_in_context(
        &self,
        platform: &dyn Platform,
        credentials: &Credentials,
        driver: &dyn PageDriver,
        sample: usize,
    ) -> Result<Vec<PostRecord>, CoreError> {
        self.login(platform, credentials, driver).await?;

        let elements = platform
            .collect_page(driver)
            .await
            .map_err(DataCollectionError::from)?;

        let mut records = Vec::new();
        for element in &elements {
            if records.len() >= sample {
                break;
            }
            if let Some(post) = platform.extract_record(element.as_ref()).await {
                if !post.content.is_empty() {
                    records.push(ranker::score(post));
                }
            }
        }

        info!(
            "Sampled engagement of {} posts on {}",
            records.len(),
            platform.name()
        );
        Ok(records)
    }
}
