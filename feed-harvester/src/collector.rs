//! Incremental scroll collection.
//!
//! Each iteration reads every visible post, keeps the ones whose content has
//! not been seen in this run, then scrolls and re-measures the document. The
//! loop ends on the first of: enough posts, `stagnation_threshold`
//! iterations without a new post, a scroll that did not grow the page, or
//! `max_iterations`.

use crate::driver::{PageDriver, SCROLL_HEIGHT_SCRIPT, SCROLL_TO_BOTTOM_SCRIPT};
use crate::metrics::{HarvestEvent, HarvestObserver};
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use trendscout_core::{DataCollectionError, DriverError, HarvesterConfig, ScrapedPost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    Stagnated,
    FeedExhausted,
    IterationLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopReason::TargetReached => "target_reached",
            StopReason::Stagnated => "stagnated",
            StopReason::FeedExhausted => "feed_exhausted",
            StopReason::IterationLimit => "iteration_limit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    /// Unique posts in collection order.
    pub posts: Vec<ScrapedPost>,
    pub iterations: u32,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub max_posts: usize,
    pub scroll_wait: Duration,
    pub stagnation_threshold: u32,
    pub max_iterations: u32,
    /// How long to wait for the first post before the loop starts.
    pub element_timeout: Duration,
    pub deadline: Option<Instant>,
}

impl CollectorSettings {
    pub fn from_config(config: &HarvesterConfig, max_posts: usize) -> Self {
        Self {
            max_posts,
            scroll_wait: config.scroll_wait(),
            stagnation_threshold: config.stagnation_threshold.max(1),
            max_iterations: config.max_scroll_iterations.max(1),
            element_timeout: config.element_timeout(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }
}

pub struct ScrollCollector<'a> {
    platform: &'a dyn Platform,
    settings: CollectorSettings,
    observer: &'a dyn HarvestObserver,
}

impl<'a> ScrollCollector<'a> {
    pub fn new(
        platform: &'a dyn Platform,
        settings: CollectorSettings,
        observer: &'a dyn HarvestObserver,
    ) -> Self {
        Self {
            platform,
            settings,
            observer,
        }
    }

    pub async fn collect(
        &self,
        driver: &dyn PageDriver,
    ) -> Result<CollectionOutcome, DataCollectionError> {
        let platform = self.platform.name();
        let settings = &self.settings;

        match driver
            .wait_for(self.platform.post_selector(), settings.element_timeout)
            .await
        {
            Ok(()) => {}
            Err(DriverError::Timeout { .. }) => {
                warn!("No posts visible on {} yet, scrolling anyway", platform);
            }
            Err(e) => return Err(e.into()),
        }

        let mut posts: Vec<ScrapedPost> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut no_new_posts_count = 0u32;
        let mut iterations = 0u32;
        let mut last_height = measure_height(driver).await?;

        let stop_reason = loop {
            if settings.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!("Collection on {} cancelled after {} iterations", platform, iterations);
                return Err(DataCollectionError::Cancelled { iterations });
            }
            if posts.len() >= settings.max_posts {
                break StopReason::TargetReached;
            }
            if iterations >= settings.max_iterations {
                warn!(
                    "Stopping {} after {} scroll iterations with {} of {} posts",
                    platform,
                    iterations,
                    posts.len(),
                    settings.max_posts
                );
                break StopReason::IterationLimit;
            }
            iterations += 1;

            let elements = self.platform.collect_page(driver).await?;
            let mut new_posts = 0;
            for element in &elements {
                if posts.len() >= settings.max_posts {
                    break;
                }
                let Some(post) = self.platform.extract_record(element.as_ref()).await else {
                    continue;
                };
                // Content is the dedup identity. Blank posts have none and
                // would all collapse into a single ranked entry.
                if post.content.is_empty() {
                    continue;
                }
                if seen.insert(post.content.clone()) {
                    posts.push(post);
                    new_posts += 1;
                }
            }

            debug!(
                "Iteration {} on {}: {} visible, {} new, {} total",
                iterations,
                platform,
                elements.len(),
                new_posts,
                posts.len()
            );
            self.observer.on_event(&HarvestEvent::ScrollIteration {
                platform: platform.to_string(),
                iteration: iterations,
                new_posts,
                total_posts: posts.len(),
            });

            if posts.len() >= settings.max_posts {
                break StopReason::TargetReached;
            }

            if new_posts == 0 {
                no_new_posts_count += 1;
                if no_new_posts_count >= settings.stagnation_threshold {
                    break StopReason::Stagnated;
                }
            } else {
                no_new_posts_count = 0;
            }

            driver.evaluate(SCROLL_TO_BOTTOM_SCRIPT).await?;
            driver.wait(settings.scroll_wait).await;

            let height = measure_height(driver).await?;
            if height == last_height {
                break StopReason::FeedExhausted;
            }
            last_height = height;
        };

        info!(
            "Collected {} posts from {} in {} iterations ({})",
            posts.len(),
            platform,
            iterations,
            stop_reason
        );
        Ok(CollectionOutcome {
            posts,
            iterations,
            stop_reason,
        })
    }
}

async fn measure_height(driver: &dyn PageDriver) -> Result<u64, DataCollectionError> {
    let value = driver.evaluate(SCROLL_HEIGHT_SCRIPT).await?;
    value
        .as_f64()
        .filter(|height| height.is_finite() && *height >= 0.0)
        .map(|height| height.round() as u64)
        .ok_or_else(|| DataCollectionError::InvalidHeight {
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::simulated::{SimulatedDriver, SimulatedFeed, SimulatedPost};
    use crate::metrics::{MetricsCollector, NoopObserver};
    use crate::platform::DemoPlatform;
    use trendscout_core::Credentials;

    fn settings(max_posts: usize) -> CollectorSettings {
        CollectorSettings {
            max_posts,
            scroll_wait: Duration::from_millis(1),
            stagnation_threshold: 3,
            max_iterations: 50,
            element_timeout: Duration::from_millis(5),
            deadline: None,
        }
    }

    fn numbered(count: usize) -> Vec<SimulatedPost> {
        (0..count)
            .map(|i| SimulatedPost::new(format!("post {}", i), format!("{}", i), "0"))
            .collect()
    }

    async fn signed_in(feed: SimulatedFeed) -> SimulatedDriver {
        let driver = SimulatedDriver::new(feed);
        DemoPlatform::new()
            .login(&driver, &Credentials::new("u", "p"), Duration::from_millis(5))
            .await
            .unwrap();
        driver
    }

    fn assert_unique(posts: &[ScrapedPost]) {
        let unique: HashSet<&str> = posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(unique.len(), posts.len());
    }

    #[tokio::test]
    async fn test_stops_at_target() {
        let driver = signed_in(SimulatedFeed::new(numbered(7))).await;
        let platform = DemoPlatform::new();

        let outcome = ScrollCollector::new(&platform, settings(5), &NoopObserver)
            .collect(&driver)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::TargetReached);
        assert_eq!(outcome.posts.len(), 5);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.posts[0].content, "post 0");
        assert_eq!(outcome.posts[4].content, "post 4");
    }

    #[tokio::test]
    async fn test_stops_when_feed_exhausted() {
        let driver = signed_in(SimulatedFeed::new(numbered(7))).await;
        let platform = DemoPlatform::new();

        let outcome = ScrollCollector::new(&platform, settings(100), &NoopObserver)
            .collect(&driver)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::FeedExhausted);
        assert_eq!(outcome.posts.len(), 7);
        assert_eq!(outcome.iterations, 3);
    }

    #[tokio::test]
    async fn test_stops_on_stagnation() {
        let driver = signed_in(SimulatedFeed::new(numbered(2)).endless()).await;
        let platform = DemoPlatform::new();
        let metrics = MetricsCollector::new();

        let outcome = ScrollCollector::new(&platform, settings(100), &metrics)
            .collect(&driver)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Stagnated);
        assert_eq!(outcome.posts.len(), 2);
        assert_eq!(outcome.iterations, 4);
        assert_eq!(metrics.snapshot().scroll_iterations, 4);
    }

    #[tokio::test]
    async fn test_iteration_cap_returns_partial_posts() {
        let driver = signed_in(SimulatedFeed::new(numbered(2)).endless()).await;
        let platform = DemoPlatform::new();
        let capped = CollectorSettings {
            stagnation_threshold: 1000,
            max_iterations: 4,
            ..settings(100)
        };

        let outcome = ScrollCollector::new(&platform, capped, &NoopObserver)
            .collect(&driver)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::IterationLimit);
        assert_eq!(outcome.iterations, 4);
        assert_eq!(outcome.posts.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicates_blanks_and_broken_posts_are_skipped() {
        let posts = vec![
            SimulatedPost::new("same", "1", "0"),
            SimulatedPost::new("same", "9", "9"),
            SimulatedPost::new("   ", "5", "5"),
            SimulatedPost::broken("detached"),
            SimulatedPost::new("other", "2", "0"),
        ];
        let driver = signed_in(SimulatedFeed::new(posts).with_page_size(2)).await;
        let platform = DemoPlatform::new();

        let outcome = ScrollCollector::new(&platform, settings(100), &NoopObserver)
            .collect(&driver)
            .await
            .unwrap();

        let content: Vec<&str> = outcome.posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(content, vec!["same", "other"]);
        assert_eq!(outcome.posts[0].likes_text, "1");
        assert_unique(&outcome.posts);
    }

    #[tokio::test]
    async fn test_blank_posts_never_count_toward_target() {
        let posts = vec![
            SimulatedPost::new("", "900", "90"),
            SimulatedPost::new("  ", "800", "80"),
            SimulatedPost::new("first", "1", "0"),
            SimulatedPost::new("second", "2", "0"),
        ];
        let driver = signed_in(SimulatedFeed::new(posts)).await;
        let platform = DemoPlatform::new();

        let outcome = ScrollCollector::new(&platform, settings(2), &NoopObserver)
            .collect(&driver)
            .await
            .unwrap();

        let content: Vec<&str> = outcome.posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(content, vec!["first", "second"]);
        assert_eq!(outcome.stop_reason, StopReason::TargetReached);
    }

    #[tokio::test]
    async fn test_passed_deadline_cancels() {
        let driver = signed_in(SimulatedFeed::new(numbered(7))).await;
        let platform = DemoPlatform::new();
        let cancelled = settings(5).with_deadline(Some(Instant::now()));

        let result = ScrollCollector::new(&platform, cancelled, &NoopObserver)
            .collect(&driver)
            .await;

        assert!(matches!(
            result,
            Err(DataCollectionError::Cancelled { iterations: 0 })
        ));
    }

    #[tokio::test]
    async fn test_driver_failure_aborts_run() {
        let driver = signed_in(SimulatedFeed::new(numbered(3))).await;
        driver.close().await.unwrap();
        let platform = DemoPlatform::new();

        let result = ScrollCollector::new(&platform, settings(5), &NoopObserver)
            .collect(&driver)
            .await;

        assert!(matches!(
            result,
            Err(DataCollectionError::Driver(DriverError::SessionClosed))
        ));
    }

    #[tokio::test]
    async fn test_empty_feed_terminates() {
        let driver = SimulatedDriver::new(SimulatedFeed::new(Vec::new()));
        let platform = DemoPlatform::new();

        let outcome = ScrollCollector::new(&platform, settings(5), &NoopObserver)
            .collect(&driver)
            .await
            .unwrap();

        assert!(outcome.posts.is_empty());
        assert_eq!(outcome.stop_reason, StopReason::FeedExhausted);
    }
}
