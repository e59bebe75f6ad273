#[cfg(test)]
mod tests {
    use crate::driver::simulated::SimulatedPost;
    use crate::{
        CollectRequest, Harvester, MemoryCache, SimulatedFeed, SimulatedLauncher, StaticCredentials,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use trendscout_core::{
        ConfigError, CoreError, DataCollectionError, HarvesterConfig, LoginError, LoginRateConfig,
        PostRecord,
    };

    fn fast_config() -> HarvesterConfig {
        HarvesterConfig {
            scroll_wait_ms: 1,
            retry_backoff_ms: 5,
            login_timeout_ms: 10,
            element_timeout_ms: 10,
            login_rate: LoginRateConfig {
                calls: 100,
                period_secs: 60,
            },
            ..Default::default()
        }
    }

    fn demo_feed() -> SimulatedFeed {
        let likes = [100, 50, 50, 10, 5, 5, 1];
        let comments = [10, 5, 5, 2, 1, 1, 0];
        SimulatedFeed::new(
            likes
                .iter()
                .zip(comments.iter())
                .enumerate()
                .map(|(i, (likes, comments))| {
                    SimulatedPost::new(
                        format!("Demo post #{}", i + 1),
                        likes.to_string(),
                        format!("{} comments", comments),
                    )
                })
                .collect(),
        )
    }

    fn demo_credentials() -> Arc<StaticCredentials> {
        Arc::new(
            StaticCredentials::new()
                .with("DEMO_USER", "demo")
                .with("DEMO_PASSWORD", "demo-secret"),
        )
    }

    fn harvester(config: HarvesterConfig, launcher: &SimulatedLauncher) -> Harvester {
        let ttl = config.cache_ttl();
        Harvester::new(config, Arc::new(launcher.clone()))
            .with_cache(Arc::new(MemoryCache::new(ttl)))
            .with_credentials(demo_credentials())
            .with_metrics()
    }

    fn engagement(records: &[PostRecord]) -> Vec<u64> {
        records.iter().map(|r| r.total_engagement).collect()
    }

    #[tokio::test]
    async fn test_demo_collection_end_to_end() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let harvester = harvester(fast_config(), &launcher);

        let first = harvester.collect("demo", 5, 3).await.unwrap();
        assert_eq!(engagement(&first), vec![110, 55, 55]);
        assert_eq!(first[1].content, "Demo post #2");
        assert_eq!(first[2].content, "Demo post #3");
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), 1);

        let second = harvester.collect("demo", 5, 3).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(launcher.launches(), 1);

        let metrics = harvester.metrics().unwrap();
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.successful_runs, 1);
        assert_eq!(metrics.posts_collected, 5);
    }

    #[tokio::test]
    async fn test_platform_lookup_is_case_insensitive() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let harvester = harvester(fast_config(), &launcher);

        harvester.collect("DEMO", 5, 3).await.unwrap();
        harvester.collect("demo", 5, 3).await.unwrap();
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_different_parameters_use_different_keys() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let harvester = harvester(fast_config(), &launcher);

        let top_three = harvester.collect("demo", 5, 3).await.unwrap();
        let top_two = harvester.collect("demo", 5, 2).await.unwrap();

        assert_eq!(top_three.len(), 3);
        assert_eq!(top_two.len(), 2);
        assert_eq!(launcher.launches(), 2);
    }

    #[tokio::test]
    async fn test_login_exhaustion_is_fatal_and_closes_browser() {
        let launcher = SimulatedLauncher::new(demo_feed().with_login_failures(u32::MAX));
        let harvester = harvester(fast_config(), &launcher);

        let result = harvester.collect("demo", 5, 3).await;
        match result {
            Err(CoreError::Login(LoginError::RetriesExhausted { attempts, .. })) => {
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected login failure, got {:?}", other),
        }
        assert_eq!(launcher.login_submissions(), 3);
        assert_eq!(launcher.closes(), 1);

        // Failures are never cached
        assert!(harvester.collect("demo", 5, 3).await.is_err());
        assert_eq!(launcher.launches(), 2);

        let metrics = harvester.metrics().unwrap();
        assert_eq!(metrics.failed_runs, 2);
        assert_eq!(metrics.errors_by_code["LOGIN"], 2);
    }

    #[tokio::test]
    async fn test_login_succeeds_after_retry() {
        let launcher = SimulatedLauncher::new(demo_feed().with_login_failures(2));
        let harvester = harvester(fast_config(), &launcher);

        let records = harvester.collect("demo", 5, 3).await.unwrap();
        assert_eq!(engagement(&records), vec![110, 55, 55]);
        assert_eq!(launcher.login_submissions(), 3);
        assert_eq!(harvester.metrics().unwrap().login_failures, 2);
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let harvester = harvester(fast_config(), &launcher);

        let result = harvester.collect("myspace", 5, 3).await;
        assert!(matches!(
            result,
            Err(CoreError::UnsupportedPlatform { ref platform }) if platform == "myspace"
        ));
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_launch() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let harvester = Harvester::new(fast_config(), Arc::new(launcher.clone()))
            .with_cache(Arc::new(MemoryCache::new(Duration::from_secs(60))))
            .with_credentials(Arc::new(StaticCredentials::new()));

        let result = harvester.collect("demo", 5, 3).await;
        assert!(matches!(
            result,
            Err(CoreError::Config(ConfigError::MissingEnvironmentVariable { ref var_name }))
                if var_name == "DEMO_USER"
        ));
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_browser() {
        let launcher = SimulatedLauncher::unavailable();
        let harvester = harvester(fast_config(), &launcher);

        let result = harvester.collect("demo", 5, 3).await;
        assert!(matches!(
            result,
            Err(CoreError::DataCollection(
                DataCollectionError::BrowserUnavailable { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_invalid_request_sizes() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let harvester = harvester(fast_config(), &launcher);

        assert!(matches!(
            harvester.collect("demo", 0, 3).await,
            Err(CoreError::InvalidInput { .. })
        ));
        assert!(matches!(
            harvester.collect("demo", 5, 0).await,
            Err(CoreError::InvalidInput { .. })
        ));
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_deadline_cancels_run_and_closes_browser() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let harvester = harvester(fast_config(), &launcher);

        let request = CollectRequest::new("demo", 5, 3).with_deadline(Instant::now());
        let result = harvester.collect_request(request).await;

        assert!(matches!(
            result,
            Err(CoreError::DataCollection(DataCollectionError::Cancelled { .. }))
        ));
        assert_eq!(launcher.closes(), 1);

        // Nothing was cached, so a later run collects again
        harvester.collect("demo", 5, 3).await.unwrap();
        assert_eq!(launcher.launches(), 2);
    }

    #[tokio::test]
    async fn test_max_posts_clamped_to_configured_ceiling() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let config = HarvesterConfig {
            max_posts: 4,
            ..fast_config()
        };
        let harvester = harvester(config, &launcher);

        let records = harvester.collect("demo", 100, 10).await.unwrap();
        assert_eq!(records.len(), 4);

        // Same effective request, same cache entry
        harvester.collect("demo", 4, 10).await.unwrap();
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_posts_are_collapsed() {
        let feed = SimulatedFeed::new(vec![
            SimulatedPost::new("Repost", "10", "1"),
            SimulatedPost::new("Original", "3", "0"),
            SimulatedPost::new("Repost", "40", "4"),
            SimulatedPost::new("Another", "1", "0"),
        ])
        .with_page_size(2);
        let launcher = SimulatedLauncher::new(feed);
        let harvester = harvester(fast_config(), &launcher);

        let records = harvester.collect("demo", 10, 10).await.unwrap();
        let content: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();

        assert_eq!(content, vec!["Repost", "Original", "Another"]);
        assert_eq!(records[0].total_engagement, 11);
    }

    #[tokio::test]
    async fn test_concurrent_collects_each_own_a_browser() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let harvester = harvester(fast_config(), &launcher);

        let runs = (1..=3).map(|top_n| harvester.collect("demo", 5, top_n));
        let results = futures::future::join_all(runs).await;

        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap().len(), i + 1);
        }
        assert_eq!(launcher.launches(), 3);
        assert_eq!(launcher.closes(), 3);
    }

    #[tokio::test]
    async fn test_engagement_snapshot_is_uncached() {
        let launcher = SimulatedLauncher::new(demo_feed().with_page_size(10));
        let harvester = harvester(fast_config(), &launcher);

        let sample = harvester.analyze_engagement("demo", 5).await.unwrap();
        assert_eq!(engagement(&sample), vec![110, 55, 55, 12, 6]);
        assert_eq!(launcher.scrolls(), 0);

        harvester.analyze_engagement("demo", 5).await.unwrap();
        assert_eq!(launcher.launches(), 2);
        assert_eq!(launcher.closes(), 2);
    }

    #[tokio::test]
    async fn test_login_attempts_share_platform_rate_limit() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let harvester = harvester(fast_config(), &launcher);

        harvester.collect("demo", 5, 3).await.unwrap();
        harvester.collect("demo", 5, 2).await.unwrap();

        let status = harvester.rate_limit_status("demo").unwrap();
        assert_eq!(status.calls_in_window, 2);
        assert_eq!(status.max_calls, 100);
        assert!(harvester.rate_limit_status("myspace").is_none());
    }

    #[tokio::test]
    async fn test_cancelled_run_still_closes_browser() {
        let launcher = SimulatedLauncher::new(demo_feed().with_page_size(10));
        let config = HarvesterConfig {
            scroll_wait_ms: 500,
            ..fast_config()
        };
        let harvester = harvester(config, &launcher);

        let result =
            tokio::time::timeout(Duration::from_millis(200), harvester.collect("demo", 20, 3)).await;
        assert!(result.is_err());

        // The close is handed to the runtime when the run future is dropped.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), launcher.launches());
    }

    #[tokio::test]
    async fn test_cache_write_sweeps_expired_entries() {
        let launcher = SimulatedLauncher::new(demo_feed());
        let cache = Arc::new(MemoryCache::new(Duration::from_millis(150)));
        let harvester = Harvester::new(fast_config(), Arc::new(launcher.clone()))
            .with_cache(cache.clone())
            .with_credentials(demo_credentials());

        harvester.collect("demo", 5, 3).await.unwrap();
        assert_eq!(cache.len().await, 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        harvester.collect("demo", 5, 2).await.unwrap();

        assert_eq!(launcher.launches(), 2);
        assert_eq!(cache.len().await, 1);
        assert_eq!(harvester.purge_cache().await, 0);
    }
}
