//! `trendscout`: run one feed collection and print the ranked posts as JSON.
//!
//! ```bash
//! # Against a running chromedriver, credentials from LINKEDIN_EMAIL / LINKEDIN_PASSWORD
//! trendscout --platform linkedin --max-posts 200 --top 10
//!
//! # Offline replay of a recorded feed
//! trendscout --platform demo --fixture demos/feed.json --top 3
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use feed_harvester::{
    BrowserLauncher, CollectRequest, Harvester, SimulatedFeed, SimulatedLauncher,
    StaticCredentials, WebDriverLauncher, DEFAULT_ENGAGEMENT_SAMPLE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use trendscout_core::{CoreError, ErrorExt, ErrorReporter, HarvesterConfig, PostRecord};
use url::Url;

#[derive(Parser)]
#[command(
    name = "trendscout",
    version,
    about = "Collect the most engaging posts from a social feed"
)]
struct Cli {
    /// Harvester configuration (TOML). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "linkedin")]
    platform: String,

    /// Posts to collect before ranking. Capped by `max_posts` in the config.
    #[arg(long, default_value_t = 100)]
    max_posts: usize,

    /// Ranked posts to print.
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// WebDriver endpoint (chromedriver, geckodriver, Selenium).
    #[arg(long, default_value = "http://localhost:9515", conflicts_with = "fixture")]
    webdriver: Url,

    /// Replay a recorded feed instead of driving a browser. Only the `demo`
    /// platform understands fixtures.
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Extra whole-run attempts after a retryable failure.
    #[arg(long, default_value_t = 0)]
    run_retries: u32,

    /// Print the engagement of the first few posts without scrolling.
    #[arg(long)]
    analyze: bool,

    /// Overall time limit for one collection run, in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn load_config(path: Option<&PathBuf>) -> Result<HarvesterConfig> {
    match path {
        Some(path) => HarvesterConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(HarvesterConfig::default()),
    }
}

fn build_harvester(cli: &Cli, config: HarvesterConfig) -> Result<Harvester> {
    let Some(fixture) = &cli.fixture else {
        let launcher = WebDriverLauncher::headless_chrome(cli.webdriver.clone())
            .context("creating WebDriver client")?
            .with_poll_interval(Duration::from_millis(250));
        return Ok(Harvester::new(config, Arc::new(launcher)).with_metrics());
    };

    if !cli.platform.eq_ignore_ascii_case("demo") {
        bail!("--fixture only works with --platform demo");
    }
    let feed = SimulatedFeed::from_json_file(fixture)
        .with_context(|| format!("reading fixture {}", fixture.display()))?;
    tracing::info!(
        "Replaying {} posts from {}",
        feed.posts.len(),
        fixture.display()
    );

    let launcher: Arc<dyn BrowserLauncher> = Arc::new(SimulatedLauncher::new(feed));
    let credentials = StaticCredentials::new()
        .with("DEMO_USER", "fixture")
        .with("DEMO_PASSWORD", "fixture");
    Ok(Harvester::new(config, launcher)
        .with_credentials(Arc::new(credentials))
        .with_metrics())
}

async fn run_once(cli: &Cli, harvester: &Harvester) -> Result<Vec<PostRecord>, CoreError> {
    if cli.analyze {
        return harvester
            .analyze_engagement(&cli.platform, DEFAULT_ENGAGEMENT_SAMPLE)
            .await;
    }

    let mut request = CollectRequest::new(&cli.platform, cli.max_posts, cli.top);
    if let Some(secs) = cli.timeout_secs {
        request = request.with_timeout(Duration::from_secs(secs));
    }
    harvester.collect_request(request).await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trendscout=info,feed_harvester=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let retry_pause = config.retry_backoff();
    let harvester = build_harvester(&cli, config)?;
    let reporter = ErrorReporter::new();

    tracing::info!(
        "Collecting from {} (platforms: {})",
        cli.platform,
        harvester.platforms().join(", ")
    );

    let mut attempt = 0;
    let records = loop {
        match run_once(&cli, &harvester).await {
            Ok(records) => break records,
            Err(e) if e.is_retryable() && attempt < cli.run_retries => {
                attempt += 1;
                reporter.report_warning(&e);
                tracing::warn!(
                    "Run failed, retrying ({}/{}) in {:?}",
                    attempt,
                    cli.run_retries,
                    retry_pause
                );
                tokio::time::sleep(retry_pause).await;
            }
            Err(e) => {
                reporter.report_error(&e);
                bail!(e.user_friendly_message());
            }
        }
    };

    if let Some(metrics) = harvester.metrics() {
        tracing::debug!(
            "Runs: {} ok, {} failed, cache hit rate {:.0}%",
            metrics.successful_runs,
            metrics.failed_runs,
            metrics.cache_hit_rate() * 100.0
        );
    }

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
