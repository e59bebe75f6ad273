//! In-memory feed that behaves like an infinite-scroll page.
//!
//! The feed starts with one page of posts visible after login; every scroll
//! reveals `page_size` more until the list runs out. With `endless` set the
//! document keeps growing after the posts run out, which is how a feed
//! padded with ads or suggestions behaves.

use super::{BrowserLauncher, ElementHandle, PageDriver, SCROLL_HEIGHT_SCRIPT, SCROLL_TO_BOTTOM_SCRIPT};
use crate::platform::demo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use trendscout_core::{CoreError, DriverError};

const PIXELS_PER_POST: u64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPost {
    pub content: String,
    pub likes: String,
    pub comments: String,
    /// Reading this post fails, like a node detached mid-read.
    #[serde(default)]
    pub broken: bool,
}

impl SimulatedPost {
    pub fn new(content: impl Into<String>, likes: impl Into<String>, comments: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            likes: likes.into(),
            comments: comments.into(),
            broken: false,
        }
    }

    pub fn broken(content: impl Into<String>) -> Self {
        Self {
            broken: true,
            ..Self::new(content, "0", "0")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedFeed {
    pub posts: Vec<SimulatedPost>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Number of login submissions that are rejected before one succeeds.
    #[serde(default)]
    pub login_failures: u32,
    #[serde(default)]
    pub endless: bool,
}

fn default_page_size() -> usize {
    3
}

impl SimulatedFeed {
    pub fn new(posts: Vec<SimulatedPost>) -> Self {
        Self {
            posts,
            page_size: default_page_size(),
            login_failures: 0,
            endless: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_login_failures(mut self, login_failures: u32) -> Self {
        self.login_failures = login_failures;
        self
    }

    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Default)]
struct DriverState {
    url: Option<String>,
    filled: Vec<(String, String)>,
    login_submissions: u32,
    logged_in: bool,
    visible: usize,
    scrolls: u64,
    closed: bool,
}

pub struct SimulatedDriver {
    feed: SimulatedFeed,
    state: Mutex<DriverState>,
    stats: Arc<LauncherStats>,
}

impl SimulatedDriver {
    pub fn new(feed: SimulatedFeed) -> Self {
        Self::with_stats(feed, Arc::new(LauncherStats::default()))
    }

    fn with_stats(feed: SimulatedFeed, stats: Arc<LauncherStats>) -> Self {
        Self {
            feed,
            state: Mutex::new(DriverState::default()),
            stats,
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, DriverState>, DriverError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return Err(DriverError::SessionClosed);
        }
        Ok(state)
    }

    fn height(&self, state: &DriverState) -> u64 {
        let base = state.visible as u64 * PIXELS_PER_POST;
        if self.feed.endless {
            base + state.scrolls * PIXELS_PER_POST
        } else {
            base
        }
    }

    fn on_feed(&self, state: &DriverState) -> bool {
        state.logged_in && state.url.as_deref() != Some(demo::LOGIN_URL)
    }
}

#[async_trait]
impl PageDriver for SimulatedDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state()?;
        state.url = Some(url.to_string());
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError> {
        let state = self.state()?;
        if selector != demo::POST_SELECTOR || !self.on_feed(&state) {
            return Ok(Vec::new());
        }

        Ok(self.feed.posts[..state.visible]
            .iter()
            .map(|post| Box::new(SimulatedElement::Post(post.clone())) as Box<dyn ElementHandle>)
            .collect())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let mut state = self.state()?;
        if state.url.as_deref() != Some(demo::LOGIN_URL) {
            return Err(DriverError::NoSuchElement {
                selector: selector.to_string(),
            });
        }
        state.filled.push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let mut state = self.state()?;
        if selector != demo::SUBMIT_SELECTOR || state.url.as_deref() != Some(demo::LOGIN_URL) {
            return Err(DriverError::NoSuchElement {
                selector: selector.to_string(),
            });
        }

        state.login_submissions += 1;
        self.stats.login_submissions.fetch_add(1, Ordering::SeqCst);
        let has_credentials = state.filled.len() >= 2;
        state.filled.clear();

        if has_credentials && state.login_submissions > self.feed.login_failures {
            state.logged_in = true;
            state.url = Some(demo::FEED_URL.to_string());
            state.visible = self.feed.page_size.min(self.feed.posts.len());
        }
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let ready = {
            let state = self.state()?;
            selector == demo::POST_SELECTOR && self.on_feed(&state) && state.visible > 0
        };
        if ready {
            return Ok(());
        }

        tokio::time::sleep(timeout).await;
        Err(DriverError::Timeout {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    async fn evaluate(&self, script: &str) -> Result<Value, DriverError> {
        let mut state = self.state()?;
        match script {
            SCROLL_HEIGHT_SCRIPT => Ok(Value::from(self.height(&state))),
            SCROLL_TO_BOTTOM_SCRIPT => {
                if self.on_feed(&state) {
                    state.visible = (state.visible + self.feed.page_size).min(self.feed.posts.len());
                    state.scrolls += 1;
                    self.stats.scrolls.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Value::Null)
            }
            other => Err(DriverError::Script {
                message: format!("unsupported script: {}", other),
            }),
        }
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut state = self.state()?;
        state.closed = true;
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

enum SimulatedElement {
    Post(SimulatedPost),
    Field(String),
}

impl SimulatedElement {
    fn stale(post: &SimulatedPost) -> DriverError {
        DriverError::Protocol {
            status: 404,
            error: "stale element reference".to_string(),
            message: format!("post '{}' is no longer attached", post.content),
        }
    }
}

#[async_trait]
impl ElementHandle for SimulatedElement {
    async fn text(&self) -> Result<String, DriverError> {
        match self {
            SimulatedElement::Post(post) if post.broken => Err(Self::stale(post)),
            SimulatedElement::Post(post) => Ok(format!(
                "{}\n{}\n{}",
                post.content, post.likes, post.comments
            )),
            SimulatedElement::Field(text) => Ok(text.clone()),
        }
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        match (self, name) {
            (SimulatedElement::Post(_), "class") => Ok(Some("post".to_string())),
            _ => Ok(None),
        }
    }

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn ElementHandle>>, DriverError> {
        let post = match self {
            SimulatedElement::Post(post) => post,
            SimulatedElement::Field(_) => return Ok(None),
        };
        if post.broken {
            return Err(Self::stale(post));
        }

        let field = match selector {
            demo::CONTENT_SELECTOR => &post.content,
            demo::LIKES_SELECTOR => &post.likes,
            demo::COMMENTS_SELECTOR => &post.comments,
            _ => return Ok(None),
        };
        Ok(Some(Box::new(SimulatedElement::Field(field.clone()))))
    }
}

/// Counters shared by every driver a [`SimulatedLauncher`] hands out.
#[derive(Debug, Default)]
pub struct LauncherStats {
    launches: AtomicUsize,
    closes: AtomicUsize,
    login_submissions: AtomicUsize,
    scrolls: AtomicUsize,
}

#[derive(Clone)]
pub struct SimulatedLauncher {
    feed: SimulatedFeed,
    stats: Arc<LauncherStats>,
    unavailable: bool,
}

impl SimulatedLauncher {
    pub fn new(feed: SimulatedFeed) -> Self {
        Self {
            feed,
            stats: Arc::new(LauncherStats::default()),
            unavailable: false,
        }
    }

    /// A launcher whose browser never starts.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(SimulatedFeed::new(Vec::new()))
        }
    }

    pub fn launches(&self) -> usize {
        self.stats.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.stats.closes.load(Ordering::SeqCst)
    }

    pub fn login_submissions(&self) -> usize {
        self.stats.login_submissions.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.stats.scrolls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for SimulatedLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        if self.unavailable {
            return Err(DriverError::Network("connection refused".to_string()));
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedDriver::with_stats(
            self.feed.clone(),
            self.stats.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(count: usize) -> SimulatedFeed {
        SimulatedFeed::new(
            (0..count)
                .map(|i| SimulatedPost::new(format!("post {}", i), "1", "0"))
                .collect(),
        )
        .with_page_size(2)
    }

    async fn logged_in(driver: &SimulatedDriver) {
        driver.navigate(demo::LOGIN_URL).await.unwrap();
        driver.fill(demo::IDENTITY_SELECTOR, "user").await.unwrap();
        driver.fill(demo::SECRET_SELECTOR, "pass").await.unwrap();
        driver.click(demo::SUBMIT_SELECTOR).await.unwrap();
    }

    #[tokio::test]
    async fn test_feed_hidden_before_login() {
        let driver = SimulatedDriver::new(feed(4));
        driver.navigate(demo::FEED_URL).await.unwrap();

        assert!(driver.query_all(demo::POST_SELECTOR).await.unwrap().is_empty());
        let waited = driver
            .wait_for(demo::POST_SELECTOR, Duration::from_millis(5))
            .await;
        assert!(matches!(waited, Err(DriverError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_scrolling_reveals_pages_until_exhausted() {
        let driver = SimulatedDriver::new(feed(5));
        logged_in(&driver).await;

        assert_eq!(driver.query_all(demo::POST_SELECTOR).await.unwrap().len(), 2);
        let first_height = driver.evaluate(SCROLL_HEIGHT_SCRIPT).await.unwrap();

        driver.evaluate(SCROLL_TO_BOTTOM_SCRIPT).await.unwrap();
        driver.evaluate(SCROLL_TO_BOTTOM_SCRIPT).await.unwrap();
        assert_eq!(driver.query_all(demo::POST_SELECTOR).await.unwrap().len(), 5);
        let full_height = driver.evaluate(SCROLL_HEIGHT_SCRIPT).await.unwrap();
        assert_ne!(first_height, full_height);

        driver.evaluate(SCROLL_TO_BOTTOM_SCRIPT).await.unwrap();
        assert_eq!(driver.evaluate(SCROLL_HEIGHT_SCRIPT).await.unwrap(), full_height);
    }

    #[tokio::test]
    async fn test_rejected_logins() {
        let driver = SimulatedDriver::new(feed(2).with_login_failures(1));

        logged_in(&driver).await;
        assert!(driver.query_all(demo::POST_SELECTOR).await.unwrap().is_empty());

        logged_in(&driver).await;
        assert_eq!(driver.query_all(demo::POST_SELECTOR).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_driver_rejects_calls() {
        let driver = SimulatedDriver::new(feed(1));
        driver.close().await.unwrap();

        assert_eq!(
            driver.navigate(demo::FEED_URL).await,
            Err(DriverError::SessionClosed)
        );
    }

    #[tokio::test]
    async fn test_unknown_script_fails() {
        let driver = SimulatedDriver::new(feed(1));
        let result = driver.evaluate("return navigator.userAgent").await;
        assert!(matches!(result, Err(DriverError::Script { .. })));
    }

    #[test]
    fn test_feed_fixture_defaults() {
        let raw = r#"{"posts": [{"content": "a", "likes": "1", "comments": "2 comments"}]}"#;
        let feed: SimulatedFeed = serde_json::from_str(raw).unwrap();

        assert_eq!(feed.page_size, 3);
        assert_eq!(feed.login_failures, 0);
        assert!(!feed.endless);
        assert!(!feed.posts[0].broken);
    }
}
