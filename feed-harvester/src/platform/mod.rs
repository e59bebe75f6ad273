//! Per-platform capability implementations.
//!
//! A [`Platform`] knows how to sign in to one site, where that site's feed
//! posts live in the DOM, and how to read one post. Everything else (retry
//! policy, scrolling, ranking, caching) is shared. Adding a site means adding
//! an implementation and registering it; the dispatch in
//! [`crate::Harvester`] never changes.

pub mod demo;
pub mod linkedin;

use crate::driver::{child_text, ElementHandle, PageDriver};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use trendscout_core::{Credentials, DriverError, ScrapedPost};

pub use demo::DemoPlatform;
pub use linkedin::LinkedInPlatform;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Registry name, lower case (e.g. `"linkedin"`).
    fn name(&self) -> &str;

    /// Environment variables holding the identity and the secret.
    fn credential_vars(&self) -> (&str, &str);

    /// Selector matching one feed post.
    fn post_selector(&self) -> &str;

    /// One login attempt: navigate, submit credentials and wait up to
    /// `timeout` for the landmark that proves the session is authenticated.
    async fn login(
        &self,
        driver: &dyn PageDriver,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Feed posts currently present in the document.
    async fn collect_page(
        &self,
        driver: &dyn PageDriver,
    ) -> Result<Vec<Box<dyn ElementHandle>>, DriverError> {
        driver.query_all(self.post_selector()).await
    }

    /// Reads one post. `None` means the element could not be read and is
    /// skipped.
    async fn extract_record(&self, element: &dyn ElementHandle) -> Option<ScrapedPost>;
}

/// DOM layout of a username/password login page.
pub struct LoginForm<'a> {
    pub url: &'a str,
    pub identity_selector: &'a str,
    pub secret_selector: &'a str,
    pub submit_selector: &'a str,
    /// Element that only exists once the user is signed in.
    pub landmark_selector: &'a str,
}

impl LoginForm<'_> {
    pub async fn submit(
        &self,
        driver: &dyn PageDriver,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        driver.navigate(self.url).await?;
        driver
            .fill(self.identity_selector, &credentials.identity)
            .await?;
        driver
            .fill(self.secret_selector, credentials.secret())
            .await?;
        driver.click(self.submit_selector).await?;
        driver.wait_for(self.landmark_selector, timeout).await
    }
}

/// Selectors locating the fields of one post, relative to the post element.
pub struct PostLayout<'a> {
    pub content_selector: &'a str,
    pub likes_selector: &'a str,
    pub comments_selector: &'a str,
}

impl PostLayout<'_> {
    /// Missing counters read as `"0"` and missing text as empty; a failing
    /// driver call drops the whole post.
    pub async fn extract(&self, element: &dyn ElementHandle) -> Option<ScrapedPost> {
        match self.read(element).await {
            Ok(post) => Some(post),
            Err(e) => {
                debug!("Skipping unreadable post: {}", e);
                None
            }
        }
    }

    async fn read(&self, element: &dyn ElementHandle) -> Result<ScrapedPost, DriverError> {
        let content = child_text(element, self.content_selector)
            .await?
            .unwrap_or_default();
        let likes = child_text(element, self.likes_selector)
            .await?
            .unwrap_or_else(|| "0".to_string());
        let comments = child_text(element, self.comments_selector)
            .await?
            .unwrap_or_else(|| "0".to_string());

        Ok(ScrapedPost::new(content.trim(), likes.trim(), comments.trim()))
    }
}

#[derive(Default, Clone)]
pub struct PlatformRegistry {
    platforms: HashMap<String, Arc<dyn Platform>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every platform shipped in this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LinkedInPlatform::new()));
        registry.register(Arc::new(DemoPlatform::new()));
        registry
    }

    pub fn register(&mut self, platform: Arc<dyn Platform>) {
        self.platforms
            .insert(platform.name().to_lowercase(), platform);
    }

    /// Lookup is case-insensitive.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Platform>> {
        self.platforms.get(&name.to_lowercase()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.platforms.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = PlatformRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["demo", "linkedin"]);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = PlatformRegistry::with_defaults();
        assert!(registry.get("LinkedIn").is_some());
        assert!(registry.get("DEMO").is_some());
        assert!(registry.get("myspace").is_none());
    }
}
