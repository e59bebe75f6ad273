//! Platform served by [`crate::driver::SimulatedDriver`].

use super::{LoginForm, Platform, PostLayout};
use crate::driver::{ElementHandle, PageDriver};
use async_trait::async_trait;
use std::time::Duration;
use trendscout_core::{Credentials, DriverError, ScrapedPost};

pub const LOGIN_URL: &str = "https://demo.invalid/login";
pub const FEED_URL: &str = "https://demo.invalid/feed";
pub const IDENTITY_SELECTOR: &str = "#user";
pub const SECRET_SELECTOR: &str = "#pass";
pub const SUBMIT_SELECTOR: &str = "#sign-in";
pub const POST_SELECTOR: &str = ".post";
pub const CONTENT_SELECTOR: &str = ".post-content";
pub const LIKES_SELECTOR: &str = ".post-likes";
pub const COMMENTS_SELECTOR: &str = ".post-comments";

const LOGIN_FORM: LoginForm<'static> = LoginForm {
    url: LOGIN_URL,
    identity_selector: IDENTITY_SELECTOR,
    secret_selector: SECRET_SELECTOR,
    submit_selector: SUBMIT_SELECTOR,
    landmark_selector: POST_SELECTOR,
};

const POST_LAYOUT: PostLayout<'static> = PostLayout {
    content_selector: CONTENT_SELECTOR,
    likes_selector: LIKES_SELECTOR,
    comments_selector: COMMENTS_SELECTOR,
};

#[derive(Debug, Default)]
pub struct DemoPlatform;

impl DemoPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Platform for DemoPlatform {
    fn name(&self) -> &str {
        "demo"
    }

    fn credential_vars(&self) -> (&str, &str) {
        ("DEMO_USER", "DEMO_PASSWORD")
    }

    fn post_selector(&self) -> &str {
        POST_SELECTOR
    }

    async fn login(
        &self,
        driver: &dyn PageDriver,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        LOGIN_FORM.submit(driver, credentials, timeout).await
    }

    async fn extract_record(&self, element: &dyn ElementHandle) -> Option<ScrapedPost> {
        POST_LAYOUT.extract(element).await
    }
}
