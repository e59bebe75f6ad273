use super::{LoginForm, Platform, PostLayout};
use crate::driver::{ElementHandle, PageDriver};
use async_trait::async_trait;
use std::time::Duration;
use trendscout_core::{Credentials, DriverError, ScrapedPost};

pub const LOGIN_URL: &str = "https://www.linkedin.com/login";
pub const POST_SELECTOR: &str = ".feed-shared-update-v2";

const LOGIN_FORM: LoginForm<'static> = LoginForm {
    url: LOGIN_URL,
    identity_selector: "#username",
    secret_selector: "#password",
    submit_selector: "button[type='submit']",
    landmark_selector: POST_SELECTOR,
};

const POST_LAYOUT: PostLayout<'static> = PostLayout {
    content_selector: ".update-components-text",
    likes_selector: ".social-details-social-counts__reactions-count",
    comments_selector: ".social-details-social-counts__comments",
};

#[derive(Debug, Default)]
pub struct LinkedInPlatform;

impl LinkedInPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Platform for LinkedInPlatform {
    fn name(&self) -> &str {
        "linkedin"
    }

    fn credential_vars(&self) -> (&str, &str) {
        ("LINKEDIN_EMAIL", "LINKEDIN_PASSWORD")
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
