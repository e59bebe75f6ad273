//! Page-driver capability consumed by the harvester.
//!
//! The harvester only ever talks to a browser through [`PageDriver`] and
//! [`ElementHandle`]. Two realizations ship with the crate:
//!
//! - [`webdriver`]: a client for any W3C WebDriver server (chromedriver,
//!   geckodriver, a Selenium grid).
//! - [`simulated`]: an in-memory feed that grows as it is scrolled, used by
//!   tests and by fixture replay.

pub mod simulated;
pub mod webdriver;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use trendscout_core::DriverError;

pub use simulated::{SimulatedFeed, SimulatedLauncher};
pub use webdriver::{WebDriverLauncher, WebDriverSession};

/// Reports the scrollable height of the document.
pub const SCROLL_HEIGHT_SCRIPT: &str = "return document.body.scrollHeight";

/// Scrolls the window to the bottom of the document.
pub const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// A single browsing context (one tab of one browser).
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Resolves once at least one element matches `selector`, or fails with
    /// [`DriverError::Timeout`].
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn evaluate(&self, script: &str) -> Result<Value, DriverError>;

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Releases the browsing context. Further calls fail with
    /// [`DriverError::SessionClosed`].
    async fn close(&self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn text(&self) -> Result<String, DriverError>;

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;

    /// First descendant matching `selector`, if any.
    async fn query(&self, selector: &str) -> Result<Option<Box<dyn ElementHandle>>, DriverError>;
}

/// Opens fresh browsing contexts, one per collection run.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, DriverError>;
}

/// Text of the first descendant matching `selector`, if there is one.
pub async fn child_text(
    element: &dyn ElementHandle,
    selector: &str,
) -> Result<Option<String>, DriverError> {
    match element.query(selector).await? {
        Some(child) => Ok(Some(child.text().await?)),
        None => Ok(None),
    }
}
