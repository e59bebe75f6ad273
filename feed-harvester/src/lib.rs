pub mod cache;
pub mod collector;
pub mod credentials;
pub mod driver;
pub mod harvester;
pub mod metrics;
pub mod platform;
pub mod ranker;
pub mod rate_limiter;
pub mod retry;
pub mod session;

mod tests;

pub use cache::{CacheKey, CacheStore, FileCache, MemoryCache};
pub use collector::{CollectionOutcome, CollectorSettings, ScrollCollector, StopReason};
pub use credentials::{CredentialSource, EnvCredentials, StaticCredentials};
pub use driver::{BrowserLauncher, ElementHandle, PageDriver, SimulatedFeed, SimulatedLauncher, WebDriverLauncher};
pub use harvester::{CollectRequest, Harvester, DEFAULT_ENGAGEMENT_SAMPLE};
pub use metrics::{HarvestEvent, HarvestMetrics, HarvestObserver, MetricsCollector, NoopObserver};
pub use platform::{DemoPlatform, LinkedInPlatform, Platform, PlatformRegistry};
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
pub use retry::RetryConfig;
pub use session::AuthenticatedSession;
