use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Login error: {0}")]
    Login(#[from] LoginError),

    #[error("Data collection error: {0}")]
    DataCollection(#[from] DataCollectionError),

    #[error("Unsupported platform: {platform}")]
    UnsupportedPlatform { platform: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum LoginError {
    #[error("Failed to login to {platform} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        platform: String,
        attempts: u32,
        last_error: String,
    },
}

#[derive(Error, Debug)]
pub enum DataCollectionError {
    #[error("Page driver failure: {0}")]
    Driver(#[from] DriverError),

    #[error("Collection cancelled after {iterations} scroll iterations")]
    Cancelled { iterations: u32 },

    #[error("Browser unavailable: {reason}")]
    BrowserUnavailable { reason: String },

    #[error("Page reported a non-numeric scroll height: {value}")]
    InvalidHeight { value: String },
}

/// Failures surfaced by a page-driver implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Timed out after {timeout_ms}ms waiting for {selector}")]
    Timeout { selector: String, timeout_ms: u64 },

    #[error("No element matches selector: {selector}")]
    NoSuchElement { selector: String },

    #[error("Script evaluation failed: {message}")]
    Script { message: String },

    #[error("Driver protocol error (status {status}, {error}): {message}")]
    Protocol {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Browsing session already closed")]
    SessionClosed,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
