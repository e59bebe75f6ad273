use crate::error::*;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::Login(e) => {
                error!("Login error details: {:?}", e);
            }
            CoreError::DataCollection(e) => {
                error!("Data collection error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Login(e) => e.is_retryable(),
            CoreError::DataCollection(e) => e.is_retryable(),
            CoreError::Io(_) => true,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::Login(e) => e.user_friendly_message(),
            CoreError::DataCollection(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::UnsupportedPlatform { platform } => format!(
                "Platform '{}' is not supported. Check the platform name and try again.",
                platform
            ),
            CoreError::InvalidInput { message } => {
                format!("Invalid input: {}", message)
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::Login(_) => "LOGIN".to_string(),
            CoreError::DataCollection(_) => "DATA_COLLECTION".to_string(),
            CoreError::UnsupportedPlatform { .. } => "UNSUPPORTED_PLATFORM".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
        }
    }
}

impl ErrorExt for LoginError {
    fn log_error(&self) -> &Self {
        error!("LoginError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("LoginError (warning): {}", self);
        self
    }

    // A whole run may be retried later; the remote may only have been slow.
    fn is_retryable(&self) -> bool {
        true
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LoginError::RetriesExhausted {
                platform, attempts, ..
            } => format!(
                "Could not sign in to {} after {} attempts. Please check your credentials.",
                platform, attempts
            ),
        }
    }

    fn error_code(&self) -> String {
        match self {
            LoginError::RetriesExhausted { .. } => "LOGIN_RETRIES_EXHAUSTED".to_string(),
        }
    }
}

impl ErrorExt for DataCollectionError {
    fn log_error(&self) -> &Self {
        error!("DataCollectionError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DataCollectionError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            DataCollectionError::Driver(e) => e.is_retryable(),
            DataCollectionError::BrowserUnavailable { .. } => true,
            DataCollectionError::Cancelled { .. } => false,
            DataCollectionError::InvalidHeight { .. } => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DataCollectionError::Driver(e) => e.user_friendly_message(),
            DataCollectionError::Cancelled { .. } => {
                "Collection was cancelled before it finished.".to_string()
            }
            DataCollectionError::BrowserUnavailable { .. } => {
                "The browser could not be started. Is the WebDriver server running?".to_string()
            }
            DataCollectionError::InvalidHeight { .. } => {
                "The page reported an unexpected layout and could not be scrolled.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            DataCollectionError::Driver(e) => e.error_code(),
            DataCollectionError::Cancelled { .. } => "COLLECTION_CANCELLED".to_string(),
            DataCollectionError::BrowserUnavailable { .. } => {
                "COLLECTION_BROWSER_UNAVAILABLE".to_string()
            }
            DataCollectionError::InvalidHeight { .. } => "COLLECTION_INVALID_HEIGHT".to_string(),
        }
    }
}

impl ErrorExt for DriverError {
    fn log_error(&self) -> &Self {
        error!("DriverError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DriverError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DriverError::Timeout { .. } | DriverError::Network(_) | DriverError::NoSuchElement { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DriverError::Timeout { .. } => {
                "The page took too long to respond. Please try again.".to_string()
            }
            DriverError::Network(_) => {
                "Lost connection to the browser. Please check the WebDriver server.".to_string()
            }
            DriverError::SessionClosed => "The browser session was closed.".to_string(),
            _ => "The browser reported an error while reading the page.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DriverError::Timeout { .. } => "DRIVER_TIMEOUT".to_string(),
            DriverError::NoSuchElement { .. } => "DRIVER_NO_SUCH_ELEMENT".to_string(),
            DriverError::Script { .. } => "DRIVER_SCRIPT".to_string(),
            DriverError::Protocol { .. } => "DRIVER_PROTOCOL".to_string(),
            DriverError::Network(_) => "DRIVER_NETWORK".to_string(),
            DriverError::SessionClosed => "DRIVER_SESSION_CLOSED".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' was not found.", path)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::Parse(_) => {
                "Configuration file could not be parsed. Please check its syntax.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
            if error.is_retryable() {
                info!("Error is retryable; the run may be attempted again");
            }
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
