//! Credential lookup, keyed by the variable names a platform declares.

use std::collections::HashMap;
use trendscout_core::{ConfigError, Credentials};

pub trait CredentialSource: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }
}

/// Fixed key/value pairs, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Resolves the identity/secret pair named by `(identity_var, secret_var)`.
pub fn resolve(
    source: &dyn CredentialSource,
    (identity_var, secret_var): (&str, &str),
) -> Result<Credentials, ConfigError> {
    let lookup = |var: &str| {
        source
            .lookup(var)
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: var.to_string(),
            })
    };

    Ok(Credentials::new(lookup(identity_var)?, lookup(secret_var)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_static_credentials() {
        let source = StaticCredentials::new()
            .with("DEMO_USER", "demo")
            .with("DEMO_PASSWORD", "secret");

        let credentials = resolve(&source, ("DEMO_USER", "DEMO_PASSWORD")).unwrap();
        assert_eq!(credentials.identity, "demo");
        assert_eq!(credentials.secret(), "secret");
    }

    #[test]
    fn test_missing_secret_names_variable() {
        let source = StaticCredentials::new().with("LINKEDIN_EMAIL", "someone@example.com");

        match resolve(&source, ("LINKEDIN_EMAIL", "LINKEDIN_PASSWORD")) {
            Err(ConfigError::MissingEnvironmentVariable { var_name }) => {
                assert_eq!(var_name, "LINKEDIN_PASSWORD");
            }
            other => panic!("Expected MissingEnvironmentVariable, got {:?}", other),
        }
    }

    #[test]
    fn test_env_credentials_ignore_unset_variables() {
        let source = EnvCredentials;
        assert!(source
            .lookup("TRENDSCOUT_TEST_VARIABLE_THAT_IS_NEVER_SET")
            .is_none());
    }
}
