use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A post as read off the page, counters still in display form.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedPost {
    pub content: String,
    pub likes_text: String,
    pub comments_text: String,
    pub captured_at: DateTime<Utc>,
}

impl ScrapedPost {
    pub fn new(
        content: impl Into<String>,
        likes_text: impl Into<String>,
        comments_text: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            likes_text: likes_text.into(),
            comments_text: comments_text.into(),
            captured_at: Utc::now(),
        }
    }
}

/// A ranked post handed to downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub content: String,
    pub likes: u64,
    pub comments: u64,
    pub total_engagement: u64,
    pub timestamp: DateTime<Utc>,
}

impl PostRecord {
    pub fn new(content: String, likes: u64, comments: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            content,
            likes,
            comments,
            total_engagement: likes.saturating_add(comments),
            timestamp,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: String,
    secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_record_engagement() {
        let record = PostRecord::new("hello".to_string(), 100, 10, Utc::now());
        assert_eq!(record.total_engagement, 110);
    }

    #[test]
    fn test_post_record_serialization_fields() {
        let record = PostRecord::new("hello".to_string(), 3, 4, Utc::now());
        let value = serde_json::to_value(&record).unwrap();

        for field in ["content", "likes", "comments", "total_engagement", "timestamp"] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = Credentials::new("someone@example.com", "hunter2");
        let rendered = format!("{:?}", credentials);

        assert!(rendered.contains("someone@example.com"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(credentials.secret(), "hunter2");
    }
}
