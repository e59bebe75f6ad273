//! TTL cache for ranked collection results.
//!
//! Caching is an optimization only: every read or write failure is logged
//! and degrades to a miss or a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use trendscout_core::{CacheError, PostRecord};

/// Fingerprint of a collection request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(platform: &str, max_posts: usize, top_n: usize) -> Self {
        Self(format!(
            "{}_posts_{}_{}",
            platform.to_lowercase(),
            max_posts,
            top_n
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn file_name(&self) -> String {
        let stem: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}.json", stem)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
    #[serde(rename = "content")]
    pub payload: Vec<PostRecord>,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, payload: Vec<PostRecord>) -> Self {
        Self {
            key: key.as_str().to_string(),
            captured_at: Utc::now(),
            payload,
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        match Utc::now().signed_duration_since(self.captured_at).to_std() {
            Ok(age) => age < ttl,
            // Captured "in the future": clock moved backwards
            Err(_) => true,
        }
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fresh payload for `key`. Missing, expired and unreadable entries are
    /// all `None`.
    async fn get(&self, key: &CacheKey) -> Option<Vec<PostRecord>>;

    /// Replaces any entry stored under `key`.
    async fn put(&self, key: &CacheKey, payload: &[PostRecord]);

    async fn invalidate(&self, key: &CacheKey);

    /// Drops every expired entry and returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    async fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Corrupt {
                key: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    async fn write_entry(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let body = serde_json::to_vec_pretty(entry)?;
        let target = self.path_for(key);
        let temp = self
            .dir
            .join(format!(".{}.{:016x}.tmp", key.file_name(), fastrand::u64(..)));

        tokio::fs::write(&temp, body).await?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(path: &Path) -> Result<bool, CacheError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn sweep(&self) -> Result<usize, CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let stale = match Self::read_entry(&path).await {
                Ok(Some(cached)) => !cached.is_fresh(self.ttl),
                Ok(None) => false,
                Err(CacheError::Corrupt { .. }) => true,
                Err(e) => return Err(e),
            };
            if stale && Self::remove(&path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &CacheKey) -> Option<Vec<PostRecord>> {
        let path = self.path_for(key);
        match Self::read_entry(&path).await {
            Ok(Some(entry)) if entry.key != key.as_str() => {
                debug!("Cache file {} belongs to {}, ignoring", path.display(), entry.key);
                None
            }
            Ok(Some(entry)) if entry.is_fresh(self.ttl) => {
                debug!("Cache hit for {}", key);
                Some(entry.payload)
            }
            Ok(Some(_)) => {
                debug!("Cache entry for {} expired", key);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn put(&self, key: &CacheKey, payload: &[PostRecord]) {
        let entry = CacheEntry::new(key, payload.to_vec());
        match self.write_entry(key, &entry).await {
            Ok(()) => debug!("Cached {} records under {}", payload.len(), key),
            Err(e) => warn!("Failed to write cache entry {}: {}", key, e),
        }
    }

    async fn invalidate(&self, key: &CacheKey) {
        if let Err(e) = Self::remove(&self.path_for(key)).await {
            warn!("Failed to invalidate cache entry {}: {}", key, e);
        }
    }

    async fn purge_expired(&self) -> usize {
        match self.sweep().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Cache sweep of {} failed: {}", self.dir.display(), e);
                0
            }
        }
    }
}

/// Process-local cache, shared between harvesters through an `Arc`.
#[derive(Debug)]
pub struct MemoryCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Vec<PostRecord>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.payload.clone())
    }

    async fn put(&self, key: &CacheKey, payload: &[PostRecord]) {
        let entry = CacheEntry::new(key, payload.to_vec());
        self.entries.write().await.insert(key.clone(), entry);
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.entries.write().await.remove(key);
    }

    async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(self.ttl));
        before - entries.len()
    }
}
