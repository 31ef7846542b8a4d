//! Persisted record cache.
//!
//! One entry per location, stored under a key that embeds a schema
//! version token: bumping the token orphans old entries instead of failing
//! to read them. Backends never raise. A read or write problem is logged
//! and treated as "no cache".

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::types::{LocationKey, WeatherRecord};

/// Default schema version token.
pub const DEFAULT_SCHEMA_VERSION: &str = "v13_search";

/// A cached record and when it was written (epoch millis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: WeatherRecord,
    pub timestamp: i64,
}

impl CacheEntry {
    pub fn new(data: WeatherRecord, written_at: DateTime<Utc>) -> Self {
        Self {
            data,
            timestamp: written_at.timestamp_millis(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        Duration::milliseconds(now.timestamp_millis() - self.timestamp)
    }

    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < ttl
    }
}

/// Storage key for a location's entry.
pub fn cache_key(schema_version: &str, location: LocationKey) -> String {
    format!("weather_cache_{schema_version}_{location}")
}

/// Key-value storage for cache entries.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn set(&self, key: &str, entry: &CacheEntry);
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// One pretty-printed JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn try_get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache entry {}", path.display()))?;
        let entry: CacheEntry = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse cache entry {}", path.display()))?;
        Ok(Some(entry))
    }

    fn try_set(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache dir {}", self.dir.display()))?;

        let json = serde_json::to_string_pretty(entry).context("Failed to serialise cache entry")?;

        // Write-then-rename so readers never see a partial file.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .with_context(|| format!("Failed to write cache entry {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move cache entry into {}", path.display()))?;
        Ok(())
    }
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.try_get(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as empty");
                None
            }
        }
    }

    fn set(&self, key: &str, entry: &CacheEntry) {
        match self.try_set(key, entry) {
            Ok(()) => debug!(key, timestamp = entry.timestamp, "Cache entry written"),
            Err(e) => warn!(key, error = %e, "Cache write failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Process-local cache, used when no directory is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, entry: &CacheEntry) {
        match self.entries.lock() {
            Ok(mut map) => {
                map.insert(key.to_string(), entry.clone());
            }
            Err(_) => warn!(key, "Memory cache lock poisoned, entry dropped"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
