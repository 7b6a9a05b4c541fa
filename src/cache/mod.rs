//! Durable per-account stores: the AI analysis cache and the read history.
//!
//! Both are small JSON files keyed by [`crate::model::link_key`] of the
//! topic's canonical link. Entries older than `cache_days` are purged once at
//! load time; a long-running process must be restarted (or the store
//! reloaded) to re-purge. Writes are write-through so a crash mid-run loses
//! at most the in-flight item.
//!
//! Cache I/O never fails the pipeline: a read error degrades to "miss", a
//! write error is logged and swallowed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{link_key, TopicAnalysis};

/// One persisted analysis record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Topic metadata snapshot at analysis time.
    pub topic: serde_json::Value,
    pub analysis: TopicAnalysis,
    pub cached_at: DateTime<Utc>,
}

/// TTL-expiring store of AI analysis results.
pub struct ContentCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ContentCache {
    /// Load the persisted store and purge expired entries. Unreadable or
    /// corrupt files start an empty cache.
    #[must_use]
    pub fn load(storage_dir: &Path, username: &str, cache_days: i64) -> Self {
        let path = storage_dir.join(format!("content_cache_{username}.json"));
        let mut entries: HashMap<String, CacheEntry> = read_json(&path).unwrap_or_default();

        let cutoff = Utc::now() - Duration::days(cache_days);
        let before = entries.len();
        entries.retain(|_, entry| entry.cached_at >= cutoff);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, kept = entries.len(), "purged expired cache entries");
        }

        let cache = Self {
            path,
            entries: Mutex::new(entries),
        };
        // Rewrite so expired entries do not come back on the next load.
        if purged > 0 {
            cache.persist();
        }
        cache
    }

    #[must_use]
    pub fn key_for(link: &str) -> String {
        link_key(link)
    }

    #[must_use]
    pub fn is_cached(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<TopicAnalysis> {
        self.entries
            .lock()
            .ok()
            .and_then(|e| e.get(key).map(|entry| entry.analysis.clone()))
    }

    /// Insert and persist immediately.
    pub fn set(&self, key: &str, topic: serde_json::Value, analysis: TopicAnalysis) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                CacheEntry {
                    topic,
                    analysis,
                    cached_at: Utc::now(),
                },
            );
        }
        self.persist();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self) {
        let Ok(entries) = self.entries.lock() else {
            return;
        };
        write_json(&self.path, &*entries);
    }
}

/// Which topics were already read recently, to avoid re-fetching the same
/// bodies every run.
pub struct ReadHistory {
    path: PathBuf,
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ReadHistory {
    #[must_use]
    pub fn load(storage_dir: &Path, username: &str, cache_days: i64) -> Self {
        let path = storage_dir.join(format!("read_history_{username}.json"));
        let mut entries: HashMap<String, DateTime<Utc>> = read_json(&path).unwrap_or_default();

        let cutoff = Utc::now() - Duration::days(cache_days);
        let before = entries.len();
        entries.retain(|_, read_at| *read_at >= cutoff);
        let purged = before - entries.len();

        let history = Self {
            path,
            entries: Mutex::new(entries),
        };
        if purged > 0 {
            debug!(purged, "purged expired read-history entries");
            history.persist();
        }
        history
    }

    #[must_use]
    pub fn is_read(&self, link: &str) -> bool {
        let key = link_key(link);
        self.entries
            .lock()
            .map(|e| e.contains_key(&key))
            .unwrap_or(false)
    }

    /// Mark and persist immediately.
    pub fn mark_read(&self, link: &str) {
        let key = link_key(link);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, Utc::now());
        }
        self.persist();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self) {
        let Ok(entries) = self.entries.lock() else {
            return;
        };
        write_json(&self.path, &*entries);
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), "corrupt store, starting empty: {e}");
                None
            }
        },
        Err(e) => {
            warn!(path = %path.display(), "unreadable store, starting empty: {e}");
            None
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    let payload = match serde_json::to_string_pretty(value) {
        Ok(p) => p,
        Err(e) => {
            warn!(path = %path.display(), "failed to serialize store: {e}");
            return;
        }
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), "failed to create storage dir: {e}");
            return;
        }
    }
    if let Err(e) = std::fs::write(path, payload) {
        warn!(path = %path.display(), "failed to persist store: {e}");
    }
}
