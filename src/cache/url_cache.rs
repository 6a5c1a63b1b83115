//! Two-tier cache for resolved delivery URLs
//!
//! Memory first, then the persistent SQLite store. Persistent hits are
//! promoted into memory. The cache is pure memoization: every value can be
//! rebuilt from its reference, transform and backend config.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::{debug, trace, warn};

use super::memory::MemoryCache;
use super::storage::{CacheStorage, StoredEntry};
use super::{CacheTtl, Namespace};

/// Persistent storage shared between cache facades
pub type SharedStorage = Arc<Mutex<CacheStorage>>;

/// Resolved-URL cache used by [`crate::delivery::ImageDelivery`].
pub struct UrlCache {
    memory: MemoryCache,
    persistent: Option<SharedStorage>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl UrlCache {
    /// Create a cache with an optional persistent tier.
    pub fn new(persistent: Option<SharedStorage>) -> Self {
        Self {
            memory: MemoryCache::new(CacheTtl::RESOLVED_URLS),
            persistent,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache with only the session tier (for `--no-cache`).
    pub fn memory_only() -> Self {
        Self::new(None)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(url) = self.memory.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!("URL cache hit (memory): {}", key);
            return Some(url);
        }

        if let Some(entry) = self.get_persistent(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("URL cache hit (persistent): {}", key);
            self.memory.put_aged(key, &entry.value, entry_age(&entry));
            return Some(entry.value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!("URL cache miss: {}", key);
        None
    }

    pub fn put(&self, key: &str, url: &str) {
        self.memory.put(key, url);

        if let Some(ref storage) = self.persistent
            && let Ok(guard) = storage.lock()
            && let Err(e) = guard.put(
                key,
                url,
                Namespace::Url.as_str(),
                CacheTtl::RESOLVED_URLS,
            )
        {
            warn!("Failed to persist resolved URL: {}", e);
        }
    }

    fn get_persistent(&self, key: &str) -> Option<StoredEntry> {
        let storage = self.persistent.as_ref()?;
        let guard = storage.lock().ok()?;
        guard.get_entry(key).ok().flatten()
    }

    /// Drop expired entries from both tiers.
    pub fn purge_expired(&self) -> usize {
        let mut removed = self.memory.purge_expired();
        if let Some(ref storage) = self.persistent
            && let Ok(guard) = storage.lock()
        {
            match guard.purge_expired() {
                Ok(n) => removed += n,
                Err(e) => warn!("Failed to purge expired cache entries: {}", e),
            }
        }
        removed
    }

    pub fn has_persistent_tier(&self) -> bool {
        self.persistent.is_some()
    }

    pub fn stats(&self) -> UrlCacheStats {
        UrlCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            memory_entries: self.memory.len(),
        }
    }
}

/// Time since a persisted entry was written; clock skew counts as fresh
fn entry_age(entry: &StoredEntry) -> Duration {
    let elapsed = Utc::now().timestamp().saturating_sub(entry.created_at);
    Duration::from_secs(u64::try_from(elapsed).unwrap_or(0))
}

/// Hit/miss counters for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub memory_entries: usize,
}

impl std::fmt::Display for UrlCacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "URL cache: {} in memory ({} hits, {} misses)",
            self.memory_entries, self.hits, self.misses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shared(dir: &TempDir) -> SharedStorage {
        Arc::new(Mutex::new(CacheStorage::open_at(dir.path()).unwrap()))
    }

    #[test]
    fn test_memory_only_roundtrip() {
        let cache = UrlCache::memory_only();
        cache.put("k", "https://example.com/x.jpg");

        assert_eq!(cache.get("k").as_deref(), Some("https://example.com/x.jpg"));
        assert!(!cache.has_persistent_tier());
    }

    #[test]
    fn test_counts_hits_and_misses() {
        let cache = UrlCache::memory_only();
        assert!(cache.get("k").is_none());
        cache.put("k", "v");
        assert!(cache.get("k").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.memory_entries, 1);
    }

    #[test]
    fn test_persistent_tier_survives_new_session() {
        let dir = TempDir::new().unwrap();

        let first = UrlCache::new(Some(shared(&dir)));
        first.put("k", "https://res.cloudinary.com/demo/image/upload/q_40/abc");
        drop(first);

        let second = UrlCache::new(Some(shared(&dir)));
        assert_eq!(
            second.get("k").as_deref(),
            Some("https://res.cloudinary.com/demo/image/upload/q_40/abc")
        );
        // Promoted into memory
        assert_eq!(second.stats().memory_entries, 1);
    }

    #[test]
    fn test_promotion_keeps_persisted_age() {
        let dir = TempDir::new().unwrap();
        let first = UrlCache::new(Some(shared(&dir)));
        first.put("old", "https://example.com/old.jpg");
        first.put("new", "https://example.com/new.jpg");
        drop(first);

        // Written just over a URL lifetime ago, expiry still in the future
        let conn = rusqlite::Connection::open(dir.path().join("cache.db")).unwrap();
        let age = CacheTtl::RESOLVED_URLS.as_secs() as i64 + 60;
        conn.execute(
            "UPDATE cache_entries SET created_at = created_at - ?1 WHERE cache_key = 'old'",
            [age],
        )
        .unwrap();

        let second = UrlCache::new(Some(shared(&dir)));
        assert!(second.get("old").is_some());
        assert!(second.get("new").is_some());
        assert_eq!(second.stats().memory_entries, 1);
    }

    #[test]
    fn test_entries_land_in_url_namespace() {
        let dir = TempDir::new().unwrap();
        let storage = shared(&dir);
        let cache = UrlCache::new(Some(storage.clone()));
        cache.put("k", "v");

        let stats = storage.lock().unwrap().stats().unwrap();
        assert_eq!(stats.by_namespace, vec![("url".to_string(), 1)]);
    }
}
