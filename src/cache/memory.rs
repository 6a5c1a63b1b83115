//! In-memory cache tier with lazy expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::trace;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    created_at: Instant,
}

/// Session-lifetime map of cached values.
///
/// Entries older than the TTL are treated as absent and dropped on read.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    ttl: Duration,
}

impl MemoryCache {
    /// Creates an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            trace!("Evicting expired memory entry {}", key);
            entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: &str, value: &str) {
        self.insert(key, value, Instant::now());
    }

    /// Insert a value that was created `age` ago elsewhere, so it expires
    /// on its original schedule. Values already past the TTL are skipped.
    pub fn put_aged(&self, key: &str, value: &str, age: Duration) {
        if age >= self.ttl {
            return;
        }
        match Instant::now().checked_sub(age) {
            Some(created_at) => self.insert(key, value, created_at),
            None => trace!("Skipping memory promotion of {}", key),
        }
    }

    fn insert(&self, key: &str, value: &str, created_at: Instant) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                MemoryEntry {
                    value: value.to_string(),
                    created_at,
                },
            );
        }
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
