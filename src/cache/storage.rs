//! SQLite-backed persistent cache tier
//!
//! Entries are stamped with their creation time and an expiry. Reads never
//! return expired rows; [`CacheStorage::purge_expired`] deletes them.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 2;

/// Environment variable overriding the cache directory
pub const ENV_CACHE_DIR: &str = "PARISHIMG_CACHE_DIR";

type Result<T> = std::result::Result<T, CacheError>;

/// A stored value together with its creation timestamp (unix seconds)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: String,
    pub created_at: i64,
}

/// SQLite-backed cache storage
pub struct CacheStorage {
    conn: Connection,
    dir: PathBuf,
}

impl CacheStorage {
    /// Open or create cache storage at the default location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/parishimg on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(ENV_CACHE_DIR)
            && !dir.is_empty()
        {
            return Ok(PathBuf::from(dir));
        }
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("parishimg"))
    }

    /// Open cache storage at a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path)?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY NOT NULL,
                namespace TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_expires_at ON cache_entries(expires_at);
            CREATE INDEX IF NOT EXISTS idx_namespace ON cache_entries(namespace);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn,
            dir: cache_dir.to_path_buf(),
        })
    }

    /// Directory this storage lives in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get a cached value if still valid
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_entry(key)?.map(|entry| entry.value))
    }

    /// Get a cached value and its creation time if still valid
    pub fn get_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let now = Utc::now().timestamp();

        let entry = self
            .conn
            .query_row(
                "SELECT value, created_at FROM cache_entries
                 WHERE cache_key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| {
                    Ok(StoredEntry {
                        value: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(entry)
    }

    /// Store a value with TTL under a namespace
    pub fn put(&self, key: &str, value: &str, namespace: &str, ttl: Duration) -> Result<()> {
        let now = Utc::now().timestamp();
        let expires = now + ttl.as_secs() as i64;

        self.conn.execute(
            "INSERT OR REPLACE INTO cache_entries
             (cache_key, namespace, value, created_at, expires_at, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![key, namespace, value, now, expires, value.len()],
        )?;
        Ok(())
    }

    /// Delete every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now().timestamp();
        let deleted = self
            .conn
            .execute("DELETE FROM cache_entries WHERE expires_at <= ?1", [now])?;
        Ok(deleted)
    }

    /// Clear all cache entries
    pub fn clear_all(&self) -> Result<ClearStats> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;

        self.conn.execute("DELETE FROM cache_entries", [])?;

        Ok(ClearStats {
            entries_removed: count as usize,
        })
    }

    /// Delete all entries in one namespace
    pub fn delete_namespace(&self, namespace: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM cache_entries WHERE namespace = ?1", [namespace])?;
        Ok(deleted)
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now().timestamp();

        let total_entries: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;

        let valid_entries: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE expires_at > ?1",
            [now],
            |r| r.get(0),
        )?;

        let total_size: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries",
            [],
            |r| r.get(0),
        )?;

        let oldest: Option<i64> = self
            .conn
            .query_row(
                "SELECT MIN(created_at) FROM cache_entries WHERE expires_at > ?1",
                [now],
                |r| r.get(0),
            )
            .optional()?
            .flatten();

        let newest: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(created_at) FROM cache_entries WHERE expires_at > ?1",
                [now],
                |r| r.get(0),
            )
            .optional()?
            .flatten();

        let mut stmt = self.conn.prepare(
            "SELECT namespace, COUNT(*) FROM cache_entries
             WHERE expires_at > ?1 GROUP BY namespace ORDER BY namespace",
        )?;
        let by_namespace = stmt
            .query_map([now], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CacheStats {
            total_entries: total_entries as usize,
            valid_entries: valid_entries as usize,
            expired_entries: (total_entries - valid_entries) as usize,
            total_size_bytes: total_size as usize,
            oldest_entry: oldest,
            newest_entry: newest,
            by_namespace,
        })
    }

    /// Nuke the cache database
    fn nuke(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        Ok(())
    }
}

/// Statistics about cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub entries_removed: usize,
}

/// Statistics about cache state
#[derive(Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub total_size_bytes: usize,
    pub oldest_entry: Option<i64>,
    pub newest_entry: Option<i64>,
    /// Valid entry count per namespace
    pub by_namespace: Vec<(String, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (CacheStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = CacheStorage::open_at(dir.path()).unwrap();
        (storage, dir)
    }

    #[test]
    fn test_put_get() {
        let (storage, _dir) = test_storage();

        storage
            .put("key1", "https://res.cloudinary.com/demo/x", "url", Duration::from_secs(60))
            .unwrap();

        let result = storage.get("key1").unwrap();
        assert_eq!(result.as_deref(), Some("https://res.cloudinary.com/demo/x"));
    }

    #[test]
    fn test_entry_is_stamped() {
        let (storage, _dir) = test_storage();
        let before = Utc::now().timestamp();

        storage.put("key1", "v", "url", Duration::from_secs(60)).unwrap();

        let entry = storage.get_entry("key1").unwrap().unwrap();
        assert!(entry.created_at >= before);
    }

    #[test]
    fn test_expiration() {
        let (storage, _dir) = test_storage();

        // 0 TTL is immediately expired
        storage.put("key3", "data", "url", Duration::from_secs(0)).unwrap();

        assert_eq!(storage.get("key3").unwrap(), None);
    }

    #[test]
    fn test_purge_expired_only_removes_expired() {
        let (storage, _dir) = test_storage();

        storage.put("old", "a", "url", Duration::from_secs(0)).unwrap();
        storage.put("fresh", "b", "url", Duration::from_secs(60)).unwrap();

        let removed = storage.purge_expired().unwrap();
        assert_eq!(removed, 1);

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(storage.get("fresh").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_clear_all() {
        let (storage, _dir) = test_storage();

        storage.put("k1", "d1", "url", Duration::from_secs(60)).unwrap();
        storage.put("k2", "d2", "image_meta", Duration::from_secs(60)).unwrap();

        let stats = storage.clear_all().unwrap();
        assert_eq!(stats.entries_removed, 2);

        assert!(storage.get("k1").unwrap().is_none());
        assert!(storage.get("k2").unwrap().is_none());
    }

    #[test]
    fn test_delete_namespace() {
        let (storage, _dir) = test_storage();

        storage.put("k1", "d1", "url", Duration::from_secs(60)).unwrap();
        storage.put("k2", "d2", "image_meta", Duration::from_secs(60)).unwrap();

        assert_eq!(storage.delete_namespace("url").unwrap(), 1);
        assert!(storage.get("k1").unwrap().is_none());
        assert!(storage.get("k2").unwrap().is_some());
    }

    #[test]
    fn test_stats_by_namespace() {
        let (storage, _dir) = test_storage();

        storage.put("k1", "data1", "url", Duration::from_secs(60)).unwrap();
        storage.put("k2", "data2", "url", Duration::from_secs(60)).unwrap();
        storage.put("k3", "data3", "image_meta", Duration::from_secs(60)).unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.valid_entries, 3);
        assert!(stats.total_size_bytes > 0);
        assert_eq!(
            stats.by_namespace,
            vec![("image_meta".to_string(), 1), ("url".to_string(), 2)]
        );
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = TempDir::new().unwrap();
        {
            let storage = CacheStorage::open_at(dir.path()).unwrap();
            storage.put("k", "v", "url", Duration::from_secs(60)).unwrap();
        }
        let storage = CacheStorage::open_at(dir.path()).unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
    }
}
