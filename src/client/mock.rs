//! Mock settings store for testing
//!
//! Holds rows in memory, counts calls, and can be told to fail.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{SettingRow, SettingsStore};
use crate::error::{ApiError, Result};

/// Mock settings table.
///
/// # Example
/// ```ignore
/// let store = MockSettingsStore::new()
///     .with_setting("cloudinary_enabled", "true")
///     .with_setting("cloudinary_cloud_name", "demo");
/// ```
#[derive(Default)]
pub struct MockSettingsStore {
    rows: Arc<Mutex<BTreeMap<String, String>>>,
    /// When set, every fetch fails with a network error
    fail_fetch: Arc<Mutex<bool>>,
    /// When set, every upsert fails with Forbidden
    fail_upsert: Arc<Mutex<bool>>,
    call_count: Arc<Mutex<CallCounts>>,
}

/// Tracks store call counts for test verification
#[derive(Default, Debug, Clone)]
pub struct CallCounts {
    pub fetch_by_keys: usize,
    pub upsert: usize,
}

impl MockSettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_setting(self, key: &str, value: &str) -> Self {
        if let Ok(mut rows) = self.rows.try_lock() {
            rows.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn failing(self) -> Self {
        if let Ok(mut fail) = self.fail_fetch.try_lock() {
            *fail = true;
        }
        self
    }

    pub fn rejecting_writes(self) -> Self {
        if let Ok(mut fail) = self.fail_upsert.try_lock() {
            *fail = true;
        }
        self
    }

    pub async fn set_failing(&self, failing: bool) {
        *self.fail_fetch.lock().await = failing;
    }

    pub async fn set_setting(&self, key: &str, value: &str) {
        self.rows
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn value(&self, key: &str) -> Option<String> {
        self.rows.lock().await.get(key).cloned()
    }

    pub async fn call_counts(&self) -> CallCounts {
        self.call_count.lock().await.clone()
    }
}

#[async_trait]
impl SettingsStore for MockSettingsStore {
    async fn fetch_by_keys(&self, keys: &[&str]) -> Result<Vec<SettingRow>> {
        self.call_count.lock().await.fetch_by_keys += 1;

        if *self.fail_fetch.lock().await {
            return Err(ApiError::Network("connection refused".to_string()).into());
        }

        let rows = self.rows.lock().await;
        Ok(keys
            .iter()
            .filter_map(|k| rows.get(*k).map(|v| SettingRow::new(*k, v.clone())))
            .collect())
    }

    async fn upsert(&self, row: &SettingRow) -> Result<()> {
        self.call_count.lock().await.upsert += 1;

        if *self.fail_upsert.lock().await {
            return Err(ApiError::Forbidden.into());
        }

        self.rows
            .lock()
            .await
            .insert(row.key.clone(), row.value.clone());
        Ok(())
    }
}
