//! Cached resolver for the image backend settings
//!
//! Reads go to the remote table at most once per TTL window. Fetch failures
//! are logged and masked by [`ImageBackendConfig::default`], which is not
//! cached so the next read tries again.
//!
//! Every [`invalidate`](ConfigResolver::invalidate) bumps a generation
//! counter. A fetch that started under an older generation returns its
//! result to the caller but never lands in the cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use super::{ImageBackendConfig, keys};
use crate::cache::CacheTtl;
use crate::client::{SettingRow, SettingsStore};
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone)]
struct CachedConfig {
    config: ImageBackendConfig,
    fetched: Instant,
    fetched_at: DateTime<Utc>,
}

/// Resolves the current [`ImageBackendConfig`] from a [`SettingsStore`].
pub struct ConfigResolver<S: SettingsStore> {
    store: Arc<S>,
    ttl: Duration,
    cached: Mutex<Option<CachedConfig>>,
    generation: AtomicU64,
}

impl<S: SettingsStore> ConfigResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_ttl(store, CacheTtl::BACKEND_CONFIG)
    }

    pub fn with_ttl(store: Arc<S>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cached: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current backend config. Never fails.
    pub async fn get(&self) -> ImageBackendConfig {
        if let Some(config) = self.fresh() {
            debug!("Backend config cache hit");
            return config;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        match self.store.fetch_by_keys(&keys::ALL).await {
            Ok(rows) => {
                let config = ImageBackendConfig::from_rows(&rows);
                debug!(
                    "Fetched backend config (primary: {}, fallback: {})",
                    config.is_primary_configured(),
                    config.fallback_enabled
                );
                self.remember(config.clone(), generation);
                config
            }
            Err(e) => {
                warn!("Failed to fetch image backend settings, using defaults: {}", e);
                ImageBackendConfig::default()
            }
        }
    }

    /// Drop the cached config; the next [`get`](Self::get) re-queries the store.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
        debug!("Backend config cache invalidated");
    }

    /// When the cached config was fetched, if one is cached and still fresh
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        let cached = self.cached.lock().ok()?;
        cached
            .as_ref()
            .filter(|c| c.fetched.elapsed() < self.ttl)
            .map(|c| c.fetched_at)
    }

    /// Write every key of `config` to the store, then invalidate.
    ///
    /// The cache is invalidated even when a write fails part-way, since
    /// earlier keys may already have changed.
    pub async fn save(&self, config: &ImageBackendConfig) -> Result<()> {
        let mut result = Ok(());
        for row in config.to_rows() {
            if let Err(e) = self.store.upsert(&row).await {
                result = Err(e);
                break;
            }
        }
        self.invalidate();
        result
    }

    /// Write a single known key, then invalidate.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        if !keys::is_known(key) {
            return Err(ConfigError::UnknownSetting(key.to_string()).into());
        }
        let result = self.store.upsert(&SettingRow::new(key, value)).await;
        self.invalidate();
        result
    }

    fn fresh(&self) -> Option<ImageBackendConfig> {
        let cached = self.cached.lock().ok()?;
        cached
            .as_ref()
            .filter(|c| c.fetched.elapsed() < self.ttl)
            .map(|c| c.config.clone())
    }

    /// Cache `config` unless an invalidation happened since `generation` was read
    fn remember(&self, config: ImageBackendConfig, generation: u64) {
        if let Ok(mut cached) = self.cached.lock() {
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Backend config changed during fetch, not caching");
                return;
            }
            *cached = Some(CachedConfig {
                config,
                fetched: Instant::now(),
                fetched_at: Utc::now(),
            });
        }
    }
}
