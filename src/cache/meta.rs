//! Raw image metadata cache (30 days)
//!
//! Records what a preload fetch learned about an image so that later
//! preloads of the same URL can skip the network.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use super::url_cache::SharedStorage;
use super::{CacheTtl, Namespace, cache_key};

/// What we know about a fetched image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    /// Delivery URL that was fetched
    pub url: String,

    /// Content-Type reported by the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Body size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

/// Persistent metadata cache keyed by delivery URL
#[derive(Clone)]
pub struct ImageMetaCache {
    storage: SharedStorage,
}

impl ImageMetaCache {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    fn key(url: &str) -> String {
        cache_key(Namespace::ImageMeta.as_str(), url, &[])
    }

    pub fn get(&self, url: &str) -> Option<ImageMeta> {
        let guard = self.storage.lock().ok()?;
        guard
            .get(&Self::key(url))
            .ok()
            .flatten()
            .and_then(|json| serde_json::from_str(&json).ok())
    }

    pub fn put(&self, meta: &ImageMeta) {
        if let Ok(guard) = self.storage.lock()
            && let Ok(json) = serde_json::to_string(meta)
            && let Err(e) = guard.put(
                &Self::key(&meta.url),
                &json,
                Namespace::ImageMeta.as_str(),
                CacheTtl::IMAGE_META,
            )
        {
            warn!("Failed to store image metadata: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStorage;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[test]
    fn test_put_and_get_meta() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Mutex::new(CacheStorage::open_at(dir.path()).unwrap()));
        let cache = ImageMetaCache::new(storage);

        let meta = ImageMeta {
            url: "https://res.cloudinary.com/demo/image/upload/abc".to_string(),
            content_type: Some("image/webp".to_string()),
            size_bytes: Some(48_213),
            fetched_at: Utc::now(),
        };
        cache.put(&meta);

        assert_eq!(cache.get(&meta.url), Some(meta));
        assert!(cache.get("https://example.com/other.jpg").is_none());
    }
}
