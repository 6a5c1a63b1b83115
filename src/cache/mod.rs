//! Client-side caches for the image-delivery layer
//!
//! Resolved URLs are memoized in memory and in a SQLite store so repeated
//! renders (and later sessions) skip URL construction. A separate namespace
//! holds metadata about preloaded images.

pub mod key;
pub mod memory;
pub mod meta;
pub mod storage;
pub mod url_cache;

use std::time::Duration;

/// Cache TTL configuration per data type
pub struct CacheTtl;

impl CacheTtl {
    /// Backend feature flags and credentials
    pub const BACKEND_CONFIG: Duration = Duration::from_secs(5 * 60); // 5 min

    /// Generated delivery URLs
    pub const RESOLVED_URLS: Duration = Duration::from_secs(7 * 24 * 60 * 60); // 7 days

    /// Raw image metadata recorded by preloads
    pub const IMAGE_META: Duration = Duration::from_secs(30 * 24 * 60 * 60); // 30 days
}

/// Persistent store namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Url,
    ImageMeta,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Url => "url",
            Namespace::ImageMeta => "image_meta",
        }
    }
}

// Re-export main types
pub use key::cache_key;
pub use memory::MemoryCache;
pub use meta::{ImageMeta, ImageMetaCache};
pub use storage::CacheStorage;
pub use url_cache::{SharedStorage, UrlCache, UrlCacheStats};
