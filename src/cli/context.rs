//! Command execution context
//!
//! Loads the config, builds the Supabase client and wires the delivery
//! context with its caches so handlers don't repeat that boilerplate.

use std::sync::{Arc, Mutex};

use log::{debug, warn};

use parishimg::ImageDelivery;
use parishimg::cache::{CacheStorage, ImageMetaCache, SharedStorage, UrlCache};
use parishimg::client::SupabaseClient;
use parishimg::config::Config;
use parishimg::error::Result;

use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;

/// Shared state for commands that talk to the settings table.
pub struct CommandContext {
    /// Loaded and validated configuration
    pub config: Config,
    /// Supabase project client
    pub client: Arc<SupabaseClient>,
    /// Delivery context used to resolve image URLs
    pub delivery: ImageDelivery<SupabaseClient>,
    /// Output format preference
    pub format: OutputFormat,
    storage: Option<SharedStorage>,
}

impl CommandContext {
    /// Create a new command context.
    ///
    /// The persistent cache is optional: with `--no-cache`, or when it
    /// cannot be opened, URLs are memoized for this run only. Expired
    /// entries are swept when the cache opens.
    ///
    /// # Errors
    /// Returns error if the config cannot be loaded or lacks the project URL/key.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = Config::load_at(opts.config_ref())?;
        let client = Arc::new(SupabaseClient::from_config(&config)?);

        let storage = if opts.no_cache {
            None
        } else {
            open_storage()
        };

        let urls = UrlCache::new(storage.clone());
        let purged = urls.purge_expired();
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }

        let delivery = ImageDelivery::new(client.clone(), urls)
            .with_fallback_marker(config.fallback_marker.clone());

        Ok(Self {
            config,
            client,
            delivery,
            format: opts.format,
            storage,
        })
    }

    /// Metadata cache for preloads, when persistence is enabled
    pub fn meta_cache(&self) -> Option<ImageMetaCache> {
        self.storage.clone().map(ImageMetaCache::new)
    }
}

fn open_storage() -> Option<SharedStorage> {
    match CacheStorage::open() {
        Ok(storage) => Some(Arc::new(Mutex::new(storage))),
        Err(e) => {
            warn!("Persistent cache unavailable, using memory only: {}", e);
            None
        }
    }
}
