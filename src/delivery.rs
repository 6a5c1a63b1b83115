//! Delivery context consumed by content-display components
//!
//! [`ImageDelivery`] owns the config resolver and the URL cache, so nothing
//! in the delivery path is process-global.

use std::sync::Arc;

use log::debug;

use crate::cache::UrlCache;
use crate::client::SettingsStore;
use crate::config::DEFAULT_FALLBACK_MARKER;
use crate::image::{ImageCategory, ImageReference, ResolveOptions, Resolved, plan};
use crate::settings::ConfigResolver;

pub struct ImageDelivery<S: SettingsStore> {
    resolver: ConfigResolver<S>,
    urls: UrlCache,
    fallback_marker: String,
}

impl<S: SettingsStore> ImageDelivery<S> {
    pub fn new(store: Arc<S>, urls: UrlCache) -> Self {
        Self {
            resolver: ConfigResolver::new(store),
            urls,
            fallback_marker: DEFAULT_FALLBACK_MARKER.to_string(),
        }
    }

    pub fn with_resolver(resolver: ConfigResolver<S>, urls: UrlCache) -> Self {
        Self {
            resolver,
            urls,
            fallback_marker: DEFAULT_FALLBACK_MARKER.to_string(),
        }
    }

    /// Use a custom marker when classifying fallback storage URLs
    pub fn with_fallback_marker(mut self, marker: impl Into<String>) -> Self {
        self.fallback_marker = marker.into();
        self
    }

    pub fn resolver(&self) -> &ConfigResolver<S> {
        &self.resolver
    }

    pub fn cache(&self) -> &UrlCache {
        &self.urls
    }

    /// Build a reference classified with this context's fallback marker
    pub fn reference(
        &self,
        source_url: &str,
        backend_id: Option<&str>,
        category: ImageCategory,
    ) -> ImageReference {
        ImageReference::with_marker(source_url, backend_id, category, &self.fallback_marker)
    }

    /// Resolve the URL a component should assign to its image element.
    ///
    /// Never fails. [`Resolved::Unavailable`] means the placeholder must be
    /// shown.
    pub async fn resolve_image_url(
        &self,
        reference: &ImageReference,
        options: &ResolveOptions,
    ) -> Resolved {
        let config = self.resolver.get().await;
        let plan = plan(reference, options, &config);

        let Some(key) = plan.cache_key() else {
            debug!("Resolved {} via {}", reference.label(), plan.backend());
            return plan.render();
        };

        if let Some(url) = self.urls.get(&key) {
            return Resolved::Url(url);
        }

        let resolved = plan.render();
        if let Resolved::Url(ref url) = resolved {
            self.urls.put(&key, url);
        }
        debug!("Resolved {} via {}", reference.label(), plan.backend());
        resolved
    }
}
