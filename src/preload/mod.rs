//! Lazy loading and bounded preloading
//!
//! [`lifecycle`] drives a single image from idle to loaded. The functions
//! here warm a list of likely-next images in fixed-size chunks. Each chunk
//! is joined with settle-all semantics: a failed fetch is recorded and its
//! siblings still run to completion before the next chunk starts.

pub mod fetcher;
pub mod lifecycle;

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use futures::future::join_all;
use log::debug;
use serde::Serialize;

use crate::cache::ImageMeta;
use crate::client::SettingsStore;
use crate::delivery::ImageDelivery;
use crate::error::Result;
use crate::image::{ImageReference, ResolveOptions, Resolved};

pub use fetcher::HttpImageFetcher;
pub use lifecycle::{
    ChannelVisibility, ImageSlot, LazyImage, LoadState, Visibility, VisibilityEvent,
};

/// Concurrent fetches per preload chunk
pub const DEFAULT_PRELOAD_CONCURRENCY: usize = 2;

/// Fetches the bytes behind a delivery URL
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ImageMeta>;
}

/// One item that could not be preloaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreloadFailure {
    pub item: String,
    pub error: String,
}

/// Outcome of a preload run
#[derive(Debug, Clone, Serialize)]
pub struct PreloadReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<PreloadFailure>,
}

impl<T> Default for PreloadReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> PreloadReport<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Run `fetch` over `items` in order, at most `max_concurrent` at a time.
///
/// Chunk N+1 does not start until every fetch of chunk N has settled.
/// A `max_concurrent` of zero is treated as one.
pub async fn preload_in_chunks<I, T, F, Fut>(
    items: Vec<I>,
    fetch: F,
    max_concurrent: usize,
) -> PreloadReport<T>
where
    I: Clone + Display,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let chunk_size = max_concurrent.max(1);
    let mut report = PreloadReport::default();

    if items.is_empty() {
        return report;
    }

    debug!(
        "Preloading {} images in chunks of {}",
        items.len(),
        chunk_size
    );

    for (index, chunk) in items.chunks(chunk_size).enumerate() {
        debug!("Starting preload chunk {} ({} items)", index + 1, chunk.len());

        let results = join_all(chunk.iter().cloned().map(&fetch)).await;

        for (item, result) in chunk.iter().zip(results) {
            match result {
                Ok(value) => report.succeeded.push(value),
                Err(e) => {
                    debug!("Preload of {} failed: {}", item, e);
                    report.failed.push(PreloadFailure {
                        item: item.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    debug!(
        "Preload finished: {} ok, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    report
}

/// Resolve each reference through `delivery` and warm its URL.
///
/// References that resolve to no URL are reported as failures without a
/// fetch.
pub async fn preload_images<S, Fe>(
    delivery: &ImageDelivery<S>,
    references: &[ImageReference],
    options: &ResolveOptions,
    fetcher: &Fe,
    max_concurrent: usize,
) -> PreloadReport<ImageMeta>
where
    S: SettingsStore,
    Fe: ImageFetcher + ?Sized,
{
    let mut urls = Vec::with_capacity(references.len());
    let mut unavailable = Vec::new();

    for reference in references {
        match delivery.resolve_image_url(reference, options).await {
            Resolved::Url(url) => urls.push(url),
            Resolved::Unavailable => unavailable.push(PreloadFailure {
                item: reference.label().to_string(),
                error: "no URL available".to_string(),
            }),
        }
    }

    let mut report = preload_in_chunks(
        urls,
        |url: String| async move { fetcher.fetch(&url).await },
        max_concurrent,
    )
    .await;
    report.failed.extend(unavailable);
    report
}
