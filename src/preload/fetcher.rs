//! HTTP image fetcher used for preloading

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;

use super::ImageFetcher;
use crate::cache::{ImageMeta, ImageMetaCache};
use crate::client::error_from_response;
use crate::error::{ApiError, Result};

/// Downloads delivery URLs and records what it saw in the metadata cache.
///
/// A URL with fresh metadata is not fetched again.
pub struct HttpImageFetcher {
    http: HttpClient,
    meta: Option<ImageMetaCache>,
}

impl HttpImageFetcher {
    pub fn new(meta: Option<ImageMetaCache>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("parishimg/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self { http, meta })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageMeta> {
        if let Some(ref cache) = self.meta
            && let Some(meta) = cache.get(url)
        {
            debug!("Image metadata cache hit: {}", url);
            return Ok(meta);
        }

        debug!("GET {}", url);
        let response = self.http.get(url).send().await.map_err(ApiError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await.into());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(ApiError::from)?;

        let meta = ImageMeta {
            url: url.to_string(),
            content_type,
            size_bytes: Some(body.len() as u64),
            fetched_at: Utc::now(),
        };
        if let Some(ref cache) = self.meta {
            cache.put(&meta);
        }
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStorage;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_records_meta() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/demo/image/upload/abc123")
            .with_status(200)
            .with_header("content-type", "image/webp")
            .with_body(vec![0u8; 512])
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Mutex::new(CacheStorage::open_at(dir.path()).unwrap()));
        let fetcher = HttpImageFetcher::new(Some(ImageMetaCache::new(storage))).unwrap();
        let url = format!("{}/demo/image/upload/abc123", server.url());

        let first = fetcher.fetch(&url).await.unwrap();
        let second = fetcher.fetch(&url).await.unwrap();

        assert_eq!(first.content_type.as_deref(), Some("image/webp"));
        assert_eq!(first.size_bytes, Some(512));
        assert_eq!(first, second);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_without_cache_always_hits_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a.jpg")
            .with_status(200)
            .with_body("jpeg")
            .expect(2)
            .create_async()
            .await;

        let fetcher = HttpImageFetcher::new(None).unwrap();
        let url = format!("{}/a.jpg", server.url());

        fetcher.fetch(&url).await.unwrap();
        fetcher.fetch(&url).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.jpg")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpImageFetcher::new(None).unwrap();
        let result = fetcher.fetch(&format!("{}/missing.jpg", server.url())).await;

        assert!(matches!(
            result,
            Err(crate::error::Error::Api(ApiError::NotFound(_)))
        ));
    }
}
