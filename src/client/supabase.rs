//! Supabase client: PostgREST settings table and Storage uploads

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::{
    ImageUploader, SettingRow, SettingsStore, UploadRequest, UploadedImage, error_from_response,
};
use crate::error::{ApiError, Result};

/// Client-side request ceiling for the project (per second)
const RATE_LIMIT_PER_SECOND: u32 = 10;

/// Supabase project client
pub struct SupabaseClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    table: String,
    bucket: String,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl SupabaseClient {
    /// Create a client for the project at `base_url` (e.g. https://abcd.supabase.co)
    pub fn new(base_url: &str, api_key: &str, table: &str, bucket: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let quota = Quota::per_second(
            std::num::NonZeroU32::new(RATE_LIMIT_PER_SECOND).unwrap_or(std::num::NonZeroU32::MIN),
        );

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
            bucket: bucket.to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Create a client from the local configuration
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let (url, key) = config.validate_remote()?;
        Self::new(url, key, &config.settings_table, &config.storage_bucket)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    /// Public URL of an object in the configured bucket
    pub fn public_object_url(&self, object_path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            object_path.trim_start_matches('/')
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

/// PostgREST returns `value` as whatever the column holds
#[derive(Deserialize)]
struct RawSettingRow {
    key: String,
    value: serde_json::Value,
}

impl From<RawSettingRow> for SettingRow {
    fn from(raw: RawSettingRow) -> Self {
        let value = match raw.value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        SettingRow {
            key: raw.key,
            value,
        }
    }
}

#[async_trait]
impl SettingsStore for SupabaseClient {
    async fn fetch_by_keys(&self, keys: &[&str]) -> Result<Vec<SettingRow>> {
        self.rate_limiter.until_ready().await;

        let filter = format!("in.({})", keys.join(","));
        debug!("Fetching {} settings from {}", keys.len(), self.table);

        let response = self
            .authorized(self.http.get(self.table_url()))
            .query(&[("select", "key,value"), ("key", filter.as_str())])
            .send()
            .await
            .map_err(ApiError::from)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await.into());
        }

        let rows: Vec<RawSettingRow> = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse settings response: {}", e))
        })?;

        Ok(rows.into_iter().map(SettingRow::from).collect())
    }

    async fn upsert(&self, row: &SettingRow) -> Result<()> {
        self.rate_limiter.until_ready().await;

        debug!("Upserting setting {}", row.key);

        let response = self
            .authorized(self.http.post(self.table_url()))
            .query(&[("on_conflict", "key")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row])
            .send()
            .await
            .map_err(ApiError::from)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ImageUploader for SupabaseClient {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn upload(&self, request: UploadRequest) -> Result<UploadedImage> {
        self.rate_limiter.until_ready().await;

        let object_path = request.object_path();
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, object_path
        );
        debug!("Uploading {} bytes to {}", request.bytes.len(), url);

        let response = self
            .authorized(self.http.post(&url))
            .header("Content-Type", request.content_type.as_str())
            .header("x-upsert", "true")
            .body(request.bytes)
            .send()
            .await
            .map_err(ApiError::from)?;

        if !response.status().is_success() {
            return Err(match error_from_response(response).await {
                ApiError::BadRequest(message) => ApiError::UploadRejected {
                    backend: "supabase".to_string(),
                    message,
                },
                other => other,
            }
            .into());
        }

        Ok(UploadedImage {
            backend_id: None,
            url: self.public_object_url(&object_path),
        })
    }
}
