//! Remote collaborators: the settings table and the two upload targets

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ApiError, Result};

pub mod cloudinary;
#[cfg(test)]
pub mod mock;
pub mod supabase;

#[cfg(test)]
pub use mock::MockSettingsStore;
pub use cloudinary::CloudinaryClient;
pub use supabase::SupabaseClient;

/// Key-value settings table
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the rows for the given keys. Missing keys are simply absent.
    async fn fetch_by_keys(&self, keys: &[&str]) -> Result<Vec<SettingRow>>;

    /// Insert or update a row keyed on `key`
    async fn upsert(&self, row: &SettingRow) -> Result<()>;
}

/// Backend that accepts image uploads
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Short backend name for display
    fn name(&self) -> &'static str;

    async fn upload(&self, request: UploadRequest) -> Result<UploadedImage>;
}

/// One row of the settings table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
}

impl SettingRow {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// File to upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Destination folder, e.g. `gallery/2024`
    pub folder: Option<String>,
}

impl UploadRequest {
    /// Build a request from a file on disk, guessing the content type from its extension.
    pub fn from_path(path: &std::path::Path, folder: Option<String>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = content_type_for(&file_name).to_string();
        Ok(Self {
            file_name,
            bytes,
            content_type,
            folder,
        })
    }

    /// Object path inside a bucket (`folder/file_name`)
    pub fn object_path(&self) -> String {
        match self.folder.as_deref().map(|f| f.trim_matches('/')) {
            Some(folder) if !folder.is_empty() => format!("{}/{}", folder, self.file_name),
            _ => self.file_name.clone(),
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    /// Primary backend identifier, when uploaded there
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<String>,

    /// Publicly reachable URL of the original upload
    pub url: String,
}

/// Guess an image content type from a file name
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Map a non-success HTTP status to the API error taxonomy
pub(crate) fn error_for_status(
    status: StatusCode,
    retry_after: Option<u64>,
    body: String,
) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::NOT_FOUND => ApiError::NotFound(if body.is_empty() {
            "Resource not found".to_string()
        } else {
            body
        }),
        StatusCode::TOO_MANY_REQUESTS => {
            ApiError::RateLimit(Duration::from_secs(retry_after.unwrap_or(60)))
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
            ApiError::BadRequest(body)
        }
        status if status.is_server_error() => ApiError::ServerError(if body.is_empty() {
            format!("Server error: {}", status)
        } else {
            body
        }),
        _ => ApiError::InvalidResponse(format!("Unexpected status code: {}", status)),
    }
}

/// Turn a failed response into an [`ApiError`], consuming the body
pub(crate) async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    error_for_status(status, retry_after, body)
}
