//! Cloudinary unsigned upload client

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{ImageUploader, UploadRequest, UploadedImage, error_from_response};
use crate::error::{ApiError, ConfigError, Result};
use crate::settings::ImageBackendConfig;

/// Cloudinary upload API base URL
const API_BASE_URL: &str = "https://api.cloudinary.com/v1_1";

/// Uploads images to the primary backend using an unsigned preset
pub struct CloudinaryClient {
    http: HttpClient,
    api_base: String,
    cloud_name: String,
    upload_preset: String,
    default_folder: Option<String>,
}

impl CloudinaryClient {
    pub fn new(cloud_name: &str, upload_preset: &str, default_folder: Option<String>) -> Result<Self> {
        Self::with_api_base(API_BASE_URL, cloud_name, upload_preset, default_folder)
    }

    /// Create a client against a custom API host (for testing)
    pub fn with_api_base(
        api_base: &str,
        cloud_name: &str,
        upload_preset: &str,
        default_folder: Option<String>,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.to_string(),
            upload_preset: upload_preset.to_string(),
            default_folder,
        })
    }

    /// Create a client from the remote backend settings.
    ///
    /// # Errors
    /// [`ConfigError::PrimaryNotConfigured`] when the cloud name or preset is missing.
    pub fn from_config(config: &ImageBackendConfig) -> Result<Self> {
        let preset = config
            .upload_preset()
            .filter(|_| !config.primary_name.is_empty())
            .ok_or(ConfigError::PrimaryNotConfigured)?;
        Self::new(
            &config.primary_name,
            preset,
            config.folder().map(str::to_string),
        )
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", self.api_base, self.cloud_name)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

#[async_trait]
impl ImageUploader for CloudinaryClient {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn upload(&self, request: UploadRequest) -> Result<UploadedImage> {
        let folder = request.folder.clone().or_else(|| self.default_folder.clone());

        let file = Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(&request.content_type)
            .map_err(|e| ApiError::BadRequest(format!("Invalid content type: {}", e)))?;

        let mut form = Form::new()
            .part("file", file)
            .text("upload_preset", self.upload_preset.clone());
        if let Some(folder) = folder {
            form = form.text("folder", folder);
        }

        debug!("Uploading to {}", self.upload_url());

        let response = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(ApiError::UploadRejected {
                backend: "cloudinary".to_string(),
                message,
            }
            .into());
        }
        if !status.is_success() {
            return Err(error_from_response(response).await.into());
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse upload response: {}", e))
        })?;

        Ok(UploadedImage {
            backend_id: Some(uploaded.public_id),
            url: uploaded.secure_url,
        })
    }
}
