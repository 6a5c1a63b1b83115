//! Error types for parishimg

use std::time::Duration;
use thiserror::Error;

/// Result type alias for parishimg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// Errors from the remote settings store and upload backends
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed. Check the Supabase key with `parishimg status`.")]
    Unauthorized,

    #[error("Access denied. Saving settings requires a service-role key.")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Retry after {0:?}")]
    RateLimit(Duration),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Upload rejected by {backend}: {message}")]
    UploadRejected { backend: String, message: String },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to backend".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Run `parishimg init` to set up.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Supabase project URL not configured. Run `parishimg init` or set PARISHIMG_SUPABASE_URL.")]
    MissingSupabaseUrl,

    #[error("Supabase key not configured. Run `parishimg init` or set PARISHIMG_SUPABASE_KEY.")]
    MissingSupabaseKey,

    #[error("Unknown setting key: {0}")]
    UnknownSetting(String),

    #[error("Primary image backend is not configured (cloud name or upload preset missing)")]
    PrimaryNotConfigured,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Local cache storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_unauthorized_message() {
        let err = ApiError::Unauthorized;
        assert!(err.to_string().contains("parishimg status"));
    }

    #[test]
    fn test_api_error_forbidden_mentions_service_role() {
        let err = ApiError::Forbidden;
        assert!(err.to_string().contains("service-role"));
    }

    #[test]
    fn test_api_error_rate_limit() {
        let err = ApiError::RateLimit(Duration::from_secs(30));
        let msg = err.to_string();
        assert!(msg.contains("Rate limit"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn test_api_error_upload_rejected() {
        let err = ApiError::UploadRejected {
            backend: "cloudinary".to_string(),
            message: "Upload preset not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cloudinary"));
        assert!(msg.contains("Upload preset not found"));
    }

    #[test]
    fn test_config_error_missing_url() {
        let err = ConfigError::MissingSupabaseUrl;
        assert!(err.to_string().contains("PARISHIMG_SUPABASE_URL"));
    }

    #[test]
    fn test_config_error_unknown_setting() {
        let err = ConfigError::UnknownSetting("bogus_key".to_string());
        assert!(err.to_string().contains("bogus_key"));
    }

    #[test]
    fn test_cache_error_from_rusqlite() {
        let err: CacheError = rusqlite::Error::InvalidQuery.into();
        match err {
            CacheError::Database(_) => (),
            _ => panic!("Expected CacheError::Database"),
        }
    }

    #[test]
    fn test_error_from_api_error() {
        let err: Error = ApiError::Unauthorized.into();
        match err {
            Error::Api(ApiError::Unauthorized) => (),
            _ => panic!("Expected Error::Api(ApiError::Unauthorized)"),
        }
    }

    #[test]
    fn test_error_from_cache_error() {
        let err: Error = CacheError::NoHome.into();
        assert!(matches!(err, Error::Cache(CacheError::NoHome)));
    }

    #[test]
    fn test_config_error_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("invalid: [yaml: content").unwrap_err();
        let config_err: ConfigError = yaml_err.into();

        match config_err {
            ConfigError::ParseError(_) => (),
            _ => panic!("Expected ConfigError::ParseError"),
        }
    }
}
