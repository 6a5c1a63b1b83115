//! Local configuration for parishimg
//!
//! The operator config only says where the remote settings live. The image
//! backend flags themselves are stored remotely and read through
//! [`crate::settings::ConfigResolver`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Environment variable overriding the Supabase project URL
pub const ENV_SUPABASE_URL: &str = "PARISHIMG_SUPABASE_URL";

/// Environment variable overriding the Supabase API key
pub const ENV_SUPABASE_KEY: &str = "PARISHIMG_SUPABASE_KEY";

/// URL substring identifying the fallback storage backend
pub const DEFAULT_FALLBACK_MARKER: &str = "supabase.co/storage";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Supabase project URL (e.g. https://abcd.supabase.co)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supabase_url: Option<String>,

    /// Supabase API key (anon or service-role)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supabase_key: Option<String>,

    /// Key-value table holding the site settings
    #[serde(default = "default_settings_table")]
    pub settings_table: String,

    /// Storage bucket used when uploading to the fallback backend
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,

    /// URL substring that marks an image as living in fallback storage
    #[serde(default = "default_fallback_marker")]
    pub fallback_marker: String,

    /// User preferences
    #[serde(default)]
    pub preferences: Preferences,
}

/// User preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    /// Maximum concurrent preload fetches
    #[serde(default = "default_preload_concurrency")]
    pub preload_concurrency: usize,
}

fn default_settings_table() -> String {
    "site_settings".to_string()
}

fn default_storage_bucket() -> String {
    "images".to_string()
}

fn default_fallback_marker() -> String {
    DEFAULT_FALLBACK_MARKER.to_string()
}

fn default_preload_concurrency() -> usize {
    2
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            preload_concurrency: default_preload_concurrency(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_key: None,
            settings_table: default_settings_table(),
            storage_bucket: default_storage_bucket(),
            fallback_marker: default_fallback_marker(),
            preferences: Preferences::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".parishimg").join("config.yaml"))
    }

    /// Resolve the config path from an optional override
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from an optional path, applying environment overrides.
    ///
    /// A missing file is tolerated when the environment supplies the project URL.
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        let mut config = match Self::load_from(path) {
            Ok(config) => config,
            Err(crate::error::Error::Config(ConfigError::NotFound))
                if std::env::var(ENV_SUPABASE_URL).is_ok() =>
            {
                Config::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SUPABASE_URL).filter(|v| !v.is_empty()) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = lookup(ENV_SUPABASE_KEY).filter(|v| !v.is_empty()) {
            self.supabase_key = Some(key);
        }
    }

    /// Save configuration to an optional path
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(Self::resolve_path(path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(&path, contents)?;

        // The file holds an API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Validate that the remote settings store is reachable in principle
    pub fn validate_remote(&self) -> Result<(&str, &str)> {
        let url = self
            .supabase_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingSupabaseUrl)?;
        let key = self
            .supabase_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingSupabaseKey)?;
        Ok((url.trim_end_matches('/'), key))
    }

    /// Role claim of the configured Supabase key (`anon`, `service_role`, ...)
    pub fn key_role(&self) -> Option<String> {
        self.supabase_key.as_deref().and_then(jwt_role)
    }
}

/// Extract the `role` claim from a Supabase JWT without verifying it
pub fn jwt_role(token: &str) -> Option<String> {
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    #[derive(Deserialize)]
    struct Claims {
        role: Option<String>,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    claims.role
}
