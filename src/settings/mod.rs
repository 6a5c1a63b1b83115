//! Image backend settings
//!
//! The site stores its image backend switches in a remote key-value table.
//! [`ImageBackendConfig`] is the typed view of those rows and
//! [`ConfigResolver`] caches it for [`CacheTtl::BACKEND_CONFIG`](crate::cache::CacheTtl).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::client::SettingRow;
use crate::error::{ConfigError, Result};

pub mod resolver;

pub use resolver::ConfigResolver;

/// Setting keys in the remote table
pub mod keys {
    pub const PRIMARY_ENABLED: &str = "cloudinary_enabled";
    pub const PRIMARY_CLOUD_NAME: &str = "cloudinary_cloud_name";
    pub const PRIMARY_UPLOAD_PRESET: &str = "cloudinary_upload_preset";
    pub const PRIMARY_API_KEY: &str = "cloudinary_api_key";
    pub const PRIMARY_FOLDER: &str = "cloudinary_folder";
    pub const FALLBACK_ENABLED: &str = "supabase_storage_enabled";
    pub const UPLOAD_TARGET: &str = "image_upload_target";

    /// Every key the resolver fetches
    pub const ALL: [&str; 7] = [
        PRIMARY_ENABLED,
        PRIMARY_CLOUD_NAME,
        PRIMARY_UPLOAD_PRESET,
        PRIMARY_API_KEY,
        PRIMARY_FOLDER,
        FALLBACK_ENABLED,
        UPLOAD_TARGET,
    ];

    /// Keys stored in the opaque credentials map
    pub const CREDENTIALS: [&str; 3] = [PRIMARY_UPLOAD_PRESET, PRIMARY_API_KEY, PRIMARY_FOLDER];

    pub fn is_known(key: &str) -> bool {
        ALL.contains(&key)
    }
}

/// Where new uploads go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadTarget {
    Cloudinary,
    #[default]
    Supabase,
}

impl UploadTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadTarget::Cloudinary => "cloudinary",
            UploadTarget::Supabase => "supabase",
        }
    }

    /// Parse a stored value; anything unrecognized means the fallback storage
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "cloudinary" => UploadTarget::Cloudinary,
            _ => UploadTarget::Supabase,
        }
    }
}

/// Typed view of the image backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageBackendConfig {
    /// Whether the primary CDN is switched on
    pub primary_enabled: bool,

    /// Primary CDN cloud name
    pub primary_name: String,

    /// Upload preset, API key and folder of the primary CDN
    pub credentials: BTreeMap<String, String>,

    /// Whether fallback storage URLs may be served
    pub fallback_enabled: bool,

    /// Destination for new uploads
    pub upload_target: UploadTarget,
}

impl Default for ImageBackendConfig {
    /// Safe default used whenever the settings cannot be fetched:
    /// no primary CDN, fallback storage allowed.
    fn default() -> Self {
        Self {
            primary_enabled: false,
            primary_name: String::new(),
            credentials: BTreeMap::new(),
            fallback_enabled: true,
            upload_target: UploadTarget::Supabase,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

impl ImageBackendConfig {
    /// Build the config from settings rows. Keys absent from `rows` keep their defaults.
    pub fn from_rows(rows: &[SettingRow]) -> Self {
        let mut config = Self::default();
        for row in rows {
            // Rows come from the table itself, so unknown keys are ignored
            let _ = config.apply(&row.key, &row.value);
        }
        config
    }

    /// Apply one setting to this config.
    ///
    /// # Errors
    /// [`ConfigError::UnknownSetting`] for keys outside [`keys::ALL`].
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            keys::PRIMARY_ENABLED => self.primary_enabled = parse_flag(value),
            keys::PRIMARY_CLOUD_NAME => self.primary_name = value.trim().to_string(),
            keys::FALLBACK_ENABLED => self.fallback_enabled = parse_flag(value),
            keys::UPLOAD_TARGET => self.upload_target = UploadTarget::from_setting(value),
            k if keys::CREDENTIALS.contains(&k) => {
                if value.is_empty() {
                    self.credentials.remove(k);
                } else {
                    self.credentials.insert(k.to_string(), value.to_string());
                }
            }
            other => return Err(ConfigError::UnknownSetting(other.to_string()).into()),
        }
        Ok(())
    }

    /// Rows representing this config, one per key
    pub fn to_rows(&self) -> Vec<SettingRow> {
        let mut rows = vec![
            SettingRow::new(keys::PRIMARY_ENABLED, self.primary_enabled.to_string()),
            SettingRow::new(keys::PRIMARY_CLOUD_NAME, self.primary_name.clone()),
        ];
        for key in keys::CREDENTIALS {
            rows.push(SettingRow::new(
                key,
                self.credentials.get(key).cloned().unwrap_or_default(),
            ));
        }
        rows.push(SettingRow::new(
            keys::FALLBACK_ENABLED,
            self.fallback_enabled.to_string(),
        ));
        rows.push(SettingRow::new(
            keys::UPLOAD_TARGET,
            self.upload_target.as_str(),
        ));
        rows
    }

    /// Primary CDN is switched on and has a cloud name to address
    pub fn is_primary_configured(&self) -> bool {
        self.primary_enabled && !self.primary_name.is_empty()
    }

    pub fn upload_preset(&self) -> Option<&str> {
        self.credentials
            .get(keys::PRIMARY_UPLOAD_PRESET)
            .map(String::as_str)
    }

    pub fn folder(&self) -> Option<&str> {
        self.credentials.get(keys::PRIMARY_FOLDER).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_safe() {
        let config = ImageBackendConfig::default();
        assert!(!config.primary_enabled);
        assert!(config.fallback_enabled);
        assert_eq!(config.upload_target, UploadTarget::Supabase);
        assert!(!config.is_primary_configured());
    }

    #[test]
    fn test_from_rows() {
        let config = ImageBackendConfig::from_rows(&[
            SettingRow::new(keys::PRIMARY_ENABLED, "true"),
            SettingRow::new(keys::PRIMARY_CLOUD_NAME, " demo "),
            SettingRow::new(keys::PRIMARY_UPLOAD_PRESET, "parish_unsigned"),
            SettingRow::new(keys::FALLBACK_ENABLED, "false"),
            SettingRow::new(keys::UPLOAD_TARGET, "Cloudinary"),
        ]);

        assert!(config.is_primary_configured());
        assert_eq!(config.primary_name, "demo");
        assert_eq!(config.upload_preset(), Some("parish_unsigned"));
        assert!(!config.fallback_enabled);
        assert_eq!(config.upload_target, UploadTarget::Cloudinary);
    }

    #[test]
    fn test_non_true_flags_are_false() {
        let config = ImageBackendConfig::from_rows(&[
            SettingRow::new(keys::PRIMARY_ENABLED, "yes"),
            SettingRow::new(keys::PRIMARY_CLOUD_NAME, "demo"),
        ]);
        assert!(!config.primary_enabled);
    }

    #[test]
    fn test_enabled_without_cloud_name_is_not_configured() {
        let config =
            ImageBackendConfig::from_rows(&[SettingRow::new(keys::PRIMARY_ENABLED, "true")]);
        assert!(config.primary_enabled);
        assert!(!config.is_primary_configured());
    }

    #[test]
    fn test_unknown_upload_target_falls_back() {
        assert_eq!(UploadTarget::from_setting("s3"), UploadTarget::Supabase);
    }

    #[test]
    fn test_apply_rejects_unknown_key() {
        let mut config = ImageBackendConfig::default();
        assert!(matches!(
            config.apply("site_title", "St. Mary"),
            Err(crate::error::Error::Config(ConfigError::UnknownSetting(_)))
        ));
    }

    #[test]
    fn test_to_rows_covers_every_key() {
        let rows = ImageBackendConfig::default().to_rows();
        let row_keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        for key in keys::ALL {
            assert!(row_keys.contains(&key), "missing {}", key);
        }
    }

    #[test]
    fn test_rows_roundtrip() {
        let mut config = ImageBackendConfig::default();
        config.apply(keys::PRIMARY_ENABLED, "true").unwrap();
        config.apply(keys::PRIMARY_CLOUD_NAME, "demo").unwrap();
        config.apply(keys::PRIMARY_FOLDER, "parish").unwrap();

        assert_eq!(ImageBackendConfig::from_rows(&config.to_rows()), config);
    }
}
