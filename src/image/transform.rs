//! Transformation parameters and build results

use std::fmt;

use serde::{Deserialize, Serialize};

use super::heuristic::DeviceProfile;

/// Output format requested from a backend
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Let the CDN negotiate (modern formats when the client supports them)
    #[default]
    Auto,
    Webp,
    Avif,
    Jpg,
    Png,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Auto => "auto",
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

/// How the image is fitted into the requested box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CropMode {
    Fill,
    Fit,
    Limit,
    Scale,
    Thumb,
}

impl CropMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropMode::Fill => "fill",
            CropMode::Fit => "fit",
            CropMode::Limit => "limit",
            CropMode::Scale => "scale",
            CropMode::Thumb => "thumb",
        }
    }

    /// Crops that cut the image and therefore benefit from automatic gravity
    pub fn uses_gravity(&self) -> bool {
        matches!(self, CropMode::Fill | CropMode::Thumb)
    }

    /// Equivalent `resize` value for the fallback storage render endpoint
    pub fn storage_resize(&self) -> &'static str {
        match self {
            CropMode::Fill | CropMode::Thumb => "cover",
            CropMode::Fit | CropMode::Limit => "contain",
            CropMode::Scale => "fill",
        }
    }
}

/// Caller options for a single URL build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
    /// Smallest acceptable quality and size, for thumbnail-scale images
    pub ultra_compress: bool,
    pub format: ImageFormat,
    pub crop: Option<CropMode>,
    pub dpr: Option<f32>,
    /// Device-optimized mode when present
    pub device: Option<DeviceProfile>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn ultra_compress(mut self) -> Self {
        self.ultra_compress = true;
        self
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn crop(mut self, crop: CropMode) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn dpr(mut self, dpr: f32) -> Self {
        self.dpr = Some(dpr);
        self
    }

    pub fn device(mut self, device: DeviceProfile) -> Self {
        self.device = Some(device);
        self
    }
}

/// Concrete transformation derived for one build. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformSpec {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub format: ImageFormat,
    pub crop: CropMode,
    pub progressive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpr: Option<f32>,
}

impl TransformSpec {
    /// Every parameter that affects the output URL, for cache keys
    pub fn cache_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("w", self.width.to_string()),
            ("h", self.height.to_string()),
            ("q", self.quality.to_string()),
            ("f", self.format.as_str().to_string()),
            ("c", self.crop.as_str().to_string()),
            ("p", self.progressive.to_string()),
        ];
        if let Some(dpr) = self.dpr {
            params.push(("dpr", format_dpr(dpr)));
        }
        params
    }
}

/// Render a DPR the way the CDN expects it (`2.0`, `1.5`)
pub(crate) fn format_dpr(dpr: f32) -> String {
    format!("{:.1}", dpr)
}

/// Result of resolving an image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolved {
    /// URL to assign to the image element
    Url(String),
    /// No URL may be served; render the placeholder
    Unavailable,
}

impl Resolved {
    /// String form handed to components; empty when unavailable
    pub fn as_str(&self) -> &str {
        match self {
            Resolved::Url(url) => url,
            Resolved::Unavailable => "",
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Resolved::Url(url) => Some(url),
            Resolved::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Resolved::Unavailable)
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
