//! Image references and their backend classification

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_FALLBACK_MARKER;

/// Logical size class requested by a component
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    /// Gallery grid tiles, avatars
    Thumbnail,
    /// Blog and announcement cards
    #[default]
    Medium,
    /// Lightbox and detail views
    Large,
    /// Homepage slides
    Hero,
}

impl ImageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageCategory::Thumbnail => "thumbnail",
            ImageCategory::Medium => "medium",
            ImageCategory::Large => "large",
            ImageCategory::Hero => "hero",
        }
    }
}

/// Where an image can be served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "backend", content = "value", rename_all = "lowercase")]
pub enum ImageSource {
    /// Asset identifier in the primary CDN
    Primary(String),
    /// URL in the fallback object storage
    Fallback(String),
    /// Any other URL, served as-is
    External(String),
}

impl ImageSource {
    /// Classify a URL against the fallback storage marker.
    pub fn classify(url: &str, fallback_marker: &str) -> Self {
        if !fallback_marker.is_empty() && url.contains(fallback_marker) {
            ImageSource::Fallback(url.to_string())
        } else {
            ImageSource::External(url.to_string())
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::Primary(_) => "primary",
            ImageSource::Fallback(_) => "fallback",
            ImageSource::External(_) => "external",
        }
    }
}

/// Immutable reference to an image as supplied by a component.
///
/// Classification happens once, here. `sources` holds the candidates in
/// preference order: the primary identifier first, then the source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReference {
    sources: Vec<ImageSource>,
    category: ImageCategory,
}

impl ImageReference {
    /// Build a reference using a custom fallback marker.
    pub fn with_marker(
        source_url: &str,
        backend_id: Option<&str>,
        category: ImageCategory,
        fallback_marker: &str,
    ) -> Self {
        let mut sources = Vec::with_capacity(2);
        if let Some(id) = backend_id.map(str::trim).filter(|id| !id.is_empty()) {
            sources.push(ImageSource::Primary(id.to_string()));
        }
        let url = source_url.trim();
        if !url.is_empty() {
            sources.push(ImageSource::classify(url, fallback_marker));
        }
        Self { sources, category }
    }

    /// Build a reference from a source URL and optional primary identifier.
    pub fn new(source_url: &str, backend_id: Option<&str>, category: ImageCategory) -> Self {
        Self::with_marker(source_url, backend_id, category, DEFAULT_FALLBACK_MARKER)
    }

    /// Reference to a bare source URL.
    pub fn from_url(source_url: &str, category: ImageCategory) -> Self {
        Self::new(source_url, None, category)
    }

    /// Reference known only by its primary identifier.
    pub fn primary(backend_id: &str, category: ImageCategory) -> Self {
        Self::new("", Some(backend_id), category)
    }

    pub fn sources(&self) -> &[ImageSource] {
        &self.sources
    }

    pub fn category(&self) -> ImageCategory {
        self.category
    }

    /// Primary identifier, if any
    pub fn backend_id(&self) -> Option<&str> {
        self.sources.iter().find_map(|s| match s {
            ImageSource::Primary(id) => Some(id.as_str()),
            _ => None,
        })
    }

    /// Human-readable label for logs and reports
    pub fn label(&self) -> &str {
        self.sources
            .iter()
            .map(|s| match s {
                ImageSource::Primary(v) | ImageSource::Fallback(v) | ImageSource::External(v) => {
                    v.as_str()
                }
            })
            .next()
            .unwrap_or("<empty>")
    }
}
