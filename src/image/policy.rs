//! Bandwidth policy table
//!
//! All size and quality ceilings used by the URL builder and the device
//! heuristic are defined here and nowhere else.

use super::source::ImageCategory;
use super::transform::CropMode;

/// Widest image ever requested from the primary CDN
pub const PRIMARY_MAX_WIDTH: u32 = 800;

/// Tallest image ever requested from the primary CDN
pub const PRIMARY_MAX_HEIGHT: u32 = 600;

/// Largest side requested from fallback storage
pub const FALLBACK_MAX_SIDE: u32 = 600;

/// Highest quality requested from fallback storage
pub const FALLBACK_MAX_QUALITY: u8 = 30;

/// Quality used in ultra-compress mode
pub const ULTRA_QUALITY: u8 = 25;

/// Side length ceiling in ultra-compress mode (always square)
pub const ULTRA_MAX_SIDE: u32 = 100;

/// Highest device pixel ratio passed to the CDN
pub const MAX_DPR: f32 = 2.0;

/// Device tier quality on slow or data-saving connections
pub const QUALITY_CONSTRAINED: u8 = 25;

/// Device tier quality on narrow viewports
pub const QUALITY_NARROW: u8 = 30;

/// Device tier quality otherwise
pub const QUALITY_DEFAULT: u8 = 40;

/// Viewports narrower than this count as narrow
pub const NARROW_VIEWPORT_PX: u32 = 768;

/// Size ceiling for narrow viewports
pub const NARROW_MAX_SIDE: u32 = 300;

/// Size ceiling for everything else
pub const WIDE_MAX_SIDE: u32 = 600;

/// Defaults applied per logical category when the caller gives no override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPolicy {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub crop: CropMode,
}

/// Defaults for an image category
pub const fn category_policy(category: ImageCategory) -> CategoryPolicy {
    match category {
        ImageCategory::Thumbnail => CategoryPolicy {
            width: 300,
            height: 300,
            quality: 35,
            crop: CropMode::Fill,
        },
        ImageCategory::Medium => CategoryPolicy {
            width: 600,
            height: 400,
            quality: 40,
            crop: CropMode::Fill,
        },
        ImageCategory::Large => CategoryPolicy {
            width: 800,
            height: 600,
            quality: 40,
            crop: CropMode::Limit,
        },
        ImageCategory::Hero => CategoryPolicy {
            width: 800,
            height: 600,
            quality: 45,
            crop: CropMode::Fill,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ImageCategory; 4] = [
        ImageCategory::Thumbnail,
        ImageCategory::Medium,
        ImageCategory::Large,
        ImageCategory::Hero,
    ];

    #[test]
    fn test_category_defaults_fit_primary_ceilings() {
        for category in ALL {
            let policy = category_policy(category);
            assert!(policy.width <= PRIMARY_MAX_WIDTH);
            assert!(policy.height <= PRIMARY_MAX_HEIGHT);
        }
    }

    #[test]
    fn test_category_quality_range() {
        for category in ALL {
            let quality = category_policy(category).quality;
            assert!((35..=45).contains(&quality), "{:?} -> {}", category, quality);
        }
    }
}
