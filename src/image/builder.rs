//! URL builder
//!
//! Building is split in two steps. [`plan`] picks the backend and derives the
//! [`TransformSpec`]; [`Plan::render`] turns that into the delivery URL. The
//! plan also supplies the cache key, so the delivery layer can check the
//! cache before rendering.

use log::trace;

use super::heuristic::device_tier;
use super::policy::{
    FALLBACK_MAX_QUALITY, FALLBACK_MAX_SIDE, MAX_DPR, PRIMARY_MAX_HEIGHT, PRIMARY_MAX_WIDTH,
    ULTRA_MAX_SIDE, ULTRA_QUALITY, category_policy,
};
use super::source::{ImageCategory, ImageReference, ImageSource};
use super::transform::{
    CropMode, ImageFormat, ResolveOptions, Resolved, TransformSpec, format_dpr,
};
use crate::cache::cache_key;
use crate::settings::ImageBackendConfig;

/// Delivery host of the primary CDN
pub const PRIMARY_DELIVERY_BASE: &str = "https://res.cloudinary.com";

/// Query parameters the fallback builder owns; any others are preserved
const FALLBACK_PARAMS: [&str; 5] = ["width", "height", "quality", "resize", "format"];

/// Backend choice and transform for one reference
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Primary {
        cloud_name: String,
        public_id: String,
        spec: TransformSpec,
    },
    Fallback {
        url: String,
        spec: TransformSpec,
    },
    Passthrough(String),
    Unavailable,
}

impl Plan {
    /// Backend label for logs and reports
    pub fn backend(&self) -> &'static str {
        match self {
            Plan::Primary { .. } => "primary",
            Plan::Fallback { .. } => "fallback",
            Plan::Passthrough(_) => "external",
            Plan::Unavailable => "unavailable",
        }
    }

    pub fn spec(&self) -> Option<&TransformSpec> {
        match self {
            Plan::Primary { spec, .. } | Plan::Fallback { spec, .. } => Some(spec),
            _ => None,
        }
    }

    /// Key under which the rendered URL is memoized.
    ///
    /// Only transformed URLs are cached. Passthrough costs nothing to
    /// rebuild and unavailable results must never be served from cache.
    pub fn cache_key(&self) -> Option<String> {
        match self {
            Plan::Primary {
                cloud_name,
                public_id,
                spec,
            } => Some(key_for("primary", public_id, &[("cloud", cloud_name)], spec)),
            Plan::Fallback { url, spec } => Some(key_for("fallback", url, &[], spec)),
            Plan::Passthrough(_) | Plan::Unavailable => None,
        }
    }

    pub fn render(&self) -> Resolved {
        match self {
            Plan::Primary {
                cloud_name,
                public_id,
                spec,
            } => Resolved::Url(primary_url(cloud_name, public_id, spec)),
            Plan::Fallback { url, spec } => Resolved::Url(fallback_url(url, spec)),
            Plan::Passthrough(url) => Resolved::Url(url.clone()),
            Plan::Unavailable => Resolved::Unavailable,
        }
    }
}

fn key_for(kind: &str, source: &str, backend: &[(&str, &str)], spec: &TransformSpec) -> String {
    let params = spec.cache_params();
    let mut pairs: Vec<(&str, &str)> = backend.to_vec();
    pairs.extend(params.iter().map(|(k, v)| (*k, v.as_str())));
    cache_key(kind, source, &pairs)
}

/// Choose a backend for `reference` under `config`.
///
/// Sources are tried in preference order. A primary identifier is skipped
/// when the primary CDN is off or has no cloud name. A fallback storage URL
/// with fallback disabled ends the walk as unavailable rather than leaking
/// the raw URL.
pub fn plan(reference: &ImageReference, options: &ResolveOptions, config: &ImageBackendConfig) -> Plan {
    for source in reference.sources() {
        match source {
            ImageSource::Primary(id) => {
                if config.is_primary_configured() {
                    return Plan::Primary {
                        cloud_name: config.primary_name.clone(),
                        public_id: id.clone(),
                        spec: primary_spec(reference.category(), options),
                    };
                }
                trace!("Primary backend not configured, skipping id {}", id);
            }
            ImageSource::Fallback(url) => {
                if config.fallback_enabled {
                    return Plan::Fallback {
                        url: url.clone(),
                        spec: fallback_spec(reference.category(), options),
                    };
                }
                trace!("Fallback storage disabled, {} is unavailable", url);
                return Plan::Unavailable;
            }
            ImageSource::External(url) => return Plan::Passthrough(url.clone()),
        }
    }
    Plan::Unavailable
}

/// Plan and render in one step.
pub fn build_url(
    reference: &ImageReference,
    options: &ResolveOptions,
    config: &ImageBackendConfig,
) -> Resolved {
    plan(reference, options, config).render()
}

struct Limits {
    max_width: u32,
    max_height: u32,
    max_quality: u8,
}

const PRIMARY_LIMITS: Limits = Limits {
    max_width: PRIMARY_MAX_WIDTH,
    max_height: PRIMARY_MAX_HEIGHT,
    max_quality: 100,
};

const FALLBACK_LIMITS: Limits = Limits {
    max_width: FALLBACK_MAX_SIDE,
    max_height: FALLBACK_MAX_SIDE,
    max_quality: FALLBACK_MAX_QUALITY,
};

fn derive_spec(category: ImageCategory, options: &ResolveOptions, limits: &Limits) -> TransformSpec {
    let policy = category_policy(category);

    if options.ultra_compress {
        let side = options
            .width
            .or(options.height)
            .unwrap_or(ULTRA_MAX_SIDE)
            .clamp(1, ULTRA_MAX_SIDE)
            .min(limits.max_width)
            .min(limits.max_height);
        return TransformSpec {
            width: side,
            height: side,
            quality: ULTRA_QUALITY.min(limits.max_quality),
            format: options.format,
            crop: CropMode::Fill,
            progressive: true,
            dpr: None,
        };
    }

    let tier = options.device.as_ref().map(device_tier);

    let quality = options
        .quality
        .or(tier.map(|t| t.quality))
        .unwrap_or(policy.quality)
        .clamp(1, limits.max_quality);

    let mut width = options.width.unwrap_or(policy.width);
    let mut height = options.height.unwrap_or(policy.height);
    if let Some(tier) = tier {
        width = width.min(tier.max_width);
        height = height.min(tier.max_height);
    }

    TransformSpec {
        width: width.clamp(1, limits.max_width),
        height: height.clamp(1, limits.max_height),
        quality,
        format: options.format,
        crop: options.crop.unwrap_or(policy.crop),
        progressive: true,
        dpr: None,
    }
}

fn primary_spec(category: ImageCategory, options: &ResolveOptions) -> TransformSpec {
    let mut spec = derive_spec(category, options, &PRIMARY_LIMITS);
    // The CDN always negotiates the format itself
    spec.format = ImageFormat::Auto;
    spec.dpr = options
        .dpr
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.min(MAX_DPR));
    spec
}

fn fallback_spec(category: ImageCategory, options: &ResolveOptions) -> TransformSpec {
    let mut spec = derive_spec(category, options, &FALLBACK_LIMITS);
    spec.progressive = false;
    spec
}

fn primary_url(cloud_name: &str, public_id: &str, spec: &TransformSpec) -> String {
    let mut directives = vec![
        format!("f_{}", ImageFormat::Auto.as_str()),
        format!("q_{}", spec.quality),
        format!("c_{}", spec.crop.as_str()),
    ];
    if spec.crop.uses_gravity() {
        directives.push("g_auto".to_string());
    }
    directives.push(format!("w_{}", spec.width));
    directives.push(format!("h_{}", spec.height));
    if spec.progressive {
        directives.push("fl_progressive".to_string());
    }
    directives.push("fl_strip_profile".to_string());
    if let Some(dpr) = spec.dpr {
        directives.push(format!("dpr_{}", format_dpr(dpr)));
    }

    format!(
        "{}/{}/image/upload/{}/{}",
        PRIMARY_DELIVERY_BASE,
        cloud_name,
        directives.join(","),
        public_id.trim_start_matches('/')
    )
}

fn fallback_url(url: &str, spec: &TransformSpec) -> String {
    // Query goes before any fragment
    let (url, fragment) = match url.split_once('#') {
        Some((url, fragment)) => (url, Some(fragment)),
        None => (url, None),
    };
    let (base, existing) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };

    let mut params = vec![
        format!("width={}", spec.width),
        format!("height={}", spec.height),
        format!("quality={}", spec.quality),
        format!("resize={}", spec.crop.storage_resize()),
    ];
    if spec.format != ImageFormat::Auto {
        params.push(format!("format={}", spec.format.as_str()));
    }

    if let Some(existing) = existing {
        for param in existing.split('&').filter(|p| !p.is_empty()) {
            let key = param.split('=').next().unwrap_or("");
            if !FALLBACK_PARAMS.contains(&key) {
                params.push(param.to_string());
            }
        }
    }

    match fragment {
        Some(fragment) => format!("{}?{}#{}", base, params.join("&"), fragment),
        None => format!("{}?{}", base, params.join("&")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::heuristic::{DeviceProfile, NetworkType};

    const SUPABASE_URL: &str = "https://x.supabase.co/storage/v1/object/public/images/foo.jpg";

    fn primary_config() -> ImageBackendConfig {
        ImageBackendConfig {
            primary_enabled: true,
            primary_name: "demo".to_string(),
            ..Default::default()
        }
    }

    fn fallback_disabled() -> ImageBackendConfig {
        ImageBackendConfig {
            fallback_enabled: false,
            ..Default::default()
        }
    }

    fn directive(url: &str, prefix: &str) -> Option<u32> {
        url.split('/')
            .flat_map(|segment| segment.split(','))
            .find_map(|d| d.strip_prefix(prefix).and_then(|v| v.parse().ok()))
    }

    #[test]
    fn test_primary_width_clamped_to_800() {
        let reference = ImageReference::primary("abc123", ImageCategory::Large);
        let options = ResolveOptions::new().width(1920);

        let url = build_url(&reference, &options, &primary_config());
        let url = url.as_str();

        assert!(url.starts_with("https://res.cloudinary.com/demo/image/upload/"));
        assert!(url.ends_with("/abc123"));
        assert!(url.contains("w_800"));
        assert!(!url.contains("w_1920"));
    }

    #[test]
    fn test_primary_dimensions_never_exceed_ceilings() {
        let config = primary_config();
        let categories = [
            ImageCategory::Thumbnail,
            ImageCategory::Medium,
            ImageCategory::Large,
            ImageCategory::Hero,
        ];
        let sizes = [None, Some(1), Some(599), Some(800), Some(4000), Some(u32::MAX)];

        for category in categories {
            for width in sizes {
                for height in sizes {
                    let reference = ImageReference::primary("abc123", category);
                    let options = ResolveOptions {
                        width,
                        height,
                        ..Default::default()
                    };
                    let url = build_url(&reference, &options, &config).to_string();

                    let w = directive(&url, "w_").unwrap();
                    let h = directive(&url, "h_").unwrap();
                    assert!(w <= 800 && h <= 600, "{} -> {}x{}", url, w, h);
                }
            }
        }
    }

    #[test]
    fn test_ultra_compress_is_square_q25() {
        let config = primary_config();
        for requested in [None, Some(50), Some(100), Some(1920)] {
            let reference = ImageReference::primary("abc123", ImageCategory::Thumbnail);
            let mut options = ResolveOptions::new().quality(90).ultra_compress();
            options.width = requested;

            let url = build_url(&reference, &options, &config).to_string();

            assert_eq!(directive(&url, "q_"), Some(25));
            let w = directive(&url, "w_").unwrap();
            let h = directive(&url, "h_").unwrap();
            assert_eq!(w, h);
            assert!(w <= 100);
        }
    }

    #[test]
    fn test_ultra_compress_default_side() {
        let reference = ImageReference::primary("abc123", ImageCategory::Thumbnail);
        let url = build_url(&reference, &ResolveOptions::new().ultra_compress(), &primary_config());
        assert!(url.as_str().contains("q_25,c_fill,g_auto,w_100,h_100"));
    }

    #[test]
    fn test_ultra_compress_on_fallback() {
        let reference = ImageReference::from_url(SUPABASE_URL, ImageCategory::Thumbnail);
        let url = build_url(
            &reference,
            &ResolveOptions::new().ultra_compress(),
            &ImageBackendConfig::default(),
        );
        assert!(url.as_str().contains("width=100&height=100&quality=25"));
    }

    #[test]
    fn test_primary_directive_order() {
        let reference = ImageReference::primary("parish/slide-1", ImageCategory::Hero);
        let options = ResolveOptions::new().dpr(3.0);

        let url = build_url(&reference, &options, &primary_config());

        assert_eq!(
            url.as_str(),
            "https://res.cloudinary.com/demo/image/upload/\
             f_auto,q_45,c_fill,g_auto,w_800,h_600,fl_progressive,fl_strip_profile,dpr_2.0/parish/slide-1"
        );
    }

    #[test]
    fn test_limit_crop_has_no_gravity() {
        let reference = ImageReference::primary("abc123", ImageCategory::Large);
        let url = build_url(&reference, &ResolveOptions::new(), &primary_config());
        assert!(url.as_str().contains("c_limit,w_800"));
        assert!(!url.as_str().contains("g_auto"));
    }

    #[test]
    fn test_explicit_quality_overrides_tier() {
        let reference = ImageReference::primary("abc123", ImageCategory::Medium);
        let options = ResolveOptions::new().quality(70).device(DeviceProfile {
            network: Some(NetworkType::TwoG),
            ..Default::default()
        });
        let url = build_url(&reference, &options, &primary_config());
        assert_eq!(directive(url.as_str(), "q_"), Some(70));
    }

    #[test]
    fn test_quality_clamped_to_valid_range() {
        let reference = ImageReference::primary("abc123", ImageCategory::Medium);
        let url = build_url(&reference, &ResolveOptions::new().quality(0), &primary_config());
        assert_eq!(directive(url.as_str(), "q_"), Some(1));
    }

    #[test]
    fn test_device_mode_applies_tier() {
        let reference = ImageReference::primary("abc123", ImageCategory::Hero);
        let options = ResolveOptions::new().device(DeviceProfile {
            viewport_width: Some(375),
            ..Default::default()
        });

        let url = build_url(&reference, &options, &primary_config()).to_string();

        assert_eq!(directive(&url, "q_"), Some(30));
        assert_eq!(directive(&url, "w_"), Some(300));
        assert_eq!(directive(&url, "h_"), Some(300));
    }

    #[test]
    fn test_primary_not_configured_uses_source_url() {
        let reference =
            ImageReference::new(SUPABASE_URL, Some("abc123"), ImageCategory::Medium);
        let config = ImageBackendConfig {
            primary_enabled: true,
            ..Default::default()
        };

        let plan = plan(&reference, &ResolveOptions::new(), &config);

        assert_eq!(plan.backend(), "fallback");
    }

    #[test]
    fn test_fallback_disabled_returns_empty() {
        let reference = ImageReference::from_url(SUPABASE_URL, ImageCategory::Medium);

        let resolved = build_url(&reference, &ResolveOptions::new(), &fallback_disabled());

        assert_eq!(resolved, Resolved::Unavailable);
        assert_eq!(resolved.as_str(), "");
    }

    #[test]
    fn test_fallback_disabled_with_unconfigured_primary_is_unavailable() {
        let reference =
            ImageReference::new(SUPABASE_URL, Some("abc123"), ImageCategory::Medium);
        let resolved = build_url(&reference, &ResolveOptions::new(), &fallback_disabled());
        assert_eq!(resolved.as_str(), "");
    }

    #[test]
    fn test_primary_wins_over_disabled_fallback() {
        let reference =
            ImageReference::new(SUPABASE_URL, Some("abc123"), ImageCategory::Medium);
        let config = ImageBackendConfig {
            fallback_enabled: false,
            ..primary_config()
        };
        let resolved = build_url(&reference, &ResolveOptions::new(), &config);
        assert!(resolved.as_str().starts_with(PRIMARY_DELIVERY_BASE));
    }

    #[test]
    fn test_fallback_params_clamped() {
        let reference = ImageReference::from_url(SUPABASE_URL, ImageCategory::Hero);
        let options = ResolveOptions::new().width(1920).height(1080).quality(90);

        let url = build_url(&reference, &options, &ImageBackendConfig::default());

        assert_eq!(
            url.as_str(),
            format!("{}?width=600&height=600&quality=30&resize=cover", SUPABASE_URL)
        );
    }

    #[test]
    fn test_fallback_preserves_unrelated_params() {
        let source = format!("{}?token=abc&width=2000", SUPABASE_URL);
        let reference = ImageReference::from_url(&source, ImageCategory::Thumbnail);
        let options = ResolveOptions::new().format(ImageFormat::Webp);

        let url = build_url(&reference, &options, &ImageBackendConfig::default()).to_string();

        assert!(url.contains("token=abc"));
        assert!(url.contains("format=webp"));
        assert!(url.contains("width=300"));
        assert!(!url.contains("width=2000"));
    }

    #[test]
    fn test_fallback_query_precedes_fragment() {
        let source = format!("{}#slide", SUPABASE_URL);
        let reference = ImageReference::from_url(&source, ImageCategory::Hero);
        let options = ResolveOptions::new().width(1920).height(1080).quality(90);

        let url = build_url(&reference, &options, &ImageBackendConfig::default());

        assert_eq!(
            url.as_str(),
            format!(
                "{}?width=600&height=600&quality=30&resize=cover#slide",
                SUPABASE_URL
            )
        );
    }

    #[test]
    fn test_fallback_fragment_after_existing_query() {
        let source = format!("{}?token=abc#top", SUPABASE_URL);
        let reference = ImageReference::from_url(&source, ImageCategory::Thumbnail);

        let url = build_url(&reference, &ResolveOptions::new(), &ImageBackendConfig::default())
            .to_string();

        assert!(url.ends_with("&token=abc#top"));
        assert!(url.contains("?width=300"));
    }

    #[test]
    fn test_external_url_unmodified() {
        let source = "https://images.example.org/stained-glass.jpg?v=2";
        let reference = ImageReference::from_url(source, ImageCategory::Large);

        for config in [ImageBackendConfig::default(), fallback_disabled(), primary_config()] {
            let resolved = build_url(&reference, &ResolveOptions::new().width(1920), &config);
            assert_eq!(resolved.as_str(), source);
        }
    }

    #[test]
    fn test_empty_reference_is_unavailable() {
        let reference = ImageReference::from_url("", ImageCategory::Medium);
        assert!(build_url(&reference, &ResolveOptions::new(), &primary_config()).is_unavailable());
    }

    #[test]
    fn test_cache_key_only_for_transformed_plans() {
        let config = primary_config();
        let options = ResolveOptions::new();

        let primary = plan(&ImageReference::primary("abc123", ImageCategory::Medium), &options, &config);
        let external = plan(
            &ImageReference::from_url("https://example.com/a.jpg", ImageCategory::Medium),
            &options,
            &config,
        );
        let unavailable = plan(
            &ImageReference::from_url(SUPABASE_URL, ImageCategory::Medium),
            &options,
            &fallback_disabled(),
        );

        assert!(primary.cache_key().is_some());
        assert!(external.cache_key().is_none());
        assert!(unavailable.cache_key().is_none());
    }

    #[test]
    fn test_cache_key_separates_cloud_from_public_id() {
        let spec = plan(
            &ImageReference::primary("c", ImageCategory::Medium),
            &ResolveOptions::new(),
            &primary_config(),
        )
        .spec()
        .cloned()
        .unwrap();

        let nested_cloud = Plan::Primary {
            cloud_name: "a/b".to_string(),
            public_id: "c".to_string(),
            spec: spec.clone(),
        };
        let nested_id = Plan::Primary {
            cloud_name: "a".to_string(),
            public_id: "b/c".to_string(),
            spec,
        };

        assert_ne!(nested_cloud.render(), nested_id.render());
        assert_ne!(nested_cloud.cache_key(), nested_id.cache_key());
    }

    #[test]
    fn test_cache_key_tracks_every_output_input() {
        let reference = ImageReference::primary("abc123", ImageCategory::Medium);
        let base = plan(&reference, &ResolveOptions::new(), &primary_config());

        let other_cloud = ImageBackendConfig {
            primary_name: "parish".to_string(),
            ..primary_config()
        };
        let by_cloud = plan(&reference, &ResolveOptions::new(), &other_cloud);
        let by_width = plan(&reference, &ResolveOptions::new().width(300), &primary_config());

        assert_ne!(base.cache_key(), by_cloud.cache_key());
        assert_ne!(base.cache_key(), by_width.cache_key());
        assert_eq!(
            base.cache_key(),
            plan(&reference, &ResolveOptions::new(), &primary_config()).cache_key()
        );
    }
}
