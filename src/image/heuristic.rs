//! Device/network heuristic
//!
//! A pure function of the conditions reported at call time. Nothing here is
//! cached; callers pass a fresh [`DeviceProfile`] on every build.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::policy::{
    NARROW_MAX_SIDE, NARROW_VIEWPORT_PX, QUALITY_CONSTRAINED, QUALITY_DEFAULT, QUALITY_NARROW,
    WIDE_MAX_SIDE,
};

/// Effective connection type as reported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum NetworkType {
    #[serde(rename = "slow-2g")]
    #[value(name = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    #[value(name = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    #[value(name = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    #[value(name = "4g")]
    FourG,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Slow2g => "slow-2g",
            NetworkType::TwoG => "2g",
            NetworkType::ThreeG => "3g",
            NetworkType::FourG => "4g",
        }
    }

    pub fn is_constrained(&self) -> bool {
        !matches!(self, NetworkType::FourG)
    }
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(NetworkType::Slow2g),
            "2g" => Ok(NetworkType::TwoG),
            "3g" => Ok(NetworkType::ThreeG),
            "4g" => Ok(NetworkType::FourG),
            other => Err(format!("unknown network type '{}'", other)),
        }
    }
}

/// Conditions observed on the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Viewport width in CSS pixels, if known
    pub viewport_width: Option<u32>,
    /// Reported effective connection type, if the client exposes one
    pub network: Option<NetworkType>,
    /// Client asked to save data
    pub save_data: bool,
}

impl DeviceProfile {
    pub fn is_constrained(&self) -> bool {
        self.save_data || self.network.is_some_and(|n| n.is_constrained())
    }

    pub fn is_narrow(&self) -> bool {
        self.viewport_width.is_some_and(|w| w < NARROW_VIEWPORT_PX)
    }
}

/// Quality tier and size ceiling for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceTier {
    pub quality: u8,
    pub max_width: u32,
    pub max_height: u32,
}

/// Pick the tier for the given conditions.
///
/// Constrained networks win over viewport width for quality. The size
/// ceiling depends on viewport width only.
pub fn device_tier(profile: &DeviceProfile) -> DeviceTier {
    let quality = if profile.is_constrained() {
        QUALITY_CONSTRAINED
    } else if profile.is_narrow() {
        QUALITY_NARROW
    } else {
        QUALITY_DEFAULT
    };

    let side = if profile.is_narrow() {
        NARROW_MAX_SIDE
    } else {
        WIDE_MAX_SIDE
    };

    DeviceTier {
        quality,
        max_width: side,
        max_height: side,
    }
}
