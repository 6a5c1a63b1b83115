//! Image references, transformation policy and URL building

pub mod builder;
pub mod heuristic;
pub mod placeholder;
pub mod policy;
pub mod source;
pub mod transform;

pub use builder::{Plan, build_url, plan};
pub use heuristic::{DeviceProfile, DeviceTier, NetworkType, device_tier};
pub use placeholder::Placeholder;
pub use source::{ImageCategory, ImageReference, ImageSource};
pub use transform::{CropMode, ImageFormat, ResolveOptions, Resolved, TransformSpec};
