//! Image-delivery layer for the parish website
//!
//! Content components hand an [`ImageReference`](image::ImageReference) to
//! [`ImageDelivery::resolve_image_url`](delivery::ImageDelivery::resolve_image_url)
//! and get back a delivery URL, or [`Resolved::Unavailable`](image::Resolved)
//! when the placeholder must be shown. Backend selection follows the remote
//! settings table, read through a short-lived cache.

pub mod cache;
pub mod client;
pub mod config;
pub mod delivery;
pub mod error;
pub mod image;
pub mod preload;
pub mod settings;

pub use delivery::ImageDelivery;
pub use error::{Error, Result};
