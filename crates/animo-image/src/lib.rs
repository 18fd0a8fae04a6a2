//! Pixel-level utilities: key-color selection, baking, mask preparation,
//! and render geometry.
//!
//! Everything here is synchronous and CPU-bound; the pipeline calls into
//! it before and between the external stages.

pub mod analyze;
pub mod bake;
pub mod color;
pub mod error;
pub mod geometry;

pub use analyze::SourceImage;
pub use bake::{bake_onto, prepare_mask, rebake_background, save_rgb_png, PreparedMask};
pub use color::{find_key_color, Rgb, KEY_CANDIDATES};
pub use error::{ImageError, ImageResult};
pub use geometry::{even_up, RenderGeometry};
