//! Baking and mask preparation.
//!
//! Baking composites the subject onto a flat key color before generation
//! so the generated video carries a keyable reference background.

use std::path::{Path, PathBuf};

use image::{Rgb as ImgRgb, RgbImage, RgbaImage};
use tracing::{debug, warn};

use crate::analyze::SourceImage;
use crate::color::Rgb;
use crate::error::{ImageError, ImageResult};

/// Composite a (possibly transparent) source onto a flat background color.
pub fn bake_onto(src: &SourceImage, background: Rgb) -> RgbImage {
    let mut out = RgbImage::new(src.width, src.height);
    for (x, y, px) in src.pixels().enumerate_pixels() {
        let a = px.0[3] as f32 / 255.0;
        let blend = |fg: u8, bg: u8| (fg as f32 * a + bg as f32 * (1.0 - a)).round() as u8;
        out.put_pixel(
            x,
            y,
            ImgRgb([
                blend(px.0[0], background.r),
                blend(px.0[1], background.g),
                blend(px.0[2], background.b),
            ]),
        );
    }
    out
}

/// Replace near-background pixels of an opaque photo with the key color.
///
/// Used for solid-background photos: the detected border color defines
/// the background set, and rewriting it to a palette key gives the
/// post-generation keyer an exact color to remove.
pub fn rebake_background(
    src: &SourceImage,
    background: Rgb,
    tolerance: f64,
    key: Rgb,
) -> RgbImage {
    let mut out = RgbImage::new(src.width, src.height);
    let mut replaced = 0u64;
    for (x, y, px) in src.pixels().enumerate_pixels() {
        let rgb = Rgb::new(px.0[0], px.0[1], px.0[2]);
        let value = if background.distance(&rgb) <= tolerance {
            replaced += 1;
            ImgRgb([key.r, key.g, key.b])
        } else {
            ImgRgb([rgb.r, rgb.g, rgb.b])
        };
        out.put_pixel(x, y, value);
    }
    debug!(replaced, key = %key.to_ffmpeg_hex(), "rebaked background pixels");
    out
}

/// Save an RGB image as PNG.
pub fn save_rgb_png(img: &RgbImage, path: impl AsRef<Path>) -> ImageResult<()> {
    let path = path.as_ref();
    img.save(path)
        .map_err(|e| ImageError::unwritable(path, e))
}

/// A static mask validated and normalized to RGBA.
#[derive(Debug, Clone)]
pub struct PreparedMask {
    pub width: u32,
    pub height: u32,
    /// True when the alpha channel has no variation at all. The mask
    /// pipeline still runs; the caller surfaces a warning instead.
    pub flat_alpha: bool,
    pixels: RgbaImage,
    source: PathBuf,
}

impl PreparedMask {
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Write the normalized RGBA mask to `path` (PNG).
    pub fn save_png(&self, path: impl AsRef<Path>) -> ImageResult<()> {
        let path = path.as_ref();
        self.pixels
            .save(path)
            .map_err(|e| ImageError::unwritable(path, e))
    }
}

/// Load a mask image, converting to RGBA when needed and checking the
/// alpha channel for variation.
///
/// A mask without native alpha converts to all-opaque RGBA; that is
/// reported as `flat_alpha` rather than an error, matching the
/// warn-and-proceed contract for degenerate masks.
pub fn prepare_mask(path: impl AsRef<Path>) -> ImageResult<PreparedMask> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ImageError::NotFound(path.to_path_buf()));
    }

    let decoded = image::open(path).map_err(|e| ImageError::unreadable(path, e))?;
    if !decoded.color().has_alpha() {
        warn!(
            path = %path.display(),
            "mask has no alpha channel; converting to RGBA (fully opaque)"
        );
    }
    let pixels = decoded.to_rgba8();
    let (width, height) = pixels.dimensions();

    let (min_a, max_a) = pixels
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), px| {
            (lo.min(px.0[3]), hi.max(px.0[3]))
        });
    let flat_alpha = min_a == max_a;
    if flat_alpha {
        warn!(
            alpha = min_a,
            "mask alpha is flat; output will have no transparency variation"
        );
    } else {
        debug!(min_a, max_a, "mask alpha range");
    }

    Ok(PreparedMask {
        width,
        height,
        flat_alpha,
        pixels,
        source: path.to_path_buf(),
    })
}
