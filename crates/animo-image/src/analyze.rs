//! Source image loading and classification.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::debug;

use crate::color::Rgb;
use crate::error::{ImageError, ImageResult};

/// Default opacity threshold: pixels at or above this alpha count as
/// foreground for key-color search.
pub const DEFAULT_OPACITY_THRESHOLD: u8 = 32;

/// Default color-distance tolerance when clustering border samples.
pub const DEFAULT_BORDER_TOLERANCE: f64 = 32.0;

/// Border sampling stride in pixels.
const BORDER_SAMPLE_STRIDE: u32 = 4;

/// A loaded input image plus the metadata the strategy selector reads.
/// Read-only after load.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Whether the file's native color mode carried an alpha channel.
    pub has_alpha: bool,
    pixels: RgbaImage,
}

impl SourceImage {
    /// Load and decode an image (PNG/JPG/WEBP).
    pub fn load(path: impl AsRef<Path>) -> ImageResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImageError::NotFound(path.to_path_buf()));
        }

        let decoded = image::open(path).map_err(|e| ImageError::unreadable(path, e))?;
        let has_alpha = decoded.color().has_alpha();
        let pixels = decoded.to_rgba8();
        let (width, height) = pixels.dimensions();

        debug!(
            path = %path.display(),
            width, height, has_alpha,
            "loaded source image"
        );

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            has_alpha,
            pixels,
        })
    }

    /// Build directly from pixels (tests and baked intermediates).
    pub fn from_rgba(path: impl Into<PathBuf>, pixels: RgbaImage, has_alpha: bool) -> Self {
        let (width, height) = pixels.dimensions();
        Self {
            path: path.into(),
            width,
            height,
            has_alpha,
            pixels,
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Sample border and corner pixels; if they cluster within `tolerance`
    /// of their mean, the image is a solid-background photo and the mean
    /// is the background color.
    pub fn detect_solid_background(&self, tolerance: f64) -> Option<Rgb> {
        let samples = self.border_samples();
        if samples.is_empty() {
            return None;
        }

        let n = samples.len() as f64;
        let (mut r, mut g, mut b) = (0f64, 0f64, 0f64);
        for px in &samples {
            r += px.r as f64;
            g += px.g as f64;
            b += px.b as f64;
        }
        let mean = Rgb::new((r / n) as u8, (g / n) as u8, (b / n) as u8);

        if samples.iter().all(|px| mean.distance(px) <= tolerance) {
            debug!(color = %mean.to_ffmpeg_hex(), "border samples cluster; solid background");
            Some(mean)
        } else {
            None
        }
    }

    /// Opaque foreground pixels for key-color search.
    ///
    /// With an alpha channel the threshold decides membership; for opaque
    /// images the caller supplies the detected background color and the
    /// same cluster tolerance, and membership is "far from background".
    pub fn foreground_pixels(
        &self,
        opacity_threshold: u8,
        background: Option<(Rgb, f64)>,
    ) -> Vec<Rgb> {
        let mut out = Vec::new();
        for px in self.pixels.pixels() {
            let rgb = Rgb::new(px.0[0], px.0[1], px.0[2]);
            let keep = if self.has_alpha {
                px.0[3] >= opacity_threshold
            } else if let Some((bg, tolerance)) = background {
                bg.distance(&rgb) > tolerance
            } else {
                true
            };
            if keep {
                out.push(rgb);
            }
        }
        out
    }

    fn border_samples(&self) -> Vec<Rgb> {
        let mut samples = Vec::new();
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return samples;
        }

        let mut push = |x: u32, y: u32| {
            let px = self.pixels.get_pixel(x, y);
            samples.push(Rgb::new(px.0[0], px.0[1], px.0[2]));
        };

        for x in (0..w).step_by(BORDER_SAMPLE_STRIDE as usize) {
            push(x, 0);
            push(x, h - 1);
        }
        for y in (0..h).step_by(BORDER_SAMPLE_STRIDE as usize) {
            push(0, y);
            push(w - 1, y);
        }
        // Corners are the strongest background signal; always include them.
        push(w - 1, 0);
        push(0, h - 1);
        push(w - 1, h - 1);

        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid_image(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    #[test]
    fn test_solid_background_detected() {
        let mut img = solid_image(64, 64, [255, 255, 255, 255]);
        // Subject in the middle does not disturb border sampling.
        for y in 20..44 {
            for x in 20..44 {
                img.put_pixel(x, y, Rgba([40, 80, 120, 255]));
            }
        }
        let src = SourceImage::from_rgba("test.jpg", img, false);
        let bg = src.detect_solid_background(DEFAULT_BORDER_TOLERANCE).unwrap();
        assert!(bg.distance(&Rgb::new(255, 255, 255)) < 2.0);
    }

    #[test]
    fn test_complex_background_not_detected() {
        let mut img = solid_image(64, 64, [255, 255, 255, 255]);
        for x in 0..64 {
            // Noisy top border defeats clustering.
            let v = (x * 4 % 256) as u8;
            img.put_pixel(x, 0, Rgba([v, 255 - v, v, 255]));
        }
        let src = SourceImage::from_rgba("test.jpg", img, false);
        assert!(src.detect_solid_background(DEFAULT_BORDER_TOLERANCE).is_none());
    }

    #[test]
    fn test_foreground_respects_opacity_threshold() {
        let mut img = solid_image(4, 1, [100, 100, 100, 0]);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        img.put_pixel(1, 0, Rgba([50, 60, 70, DEFAULT_OPACITY_THRESHOLD]));
        let src = SourceImage::from_rgba("test.png", img, true);
        let fg = src.foreground_pixels(DEFAULT_OPACITY_THRESHOLD, None);
        assert_eq!(fg.len(), 2);
    }

    #[test]
    fn test_foreground_from_background_distance() {
        let mut img = solid_image(4, 1, [255, 255, 255, 255]);
        img.put_pixel(0, 0, Rgba([20, 20, 20, 255]));
        let src = SourceImage::from_rgba("test.jpg", img, false);
        let fg = src.foreground_pixels(
            DEFAULT_OPACITY_THRESHOLD,
            Some((Rgb::new(255, 255, 255), DEFAULT_BORDER_TOLERANCE)),
        );
        assert_eq!(fg.len(), 1);
        assert_eq!(fg[0], Rgb::new(20, 20, 20));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SourceImage::load("/nonexistent/image.png").unwrap_err();
        assert!(matches!(err, ImageError::NotFound(_)));
    }
}
