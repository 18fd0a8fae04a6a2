//! Render geometry: mobile cap, oversize-and-crop, even alignment.
//!
//! Generated video tends to drift a few percent of zoom relative to the
//! source framing. Rendering oversized and center-cropping back to the
//! target absorbs that drift. VP9 and H.264 both require even dimensions.

/// Round up to the next even number.
pub fn even_up(n: u32) -> u32 {
    n + n % 2
}

/// Planned dimensions for the post-generation scale and crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderGeometry {
    /// Oversized render target (scale stage).
    pub render_width: u32,
    pub render_height: u32,
    /// Final cropped output. Always even.
    pub crop_width: u32,
    pub crop_height: u32,
}

impl RenderGeometry {
    /// Mobile cap per axis when no explicit size is requested.
    pub const MOBILE_CAP: u32 = 720;

    /// Oversize factor absorbed by the center crop.
    pub const OVERSIZE: f64 = 1.15;

    /// Plan geometry from source dimensions and an optional explicit
    /// target. Explicit sizes are honored (even-aligned); otherwise the
    /// source size is capped at 720 per axis.
    pub fn plan(src_width: u32, src_height: u32, target: Option<(u32, u32)>) -> Self {
        let (cap_w, cap_h) = match target {
            Some((w, h)) => (w, h),
            None => (src_width.min(Self::MOBILE_CAP), src_height.min(Self::MOBILE_CAP)),
        };

        let render_width = even_up((cap_w as f64 * Self::OVERSIZE) as u32);
        let render_height = even_up((cap_h as f64 * Self::OVERSIZE) as u32);
        let crop_width = even_up(cap_w);
        let crop_height = even_up(cap_h);

        Self {
            render_width,
            render_height,
            crop_width,
            crop_height,
        }
    }

    /// The FFmpeg fragment implementing this plan. The scale preserves
    /// aspect ratio; the crop centers by default.
    pub fn scale_filter(&self) -> String {
        format!(
            "scale={}:{}:force_original_aspect_ratio=decrease,crop={}:{}",
            self.render_width, self.render_height, self.crop_width, self.crop_height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_up() {
        assert_eq!(even_up(719), 720);
        assert_eq!(even_up(720), 720);
        assert_eq!(even_up(0), 0);
    }

    #[test]
    fn test_plan_caps_at_720() {
        let g = RenderGeometry::plan(1080, 1920, None);
        assert_eq!(g.crop_width, 720);
        assert_eq!(g.crop_height, 720);
    }

    #[test]
    fn test_plan_dimensions_always_even() {
        for (w, h) in [(501, 333), (719, 720), (100, 101)] {
            let g = RenderGeometry::plan(w, h, None);
            assert_eq!(g.render_width % 2, 0);
            assert_eq!(g.render_height % 2, 0);
            assert_eq!(g.crop_width % 2, 0);
            assert_eq!(g.crop_height % 2, 0);
        }
    }

    #[test]
    fn test_plan_oversizes_render() {
        let g = RenderGeometry::plan(600, 400, None);
        assert!(g.render_width >= (600.0 * 1.15) as u32);
        assert!(g.render_height >= (400.0 * 1.15) as u32);
        assert_eq!(g.crop_width, 600);
        assert_eq!(g.crop_height, 400);
    }

    #[test]
    fn test_explicit_target_honored() {
        let g = RenderGeometry::plan(2000, 2000, Some((640, 360)));
        assert_eq!(g.crop_width, 640);
        assert_eq!(g.crop_height, 360);
    }

    #[test]
    fn test_scale_filter_shape() {
        let g = RenderGeometry::plan(600, 400, None);
        let f = g.scale_filter();
        assert!(f.starts_with("scale="));
        assert!(f.contains("force_original_aspect_ratio=decrease"));
        assert!(f.contains("crop=600:400"));
    }
}
