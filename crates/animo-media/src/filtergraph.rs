//! Per-strategy filter-graph construction.
//!
//! Every graph that merges an alpha signal into a color stream scales
//! both sides explicitly before `alphamerge`. Relying on the encoder to
//! resize implicitly corrupts alpha alignment without any error, so the
//! same scale fragment is applied to both streams.

use animo_image::color::Rgb;
use animo_image::geometry::{even_up, RenderGeometry};

/// Frame rate used when synthesizing a mask video from a still image.
pub const MASK_VIDEO_FPS: u32 = 24;

/// Chromakey extraction tunables.
///
/// Defaults were chosen empirically against generated footage; treat
/// them as starting points, not ground truth.
#[derive(Debug, Clone)]
pub struct ChromakeyTuning {
    /// Key similarity threshold (0..1).
    pub similarity: f32,
    /// Edge blend (0..1).
    pub blend: f32,
    /// Alpha erosion passes removing the keyed-edge fringe. 0 disables.
    pub erode_passes: u32,
    /// Damp residual key-color bleed in surviving pixels.
    pub despill: bool,
}

impl Default for ChromakeyTuning {
    fn default() -> Self {
        Self {
            similarity: 0.28,
            blend: 0.02,
            erode_passes: 1,
            despill: true,
        }
    }
}

impl ChromakeyTuning {
    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_erode_passes(mut self, passes: u32) -> Self {
        self.erode_passes = passes;
        self
    }
}

/// Segmentation-mask post-processing tunables.
#[derive(Debug, Clone)]
pub struct SegmentationTuning {
    /// Temporal smoothing half-window in frames; the mixed window is
    /// `2 * half + 1` frames. Suppresses mask flicker.
    pub smooth_half_window: u32,
    /// Morphological dilation passes recovering clipped thin extremities.
    pub dilate_passes: u32,
}

impl Default for SegmentationTuning {
    fn default() -> Self {
        Self {
            smooth_half_window: 2,
            dilate_passes: 2,
        }
    }
}

impl SegmentationTuning {
    pub fn with_smooth_half_window(mut self, half: u32) -> Self {
        self.smooth_half_window = half;
        self
    }

    pub fn with_dilate_passes(mut self, passes: u32) -> Self {
        self.dilate_passes = passes;
        self
    }
}

/// A complete `-filter_complex` graph with a labeled output stream.
#[derive(Debug, Clone)]
pub struct FilterGraph {
    complex: String,
    out_label: String,
}

impl FilterGraph {
    pub fn complex(&self) -> &str {
        &self.complex
    }

    /// The `-map` argument selecting this graph's output.
    pub fn map_label(&self) -> String {
        format!("[{}]", self.out_label)
    }
}

/// Chromakey strategy: key out the baked color, erode the alpha fringe,
/// despill, scale and center-crop.
pub fn chromakey_graph(
    key: Rgb,
    tuning: &ChromakeyTuning,
    geometry: &RenderGeometry,
) -> FilterGraph {
    let mut alpha_chain = String::from("alphaextract");
    for _ in 0..tuning.erode_passes {
        alpha_chain.push_str(",erosion=threshold0=255:threshold1=255:threshold2=255:threshold3=255");
    }

    let mut merge_chain = String::from("alphamerge");
    if tuning.despill {
        merge_chain.push(',');
        merge_chain.push_str(&despill_filter(key));
    }

    let complex = format!(
        "[0:v]chromakey={}:{}:{},split[rgb][a];[a]{}[am];[rgb][am]{},{}[out]",
        key.to_ffmpeg_hex(),
        tuning.similarity,
        tuning.blend,
        alpha_chain,
        merge_chain,
        geometry.scale_filter(),
    );

    FilterGraph {
        complex,
        out_label: "out".to_string(),
    }
}

/// Segmentation strategy: temporally smooth and dilate the mask video,
/// align both streams to the same geometry, merge.
///
/// Input 0 is the generated color video, input 1 the grayscale mask.
pub fn segmentation_graph(tuning: &SegmentationTuning, geometry: &RenderGeometry) -> FilterGraph {
    let frames = 2 * tuning.smooth_half_window + 1;

    let mut mask_chain = format!("format=gray,tmix=frames={frames}");
    for _ in 0..tuning.dilate_passes {
        mask_chain.push_str(",dilation");
    }

    // Identical scale+crop on both streams keeps the alpha aligned.
    let scale = geometry.scale_filter();
    let complex = format!(
        "[1:v]{mask_chain},{scale}[am];[0:v]{scale}[vid];[vid][am]alphamerge[out]"
    );

    FilterGraph {
        complex,
        out_label: "out".to_string(),
    }
}

/// Static-mask strategy, merge pass: the generated video is forced to
/// the mask's (even-aligned) dimensions, not the other way around.
///
/// Input 0 is the generated color video, input 1 the mask video.
pub fn static_mask_graph(mask_width: u32, mask_height: u32) -> FilterGraph {
    let w = even_up(mask_width);
    let h = even_up(mask_height);
    let complex = format!("[0:v]scale={w}:{h}[vid];[vid][1:v]alphamerge[out]");

    FilterGraph {
        complex,
        out_label: "out".to_string(),
    }
}

/// Filter for the mask-video pre-pass: extract the still mask's alpha as
/// luminance and scale to even dimensions.
pub fn mask_video_filter(mask_width: u32, mask_height: u32) -> String {
    format!(
        "alphaextract,scale={}:{}",
        even_up(mask_width),
        even_up(mask_height)
    )
}

/// Re-express an alpha-carrying graph output as a stacked opaque frame:
/// color on top, grayscale alpha below, total height doubled. Standard
/// decoders play it back; a shader recombines at render time.
pub fn stack_alpha(graph: FilterGraph) -> FilterGraph {
    let complex = format!(
        "{};[{}]split[stk_c][stk_a];[stk_a]alphaextract[stk_am];\
         [stk_c][stk_am]vstack=inputs=2,format=yuv420p[stacked]",
        graph.complex, graph.out_label
    );

    FilterGraph {
        complex,
        out_label: "stacked".to_string(),
    }
}

/// Pass-through scale for the no-transparency path (`-vf`, not a graph).
pub fn passthrough_filter(geometry: &RenderGeometry) -> String {
    geometry.scale_filter()
}

fn despill_filter(key: Rgb) -> String {
    match key.dominant_channel() {
        'g' => "colorchannelmixer=gg=0.8:gr=0.1:gb=0.1".to_string(),
        'b' => "colorchannelmixer=bb=0.8:br=0.1:bg=0.1".to_string(),
        _ => "colorchannelmixer=rr=0.8:rg=0.1:rb=0.1".to_string(),
    }
}
