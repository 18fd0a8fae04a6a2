//! Encode-stage assembly: one [`FfmpegCommand`] per output container.
//!
//! The webm and mp4 variants of a run are built independently from the
//! same composited signal; failure of one never corrupts the other.

use std::path::Path;

use animo_image::color::Rgb;
use animo_image::geometry::RenderGeometry;
use animo_models::{AlphaWebmConfig, OpaqueWebmConfig, OutputContainer, StackedMp4Config};

use crate::command::FfmpegCommand;
use crate::filtergraph::{
    chromakey_graph, mask_video_filter, passthrough_filter, segmentation_graph, stack_alpha,
    static_mask_graph, ChromakeyTuning, FilterGraph, SegmentationTuning, MASK_VIDEO_FPS,
};

/// Encoder and filter tunables for a run.
#[derive(Debug, Clone, Default)]
pub struct EncoderSettings {
    pub alpha_webm: AlphaWebmConfig,
    pub opaque_webm: OpaqueWebmConfig,
    pub mp4: StackedMp4Config,
    pub chromakey: ChromakeyTuning,
    pub segmentation: SegmentationTuning,
}

/// Parameters for synthesizing a mask video from a still image.
#[derive(Debug, Clone, Copy)]
pub struct MaskVideoSpec {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

/// Chromakey strategy encode for one container.
pub fn chromakey_encode(
    video: &Path,
    key: Rgb,
    geometry: &RenderGeometry,
    container: OutputContainer,
    settings: &EncoderSettings,
    output: &Path,
) -> FfmpegCommand {
    let graph = chromakey_graph(key, &settings.chromakey, geometry);
    alpha_graph_encode(FfmpegCommand::new(output).input(video), graph, container, settings)
}

/// Segmentation strategy encode for one container.
///
/// `mask_video` is the provider's grayscale mask output.
pub fn segmentation_encode(
    color_video: &Path,
    mask_video: &Path,
    geometry: &RenderGeometry,
    container: OutputContainer,
    settings: &EncoderSettings,
    output: &Path,
) -> FfmpegCommand {
    let graph = segmentation_graph(&settings.segmentation, geometry);
    let cmd = FfmpegCommand::new(output).input(color_video).input(mask_video);
    alpha_graph_encode(cmd, graph, container, settings)
}

/// Mask-video pre-pass: loop the still mask into a video of the clip's
/// duration, alpha expressed as luminance.
pub fn mask_video_encode(mask_png: &Path, spec: MaskVideoSpec, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input_with_args(["-loop", "1"], mask_png)
        .video_filter(mask_video_filter(spec.width, spec.height))
        .duration(spec.duration_secs)
        .frame_rate(MASK_VIDEO_FPS)
        .output_args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-an"])
}

/// Static-mask strategy merge pass for one container. Output dimensions
/// follow the mask, not the generated video.
pub fn static_mask_encode(
    color_video: &Path,
    mask_video: &Path,
    mask_width: u32,
    mask_height: u32,
    container: OutputContainer,
    settings: &EncoderSettings,
    output: &Path,
) -> FfmpegCommand {
    let graph = static_mask_graph(mask_width, mask_height);
    let cmd = FfmpegCommand::new(output)
        .input(color_video)
        .input(mask_video);
    alpha_graph_encode(cmd, graph, container, settings).shortest()
}

/// No-transparency encode for one container.
pub fn opaque_encode(
    video: &Path,
    geometry: &RenderGeometry,
    container: OutputContainer,
    settings: &EncoderSettings,
    output: &Path,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(output)
        .input(video)
        .video_filter(passthrough_filter(geometry));
    match container {
        OutputContainer::Webm => cmd.output_args(settings.opaque_webm.to_output_args()),
        OutputContainer::Mp4 => cmd.output_args(settings.mp4.to_output_args()),
    }
}

/// Attach an alpha-producing graph and the container-appropriate encode
/// arguments. The mp4 variant re-packs the alpha as a stacked frame
/// because H.264 has no alpha plane.
fn alpha_graph_encode(
    cmd: FfmpegCommand,
    graph: FilterGraph,
    container: OutputContainer,
    settings: &EncoderSettings,
) -> FfmpegCommand {
    match container {
        OutputContainer::Webm => cmd
            .filter_complex(graph.complex().to_string())
            .map(graph.map_label())
            .output_args(settings.alpha_webm.to_output_args()),
        OutputContainer::Mp4 => {
            let stacked = stack_alpha(graph);
            cmd.filter_complex(stacked.complex().to_string())
                .map(stacked.map_label())
                .output_args(settings.mp4.to_output_args())
        }
    }
}
