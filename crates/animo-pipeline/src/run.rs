//! The run orchestrator.
//!
//! A run is a linear stage sequence; every intermediate artifact lives
//! in a per-run scratch directory that is removed on success and
//! failure alike unless the caller asked to keep it. Final outputs are
//! written by the encoder's scratch-and-rename path, so a failed run
//! never leaves a partial output file behind.

use std::path::{Path, PathBuf};
use std::time::Duration;

use animo_image::{bake_onto, rebake_background, save_rgb_png, SourceImage};
use animo_image::geometry::RenderGeometry;
use animo_media::{
    chromakey_encode, mask_video_encode, opaque_encode, probe_video, segmentation_encode,
    static_mask_encode, EncoderSettings, FfmpegRunner, MaskVideoSpec,
};
use animo_models::{AnimationRequest, OutputContainer};
use animo_providers::{
    download_to, GenerationClient, GenerationRequest, ReplicateClient, SegmentationClient,
    SegmentationRequest,
};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::report::{OutputFile, RunReport};
use crate::strategy::{resolve, BackgroundSource, ResolvedStrategy, StrategyConfig};

const DEFAULT_ENCODE_TIMEOUT: Duration = Duration::from_secs(600);

/// Run-level tunables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub strategy: StrategyConfig,
    pub encoder: EncoderSettings,
    /// Wall-clock cap on each FFmpeg invocation.
    pub encode_timeout: Duration,
    /// Keep the scratch directory after the run (debugging).
    pub keep_intermediates: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            encoder: EncoderSettings::default(),
            encode_timeout: DEFAULT_ENCODE_TIMEOUT,
            keep_intermediates: false,
        }
    }
}

/// End-to-end animation pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    replicate: ReplicateClient,
}

impl Pipeline {
    pub fn new(replicate: ReplicateClient) -> Self {
        Self::with_config(replicate, PipelineConfig::default())
    }

    pub fn with_config(replicate: ReplicateClient, config: PipelineConfig) -> Self {
        Self { config, replicate }
    }

    /// Execute one animation run.
    pub async fn run(&self, request: &AnimationRequest) -> PipelineResult<RunReport> {
        let source = SourceImage::load(&request.image)?;
        let resolution = resolve(request, &source, &self.config.strategy)?;
        let mut warnings = resolution.warnings;
        let strategy = resolution.strategy;
        let geometry = RenderGeometry::plan(
            source.width,
            source.height,
            request.size.map(|s| (s.width, s.height)),
        );
        info!(
            stage = "validated",
            strategy = strategy.label(),
            width = geometry.crop_width,
            height = geometry.crop_height,
            "run validated"
        );

        // The guard owns the scratch directory and removes it on drop,
        // on failure paths included. Keeping intermediates detaches the
        // directory up front so a failed run still leaves them behind.
        let scratch = tempfile::Builder::new().prefix("animo-").tempdir()?;
        let (work, _scratch_guard) = if self.config.keep_intermediates {
            let kept = scratch.keep();
            let msg = format!("intermediates kept in {}", kept.display());
            info!("{msg}");
            warnings.push(msg);
            (kept, None)
        } else {
            (scratch.path().to_path_buf(), Some(scratch))
        };

        let start_frame = self.prepare_start_frame(&source, &strategy, &work)?;
        let generated = self
            .generate(request, &strategy, resolution.seamless_loop, &start_frame, &work)
            .await?;

        // The provider decides the real duration and framing; the mask
        // pre-pass and the logs follow what actually came back.
        let generated_info = probe_video(&generated).await?;
        info!(
            stage = "generated",
            width = generated_info.width,
            height = generated_info.height,
            duration = generated_info.duration,
            "downloaded generated video"
        );
        let clip_duration = if generated_info.duration > 0.0 {
            generated_info.duration
        } else {
            request.duration.seconds() as f64
        };

        let mask_video = self
            .prepare_mask_video(&strategy, &generated, clip_duration, &work)
            .await?;

        let runner = FfmpegRunner::new().with_timeout(self.config.encode_timeout);
        let mut outputs = Vec::new();
        for (container, output_path) in derive_outputs(request) {
            info!(stage = "encoding", output = %output_path.display(), "encoding output");
            // mask_video is Some for exactly the strategies that read it.
            let cmd = match (&strategy, mask_video.as_deref()) {
                (ResolvedStrategy::Chromakey(plan), _) => chromakey_encode(
                    &generated,
                    plan.key_color,
                    &geometry,
                    container,
                    &self.config.encoder,
                    &output_path,
                ),
                (ResolvedStrategy::Segmentation(_), Some(mask)) => segmentation_encode(
                    &generated,
                    mask,
                    &geometry,
                    container,
                    &self.config.encoder,
                    &output_path,
                ),
                (ResolvedStrategy::Mask(plan), Some(mask)) => static_mask_encode(
                    &generated,
                    mask,
                    plan.mask.width,
                    plan.mask.height,
                    container,
                    &self.config.encoder,
                    &output_path,
                ),
                (ResolvedStrategy::None, _) => opaque_encode(
                    &generated,
                    &geometry,
                    container,
                    &self.config.encoder,
                    &output_path,
                ),
                (_, None) => {
                    return Err(PipelineError::configuration(
                        "internal: mask video missing for a mask-based strategy",
                    ))
                }
            };
            runner.run(&cmd).await?;
            let bytes = std::fs::metadata(&output_path)?.len();
            outputs.push(OutputFile {
                path: output_path,
                bytes,
                container,
            });
        }

        info!(stage = "done", outputs = outputs.len(), "run complete");
        Ok(RunReport {
            strategy: strategy.label(),
            outputs,
            warnings,
        })
    }

    /// Produce the frame handed to the generation provider. Chromakey
    /// runs bake their key color into it; every other strategy sends
    /// the source image untouched.
    fn prepare_start_frame(
        &self,
        source: &SourceImage,
        strategy: &ResolvedStrategy,
        work: &Path,
    ) -> PipelineResult<PathBuf> {
        let ResolvedStrategy::Chromakey(plan) = strategy else {
            return Ok(source.path.clone());
        };

        let baked = match plan.background {
            BackgroundSource::AlphaChannel => bake_onto(source, plan.key_color),
            BackgroundSource::DetectedSolid { color } => rebake_background(
                source,
                color,
                self.config.strategy.border_tolerance,
                plan.key_color,
            ),
        };
        let start = work.join("start.png");
        save_rgb_png(&baked, &start)?;
        info!(
            stage = "baked",
            key = %plan.key_color.to_ffmpeg_hex(),
            "baked start frame"
        );
        Ok(start)
    }

    async fn generate(
        &self,
        request: &AnimationRequest,
        strategy: &ResolvedStrategy,
        seamless_loop: bool,
        start_frame: &Path,
        work: &Path,
    ) -> PipelineResult<PathBuf> {
        let (start, end) = animo_providers::generation::loop_frames(start_frame, seamless_loop);
        let client = GenerationClient::new(self.replicate.clone(), request.model);
        info!(stage = "generating", strategy = strategy.label(), "requesting generation");
        let url = client
            .generate(&GenerationRequest {
                prompt: request.prompt.clone(),
                start_frame: start,
                end_frame: end,
                duration_secs: request.duration.seconds(),
                intensity: request.motion.intensity(),
                motion_hint: request.motion.prompt_hint().map(String::from),
            })
            .await?;

        let generated = work.join("generated.mp4");
        download_to(self.replicate.http(), &url, &generated).await?;
        Ok(generated)
    }

    /// Produce the mask video for strategies that composite against
    /// one. Segmentation asks the provider; the static-mask strategy
    /// synthesizes it locally from the mask still.
    async fn prepare_mask_video(
        &self,
        strategy: &ResolvedStrategy,
        generated: &Path,
        clip_duration: f64,
        work: &Path,
    ) -> PipelineResult<Option<PathBuf>> {
        match strategy {
            ResolvedStrategy::Segmentation(plan) => {
                info!(stage = "segmenting", subject = %plan.subject, "requesting mask video");
                let client = SegmentationClient::new(self.replicate.clone());
                let url = client
                    .segment(&SegmentationRequest {
                        video: generated.to_path_buf(),
                        subject: plan.subject.clone(),
                        negative_prompt: plan.negative_prompt.clone(),
                    })
                    .await?;
                let mask = work.join("mask.mp4");
                download_to(self.replicate.http(), &url, &mask).await?;
                Ok(Some(mask))
            }
            ResolvedStrategy::Mask(plan) => {
                let mask_png = work.join("mask_rgba.png");
                plan.mask.save_png(&mask_png)?;

                let mask = work.join("mask.mp4");
                let cmd = mask_video_encode(
                    &mask_png,
                    MaskVideoSpec {
                        width: plan.mask.width,
                        height: plan.mask.height,
                        duration_secs: clip_duration,
                    },
                    &mask,
                );
                FfmpegRunner::new()
                    .with_timeout(self.config.encode_timeout)
                    .run(&cmd)
                    .await?;
                Ok(Some(mask))
            }
            _ => Ok(None),
        }
    }
}

/// Map the format selection to concrete output paths.
///
/// The first container takes the explicit `--output` when given,
/// otherwise `<input stem>-animated.<ext>` next to the input; further
/// containers are extension siblings of the first.
fn derive_outputs(request: &AnimationRequest) -> Vec<(OutputContainer, PathBuf)> {
    let base = match &request.output {
        Some(path) => path.clone(),
        None => {
            let stem = request
                .image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "animation".to_string());
            request.image.with_file_name(format!("{stem}-animated"))
        }
    };
    request
        .format
        .containers()
        .iter()
        .map(|c| (*c, base.with_extension(c.extension())))
        .collect()
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animo_models::{
        ClipDuration, GenerationModel, MotionIntensity, OutputFormat, SubjectType, TargetSize,
        TransparencyMethod,
    };
    use image::{Rgba, RgbaImage};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> AnimationRequest {
        AnimationRequest {
            image: PathBuf::from("/assets/mascot.png"),
            prompt: "waves".to_string(),
            subject_type: SubjectType::Character,
            method: TransparencyMethod::Auto,
            model: GenerationModel::Kling,
            subject: None,
            motion: MotionIntensity::Auto,
            duration: ClipDuration::Five,
            seamless_loop: false,
            size: None,
            mask: None,
            format: OutputFormat::Webm,
            output: None,
        }
    }

    #[test]
    fn test_default_output_derives_from_input_stem() {
        let outs = derive_outputs(&request());
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].1, PathBuf::from("/assets/mascot-animated.webm"));
    }

    #[test]
    fn test_both_formats_are_extension_siblings() {
        let mut req = request();
        req.format = OutputFormat::Both;
        req.output = Some(PathBuf::from("/out/clip.webm"));
        let outs = derive_outputs(&req);
        assert_eq!(outs[0].1, PathBuf::from("/out/clip.webm"));
        assert_eq!(outs[1].1, PathBuf::from("/out/clip.mp4"));
    }

    #[test]
    fn test_explicit_output_extension_follows_container() {
        let mut req = request();
        req.format = OutputFormat::Mp4;
        req.output = Some(PathBuf::from("/out/clip.webm"));
        let outs = derive_outputs(&req);
        assert_eq!(outs[0].1, PathBuf::from("/out/clip.mp4"));
    }

    #[test]
    fn test_geometry_honors_explicit_size() {
        let size: TargetSize = "500x333".parse().unwrap();
        let g = RenderGeometry::plan(2000, 2000, Some((size.width, size.height)));
        assert_eq!(g.crop_width, 500);
        assert_eq!(g.crop_height, 334);
    }

    fn scratch_dirs() -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("animo-"))
            })
            .collect();
        dirs.sort();
        dirs
    }

    #[tokio::test]
    async fn test_stuck_provider_times_out_and_cleans_scratch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/kwaivgi/kling-v2.1/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p9", "status": "starting"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p9", "status": "processing"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("mascot.png");
        let mut img = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 0]));
        for y in 4..12 {
            for x in 4..12 {
                img.put_pixel(x, y, Rgba([120, 80, 40, 255]));
            }
        }
        img.save(&image_path).unwrap();

        let before = scratch_dirs();

        let replicate = ReplicateClient::new("test-token")
            .with_base_url(server.uri())
            .with_poll_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_millis(200));
        let pipeline = Pipeline::new(replicate);

        let mut req = request();
        req.image = image_path;
        let err = pipeline.run(&req).await.unwrap_err();

        assert!(err.is_provider_timeout(), "expected timeout, got {err:?}");
        // The scratch directory (with the baked start frame) is gone.
        assert_eq!(scratch_dirs(), before);
    }
}
