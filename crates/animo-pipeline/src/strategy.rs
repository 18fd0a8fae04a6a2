//! Transparency strategy selection.
//!
//! Resolution happens exactly once, up front: the rest of the pipeline
//! branches on the returned tagged strategy, never on the raw request
//! flags. Priority order: explicit mask, background subject type,
//! forced method, then the auto heuristics.

use animo_image::analyze::{DEFAULT_BORDER_TOLERANCE, DEFAULT_OPACITY_THRESHOLD};
use animo_image::color::{find_key_color, Rgb};
use animo_image::{prepare_mask, PreparedMask, SourceImage};
use animo_models::{AnimationRequest, SubjectType, TransparencyMethod};
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};

/// Subject description used when auto-resolution lands on segmentation
/// and the caller supplied none. Degrades mask quality; warned about.
const FALLBACK_SUBJECT: &str = "the main subject in the foreground";

/// Selector tunables.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Alpha value at or above which a pixel counts as foreground.
    pub opacity_threshold: u8,
    /// Border-sample clustering tolerance (RGB distance).
    pub border_tolerance: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            opacity_threshold: DEFAULT_OPACITY_THRESHOLD,
            border_tolerance: DEFAULT_BORDER_TOLERANCE,
        }
    }
}

/// Where the keyable background comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundSource {
    /// Source has an alpha channel; bake the subject onto the key color.
    AlphaChannel,
    /// Opaque photo on a detected solid background; rewrite
    /// near-background pixels to the key color before generation.
    DetectedSolid { color: Rgb },
}

#[derive(Debug, Clone)]
pub struct ChromakeyPlan {
    pub key_color: Rgb,
    pub background: BackgroundSource,
}

#[derive(Debug, Clone)]
pub struct SegmentationPlan {
    pub subject: String,
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MaskPlan {
    /// Decoded, RGBA-normalized mask. Carried through so the runner
    /// never decodes the file a second time.
    pub mask: PreparedMask,
}

/// The one concrete strategy a run executes.
#[derive(Debug, Clone)]
pub enum ResolvedStrategy {
    Chromakey(ChromakeyPlan),
    Segmentation(SegmentationPlan),
    Mask(MaskPlan),
    None,
}

impl ResolvedStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            ResolvedStrategy::Chromakey(_) => "chromakey",
            ResolvedStrategy::Segmentation(_) => "segmentation",
            ResolvedStrategy::Mask(_) => "mask",
            ResolvedStrategy::None => "none",
        }
    }
}

/// Result of strategy resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub strategy: ResolvedStrategy,
    /// Loop request after capability checking; downgraded to false with
    /// a warning when the model cannot constrain the end frame.
    pub seamless_loop: bool,
    /// Non-fatal conditions surfaced to the caller.
    pub warnings: Vec<String>,
}

/// Resolve the request to exactly one strategy with its parameters.
pub fn resolve(
    request: &AnimationRequest,
    source: &SourceImage,
    config: &StrategyConfig,
) -> PipelineResult<Resolution> {
    let mut warnings = Vec::new();

    let seamless_loop = check_loop(request, &mut warnings);
    let strategy = pick_strategy(request, source, config, &mut warnings)?;

    info!(strategy = strategy.label(), "resolved transparency strategy");
    Ok(Resolution {
        strategy,
        seamless_loop,
        warnings,
    })
}

fn check_loop(request: &AnimationRequest, warnings: &mut Vec<String>) -> bool {
    if !request.seamless_loop {
        return false;
    }
    let caps = request.model.capabilities();
    if caps.supports_end_frame {
        true
    } else {
        let msg = format!(
            "{} does not support an end-frame constraint; ignoring --loop",
            request.model
        );
        warn!("{msg}");
        warnings.push(msg);
        false
    }
}

fn pick_strategy(
    request: &AnimationRequest,
    source: &SourceImage,
    config: &StrategyConfig,
    warnings: &mut Vec<String>,
) -> PipelineResult<ResolvedStrategy> {
    // An explicit mask wins over everything, including --type background.
    if let Some(mask_path) = &request.mask {
        let mask = prepare_mask(mask_path)?;
        if mask.flat_alpha {
            warnings.push(format!(
                "mask {} has flat alpha; output will have no transparency variation",
                mask_path.display()
            ));
        }
        return Ok(ResolvedStrategy::Mask(MaskPlan { mask }));
    }

    if request.subject_type == SubjectType::Background {
        return Ok(ResolvedStrategy::None);
    }

    match request.method {
        TransparencyMethod::Mask => Err(PipelineError::configuration(
            "--method mask requires --mask <path>",
        )),
        TransparencyMethod::None => Ok(ResolvedStrategy::None),
        TransparencyMethod::Chromakey => {
            chromakey_plan(source, config, warnings).map(ResolvedStrategy::Chromakey).ok_or_else(|| {
                PipelineError::configuration(
                    "chromakey forced, but the image has no alpha channel and no detectable solid background",
                )
            })
        }
        TransparencyMethod::Segmentation => {
            // Forced segmentation insists on a usable subject.
            let subject = request
                .subject
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(PipelineError::MissingSubject)?;
            Ok(ResolvedStrategy::Segmentation(SegmentationPlan {
                subject: subject.to_string(),
                negative_prompt: None,
            }))
        }
        TransparencyMethod::Auto => {
            if let Some(plan) = chromakey_plan(source, config, warnings) {
                return Ok(ResolvedStrategy::Chromakey(plan));
            }
            // Complex background: fall through to segmentation.
            let subject = match request
                .subject
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                Some(s) => s.to_string(),
                None => {
                    let msg = format!(
                        "no --subject given; segmenting with a generic description ({FALLBACK_SUBJECT:?}), mask quality may degrade"
                    );
                    warn!("{msg}");
                    warnings.push(msg);
                    FALLBACK_SUBJECT.to_string()
                }
            };
            Ok(ResolvedStrategy::Segmentation(SegmentationPlan {
                subject,
                negative_prompt: None,
            }))
        }
    }
}

/// Build a chromakey plan when the image structurally supports one.
fn chromakey_plan(
    source: &SourceImage,
    config: &StrategyConfig,
    warnings: &mut Vec<String>,
) -> Option<ChromakeyPlan> {
    if source.has_alpha {
        let foreground = source.foreground_pixels(config.opacity_threshold, None);
        if foreground.is_empty() {
            warnings.push("image alpha has no opaque pixels; key color defaults to the first palette entry".to_string());
        }
        return Some(ChromakeyPlan {
            key_color: find_key_color(&foreground),
            background: BackgroundSource::AlphaChannel,
        });
    }

    let background = source.detect_solid_background(config.border_tolerance)?;
    let foreground =
        source.foreground_pixels(config.opacity_threshold, Some((background, config.border_tolerance)));
    Some(ChromakeyPlan {
        key_color: find_key_color(&foreground),
        background: BackgroundSource::DetectedSolid { color: background },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use animo_image::KEY_CANDIDATES;
    use animo_models::{
        ClipDuration, GenerationModel, MotionIntensity, OutputFormat, TransparencyMethod,
    };
    use image::{Rgba, RgbaImage};

    fn request() -> AnimationRequest {
        AnimationRequest {
            image: "character.png".into(),
            prompt: "waves hello".to_string(),
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

    fn rgba_character() -> SourceImage {
        let mut img = RgbaImage::from_pixel(32, 32, Rgba([0, 0, 0, 0]));
        for y in 8..24 {
            for x in 8..24 {
                img.put_pixel(x, y, Rgba([120, 80, 40, 255]));
            }
        }
        SourceImage::from_rgba("character.png", img, true)
    }

    fn white_backdrop_photo() -> SourceImage {
        let mut img = RgbaImage::from_pixel(32, 32, Rgba([252, 252, 252, 255]));
        for y in 10..22 {
            for x in 10..22 {
                img.put_pixel(x, y, Rgba([60, 90, 130, 255]));
            }
        }
        SourceImage::from_rgba("photo.jpg", img, false)
    }

    fn noisy_photo() -> SourceImage {
        let mut img = RgbaImage::new(32, 32);
        for y in 0..32 {
            for x in 0..32 {
                let v = ((x * 13 + y * 29) % 256) as u8;
                img.put_pixel(x, y, Rgba([v, 255 - v, (v / 2) + 100, 255]));
            }
        }
        SourceImage::from_rgba("busy.jpg", img, false)
    }

    #[test]
    fn test_auto_with_alpha_resolves_to_chromakey() {
        let res = resolve(&request(), &rgba_character(), &StrategyConfig::default()).unwrap();
        match res.strategy {
            ResolvedStrategy::Chromakey(plan) => {
                assert_eq!(plan.background, BackgroundSource::AlphaChannel);
                assert!(KEY_CANDIDATES.contains(&plan.key_color));
            }
            other => panic!("expected chromakey, got {}", other.label()),
        }
    }

    #[test]
    fn test_forced_segmentation_without_subject_fails() {
        let mut req = request();
        req.method = TransparencyMethod::Segmentation;
        let err = resolve(&req, &rgba_character(), &StrategyConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSubject));
    }

    #[test]
    fn test_forced_segmentation_with_subject_honored() {
        let mut req = request();
        req.method = TransparencyMethod::Segmentation;
        req.subject = Some("the knight".to_string());
        let res = resolve(&req, &rgba_character(), &StrategyConfig::default()).unwrap();
        match res.strategy {
            ResolvedStrategy::Segmentation(plan) => assert_eq!(plan.subject, "the knight"),
            other => panic!("expected segmentation, got {}", other.label()),
        }
    }

    #[test]
    fn test_solid_backdrop_photo_keys_from_palette() {
        let res = resolve(&request(), &white_backdrop_photo(), &StrategyConfig::default()).unwrap();
        match res.strategy {
            ResolvedStrategy::Chromakey(plan) => {
                assert!(KEY_CANDIDATES.contains(&plan.key_color));
                match plan.background {
                    BackgroundSource::DetectedSolid { color } => {
                        assert!(color.distance(&Rgb::new(255, 255, 255)) < 16.0);
                    }
                    other => panic!("expected detected solid background, got {other:?}"),
                }
            }
            other => panic!("expected chromakey, got {}", other.label()),
        }
    }

    #[test]
    fn test_complex_photo_falls_back_to_segmentation_with_warning() {
        let res = resolve(&request(), &noisy_photo(), &StrategyConfig::default()).unwrap();
        assert!(matches!(res.strategy, ResolvedStrategy::Segmentation(_)));
        assert!(res.warnings.iter().any(|w| w.contains("generic")));
    }

    #[test]
    fn test_background_type_forces_none() {
        let mut req = request();
        req.subject_type = SubjectType::Background;
        let res = resolve(&req, &rgba_character(), &StrategyConfig::default()).unwrap();
        assert!(matches!(res.strategy, ResolvedStrategy::None));
    }

    #[test]
    fn test_forced_chromakey_on_complex_opaque_image_fails() {
        let mut req = request();
        req.method = TransparencyMethod::Chromakey;
        let err = resolve(&req, &noisy_photo(), &StrategyConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_forced_mask_method_without_path_fails() {
        let mut req = request();
        req.method = TransparencyMethod::Mask;
        let err = resolve(&req, &rgba_character(), &StrategyConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_loop_downgraded_for_model_without_end_frame() {
        let mut req = request();
        req.seamless_loop = true;
        req.model = GenerationModel::Minimax;
        let res = resolve(&req, &rgba_character(), &StrategyConfig::default()).unwrap();
        assert!(!res.seamless_loop);
        assert!(res.warnings.iter().any(|w| w.contains("--loop")));
    }

    #[test]
    fn test_loop_kept_for_capable_model() {
        let mut req = request();
        req.seamless_loop = true;
        let res = resolve(&req, &rgba_character(), &StrategyConfig::default()).unwrap();
        assert!(res.seamless_loop);
        assert!(res.warnings.is_empty());
    }

    #[test]
    fn test_mask_overrides_background_type() {
        let dir = tempfile_dir();
        let mask_path = dir.path().join("mask.png");
        let mut mask = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
        mask.put_pixel(0, 0, Rgba([255, 255, 255, 0]));
        mask.save(&mask_path).unwrap();

        let mut req = request();
        req.subject_type = SubjectType::Background;
        req.mask = Some(mask_path);
        let res = resolve(&req, &rgba_character(), &StrategyConfig::default()).unwrap();
        assert!(matches!(res.strategy, ResolvedStrategy::Mask(_)));
    }

    #[test]
    fn test_flat_mask_warns_but_resolves() {
        let dir = tempfile_dir();
        let mask_path = dir.path().join("logo.png");
        RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]))
            .save(&mask_path)
            .unwrap();

        let mut req = request();
        req.mask = Some(mask_path);
        let res = resolve(&req, &rgba_character(), &StrategyConfig::default()).unwrap();
        match &res.strategy {
            ResolvedStrategy::Mask(plan) => assert!(plan.mask.flat_alpha),
            other => panic!("expected mask, got {}", other.label()),
        }
        assert!(res.warnings.iter().any(|w| w.contains("flat alpha")));
    }

    #[test]
    fn test_mask_plan_carries_decoded_mask() {
        let dir = tempfile_dir();
        let mask_path = dir.path().join("mask.png");
        let mut mask = RgbaImage::from_pixel(20, 14, Rgba([255, 255, 255, 255]));
        mask.put_pixel(0, 0, Rgba([255, 255, 255, 0]));
        mask.save(&mask_path).unwrap();

        let mut req = request();
        req.mask = Some(mask_path.clone());
        let res = resolve(&req, &rgba_character(), &StrategyConfig::default()).unwrap();
        match &res.strategy {
            ResolvedStrategy::Mask(plan) => {
                assert_eq!((plan.mask.width, plan.mask.height), (20, 14));
                assert!(!plan.mask.flat_alpha);
                // The plan can write the normalized mask without going
                // back to the original file.
                let copy = dir.path().join("copy.png");
                plan.mask.save_png(&copy).unwrap();
                assert!(copy.exists());
            }
            other => panic!("expected mask, got {}", other.label()),
        }
    }

    fn tempfile_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }
}
