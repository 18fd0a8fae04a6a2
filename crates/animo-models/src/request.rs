//! Run request and option definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::model::GenerationModel;

/// What the source image represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    /// Foreground subject, output should carry transparency.
    #[default]
    Character,
    /// Full-frame scene, no transparency.
    Background,
}

impl FromStr for SubjectType {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "character" => Ok(SubjectType::Character),
            "background" => Ok(SubjectType::Background),
            _ => Err(OptionParseError::new("type", s)),
        }
    }
}

/// How transparency should be extracted from the generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransparencyMethod {
    /// Pick a strategy from the source image's own signals.
    #[default]
    Auto,
    /// Bake a key color behind the subject and key it back out.
    Chromakey,
    /// AI segmentation mask over the generated video.
    Segmentation,
    /// Static alpha mask supplied by the caller.
    Mask,
    /// No transparency stage.
    None,
}

impl fmt::Display for TransparencyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransparencyMethod::Auto => "auto",
            TransparencyMethod::Chromakey => "chromakey",
            TransparencyMethod::Segmentation => "segmentation",
            TransparencyMethod::Mask => "mask",
            TransparencyMethod::None => "none",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransparencyMethod {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(TransparencyMethod::Auto),
            "chromakey" => Ok(TransparencyMethod::Chromakey),
            "segmentation" | "sam3" => Ok(TransparencyMethod::Segmentation),
            "mask" => Ok(TransparencyMethod::Mask),
            "none" => Ok(TransparencyMethod::None),
            _ => Err(OptionParseError::new("method", s)),
        }
    }
}

/// Motion intensity requested for generation.
///
/// Maps to the provider's guidance parameter; `Auto` leaves the
/// provider default in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotionIntensity {
    #[default]
    Auto,
    Subtle,
    Normal,
    Expressive,
    Dynamic,
}

impl MotionIntensity {
    /// Numeric intensity passed to providers that accept one.
    pub fn intensity(&self) -> f32 {
        match self {
            MotionIntensity::Auto => 0.5,
            MotionIntensity::Subtle => 0.3,
            MotionIntensity::Normal => 0.5,
            MotionIntensity::Expressive => 0.7,
            MotionIntensity::Dynamic => 0.85,
        }
    }

    /// Prompt hint for providers without a numeric intensity input.
    pub fn prompt_hint(&self) -> Option<&'static str> {
        match self {
            MotionIntensity::Auto | MotionIntensity::Normal => None,
            MotionIntensity::Subtle => Some("subtle, gentle motion"),
            MotionIntensity::Expressive => Some("expressive, lively motion"),
            MotionIntensity::Dynamic => Some("dynamic, energetic motion"),
        }
    }
}

impl FromStr for MotionIntensity {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(MotionIntensity::Auto),
            "subtle" => Ok(MotionIntensity::Subtle),
            "normal" => Ok(MotionIntensity::Normal),
            "expressive" => Ok(MotionIntensity::Expressive),
            "dynamic" => Ok(MotionIntensity::Dynamic),
            _ => Err(OptionParseError::new("motion", s)),
        }
    }
}

/// Clip duration in seconds. Providers accept 5 or 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ClipDuration {
    #[default]
    Five,
    Ten,
}

impl ClipDuration {
    pub fn seconds(&self) -> u32 {
        match self {
            ClipDuration::Five => 5,
            ClipDuration::Ten => 10,
        }
    }

    pub fn from_seconds(secs: u32) -> Result<Self, OptionParseError> {
        match secs {
            5 => Ok(ClipDuration::Five),
            10 => Ok(ClipDuration::Ten),
            _ => Err(OptionParseError::new("duration", secs.to_string())),
        }
    }
}

/// A single output container kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputContainer {
    /// VP9 WebM; carries alpha in a 4-channel pixel format.
    Webm,
    /// H.264 MP4; alpha re-expressed as a stacked double-height frame.
    Mp4,
}

impl OutputContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputContainer::Webm => "webm",
            OutputContainer::Mp4 => "mp4",
        }
    }
}

/// Requested output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Webm,
    Mp4,
    Both,
}

impl OutputFormat {
    /// The concrete containers this selection expands to, in encode order.
    pub fn containers(&self) -> &'static [OutputContainer] {
        match self {
            OutputFormat::Webm => &[OutputContainer::Webm],
            OutputFormat::Mp4 => &[OutputContainer::Mp4],
            OutputFormat::Both => &[OutputContainer::Webm, OutputContainer::Mp4],
        }
    }
}

impl FromStr for OutputFormat {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webm" => Ok(OutputFormat::Webm),
            "mp4" => Ok(OutputFormat::Mp4),
            "both" => Ok(OutputFormat::Both),
            _ => Err(OptionParseError::new("format", s)),
        }
    }
}

/// Explicit output size, `WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for TargetSize {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| OptionParseError::new("size", s))?;
        let width = w.trim().parse().map_err(|_| OptionParseError::new("size", s))?;
        let height = h.trim().parse().map_err(|_| OptionParseError::new("size", s))?;
        if width == 0 || height == 0 {
            return Err(OptionParseError::new("size", s));
        }
        Ok(TargetSize { width, height })
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Error)]
#[error("invalid value for --{flag}: {value}")]
pub struct OptionParseError {
    flag: &'static str,
    value: String,
}

impl OptionParseError {
    pub(crate) fn new(flag: &'static str, value: impl Into<String>) -> Self {
        Self {
            flag,
            value: value.into(),
        }
    }
}

/// The validated set of run parameters.
///
/// Exactly one transparency strategy is resolved from this before any
/// external call is made; the resolver consumes `method` and never
/// re-branches on it downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationRequest {
    pub image: PathBuf,
    pub prompt: String,
    pub subject_type: SubjectType,
    pub method: TransparencyMethod,
    pub model: GenerationModel,
    /// Subject description for segmentation (what to keep).
    pub subject: Option<String>,
    pub motion: MotionIntensity,
    pub duration: ClipDuration,
    pub seamless_loop: bool,
    /// Explicit output size; defaults to the source image's size capped
    /// for mobile when absent.
    pub size: Option<TargetSize>,
    /// Static alpha mask image; forces the mask strategy.
    pub mask: Option<PathBuf>,
    pub format: OutputFormat,
    /// Output path for the first container; siblings derive from it.
    pub output: Option<PathBuf>,
}
