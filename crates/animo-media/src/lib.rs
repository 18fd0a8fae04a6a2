//! FFmpeg CLI wrapper for the compositing and encoding stages.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building (multiple inputs, filter graphs)
//! - Per-strategy filter-graph construction with format invariants
//! - Atomic output handling (temp path + rename, no partial files)
//! - FFprobe metadata

pub mod command;
pub mod encode;
pub mod error;
pub mod filtergraph;
pub mod fs_utils;
pub mod probe;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use encode::{
    chromakey_encode, mask_video_encode, opaque_encode, segmentation_encode, static_mask_encode,
    EncoderSettings, MaskVideoSpec,
};
pub use error::{MediaError, MediaResult};
pub use filtergraph::{ChromakeyTuning, FilterGraph, SegmentationTuning};
pub use fs_utils::move_file;
pub use probe::{probe_video, VideoInfo};
