//! Shared data models for the animo pipeline.
//!
//! Pure types: the validated run request, generation-model capability
//! lookups, and encoder configuration. No I/O in this crate.

pub mod encoding;
pub mod model;
pub mod request;

pub use encoding::{AlphaWebmConfig, OpaqueWebmConfig, StackedMp4Config};
pub use model::{GenerationModel, ModelCapabilities};
pub use request::{
    AnimationRequest, ClipDuration, MotionIntensity, OutputContainer, OutputFormat, SubjectType,
    TargetSize, TransparencyMethod,
};
