//! End-to-end run orchestration.
//!
//! The strategy selector turns the raw request plus source-image signals
//! into one tagged strategy, computed once before any external call; the
//! runner then walks the linear stage sequence
//! Validated → Generating → Segmenting? → Compositing → Encoding → Done.

pub mod error;
pub mod report;
pub mod run;
pub mod strategy;

pub use error::{PipelineError, PipelineResult};
pub use report::{OutputFile, RunReport};
pub use run::{Pipeline, PipelineConfig};
pub use strategy::{
    resolve, BackgroundSource, ChromakeyPlan, MaskPlan, Resolution, ResolvedStrategy,
    SegmentationPlan, StrategyConfig,
};
