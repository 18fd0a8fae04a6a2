//! Run outcome surfaced to callers.

use std::path::PathBuf;

use animo_models::OutputContainer;

/// One produced output file.
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub container: OutputContainer,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The strategy the run executed ("chromakey", "segmentation",
    /// "mask", "none").
    pub strategy: &'static str,
    pub outputs: Vec<OutputFile>,
    /// Non-fatal conditions collected across the run.
    pub warnings: Vec<String>,
}
