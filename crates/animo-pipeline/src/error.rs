//! Pipeline error taxonomy.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid flag combination or structurally impossible request,
    /// detected before any external call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Segmentation was requested without a usable subject description.
    #[error("segmentation requires a subject description (--subject)")]
    MissingSubject,

    #[error(transparent)]
    Provider(#[from] animo_providers::ProviderError),

    #[error(transparent)]
    Encode(#[from] animo_media::MediaError),

    #[error(transparent)]
    Format(#[from] animo_image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the run failed on the distinguishable provider-timeout
    /// condition.
    pub fn is_provider_timeout(&self) -> bool {
        matches!(self, PipelineError::Provider(e) if e.is_timeout())
    }
}
