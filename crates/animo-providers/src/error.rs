//! Provider error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} environment variable is not set")]
    MissingToken(&'static str),

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the request: {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("{model} reported failure: {message}")]
    Failed { model: String, message: String },

    #[error("provider returned a malformed response: {0}")]
    Malformed(String),

    #[error("provider did not complete within {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn failed(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Whether this is the distinguishable timeout condition.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }
}
