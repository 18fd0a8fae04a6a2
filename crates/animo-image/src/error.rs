//! Error types for image operations.

use std::path::PathBuf;
use thiserror::Error;

pub type ImageResult<T> = Result<T, ImageError>;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to decode image {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode image {path}: {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    pub fn unreadable(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub fn unwritable(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Unwritable {
            path: path.into(),
            source,
        }
    }
}
