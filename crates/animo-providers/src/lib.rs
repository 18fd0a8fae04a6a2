//! Clients for the external AI services.
//!
//! Both the video-generation and segmentation providers sit behind the
//! same submit/poll/download surface. Calls are single-attempt: a
//! terminal provider failure is surfaced as-is, never retried here.

pub mod client;
pub mod download;
pub mod error;
pub mod generation;
pub mod segmentation;

pub use client::{file_data_uri, ReplicateClient, API_TOKEN_ENV};
pub use download::download_to;
pub use error::{ProviderError, ProviderResult};
pub use generation::{GenerationClient, GenerationRequest};
pub use segmentation::{SegmentationClient, SegmentationRequest};
