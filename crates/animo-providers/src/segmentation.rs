//! Segmentation provider calls (mask-only mode).

use std::path::PathBuf;

use serde_json::{json, Value};
use tracing::info;

use crate::client::{file_data_uri, ReplicateClient};
use crate::error::ProviderResult;

/// Provider-side segmentation model (`owner/name`).
const SEGMENTATION_MODEL: &str = "meta/sam-3-video";

/// One segmentation call over a generated video.
#[derive(Debug, Clone)]
pub struct SegmentationRequest {
    pub video: PathBuf,
    /// What to keep (subject description).
    pub subject: String,
    /// What to suppress, when known.
    pub negative_prompt: Option<String>,
}

/// Client for the external segmentation/matting provider.
#[derive(Debug, Clone)]
pub struct SegmentationClient {
    replicate: ReplicateClient,
}

impl SegmentationClient {
    pub fn new(replicate: ReplicateClient) -> Self {
        Self { replicate }
    }

    /// Submit the video for mask-only segmentation; returns the URL of
    /// a grayscale mask video.
    pub async fn segment(&self, request: &SegmentationRequest) -> ProviderResult<String> {
        let input = build_input(request)?;
        info!(subject = %request.subject, "segmenting generated video");
        self.replicate.run(SEGMENTATION_MODEL, input).await
    }
}

fn build_input(request: &SegmentationRequest) -> ProviderResult<Value> {
    let mut input = json!({
        "video": file_data_uri(&request.video)?,
        "prompt": request.subject,
        "mask_only": true,
    });
    if let Some(negative) = &request.negative_prompt {
        input["negative_prompt"] = Value::String(negative.clone());
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_is_mask_only() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("generated.mp4");
        std::fs::write(&video, b"video-bytes").unwrap();

        let input = build_input(&SegmentationRequest {
            video,
            subject: "the corgi".to_string(),
            negative_prompt: None,
        })
        .unwrap();

        assert_eq!(input["mask_only"], true);
        assert_eq!(input["prompt"], "the corgi");
        assert!(input["video"].as_str().unwrap().starts_with("data:video/mp4"));
        assert!(input.get("negative_prompt").is_none());
    }

    #[test]
    fn test_negative_prompt_included_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("generated.mp4");
        std::fs::write(&video, b"video-bytes").unwrap();

        let input = build_input(&SegmentationRequest {
            video,
            subject: "the robot".to_string(),
            negative_prompt: Some("background props".to_string()),
        })
        .unwrap();

        assert_eq!(input["negative_prompt"], "background props");
    }
}
