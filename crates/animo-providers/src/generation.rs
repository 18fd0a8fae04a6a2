//! Video-generation provider calls.

use std::path::{Path, PathBuf};

use animo_models::GenerationModel;
use serde_json::{json, Value};
use tracing::info;

use crate::client::{file_data_uri, ReplicateClient};
use crate::error::ProviderResult;

const NEGATIVE_PROMPT: &str = "blurry, distorted, low quality, watermark";

/// One generation call: animate `start_frame` according to `prompt`.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub start_frame: PathBuf,
    /// When set, the provider is constrained to end on this frame
    /// (seamless loop). Only meaningful for models whose capability
    /// table says `supports_end_frame`.
    pub end_frame: Option<PathBuf>,
    pub duration_secs: u32,
    /// Numeric motion parameter for models that take one.
    pub intensity: f32,
    /// Prompt suffix for models that do not.
    pub motion_hint: Option<String>,
}

/// Client for the external video-generation provider.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    replicate: ReplicateClient,
    model: GenerationModel,
}

impl GenerationClient {
    pub fn new(replicate: ReplicateClient, model: GenerationModel) -> Self {
        Self { replicate, model }
    }

    /// Submit the generation job and block until the provider returns a
    /// downloadable video URL.
    pub async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let caps = self.model.capabilities();
        let input = self.build_input(request)?;
        info!(model = %self.model, looping = request.end_frame.is_some(), "generating animation");
        self.replicate.run(caps.model_path, input).await
    }

    fn build_input(&self, request: &GenerationRequest) -> ProviderResult<Value> {
        let start = file_data_uri(&request.start_frame)?;
        match self.model {
            GenerationModel::Kling => {
                let mut input = json!({
                    "prompt": request.prompt,
                    "start_image": start,
                    "duration": request.duration_secs,
                    "mode": "standard",
                    "negative_prompt": NEGATIVE_PROMPT,
                    "cfg_scale": request.intensity,
                    "aspect_ratio": "16:9",
                });
                if let Some(end_frame) = &request.end_frame {
                    // End-frame constraint needs the pro tier.
                    input["end_image"] = Value::String(file_data_uri(end_frame)?);
                    input["mode"] = Value::String("pro".to_string());
                }
                Ok(input)
            }
            GenerationModel::Minimax => {
                let prompt = match &request.motion_hint {
                    Some(hint) => format!("{}. {hint}", request.prompt.trim_end_matches('.')),
                    None => request.prompt.clone(),
                };
                Ok(json!({
                    "prompt": prompt,
                    "first_frame_image": start,
                    "prompt_optimizer": true,
                }))
            }
        }
    }
}

/// Frame pair passed to generation (start, and end when looping).
pub fn loop_frames(start_frame: &Path, seamless_loop: bool) -> (PathBuf, Option<PathBuf>) {
    let start = start_frame.to_path_buf();
    let end = seamless_loop.then(|| start.clone());
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("start.png");
        std::fs::write(&path, b"not-really-a-png").unwrap();
        path
    }

    fn request(start: PathBuf) -> GenerationRequest {
        GenerationRequest {
            prompt: "a mascot waves".to_string(),
            start_frame: start,
            end_frame: None,
            duration_secs: 5,
            intensity: 0.5,
            motion_hint: None,
        }
    }

    #[test]
    fn test_kling_input_shape() {
        let dir = tempfile::tempdir().unwrap();
        let client = GenerationClient::new(ReplicateClient::new("t"), GenerationModel::Kling);
        let input = client.build_input(&request(frame(&dir))).unwrap();

        assert_eq!(input["duration"], 5);
        assert_eq!(input["mode"], "standard");
        assert_eq!(input["cfg_scale"], 0.5);
        assert!(input["start_image"].as_str().unwrap().starts_with("data:"));
        assert!(input.get("end_image").is_none());
    }

    #[test]
    fn test_kling_loop_switches_to_pro_mode() {
        let dir = tempfile::tempdir().unwrap();
        let start = frame(&dir);
        let mut req = request(start.clone());
        req.end_frame = Some(start);

        let client = GenerationClient::new(ReplicateClient::new("t"), GenerationModel::Kling);
        let input = client.build_input(&req).unwrap();
        assert_eq!(input["mode"], "pro");
        assert!(input["end_image"].as_str().is_some());
    }

    #[test]
    fn test_minimax_input_ignores_numeric_intensity() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(frame(&dir));
        req.motion_hint = Some("subtle, gentle motion".to_string());

        let client = GenerationClient::new(ReplicateClient::new("t"), GenerationModel::Minimax);
        let input = client.build_input(&req).unwrap();
        assert!(input.get("cfg_scale").is_none());
        assert!(input["prompt"].as_str().unwrap().contains("subtle, gentle motion"));
        assert_eq!(input["prompt_optimizer"], true);
    }

    #[test]
    fn test_loop_frames() {
        let start = Path::new("/w/start.png");
        let (s, e) = loop_frames(start, true);
        assert_eq!(s, e.unwrap());
        let (_, e) = loop_frames(start, false);
        assert!(e.is_none());
    }
}
