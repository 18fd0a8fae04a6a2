//! Replicate prediction client: submit, poll, extract output.

use std::path::Path;
use std::time::{Duration, Instant};

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

/// API token environment variable, checked before any network call.
pub const API_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

const DEFAULT_BASE_URL: &str = "https://api.replicate.com";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Prediction lifecycle response.
#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Client for a Replicate-style prediction API.
#[derive(Debug, Clone)]
pub struct ReplicateClient {
    base_url: String,
    token: String,
    http: Client,
    poll_interval: Duration,
    timeout: Duration,
}

impl ReplicateClient {
    /// Build from the environment. Fails fast when the token is absent
    /// so no run gets past validation without credentials.
    pub fn from_env() -> ProviderResult<Self> {
        let token =
            std::env::var(API_TOKEN_ENV).map_err(|_| ProviderError::MissingToken(API_TOKEN_ENV))?;

        let timeout = std::env::var("ANIMO_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let poll_interval = std::env::var("ANIMO_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        Ok(Self::new(token).with_timeout(timeout).with_poll_interval(poll_interval))
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            http: Client::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the API endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Submit a prediction for `model_path` (`owner/name`) and block
    /// until it reaches a terminal state or the configured timeout.
    /// Returns the output artifact URL.
    pub async fn run(&self, model_path: &str, input: Value) -> ProviderResult<String> {
        let started = Instant::now();
        let prediction = self.create(model_path, input).await?;
        info!(model = model_path, id = %prediction.id, "prediction submitted");

        let mut current = prediction;
        loop {
            match current.status.as_str() {
                "succeeded" => {
                    debug!(id = %current.id, "prediction succeeded");
                    return extract_output_url(current.output.as_ref())
                        .ok_or_else(|| ProviderError::malformed("prediction output has no URL"));
                }
                "failed" | "canceled" => {
                    let message = current
                        .error
                        .as_ref()
                        .map(value_to_message)
                        .unwrap_or_else(|| current.status.clone());
                    return Err(ProviderError::failed(model_path, message));
                }
                _ => {
                    if started.elapsed() >= self.timeout {
                        warn!(model = model_path, id = %current.id, "prediction timed out");
                        return Err(ProviderError::Timeout(self.timeout.as_secs()));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                    current = self.poll(&current.id).await?;
                }
            }
        }
    }

    async fn create(&self, model_path: &str, input: Value) -> ProviderResult<Prediction> {
        let url = format!("{}/v1/models/{}/predictions", self.base_url, model_path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "input": input }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected { status, body });
        }

        response
            .json::<Prediction>()
            .await
            .map_err(|e| ProviderError::malformed(format!("prediction create response: {e}")))
    }

    async fn poll(&self, id: &str) -> ProviderResult<Prediction> {
        let url = format!("{}/v1/predictions/{}", self.base_url, id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected { status, body });
        }

        response
            .json::<Prediction>()
            .await
            .map_err(|e| ProviderError::malformed(format!("prediction poll response: {e}")))
    }
}

/// Providers return the artifact URL as a bare string or a list of
/// strings; take the first usable one.
fn extract_output_url(output: Option<&Value>) -> Option<String> {
    match output? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }),
        Value::Object(map) => map.get("url").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn value_to_message(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Encode a local file as a `data:` URI for provider file inputs.
pub fn file_data_uri(path: &Path) -> ProviderResult<String> {
    let bytes = std::fs::read(path)?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ReplicateClient {
        ReplicateClient::new("test-token")
            .with_base_url(server.uri())
            .with_poll_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_millis(300))
    }

    #[test]
    fn test_extract_output_url_shapes() {
        assert_eq!(
            extract_output_url(Some(&json!("https://x/video.mp4"))).unwrap(),
            "https://x/video.mp4"
        );
        assert_eq!(
            extract_output_url(Some(&json!(["https://x/a.mp4", "https://x/b.mp4"]))).unwrap(),
            "https://x/a.mp4"
        );
        assert_eq!(
            extract_output_url(Some(&json!({"url": "https://x/c.mp4"}))).unwrap(),
            "https://x/c.mp4"
        );
        assert!(extract_output_url(Some(&json!(42))).is_none());
        assert!(extract_output_url(None).is_none());
    }

    #[tokio::test]
    async fn test_run_polls_until_succeeded() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/models/kwaivgi/kling-v2.1/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p1", "status": "processing"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p1", "status": "succeeded", "output": "https://cdn/video.mp4"
            })))
            .mount(&server)
            .await;

        let url = client_for(&server)
            .run("kwaivgi/kling-v2.1", json!({"prompt": "wave"}))
            .await
            .unwrap();
        assert_eq!(url, "https://cdn/video.mp4");
    }

    #[tokio::test]
    async fn test_run_surfaces_provider_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/models/minimax/video-01/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p2", "status": "failed", "error": "NSFW content detected"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .run("minimax/video-01", json!({"prompt": "x"}))
            .await
            .unwrap_err();
        match err {
            ProviderError::Failed { model, message } => {
                assert_eq!(model, "minimax/video-01");
                assert!(message.contains("NSFW"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_times_out_on_stuck_prediction() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/models/kwaivgi/kling-v2.1/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p3", "status": "starting"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p3", "status": "processing"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .run("kwaivgi/kling-v2.1", json!({"prompt": "x"}))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_a_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .run("kwaivgi/kling-v2.1", json!({}))
            .await
            .unwrap_err();
        match err {
            ProviderError::Rejected { status, .. } => assert_eq!(status, 401),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_file_data_uri_mime_detection() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("frame.png");
        std::fs::write(&png, [0x89, 0x50, 0x4E, 0x47]).unwrap();
        let uri = file_data_uri(&png).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
    }
}
