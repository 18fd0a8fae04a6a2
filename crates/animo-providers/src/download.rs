//! Streaming download of provider artifacts.

use std::path::Path;

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Download `url` to `dest`, streaming chunks to disk.
pub async fn download_to(client: &Client, url: &str, dest: impl AsRef<Path>) -> ProviderResult<()> {
    let dest = dest.as_ref();
    let mut response = client.get(url).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Rejected { status, body });
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut bytes = 0u64;
    while let Some(chunk) = response.chunk().await? {
        bytes += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!(url, dest = %dest.display(), bytes, "artifact downloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video.mp4");
        download_to(&Client::new(), &format!("{}/video.mp4", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"mp4-bytes");
    }

    #[tokio::test]
    async fn test_download_surfaces_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = download_to(
            &Client::new(),
            &format!("{}/missing.mp4", server.uri()),
            dir.path().join("out.mp4"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProviderError::Rejected { status: 404, .. }));
    }
}
