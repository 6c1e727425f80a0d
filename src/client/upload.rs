//! Multipart upload to the save endpoint
//!
//! One best-effort POST per submission: no retries, no chunking, no
//! progress reporting. The caller keeps the clip until success is
//! confirmed so the operator can resubmit after a failure.

use reqwest::multipart;
use thiserror::Error;

use crate::clip::{ClipFormat, SaveRequest, SavedArtifact};

/// Upload failures surfaced to the operator
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server rejected the upload ({status}): {detail}")]
    Status {
        status: reqwest::StatusCode,
        detail: String,
    },
}

/// Client for the save endpoint
pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
}

impl UploadClient {
    /// Create a client for a server base URL, e.g. `http://127.0.0.1:3000`
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Send one save request; returns the server's confirmation.
    pub async fn send(&self, request: &SaveRequest) -> Result<SavedArtifact, UploadError> {
        let format = ClipFormat::Webm;
        let file = multipart::Part::bytes(request.bytes.to_vec())
            .file_name(format!("{}.{}", request.name, format.extension()))
            .mime_str(format.mime_type())?;

        let form = multipart::Form::new()
            .part("video", file)
            .text("trim_start", request.start.to_string())
            .text("trim_end", request.end.to_string())
            .text("video_name", request.name.clone());

        let url = format!("{}/api/save-video", self.base_url);
        tracing::info!(
            "Uploading \"{}\" ({} bytes, {:.1}s-{:.1}s) to {}",
            request.name,
            request.bytes.len(),
            request.start,
            request.end,
            url
        );

        let response = self.http.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!("Upload rejected ({}): {}", status, detail);
            return Err(UploadError::Status { status, detail });
        }

        let artifact = response.json::<SavedArtifact>().await?;
        tracing::info!("Upload complete: {}", artifact.filename);
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slashes_are_stripped() {
        let client = UploadClient::new("http://localhost:3000///");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn saved_artifact_parses_server_response() {
        let artifact: SavedArtifact = serde_json::from_str(
            r#"{"message": "Video saved successfully", "filename": "clip1.webm"}"#,
        )
        .unwrap();
        assert_eq!(artifact.filename, "clip1.webm");
    }
}
