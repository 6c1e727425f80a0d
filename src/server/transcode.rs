//! External transcoder invocation
//!
//! The time-range cut is a single ffmpeg invocation, awaited as one
//! atomic out-of-process call. The trait seam exists so the store and the
//! endpoint can be exercised without a real ffmpeg on the test host.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Transcoder errors
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcoder failed: {0}")]
    Failed(String),
}

/// Cuts a time range out of a staged clip into the final output file
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write `output` from `input`, trimmed to
    /// `[start_secs, start_secs + duration_secs]`.
    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> Result<(), TranscodeError>;
}

/// ffmpeg-backed transcoder
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> Result<(), TranscodeError> {
        tracing::info!(
            "Transcoding {:?} -> {:?} (start {:.3}s, duration {:.3}s)",
            input,
            output,
            start_secs,
            duration_secs
        );

        let result = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-ss")
            .arg(format!("{start_secs}"))
            .arg("-i")
            .arg(input)
            .arg("-t")
            .arg(format!("{duration_secs}"))
            .arg(output)
            .stdin(std::process::Stdio::null())
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let detail = stderr
                .lines()
                .last()
                .unwrap_or("ffmpeg exited with a failure status")
                .to_string();
            tracing::error!("Transcode failed: {}", detail);
            return Err(TranscodeError::Failed(detail));
        }

        Ok(())
    }
}
