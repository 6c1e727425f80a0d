//! Error types and handling
//!
//! Common error types used across the application.

use thiserror::Error;

use crate::capture::CaptureError;
use crate::client::UploadError;
use crate::clip::probe::ProbeError;

/// Application-wide error type for the client pipeline
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
