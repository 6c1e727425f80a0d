//! Capture system
//!
//! Owns the camera/microphone stream and produces a raw recorded clip:
//! - device enumeration for cameras and microphones
//! - a capture session state machine (Idle -> Previewing -> Recording)
//!   that pipes webcam frames through an ffmpeg encoder and buffers the
//!   encoded output in memory

pub mod devices;
pub mod session;

pub use devices::{list_cameras, list_microphones, CameraDevice, MicrophoneDevice};
pub use session::{AudioInput, CaptureConfig, CaptureSession, CaptureState, PreviewFrame};

use thiserror::Error;

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no capture device available: {0}")]
    DeviceUnavailable(String),

    #[error("invalid capture state: cannot {action} while {state:?}")]
    InvalidState {
        state: session::CaptureState,
        action: &'static str,
    },

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("device failure during recording: {0}")]
    StreamFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;
