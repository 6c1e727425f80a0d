//! Capture device enumeration
//!
//! Cameras are listed through nokhwa, microphones through cpal.

use cpal::traits::{DeviceTrait, HostTrait};
use nokhwa::utils::{ApiBackend, CameraIndex};
use serde::{Deserialize, Serialize};

use super::{CaptureError, CaptureResult};

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDevice {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,
}

/// Information about a microphone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrophoneDevice {
    /// Device name
    pub name: String,

    /// Whether this is the default input device
    pub is_default: bool,
}

/// Get list of available cameras
pub fn list_cameras() -> CaptureResult<Vec<CameraDevice>> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| CaptureError::DeviceUnavailable(format!("camera enumeration failed: {e}")))?;

    Ok(cameras
        .into_iter()
        .map(|info| {
            let id = match info.index() {
                CameraIndex::Index(i) => i.to_string(),
                CameraIndex::String(s) => s.to_string(),
            };
            CameraDevice {
                id,
                name: info.human_name().to_string(),
            }
        })
        .collect())
}

/// Get list of available microphones
pub fn list_microphones() -> Vec<MicrophoneDevice> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|device| device.name().ok())
            .map(|name| {
                let is_default = default_name.as_deref() == Some(name.as_str());
                MicrophoneDevice { name, is_default }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate microphones: {:?}", e);
            Vec::new()
        }
    }
}

/// Check that a default microphone exists
pub fn has_default_microphone() -> bool {
    cpal::default_host().default_input_device().is_some()
}
