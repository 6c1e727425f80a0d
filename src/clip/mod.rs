//! Clip data model
//!
//! Types shared across the pipeline: the raw recorded clip, the trim
//! window, the save request sent over the wire, and the server's
//! confirmation of a saved artifact.

pub mod probe;
pub mod trim;

pub use trim::{SaveRequest, TrimSelector, TrimWindow};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Container format of a recorded clip
///
/// The whole pipeline uses a single container format; keeping the enum
/// makes the extension and MIME type lookups explicit at the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipFormat {
    Webm,
}

impl ClipFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ClipFormat::Webm => "webm",
        }
    }

    /// Get the MIME type for this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            ClipFormat::Webm => "video/webm",
        }
    }
}

/// An unedited recorded clip held in memory
///
/// Created when capture stops; owned by the trim selector until it is
/// either discarded or submitted.
#[derive(Debug, Clone)]
pub struct RawClip {
    bytes: Bytes,
    format: ClipFormat,
}

impl RawClip {
    /// Wrap recorded bytes in the pipeline's container format
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            format: ClipFormat::Webm,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn format(&self) -> ClipFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The server's confirmation that a named, trimmed file now exists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedArtifact {
    pub message: String,
    pub filename: String,
}
