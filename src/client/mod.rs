//! Upload client
//!
//! Packages a save request as a multipart submission and sends it to the
//! save endpoint.

pub mod upload;

pub use upload::{UploadClient, UploadError};
