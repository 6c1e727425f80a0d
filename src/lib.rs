//! reclip - record, trim, and archive webcam clips.
//!
//! This is the main library crate for reclip. The client side captures a
//! clip from the webcam, lets the operator pick a trim window and a name,
//! and uploads the raw bytes to the save endpoint. The server side stages
//! the upload, cuts the requested time range with ffmpeg, and stores the
//! result under the uploads directory.

pub mod capture;
pub mod client;
pub mod clip;
pub mod config;
pub mod error;
pub mod server;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
