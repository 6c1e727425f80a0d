//! Application configuration
//!
//! All settings come from environment variables with sensible defaults, so
//! both the server and the headless client run with no configuration at all.

use std::path::PathBuf;

/// Runtime configuration shared by the server and the client pipeline
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the save endpoint binds to
    pub bind_addr: String,

    /// Directory holding staged and final clip files
    pub uploads_dir: PathBuf,

    /// ffmpeg binary used for recording and transcoding
    pub ffmpeg_path: String,

    /// ffprobe binary used for clip duration discovery
    pub ffprobe_path: String,
}

impl AppConfig {
    /// Build the configuration from the environment
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("RECLIP_BIND", "127.0.0.1:3000"),
            uploads_dir: PathBuf::from(env_or("RECLIP_UPLOADS_DIR", "public/uploads")),
            ffmpeg_path: env_or("RECLIP_FFMPEG", "ffmpeg"),
            ffprobe_path: env_or("RECLIP_FFPROBE", "ffprobe"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
