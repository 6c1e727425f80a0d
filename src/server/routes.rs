//! HTTP routes
//!
//! `POST /api/save-video` receives the multipart submission, validates it
//! up front, and hands the bytes to the clip store. Validation failures
//! are rejected with 400 before any filesystem or process work; staging
//! and transcode failures come back as 500. `GET /api/health` is a
//! liveness probe.

use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse, ResponseError};
use futures_util::StreamExt as _;
use serde::Serialize;
use thiserror::Error;

use super::AppState;
use crate::clip::SavedArtifact;

/// Failures of the save endpoint
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] super::store::StoreError),
}

/// JSON failure body: `{ message, error }`
#[derive(Debug, Serialize)]
struct FailureBody {
    message: &'static str,
    error: String,
}

impl ResponseError for SaveError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            SaveError::BadRequest(_) => actix_web::http::StatusCode::BAD_REQUEST,
            SaveError::Store(_) => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            SaveError::BadRequest(_) => "Invalid save-video request",
            SaveError::Store(_) => "Failed to save video",
        };
        HttpResponse::build(self.status_code()).json(FailureBody {
            message,
            error: self.to_string(),
        })
    }
}

/// The four multipart parts of a submission, collected off the wire
#[derive(Default)]
struct SaveVideoParts {
    video: Option<web::BytesMut>,
    trim_start: Option<String>,
    trim_end: Option<String>,
    video_name: Option<String>,
}

#[post("/save-video")]
pub async fn save_video(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, SaveError> {
    let parts = collect_parts(payload).await?;

    let video = parts
        .video
        .ok_or_else(|| SaveError::BadRequest("missing part: video".to_string()))?;
    let trim_start = parts
        .trim_start
        .ok_or_else(|| SaveError::BadRequest("missing part: trim_start".to_string()))?;
    let trim_end = parts
        .trim_end
        .ok_or_else(|| SaveError::BadRequest("missing part: trim_end".to_string()))?;
    let video_name = parts
        .video_name
        .ok_or_else(|| SaveError::BadRequest("missing part: video_name".to_string()))?;

    let name = validate_name(&video_name)?;
    let (start, end) = parse_trim_bounds(&trim_start, &trim_end)?;

    tracing::info!(
        "Saving \"{}\" ({} bytes, {:.3}s-{:.3}s)",
        name,
        video.len(),
        start,
        end
    );

    let filename = state
        .store
        .save_trimmed(state.transcoder.as_ref(), &name, &video, start, end)
        .await?;

    Ok(HttpResponse::Ok().json(SavedArtifact {
        message: "Video saved successfully".to_string(),
        filename,
    }))
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Drain the multipart stream into the four known parts; unknown parts
/// are read and ignored.
async fn collect_parts(mut payload: Multipart) -> Result<SaveVideoParts, SaveError> {
    let mut parts = SaveVideoParts::default();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| SaveError::BadRequest(format!("malformed multipart payload: {e}")))?;
        let name = field.name().to_string();

        let mut data = web::BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| SaveError::BadRequest(format!("malformed multipart part: {e}")))?;
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "video" => parts.video = Some(data),
            "trim_start" => parts.trim_start = Some(text_part(&name, data)?),
            "trim_end" => parts.trim_end = Some(text_part(&name, data)?),
            "video_name" => parts.video_name = Some(text_part(&name, data)?),
            _ => {}
        }
    }

    Ok(parts)
}

fn text_part(name: &str, data: web::BytesMut) -> Result<String, SaveError> {
    String::from_utf8(data.to_vec())
        .map_err(|_| SaveError::BadRequest(format!("part {name} is not valid UTF-8")))
}

/// The name becomes the output base filename verbatim, so reject anything
/// that would escape the uploads directory.
fn validate_name(raw: &str) -> Result<String, SaveError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SaveError::BadRequest("video_name is empty".to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(SaveError::BadRequest(format!(
            "video_name {name:?} is not a plain file name"
        )));
    }
    Ok(name.to_string())
}

/// Trim bounds arrive as decimal-second strings; they must be finite,
/// non-negative, and ordered.
fn parse_trim_bounds(start: &str, end: &str) -> Result<(f64, f64), SaveError> {
    let parse = |label: &str, value: &str| -> Result<f64, SaveError> {
        let parsed: f64 = value.trim().parse().map_err(|_| {
            SaveError::BadRequest(format!("{label} {value:?} is not a number"))
        })?;
        if !parsed.is_finite() || parsed < 0.0 {
            return Err(SaveError::BadRequest(format!(
                "{label} {value:?} is out of range"
            )));
        }
        Ok(parsed)
    };

    let start = parse("trim_start", start)?;
    let end = parse("trim_end", end)?;
    if end < start {
        return Err(SaveError::BadRequest(format!(
            "trim_end {end} is before trim_start {start}"
        )));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_must_be_plain() {
        assert!(validate_name("clip1").is_ok());
        assert_eq!(validate_name("  clip1  ").unwrap(), "clip1");
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("../etc/passwd").is_err());
    }

    #[test]
    fn bounds_must_be_finite_and_ordered() {
        assert_eq!(parse_trim_bounds("2.0", "5.5").unwrap(), (2.0, 5.5));
        assert_eq!(parse_trim_bounds("0", "0").unwrap(), (0.0, 0.0));
        assert!(parse_trim_bounds("abc", "5").is_err());
        assert!(parse_trim_bounds("1", "abc").is_err());
        assert!(parse_trim_bounds("NaN", "5").is_err());
        assert!(parse_trim_bounds("inf", "5").is_err());
        assert!(parse_trim_bounds("-1", "5").is_err());
        assert!(parse_trim_bounds("5", "2").is_err());
    }

    #[test]
    fn bad_request_maps_to_400() {
        let err = SaveError::BadRequest("nope".to_string());
        assert_eq!(err.status_code(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
