//! Integration tests for the save endpoint
//!
//! The external transcoder is stubbed so the endpoint's receive, stage,
//! transcode, cleanup, and respond steps can be exercised without ffmpeg
//! on the test host.

use std::path::Path;
use std::sync::Arc;

use actix_web::{test, web, App};
use async_trait::async_trait;

use reclip::clip::SavedArtifact;
use reclip::server::transcode::{TranscodeError, Transcoder};
use reclip::server::{routes, AppState, ClipStore};

const BOUNDARY: &str = "------------------------reclip-test";

/// Stub transcoder that copies the staged bytes to the output path
struct CopyTranscoder;

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        _start_secs: f64,
        _duration_secs: f64,
    ) -> Result<(), TranscodeError> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

/// Stub transcoder that always fails without producing output
struct FailingTranscoder;

#[async_trait]
impl Transcoder for FailingTranscoder {
    async fn trim(
        &self,
        _input: &Path,
        _output: &Path,
        _start_secs: f64,
        _duration_secs: f64,
    ) -> Result<(), TranscodeError> {
        Err(TranscodeError::Failed("synthetic failure".to_string()))
    }
}

fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: video/webm\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn save_request(body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/save-video")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
}

fn full_submission(name: &str, payload: &[u8]) -> Vec<u8> {
    multipart_body(&[
        ("video", Some("clip.webm"), payload),
        ("trim_start", None, b"2.0"),
        ("trim_end", None, b"5.5"),
        ("video_name", None, name.as_bytes()),
    ])
}

macro_rules! init_app {
    ($uploads:expr, $transcoder:expr) => {{
        let state = web::Data::new(AppState::new(
            ClipStore::new($uploads),
            Arc::new($transcoder) as Arc<dyn Transcoder>,
        ));
        test::init_service(
            App::new().app_data(state).service(
                web::scope("/api")
                    .service(routes::save_video)
                    .service(routes::health),
            ),
        )
        .await
    }};
}

#[actix_web::test]
async fn round_trip_saves_artifact_and_removes_staging() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    let app = init_app!(uploads.clone(), CopyTranscoder);

    let request = save_request(full_submission("clip1", b"raw-bytes")).to_request();
    let response = test::call_service(&app, request).await;
    assert!(response.status().is_success());

    let artifact: SavedArtifact = test::read_body_json(response).await;
    assert_eq!(artifact.message, "Video saved successfully");
    assert_eq!(artifact.filename, "clip1.webm");

    assert_eq!(std::fs::read(uploads.join("clip1.webm")).unwrap(), b"raw-bytes");
    assert!(!uploads.join("temp_clip1.webm").exists());
}

#[actix_web::test]
async fn missing_video_name_is_rejected_before_any_work() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    let app = init_app!(uploads.clone(), CopyTranscoder);

    let body = multipart_body(&[
        ("video", Some("clip.webm"), b"raw-bytes"),
        ("trim_start", None, b"0"),
        ("trim_end", None, b"1"),
    ]);
    let response = test::call_service(&app, save_request(body).to_request()).await;
    assert_eq!(response.status(), 400);

    // Rejected before staging: the uploads directory was never created.
    assert!(!uploads.exists());
}

#[actix_web::test]
async fn malformed_trim_bounds_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = init_app!(dir.path().to_path_buf(), CopyTranscoder);

    for (start, end) in [("abc", "5"), ("1", "abc"), ("NaN", "5"), ("5", "2"), ("-1", "5")] {
        let body = multipart_body(&[
            ("video", Some("clip.webm"), b"raw-bytes"),
            ("trim_start", None, start.as_bytes()),
            ("trim_end", None, end.as_bytes()),
            ("video_name", None, b"clip1"),
        ]);
        let response = test::call_service(&app, save_request(body).to_request()).await;
        assert_eq!(response.status(), 400, "bounds ({start}, {end})");
    }
}

#[actix_web::test]
async fn path_escaping_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = init_app!(dir.path().to_path_buf(), CopyTranscoder);

    let request = save_request(full_submission("../evil", b"raw-bytes")).to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 400);
}

#[actix_web::test]
async fn transcode_failure_returns_500_and_removes_staging() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    let app = init_app!(uploads.clone(), FailingTranscoder);

    let request = save_request(full_submission("clip1", b"raw-bytes")).to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 500);

    let failure: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(failure["message"], "Failed to save video");

    assert!(!uploads.join("temp_clip1.webm").exists());
    assert!(!uploads.join("clip1.webm").exists());
}

#[actix_web::test]
async fn concurrent_same_name_submissions_do_not_corrupt_the_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    let app = init_app!(uploads.clone(), CopyTranscoder);

    let first = test::call_service(
        &app,
        save_request(full_submission("clip1", b"first-payload")).to_request(),
    );
    let second = test::call_service(
        &app,
        save_request(full_submission("clip1", b"second-payload")).to_request(),
    );
    let (first, second) = futures_util::join!(first, second);

    assert!(first.status().is_success());
    assert!(second.status().is_success());

    // Whichever submission wins, the artifact is exactly one payload.
    let artifact = std::fs::read(uploads.join("clip1.webm")).unwrap();
    assert!(artifact == b"first-payload" || artifact == b"second-payload");
    assert!(!uploads.join("temp_clip1.webm").exists());
}

#[actix_web::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = init_app!(dir.path().to_path_buf(), CopyTranscoder);

    let request = test::TestRequest::get().uri("/api/health").to_request();
    let response = test::call_service(&app, request).await;
    assert!(response.status().is_success());
}
