//! Clip duration discovery
//!
//! Probes a recorded clip with ffprobe to find its duration. The clip
//! lives in memory, so it is spilled to a scratch file for the probe.
//!
//! A clip muxed to a pipe has no duration in its container header (the
//! muxer cannot seek back to write it), so ffprobe reports `N/A` for it.
//! When that happens the scratch file is stream-copied to a seekable
//! file, which lets the muxer write the header, and probed again.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use tempfile::NamedTempFile;
use thiserror::Error;

use super::RawClip;

/// Probe errors
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffprobe failed: {0}")]
    Ffprobe(String),

    #[error("ffmpeg remux failed: {0}")]
    Remux(String),

    #[error("unexpected ffprobe output: {0}")]
    Parse(String),
}

/// Probe a clip's duration in seconds using ffprobe.
///
/// Falls back to a stream-copy remux through ffmpeg when the container
/// reports no duration, the normal case for a clip encoded to a pipe.
pub fn probe_duration_secs(
    ffprobe: &str,
    ffmpeg: &str,
    clip: &RawClip,
) -> Result<f64, ProbeError> {
    let scratch = spill(clip, "reclip-probe-")?;
    if let Some(duration) = probe_file(ffprobe, scratch.path())? {
        return Ok(duration);
    }

    tracing::debug!("No duration in the container header, remuxing to recover it");
    let remuxed = tempfile::Builder::new()
        .prefix("reclip-remux-")
        .suffix(&format!(".{}", clip.format().extension()))
        .tempfile()?;
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(scratch.path())
        .args(["-c", "copy"])
        .arg(remuxed.path())
        .output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Remux(stderr.trim().to_string()));
    }

    probe_file(ffprobe, remuxed.path())?
        .ok_or_else(|| ProbeError::Parse("no duration in format section".to_string()))
}

fn spill(clip: &RawClip, prefix: &str) -> Result<NamedTempFile, ProbeError> {
    let mut scratch = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(&format!(".{}", clip.format().extension()))
        .tempfile()?;
    scratch.write_all(clip.bytes())?;
    scratch.flush()?;
    Ok(scratch)
}

/// One ffprobe pass; `Ok(None)` when the container reports no duration
fn probe_file(ffprobe: &str, path: &Path) -> Result<Option<f64>, ProbeError> {
    let output = Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Ffprobe(stderr.trim().to_string()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| ProbeError::Parse(e.to_string()))?;

    Ok(duration_from_ffprobe(&json))
}

/// Extract the duration in seconds from ffprobe's `-show_format` JSON.
/// An `N/A` duration parses as `None`.
fn duration_from_ffprobe(json: &serde_json::Value) -> Option<f64> {
    json.get("format")?
        .get("duration")?
        .as_str()?
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_from_format_section() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"format": {"filename": "clip.webm", "duration": "3.521", "size": "12345"}}"#,
        )
        .unwrap();
        assert_eq!(duration_from_ffprobe(&json), Some(3.521));
    }

    #[test]
    fn missing_duration_yields_none() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"format": {"filename": "clip.webm"}}"#).unwrap();
        assert_eq!(duration_from_ffprobe(&json), None);
    }

    #[test]
    fn malformed_duration_yields_none() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"format": {"duration": "N/A"}}"#).unwrap();
        assert_eq!(duration_from_ffprobe(&json), None);
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    // Reports N/A for the scratch file and a real duration once the
    // remuxed copy is probed, like ffprobe does for piped webm.
    #[cfg(unix)]
    const HEADERLESS_FFPROBE: &str = r#"#!/bin/sh
case "$6" in
  *reclip-remux-*) echo '{"format": {"duration": "2.500000"}}' ;;
  *) echo '{"format": {"duration": "N/A"}}' ;;
esac
"#;

    #[cfg(unix)]
    const COPYING_FFMPEG: &str = "#!/bin/sh\ncp \"$6\" \"$9\"\n";

    #[cfg(unix)]
    #[test]
    fn headerless_clip_duration_is_recovered_by_remux() {
        let dir = tempfile::tempdir().unwrap();
        let ffprobe = fake_tool(dir.path(), "ffprobe", HEADERLESS_FFPROBE);
        let ffmpeg = fake_tool(dir.path(), "ffmpeg", COPYING_FFMPEG);

        let clip = RawClip::new(vec![1u8, 2, 3]);
        let duration = probe_duration_secs(&ffprobe, &ffmpeg, &clip).unwrap();
        assert!((duration - 2.5).abs() < 1e-9);
    }

    #[cfg(unix)]
    #[test]
    fn duration_still_missing_after_remux_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ffprobe = fake_tool(
            dir.path(),
            "ffprobe",
            "#!/bin/sh\necho '{\"format\": {\"duration\": \"N/A\"}}'\n",
        );
        let ffmpeg = fake_tool(dir.path(), "ffmpeg", COPYING_FFMPEG);

        let clip = RawClip::new(vec![1u8, 2, 3]);
        let err = probe_duration_secs(&ffprobe, &ffmpeg, &clip).unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }
}
