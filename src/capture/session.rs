//! Capture session
//!
//! One `CaptureSession` owns the live camera stream and the active
//! encoder with explicit state transitions:
//!
//! ```text
//! Idle -> Previewing -> Recording -> Idle (clip emitted)
//! ```
//!
//! The camera is opened and driven entirely inside a capture thread; the
//! session talks to it through shared flags and an encoder sink slot.
//! While recording, raw frames in the camera's native pixel format are
//! piped into an ffmpeg child process that encodes webm to a pipe, and
//! the encoder output is buffered as an ordered sequence of chunks. When
//! recording ends the chunks are concatenated into one [`RawClip`]. A
//! mid-recording device or encoder failure aborts back to `Idle` with no
//! partial clip.

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;

use super::{devices, CaptureError, CaptureResult};
use crate::clip::RawClip;

/// How long to wait for the capture thread to open the camera
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Current state of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No stream acquired
    Idle,
    /// Camera stream is live, not recording
    Previewing,
    /// Buffering encoder output
    Recording,
}

/// Microphone input handed to ffmpeg as a native device
#[derive(Debug, Clone)]
pub struct AudioInput {
    /// ffmpeg input format, e.g. "pulse" or "avfoundation"
    pub backend: String,
    /// Device identifier understood by the backend
    pub device: String,
}

impl AudioInput {
    /// Default microphone source for the current platform, if one is known
    pub fn platform_default() -> Option<Self> {
        #[cfg(target_os = "linux")]
        {
            Some(Self {
                backend: "pulse".to_string(),
                device: "default".to_string(),
            })
        }

        #[cfg(target_os = "macos")]
        {
            Some(Self {
                backend: "avfoundation".to_string(),
                device: ":0".to_string(),
            })
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            None
        }
    }
}

/// Configuration for a capture session
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Camera index to open
    pub camera_index: u32,

    /// Microphone source; `None` records video only
    pub audio: Option<AudioInput>,

    /// ffmpeg binary used for encoding
    pub ffmpeg_path: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            audio: AudioInput::platform_default(),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

/// The latest camera frame, in the camera's native pixel format
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    /// ffmpeg pixel format name, e.g. "yuyv422"
    pub pixel_format: &'static str,
    pub data: Vec<u8>,
}

/// Stream parameters discovered when the camera opens
#[derive(Debug, Clone, Copy)]
struct StreamInfo {
    width: u32,
    height: u32,
    fps: u32,
    pixel_format: &'static str,
}

/// Shared link between the session and its capture thread
struct CameraLink {
    /// Ends the capture thread and releases the camera
    stop: AtomicBool,
    /// Frames are written to the sink only while set
    recording: AtomicBool,
    /// Encoder input; installed by `begin_recording`
    sink: Mutex<Option<ChildStdin>>,
    /// First fatal failure seen by the capture thread
    error: Mutex<Option<String>>,
    /// Most recent frame, for a preview surface
    latest: Mutex<Option<PreviewFrame>>,
}

impl CameraLink {
    fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            sink: Mutex::new(None),
            error: Mutex::new(None),
            latest: Mutex::new(None),
        }
    }
}

/// Handles for an in-flight recording
struct ActiveRecording {
    encoder: Child,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    stderr_tail: Arc<Mutex<String>>,
    reader: JoinHandle<()>,
    stderr_reader: JoinHandle<()>,
}

/// Owns the camera stream and the active recorder
pub struct CaptureSession {
    config: CaptureConfig,
    state: CaptureState,
    link: Option<Arc<CameraLink>>,
    camera_thread: Option<JoinHandle<()>>,
    stream_info: Option<StreamInfo>,
    active: Option<ActiveRecording>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: CaptureState::Idle,
            link: None,
            camera_thread: None,
            stream_info: None,
            active: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Acquire the camera (and validate the microphone) for preview.
    ///
    /// Fails with `DeviceUnavailable` when no device exists or it cannot
    /// be opened. On success the stream stays live until recording ends.
    pub fn start_capture(&mut self) -> CaptureResult<()> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::InvalidState {
                state: self.state,
                action: "start capture",
            });
        }

        if self.config.audio.is_some() && !devices::has_default_microphone() {
            return Err(CaptureError::DeviceUnavailable(
                "no microphone input device".to_string(),
            ));
        }

        let link = Arc::new(CameraLink::new());
        let (info_tx, info_rx) = mpsc::channel();
        let camera_index = self.config.camera_index;
        let thread_link = Arc::clone(&link);

        let handle = std::thread::spawn(move || {
            run_camera(camera_index, thread_link, info_tx);
        });

        let (info, handle) =
            await_camera_open(&info_rx, OPEN_TIMEOUT, camera_index, &link, handle)?;

        tracing::info!(
            "Camera {} open: {}x{} @ {}fps, pixel format {}",
            camera_index,
            info.width,
            info.height,
            info.fps,
            info.pixel_format
        );

        self.link = Some(link);
        self.camera_thread = Some(handle);
        self.stream_info = Some(info);
        self.state = CaptureState::Previewing;
        Ok(())
    }

    /// Most recent camera frame for a preview surface
    pub fn preview_frame(&self) -> CaptureResult<Option<PreviewFrame>> {
        let link = match (&self.state, &self.link) {
            (CaptureState::Idle, _) | (_, None) => {
                return Err(CaptureError::InvalidState {
                    state: self.state,
                    action: "grab a preview frame",
                })
            }
            (_, Some(link)) => link,
        };
        Ok(link.latest.lock().clone())
    }

    /// Start buffering stream data. Valid only while previewing.
    pub fn begin_recording(&mut self) -> CaptureResult<()> {
        if self.state != CaptureState::Previewing {
            return Err(CaptureError::InvalidState {
                state: self.state,
                action: "begin recording",
            });
        }
        let link = self.link.as_ref().ok_or(CaptureError::InvalidState {
            state: CaptureState::Idle,
            action: "begin recording",
        })?;
        let info = self.stream_info.ok_or(CaptureError::InvalidState {
            state: CaptureState::Idle,
            action: "begin recording",
        })?;

        let args = encoder_args(&info, self.config.audio.as_ref());
        tracing::info!("Starting ffmpeg encoder: {:?}", args);

        let mut encoder = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CaptureError::Encoder(format!("failed to start ffmpeg: {e}")))?;

        let stdin = encoder
            .stdin
            .take()
            .ok_or_else(|| CaptureError::Encoder("failed to open ffmpeg stdin".to_string()))?;
        let stdout = encoder
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Encoder("failed to open ffmpeg stdout".to_string()))?;
        let stderr = encoder
            .stderr
            .take()
            .ok_or_else(|| CaptureError::Encoder("failed to open ffmpeg stderr".to_string()))?;

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let stderr_tail = Arc::new(Mutex::new(String::new()));
        let reader = spawn_chunk_reader(stdout, Arc::clone(&chunks));
        let stderr_reader = spawn_stderr_reader(stderr, Arc::clone(&stderr_tail));

        *link.sink.lock() = Some(stdin);
        link.recording.store(true, Ordering::Relaxed);

        self.active = Some(ActiveRecording {
            encoder,
            chunks,
            stderr_tail,
            reader,
            stderr_reader,
        });
        self.state = CaptureState::Recording;
        tracing::info!("Recording started");
        Ok(())
    }

    /// Stop buffering and assemble the clip. Valid only while recording.
    ///
    /// Always transitions back to `Idle` and releases the camera; on a
    /// device or encoder failure the buffered chunks are dropped and the
    /// error is surfaced instead of a partial clip.
    pub fn end_recording(&mut self) -> CaptureResult<RawClip> {
        if self.state != CaptureState::Recording {
            return Err(CaptureError::InvalidState {
                state: self.state,
                action: "end recording",
            });
        }
        let mut active = self.active.take().ok_or(CaptureError::InvalidState {
            state: CaptureState::Idle,
            action: "end recording",
        })?;
        // The session always lands in Idle, whatever happens below.
        self.state = CaptureState::Idle;
        self.stream_info = None;

        let link = self.link.take();
        let camera_thread = self.camera_thread.take();

        let mut camera_error = None;
        if let Some(link) = link {
            link.recording.store(false, Ordering::Relaxed);
            // Dropping the sink signals end-of-stream to ffmpeg.
            drop(link.sink.lock().take());
            link.stop.store(true, Ordering::Relaxed);
            if let Some(handle) = camera_thread {
                handle
                    .join()
                    .map_err(|_| CaptureError::Encoder("capture thread panicked".to_string()))?;
            }
            camera_error = link.error.lock().take();
        }

        let status = active.encoder.wait()?;
        active
            .reader
            .join()
            .map_err(|_| CaptureError::Encoder("chunk reader thread panicked".to_string()))?;
        active
            .stderr_reader
            .join()
            .map_err(|_| CaptureError::Encoder("stderr reader thread panicked".to_string()))?;

        if let Some(message) = camera_error {
            tracing::error!("Recording aborted: {}", message);
            return Err(CaptureError::StreamFailed(message));
        }

        if !status.success() {
            let tail = active.stderr_tail.lock().clone();
            let detail = if tail.trim().is_empty() {
                format!("ffmpeg exited with {status}")
            } else {
                tail.trim().to_string()
            };
            tracing::error!("Encoder failed: {}", detail);
            return Err(CaptureError::Encoder(detail));
        }

        let chunks = std::mem::take(&mut *active.chunks.lock());
        let total: usize = chunks.iter().map(Bytes::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in &chunks {
            bytes.extend_from_slice(chunk);
        }

        tracing::info!("Recording stopped: {} chunks, {} bytes", chunks.len(), total);
        Ok(RawClip::new(bytes))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(link) = &self.link {
            link.recording.store(false, Ordering::Relaxed);
            link.stop.store(true, Ordering::Relaxed);
            drop(link.sink.lock().take());
        }
        if let Some(handle) = self.camera_thread.take() {
            let _ = handle.join();
        }
        if let Some(mut active) = self.active.take() {
            let _ = active.encoder.kill();
        }
    }
}

/// Map nokhwa's frame format to the ffmpeg rawvideo pixel format name
fn ffmpeg_pixel_format(format: FrameFormat) -> &'static str {
    match format {
        FrameFormat::YUYV => "yuyv422",
        FrameFormat::NV12 => "nv12",
        FrameFormat::RAWRGB => "rgb24",
        FrameFormat::MJPEG => "mjpeg",
        other => {
            tracing::warn!("Unknown camera format {:?}, assuming yuyv422", other);
            "yuyv422"
        }
    }
}

/// Wait for the capture thread to report its stream parameters.
///
/// On timeout the thread is detached, not joined: the device open call
/// may itself be hung, and the thread cleans up after itself once the
/// call returns (its report send fails and it releases the camera).
fn await_camera_open(
    info_rx: &mpsc::Receiver<Result<StreamInfo, String>>,
    timeout: Duration,
    camera_index: u32,
    link: &CameraLink,
    handle: JoinHandle<()>,
) -> CaptureResult<(StreamInfo, JoinHandle<()>)> {
    match info_rx.recv_timeout(timeout) {
        Ok(Ok(info)) => Ok((info, handle)),
        Ok(Err(message)) => {
            let _ = handle.join();
            Err(CaptureError::DeviceUnavailable(message))
        }
        Err(_) => {
            link.stop.store(true, Ordering::Relaxed);
            drop(handle);
            Err(CaptureError::DeviceUnavailable(format!(
                "camera {camera_index} did not open within {timeout:?}"
            )))
        }
    }
}

/// Camera thread body: owns the device for the whole session.
fn run_camera(
    camera_index: u32,
    link: Arc<CameraLink>,
    info_tx: mpsc::Sender<Result<StreamInfo, String>>,
) {
    let requested =
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera = match Camera::new(CameraIndex::Index(camera_index), requested) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = info_tx.send(Err(format!("camera {camera_index} cannot be opened: {e}")));
            return;
        }
    };
    if let Err(e) = camera.open_stream() {
        let _ = info_tx.send(Err(format!("camera stream failed: {e}")));
        return;
    }

    let format = camera.camera_format();
    let info = StreamInfo {
        width: format.resolution().width(),
        height: format.resolution().height(),
        fps: format.frame_rate().max(1),
        pixel_format: ffmpeg_pixel_format(format.format()),
    };
    if info_tx.send(Ok(info)).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    while !link.stop.load(Ordering::Relaxed) {
        match camera.frame() {
            Ok(frame) => {
                let data = frame.buffer();
                if link.recording.load(Ordering::Relaxed) {
                    let mut sink = link.sink.lock();
                    if let Some(stdin) = sink.as_mut() {
                        if let Err(e) = stdin.write_all(data) {
                            *link.error.lock() = Some(format!("encoder pipe closed: {e}"));
                            // ffmpeg is gone; stop feeding it
                            *sink = None;
                        }
                    }
                }
                *link.latest.lock() = Some(PreviewFrame {
                    width: info.width,
                    height: info.height,
                    pixel_format: info.pixel_format,
                    data: data.to_vec(),
                });
            }
            Err(e) => {
                if link.recording.load(Ordering::Relaxed) {
                    *link.error.lock() = Some(format!("camera frame read failed: {e}"));
                    break;
                }
                tracing::debug!("Dropped preview frame: {:?}", e);
            }
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!("Failed to stop camera stream: {:?}", e);
    }
}

/// Build the ffmpeg argument list for the in-memory webm encoder
fn encoder_args(info: &StreamInfo, audio: Option<&AudioInput>) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        // Raw native-format frames from the camera thread on stdin
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pixel_format".to_string(),
        info.pixel_format.to_string(),
        "-video_size".to_string(),
        format!("{}x{}", info.width, info.height),
        "-framerate".to_string(),
        info.fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
    ];

    if let Some(audio) = audio {
        args.extend([
            "-f".to_string(),
            audio.backend.clone(),
            "-i".to_string(),
            audio.device.clone(),
        ]);
    }

    args.extend([
        "-c:v".to_string(),
        "libvpx".to_string(),
        "-b:v".to_string(),
        "2M".to_string(),
        "-deadline".to_string(),
        "realtime".to_string(),
        "-cpu-used".to_string(),
        "8".to_string(),
    ]);

    if audio.is_some() {
        args.extend([
            "-c:a".to_string(),
            "libopus".to_string(),
            // The microphone is a live input; stop with the video stream
            "-shortest".to_string(),
        ]);
    }

    args.extend(["-f".to_string(), "webm".to_string(), "pipe:1".to_string()]);
    args
}

/// Buffer encoded output as an ordered sequence of chunks, driven by
/// data-available reads on the encoder pipe.
fn spawn_chunk_reader(mut stdout: ChildStdout, chunks: Arc<Mutex<Vec<Bytes>>>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut buf = [0u8; 64 * 1024];
        loop {
            match stdout.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => chunks.lock().push(Bytes::copy_from_slice(&buf[..n])),
                Err(e) => {
                    tracing::warn!("Encoder output read failed: {}", e);
                    break;
                }
            }
        }
    })
}

fn spawn_stderr_reader(
    mut stderr: impl Read + Send + 'static,
    tail: Arc<Mutex<String>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut output = String::new();
        if stderr.read_to_string(&mut output).is_ok() {
            // Keep the last few lines; ffmpeg puts the real cause there.
            let tail_lines: Vec<&str> = output.lines().rev().take(8).collect();
            *tail.lock() = tail_lines.into_iter().rev().collect::<Vec<_>>().join("\n");
        }
    })
}
