//! reclip binary
//!
//! Three subcommands: `serve` runs the save endpoint, `record` drives the
//! client pipeline headlessly (capture, trim, upload), and `devices`
//! lists cameras and microphones.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reclip::capture::{self, AudioInput, CaptureConfig, CaptureSession};
use reclip::client::UploadClient;
use reclip::clip::{probe, SavedArtifact, TrimSelector};
use reclip::{server, AppConfig, AppError};

#[derive(Parser)]
#[command(name = "reclip", version, about = "Record, trim, and archive webcam clips")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the save endpoint
    Serve {
        /// Address to bind (overrides RECLIP_BIND)
        #[arg(long)]
        bind: Option<String>,

        /// Directory for staged and final clips (overrides RECLIP_UPLOADS_DIR)
        #[arg(long)]
        uploads_dir: Option<PathBuf>,
    },

    /// Record a clip, trim it, and upload it to the save endpoint
    Record {
        /// Save endpoint base URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,

        /// Name of the saved artifact
        #[arg(long)]
        name: String,

        /// Seconds to record
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,

        /// Trim window start in seconds (defaults to 0)
        #[arg(long)]
        start: Option<f64>,

        /// Trim window end in seconds (defaults to the clip duration)
        #[arg(long)]
        end: Option<f64>,

        /// Camera index to record from
        #[arg(long, default_value_t = 0)]
        camera: u32,

        /// Record video only
        #[arg(long)]
        no_audio: bool,
    },

    /// List available cameras and microphones
    Devices,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reclip=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting reclip v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();

    match cli.command {
        Command::Serve { bind, uploads_dir } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(dir) = uploads_dir {
                config.uploads_dir = dir;
            }
            actix_web::rt::System::new().block_on(server::run(config))
        }
        Command::Record {
            server,
            name,
            seconds,
            start,
            end,
            camera,
            no_audio,
        } => {
            let capture_config = CaptureConfig {
                camera_index: camera,
                audio: if no_audio {
                    None
                } else {
                    AudioInput::platform_default()
                },
                ffmpeg_path: config.ffmpeg_path.clone(),
            };
            let artifact = run_record(
                &config,
                capture_config,
                &server,
                &name,
                seconds,
                start,
                end,
            )?;
            println!("{}: {}", artifact.message, artifact.filename);
            Ok(())
        }
        Command::Devices => {
            run_devices();
            Ok(())
        }
    }
}

/// The whole client pipeline in one pass: capture for a fixed number of
/// seconds, discover the clip duration, apply the trim selection, upload.
#[allow(clippy::too_many_arguments)]
fn run_record(
    config: &AppConfig,
    capture_config: CaptureConfig,
    server: &str,
    name: &str,
    seconds: f64,
    start: Option<f64>,
    end: Option<f64>,
) -> Result<SavedArtifact, AppError> {
    let mut session = CaptureSession::new(capture_config);
    session.start_capture()?;
    session.begin_recording()?;
    std::thread::sleep(Duration::from_secs_f64(seconds.max(0.0)));
    let clip = session.end_recording()?;

    let duration = probe::probe_duration_secs(&config.ffprobe_path, &config.ffmpeg_path, &clip)?;

    let mut selector = TrimSelector::new(clip);
    selector.on_duration_known(duration);
    selector.set_window(start.unwrap_or(0.0), end.unwrap_or(duration));
    selector.set_name(name);
    let request = selector
        .submit()
        .ok_or_else(|| AppError::Validation("name is empty or duration unknown".to_string()))?;

    let client = UploadClient::new(server);
    let runtime = tokio::runtime::Runtime::new()?;
    let artifact = runtime.block_on(client.send(&request))?;
    Ok(artifact)
}

fn run_devices() {
    match capture::list_cameras() {
        Ok(cameras) if cameras.is_empty() => println!("No cameras found"),
        Ok(cameras) => {
            println!("Cameras:");
            for camera in cameras {
                println!("  [{}] {}", camera.id, camera.name);
            }
        }
        Err(e) => println!("Cameras unavailable: {e}"),
    }

    let microphones = capture::list_microphones();
    if microphones.is_empty() {
        println!("No microphones found");
    } else {
        println!("Microphones:");
        for microphone in microphones {
            let marker = if microphone.is_default { " (default)" } else { "" };
            println!("  {}{}", microphone.name, marker);
        }
    }
}
