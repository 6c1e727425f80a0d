//! Save endpoint server
//!
//! Wires the clip store and the ffmpeg transcoder into an actix-web app
//! serving `/api/save-video` and `/api/health`.

pub mod routes;
pub mod store;
pub mod transcode;

pub use store::ClipStore;
pub use transcode::{FfmpegTranscoder, Transcoder};

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use crate::config::AppConfig;

/// Shared state for the save endpoint
pub struct AppState {
    pub store: ClipStore,
    pub transcoder: Arc<dyn Transcoder>,
}

impl AppState {
    pub fn new(store: ClipStore, transcoder: Arc<dyn Transcoder>) -> Self {
        Self { store, transcoder }
    }
}

/// Run the save endpoint until shutdown
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let state = web::Data::new(AppState::new(
        ClipStore::new(config.uploads_dir.clone()),
        Arc::new(FfmpegTranscoder::new(config.ffmpeg_path.clone())),
    ));

    tracing::info!(
        "Save endpoint listening on {} (uploads in {:?})",
        config.bind_addr,
        config.uploads_dir
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .service(
                web::scope("/api")
                    .service(routes::save_video)
                    .service(routes::health),
            )
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
