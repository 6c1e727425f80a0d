//! Clip store
//!
//! Owns the uploads directory: stages raw upload bytes next to the final
//! artifact, runs the transcoder, and guarantees the staged copy is
//! removed on every exit path. Writes for one output name are serialized
//! through a per-name lock so identical-name submissions cannot interleave
//! on the staging or final path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use super::transcode::{TranscodeError, Transcoder};
use crate::clip::ClipFormat;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),
}

/// Flat directory of named clip artifacts
pub struct ClipStore {
    root: PathBuf,
    format: ClipFormat,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ClipStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            format: ClipFormat::Webm,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final artifact filename for a clip name
    pub fn filename(&self, name: &str) -> String {
        format!("{name}.{}", self.format.extension())
    }

    /// Final artifact path: `<root>/<name>.webm`
    pub fn final_path(&self, name: &str) -> PathBuf {
        self.root.join(self.filename(name))
    }

    /// Staging path: `<root>/temp_<name>.webm`, distinct from the final
    /// path so an in-progress write never clobbers a finished artifact.
    pub fn staging_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("temp_{name}.{}", self.format.extension()))
    }

    /// Stage the raw bytes, trim them into the final artifact, and clean
    /// up the staged copy. Returns the final filename.
    pub async fn save_trimmed(
        &self,
        transcoder: &dyn Transcoder,
        name: &str,
        bytes: &[u8],
        start_secs: f64,
        end_secs: f64,
    ) -> Result<String, StoreError> {
        let lock = self.name_lock(name);
        let result = {
            let _name_guard = lock.lock().await;
            self.save_locked(transcoder, name, bytes, start_secs, end_secs)
                .await
        };
        self.evict_name_lock(name, &lock);
        result
    }

    async fn save_locked(
        &self,
        transcoder: &dyn Transcoder,
        name: &str,
        bytes: &[u8],
        start_secs: f64,
        end_secs: f64,
    ) -> Result<String, StoreError> {
        // Idempotent, safe to race with other names
        tokio::fs::create_dir_all(&self.root).await?;

        let staging = self.staging_path(name);
        tokio::fs::write(&staging, bytes).await?;
        let staged = StagedClip::new(staging.clone());
        tracing::debug!("Staged {} bytes at {:?}", bytes.len(), staging);

        let output = self.final_path(name);
        transcoder
            .trim(&staging, &output, start_secs, end_secs - start_secs)
            .await?;

        staged.remove().await?;
        tracing::info!("Saved artifact {:?}", output);
        Ok(self.filename(name))
    }

    fn name_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(name.to_string()).or_default().clone()
    }

    /// Remove the registry entry once no submission holds it, so the
    /// registry does not grow by one entry per distinct name forever.
    /// A strong count of 2 means the registry and our own handle are the
    /// only owners left; any concurrent waiter holds a third.
    fn evict_name_lock(&self, name: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        if let Some(entry) = locks.get(name) {
            if Arc::ptr_eq(entry, lock) && Arc::strong_count(entry) == 2 {
                locks.remove(name);
            }
        }
    }
}

/// Scoped ownership of a staged file: removed explicitly on the success
/// path, removed by `Drop` on every other exit path.
struct StagedClip {
    path: PathBuf,
    armed: bool,
}

impl StagedClip {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    async fn remove(mut self) -> std::io::Result<()> {
        self.armed = false;
        tokio::fs::remove_file(&self.path).await
    }
}

impl Drop for StagedClip {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("Failed to remove staged clip {:?}: {}", self.path, e);
            }
        }
    }
}
