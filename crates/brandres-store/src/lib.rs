//! Durable run state: the resumable progress checkpoint and the published
//! logo mapping.

use std::path::{Path, PathBuf};

use brandres_core::ProgressStatus;
use thiserror::Error;

pub mod progress;
pub mod publish;

pub use progress::{Checkpoint, ProgressStore, RecordOutcome, CHECKPOINT_VERSION};
pub use publish::{build_artifact, publish, HashConflict, MappingArtifact, MappingRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {context}: {source}")]
    Serialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("checkpoint at {path} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("brand {brand}: cannot move from {from} to {to}")]
    InvalidTransition {
        brand: String,
        from: ProgressStatus,
        to: ProgressStatus,
    },

    #[error("brand {0} has no progress entry")]
    UnknownBrand(String),
}

/// Writes `bytes` to `path` through a sibling temp file and a rename, so a
/// crash never leaves a half-written file behind.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the directory, temp file or rename fails.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| StoreError::Io { path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await.map_err(io_err(&tmp))?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err(path))?;
    Ok(())
}
