//! Resumable per-brand progress with an improvement-only mapping merge.
//!
//! The whole checkpoint is small (one entry per configured brand), so it is
//! kept in memory and rewritten atomically on every flush.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use brandres_core::{ProgressEntry, ProgressStatus, ResolvedMapping};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{write_atomic, StoreError};

pub const CHECKPOINT_VERSION: u32 = 1;

/// On-disk checkpoint layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    #[serde(default)]
    pub progress: BTreeMap<String, ProgressEntry>,
    #[serde(default)]
    pub mappings: BTreeMap<String, ResolvedMapping>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            progress: BTreeMap::new(),
            mappings: BTreeMap::new(),
        }
    }
}

/// What [`ProgressStore::record_result`] did with the offered mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// First mapping for the brand; stored at revision 1.
    Inserted { confidence: f64 },
    /// Replaced a weaker mapping.
    Improved { previous: f64, confidence: f64, revision: u64 },
    /// The stored mapping was at least as confident and was kept.
    Kept { stored: f64, offered: f64 },
    /// No mapping offered and none stored.
    Failed,
    /// No mapping offered; the stored one stands.
    Retained { stored: f64 },
}

impl RecordOutcome {
    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        match self {
            RecordOutcome::Failed => ProgressStatus::Failed,
            _ => ProgressStatus::Done,
        }
    }
}

pub struct ProgressStore {
    path: PathBuf,
    state: Mutex<Checkpoint>,
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ProgressStore {
    /// Opens the checkpoint at `path`, starting empty when the file does not
    /// exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read, or
    /// [`StoreError::Corrupt`] if it does not parse or has an unknown version.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let checkpoint = match tokio::fs::read(&path).await {
            Ok(bytes) => parse_checkpoint(&path, &bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no checkpoint yet, starting fresh");
                Checkpoint::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(
            path = %path.display(),
            brands = checkpoint.progress.len(),
            mappings = checkpoint.mappings.len(),
            "checkpoint loaded"
        );
        Ok(Self {
            path,
            state: Mutex::new(checkpoint),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, brand_id: &str) -> Option<ProgressEntry> {
        self.state.lock().await.progress.get(brand_id).cloned()
    }

    pub async fn mapping(&self, brand_id: &str) -> Option<ResolvedMapping> {
        self.state.lock().await.mappings.get(brand_id).cloned()
    }

    /// `true` when the brand finished in an earlier attempt and should be
    /// skipped.
    pub async fn is_complete(&self, brand_id: &str) -> bool {
        self.state
            .lock()
            .await
            .progress
            .get(brand_id)
            .is_some_and(|e| e.status == ProgressStatus::Done)
    }

    /// Copy of the whole checkpoint, for reporting and publishing.
    pub async fn snapshot(&self) -> Checkpoint {
        self.state.lock().await.clone()
    }

    /// Marks the brand `InProgress`, creating a `Pending` entry first when
    /// the brand is new. Bumps the attempt counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] when the brand is `Done` or
    /// `Failed`; a failed brand must be reset before it is retried.
    pub async fn begin_attempt(&self, brand_id: &str) -> Result<ProgressEntry, StoreError> {
        let mut state = self.state.lock().await;
        let entry = state
            .progress
            .entry(brand_id.to_string())
            .or_insert_with(|| ProgressEntry::pending(brand_id));
        transition(entry, ProgressStatus::InProgress)?;
        entry.attempt_count += 1;
        entry.last_attempt_at = Some(Utc::now());
        Ok(entry.clone())
    }

    /// Records the outcome of an attempt and flushes the checkpoint.
    ///
    /// A mapping replaces the stored one only when its confidence is
    /// strictly higher; the stored revision is bumped on replacement. With
    /// no mapping the brand is `Failed`, unless an earlier mapping exists,
    /// in which case it stays `Done` with that mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownBrand`] if the attempt was never begun,
    /// [`StoreError::InvalidTransition`] if the brand is not `InProgress`, or
    /// an I/O error from the flush.
    pub async fn record_result(
        &self,
        brand_id: &str,
        mapping: Option<ResolvedMapping>,
    ) -> Result<RecordOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let current = state
            .progress
            .get(brand_id)
            .map(|e| e.status)
            .ok_or_else(|| StoreError::UnknownBrand(brand_id.to_string()))?;
        if current != ProgressStatus::InProgress {
            return Err(StoreError::InvalidTransition {
                brand: brand_id.to_string(),
                from: current,
                to: ProgressStatus::Done,
            });
        }

        let outcome = merge_mapping(&mut state.mappings, brand_id, mapping);
        if let Some(entry) = state.progress.get_mut(brand_id) {
            transition(entry, outcome.status())?;
        }

        match &outcome {
            RecordOutcome::Kept { stored, offered } => tracing::info!(
                brand = %brand_id,
                stored,
                offered,
                "existing mapping is at least as confident, keeping it"
            ),
            RecordOutcome::Improved { previous, confidence, revision } => tracing::info!(
                brand = %brand_id,
                previous,
                confidence,
                revision,
                "mapping improved"
            ),
            _ => tracing::debug!(brand = %brand_id, outcome = ?outcome, "result recorded"),
        }

        write_checkpoint(&self.path, &state).await?;
        Ok(outcome)
    }

    /// Moves every `Failed` brand back to `Pending` and flushes. Returns the
    /// number of brands reset.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the flush fails.
    pub async fn reset_failed(&self) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let ids: Vec<String> = state.progress.keys().cloned().collect();
        reset_failed_in(&self.path, &mut state, &ids).await
    }

    /// Like [`reset_failed`](Self::reset_failed), limited to `brand_ids`.
    /// Unknown brands are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the flush fails.
    pub async fn reset_failed_for(&self, brand_ids: &[String]) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        reset_failed_in(&self.path, &mut state, brand_ids).await
    }

    /// Moves the named `Done` brands back to `Pending` so they are resolved
    /// again. Stored mappings are kept and compete with the new result.
    /// Unknown or unfinished brands are ignored. Returns the number reopened.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the flush fails.
    pub async fn reopen(&self, brand_ids: &[String]) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let mut reopened = 0;
        for id in brand_ids {
            if let Some(entry) = state.progress.get_mut(id) {
                if entry.status == ProgressStatus::Done {
                    transition(entry, ProgressStatus::Pending)?;
                    reopened += 1;
                }
            }
        }
        if reopened > 0 {
            write_checkpoint(&self.path, &state).await?;
        }
        Ok(reopened)
    }

    /// Writes the current checkpoint to disk.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if serialization or the atomic write fails.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let state = self.state.lock().await;
        write_checkpoint(&self.path, &state).await
    }
}

async fn reset_failed_in(
    path: &Path,
    state: &mut Checkpoint,
    brand_ids: &[String],
) -> Result<usize, StoreError> {
    let mut reset = 0;
    for id in brand_ids {
        if let Some(entry) = state.progress.get_mut(id) {
            if entry.status == ProgressStatus::Failed {
                transition(entry, ProgressStatus::Pending)?;
                reset += 1;
            }
        }
    }
    if reset > 0 {
        write_checkpoint(path, state).await?;
    }
    Ok(reset)
}

fn transition(entry: &mut ProgressEntry, next: ProgressStatus) -> Result<(), StoreError> {
    if !entry.status.can_transition_to(next) {
        return Err(StoreError::InvalidTransition {
            brand: entry.brand_id.clone(),
            from: entry.status,
            to: next,
        });
    }
    entry.status = next;
    Ok(())
}

fn merge_mapping(
    mappings: &mut BTreeMap<String, ResolvedMapping>,
    brand_id: &str,
    offered: Option<ResolvedMapping>,
) -> RecordOutcome {
    let stored = mappings.get(brand_id).map(|m| (m.confidence, m.revision));
    let Some(mut mapping) = offered else {
        return stored.map_or(RecordOutcome::Failed, |(stored, _)| RecordOutcome::Retained {
            stored,
        });
    };

    let confidence = mapping.confidence;
    match stored {
        None => {
            mapping.revision = 1;
            mappings.insert(brand_id.to_string(), mapping);
            RecordOutcome::Inserted { confidence }
        }
        Some((previous, revision)) if confidence > previous => {
            mapping.revision = revision + 1;
            mappings.insert(brand_id.to_string(), mapping);
            RecordOutcome::Improved {
                previous,
                confidence,
                revision: revision + 1,
            }
        }
        Some((stored, _)) => RecordOutcome::Kept {
            stored,
            offered: confidence,
        },
    }
}

fn parse_checkpoint(path: &Path, bytes: &[u8]) -> Result<Checkpoint, StoreError> {
    let checkpoint: Checkpoint =
        serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if checkpoint.version != CHECKPOINT_VERSION {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!(
                "unsupported version {} (expected {CHECKPOINT_VERSION})",
                checkpoint.version
            ),
        });
    }
    Ok(checkpoint)
}

async fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(checkpoint).map_err(|source| StoreError::Serialize {
        context: "checkpoint",
        source,
    })?;
    write_atomic(path, &bytes).await
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;
