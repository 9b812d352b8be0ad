//! Builds and writes `logo-mapping.json`, the artifact downstream templating
//! consumes.

use std::collections::BTreeMap;
use std::path::Path;

use brandres_core::{BrandEntity, ProgressStatus, ResolvedMapping};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::progress::Checkpoint;
use crate::{write_atomic, StoreError};

/// One record per configured brand. Brands without a mapping get an
/// explicit marker instead of being left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MappingRecord {
    Resolved(ResolvedMapping),
    Failed {
        slug: String,
        attempt_count: u32,
        last_attempt_at: Option<DateTime<Utc>>,
    },
    /// Not attempted yet, or interrupted before finishing.
    Pending { slug: String, attempt_count: u32 },
}

impl MappingRecord {
    #[must_use]
    pub fn slug(&self) -> &str {
        match self {
            MappingRecord::Resolved(m) => &m.brand_id,
            MappingRecord::Failed { slug, .. } | MappingRecord::Pending { slug, .. } => slug,
        }
    }
}

/// Brands whose chosen assets have identical bytes, usually a shared
/// placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashConflict {
    pub content_hash: String,
    pub slugs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingArtifact {
    pub generated_at: DateTime<Utc>,
    pub brands: Vec<MappingRecord>,
    pub conflicts: Vec<HashConflict>,
}

impl MappingArtifact {
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.brands
            .iter()
            .filter(|r| matches!(r, MappingRecord::Resolved(_)))
            .count()
    }
}

/// Assembles the artifact in configuration order.
#[must_use]
pub fn build_artifact(
    brands: &[BrandEntity],
    checkpoint: &Checkpoint,
    generated_at: DateTime<Utc>,
) -> MappingArtifact {
    let records: Vec<MappingRecord> = brands
        .iter()
        .map(|brand| {
            if let Some(mapping) = checkpoint.mappings.get(&brand.id) {
                return MappingRecord::Resolved(mapping.clone());
            }
            let entry = checkpoint.progress.get(&brand.id);
            let attempt_count = entry.map_or(0, |e| e.attempt_count);
            match entry {
                Some(e) if e.status == ProgressStatus::Failed => MappingRecord::Failed {
                    slug: brand.id.clone(),
                    attempt_count,
                    last_attempt_at: e.last_attempt_at,
                },
                _ => MappingRecord::Pending {
                    slug: brand.id.clone(),
                    attempt_count,
                },
            }
        })
        .collect();

    let mut by_hash: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for record in &records {
        if let MappingRecord::Resolved(m) = record {
            if let Some(hash) = m.content_hash.as_deref() {
                by_hash.entry(hash).or_default().push(m.brand_id.clone());
            }
        }
    }
    let conflicts: Vec<HashConflict> = by_hash
        .into_iter()
        .filter(|(_, slugs)| slugs.len() > 1)
        .map(|(hash, slugs)| HashConflict {
            content_hash: hash.to_string(),
            slugs,
        })
        .collect();

    for conflict in &conflicts {
        tracing::warn!(
            hash = %conflict.content_hash,
            brands = ?conflict.slugs,
            "brands resolved to identical logo bytes"
        );
    }

    MappingArtifact {
        generated_at,
        brands: records,
        conflicts,
    }
}

/// Writes the artifact atomically as pretty JSON.
///
/// # Errors
///
/// Returns [`StoreError::Serialize`] or [`StoreError::Io`] on failure.
pub async fn publish(path: &Path, artifact: &MappingArtifact) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(artifact).map_err(|source| StoreError::Serialize {
        context: "logo mapping",
        source,
    })?;
    write_atomic(path, &bytes).await?;
    tracing::info!(
        path = %path.display(),
        brands = artifact.brands.len(),
        resolved = artifact.resolved_count(),
        conflicts = artifact.conflicts.len(),
        "logo mapping published"
    );
    Ok(())
}
