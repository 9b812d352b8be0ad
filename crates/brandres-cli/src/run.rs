//! The `run` command: resolves pending brands with bounded parallelism,
//! records every outcome in the checkpoint and publishes the mapping.
//!
//! Per-brand failures are recorded and the run moves on; only checkpoint
//! I/O errors abort it.

use std::fmt;

use async_trait::async_trait;
use brandres_core::{AppConfig, BrandEntity, EngineTuning, ProgressStatus};
use brandres_scraper::{Resolution, Resolver, ResolverSettings};
use brandres_store::{build_artifact, publish, ProgressStore, RecordOutcome, StoreError};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub(crate) struct RunOptions {
    pub brand_filter: Option<String>,
    pub retry_failed: bool,
    pub refresh: bool,
}

/// Resolution seam so the orchestration can run against a fake.
#[async_trait]
pub(crate) trait BrandResolver: Send + Sync {
    async fn resolve(&self, brand: &BrandEntity) -> Resolution;
}

#[async_trait]
impl BrandResolver for Resolver {
    async fn resolve(&self, brand: &BrandEntity) -> Resolution {
        Resolver::resolve(self, brand).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrandOutcome {
    Resolved,
    Failed,
    /// Interrupted by cancellation; stays in progress for the next run.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub run_id: Uuid,
    pub total: usize,
    pub resolved: usize,
    pub failed: usize,
    /// Already finished, or failed and not reset.
    pub skipped: usize,
    pub cancelled: usize,
    pub geo_blocked: usize,
}

impl RunSummary {
    fn new(total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            total,
            resolved: 0,
            failed: 0,
            skipped: 0,
            cancelled: 0,
            geo_blocked: 0,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {}: {} brands, {} resolved, {} failed, {} skipped, {} cancelled ({} geo-blocked sources)",
            self.run_id,
            self.total,
            self.resolved,
            self.failed,
            self.skipped,
            self.cancelled,
            self.geo_blocked
        )
    }
}

/// Loads brands and state, resolves, then flushes and publishes.
///
/// Ctrl-C cancels the run: no new brand or fetch starts, in-flight work
/// settles, and the checkpoint and mapping are still written.
///
/// # Errors
///
/// Returns an error if configuration or the checkpoint cannot be loaded,
/// the brand filter matches nothing, or the checkpoint cannot be written.
pub(crate) async fn run_resolution(
    config: &AppConfig,
    options: &RunOptions,
) -> anyhow::Result<RunSummary> {
    let brands = brandres_core::load_brands(&config.brands_path)?.entities();
    let selected = select_brands(&brands, options.brand_filter.as_deref())?;

    let store = ProgressStore::open(config.checkpoint_path()).await?;
    prepare_selected(&store, &selected, options).await?;

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let resolver = Resolver::with_default_deps(
        &ResolverSettings::from(config),
        EngineTuning::default(),
        cancel.clone(),
    )?;
    let result = execute(
        &selected,
        &store,
        &resolver,
        config.max_concurrent_brands,
        &cancel,
    )
    .await;
    watcher.abort();

    store.flush().await?;
    let artifact = build_artifact(&brands, &store.snapshot().await, Utc::now());
    publish(&config.mapping_path(), &artifact).await?;

    let summary = result?;
    tracing::info!(
        run_id = %summary.run_id,
        total = summary.total,
        resolved = summary.resolved,
        failed = summary.failed,
        skipped = summary.skipped,
        cancelled = summary.cancelled,
        geo_blocked = summary.geo_blocked,
        "run finished"
    );
    Ok(summary)
}

fn select_brands(
    brands: &[BrandEntity],
    brand_filter: Option<&str>,
) -> anyhow::Result<Vec<BrandEntity>> {
    match brand_filter {
        Some(slug) => {
            let brand = brands
                .iter()
                .find(|b| b.id == slug)
                .ok_or_else(|| anyhow::anyhow!("brand '{slug}' not found in brands config"))?;
            Ok(vec![brand.clone()])
        }
        None => Ok(brands.to_vec()),
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupt received; finishing in-flight work");
        cancel.cancel();
    }
}

/// Resolves every brand in `brands` that still needs work, at most
/// `max_concurrent` at a time.
///
/// # Errors
///
/// Returns the first [`StoreError`]; the remaining brands are abandoned.
pub(crate) async fn execute<R: BrandResolver>(
    brands: &[BrandEntity],
    store: &ProgressStore,
    resolver: &R,
    max_concurrent: usize,
    cancel: &CancellationToken,
) -> Result<RunSummary, StoreError> {
    let mut summary = RunSummary::new(brands.len());

    let mut pending = Vec::new();
    for brand in brands {
        match store.get(&brand.id).await.map(|e| e.status) {
            Some(ProgressStatus::Done) => {
                tracing::debug!(brand = %brand.id, "already resolved, skipping");
                summary.skipped += 1;
            }
            Some(ProgressStatus::Failed) => {
                tracing::debug!(brand = %brand.id, "failed earlier and not reset, skipping");
                summary.skipped += 1;
            }
            _ => pending.push(brand),
        }
    }
    tracing::info!(
        run_id = %summary.run_id,
        pending = pending.len(),
        skipped = summary.skipped,
        "starting run"
    );

    let outcomes: Vec<(BrandOutcome, usize)> = stream::iter(pending)
        .map(|brand| process_brand(brand, store, resolver, cancel))
        .buffer_unordered(max_concurrent.max(1))
        .try_collect()
        .await?;

    for (outcome, geo_blocked) in outcomes {
        summary.geo_blocked += geo_blocked;
        match outcome {
            BrandOutcome::Resolved => summary.resolved += 1,
            BrandOutcome::Failed => summary.failed += 1,
            BrandOutcome::Cancelled => summary.cancelled += 1,
        }
    }

    if summary.failed > 0 {
        tracing::warn!(
            failed = summary.failed,
            total = summary.total,
            "some brands could not be resolved"
        );
    }
    Ok(summary)
}

/// Applies `--retry-failed` and `--refresh` to the selected brands only.
async fn prepare_selected(
    store: &ProgressStore,
    selected: &[BrandEntity],
    options: &RunOptions,
) -> Result<(), StoreError> {
    let ids: Vec<String> = selected.iter().map(|b| b.id.clone()).collect();
    if options.retry_failed {
        let reset = store.reset_failed_for(&ids).await?;
        tracing::info!(reset, "failed brands reset to pending");
    }
    if options.refresh {
        let reopened = store.reopen(&ids).await?;
        tracing::info!(reopened, "finished brands reopened for refresh");
    }
    Ok(())
}

async fn process_brand<R: BrandResolver>(
    brand: &BrandEntity,
    store: &ProgressStore,
    resolver: &R,
    cancel: &CancellationToken,
) -> Result<(BrandOutcome, usize), StoreError> {
    if cancel.is_cancelled() {
        return Ok((BrandOutcome::Cancelled, 0));
    }

    let entry = store.begin_attempt(&brand.id).await?;
    tracing::debug!(brand = %brand.id, attempt = entry.attempt_count, "resolving brand");

    let resolution = resolver.resolve(brand).await;
    let geo_blocked = resolution.stats.geo_blocked;

    // A mapping picked from a cut-short candidate set is not final.
    if resolution.cancelled {
        tracing::info!(
            brand = %brand.id,
            partial = resolution.mapping.is_some(),
            "cancelled mid-resolution; left in progress"
        );
        return Ok((BrandOutcome::Cancelled, geo_blocked));
    }

    let outcome = match store.record_result(&brand.id, resolution.mapping).await? {
        RecordOutcome::Failed => BrandOutcome::Failed,
        _ => BrandOutcome::Resolved,
    };
    Ok((outcome, geo_blocked))
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
