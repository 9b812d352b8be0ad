//! Read-only and maintenance commands over the checkpoint.

use brandres_core::AppConfig;
use brandres_store::{build_artifact, publish, Checkpoint, ProgressStore};
use chrono::Utc;

/// Prints one line per configured brand: status, attempts and the chosen
/// asset, if any.
///
/// # Errors
///
/// Returns an error if the brands config or the checkpoint cannot be read.
pub(crate) async fn run_status(config: &AppConfig, brand_filter: Option<&str>) -> anyhow::Result<()> {
    let brands = brandres_core::load_brands(&config.brands_path)?.entities();
    let store = ProgressStore::open(config.checkpoint_path()).await?;
    let checkpoint = store.snapshot().await;

    let rows: Vec<String> = brands
        .iter()
        .filter(|b| brand_filter.is_none_or(|slug| b.id == slug))
        .map(|b| status_line(&checkpoint, &b.id))
        .collect();

    if rows.is_empty() {
        println!(
            "no brands configured{}",
            brand_filter
                .map(|s| format!(" matching {s}"))
                .unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "{:<24}{:<13}{:<10}{:<12}{:<18}URL",
        "BRAND", "STATUS", "ATTEMPTS", "CONFIDENCE", "SOURCE"
    );
    for row in rows {
        println!("{row}");
    }
    Ok(())
}

fn status_line(checkpoint: &Checkpoint, slug: &str) -> String {
    let entry = checkpoint.progress.get(slug);
    let status = entry.map_or("pending", |e| e.status.as_str());
    let attempts = entry.map_or(0, |e| e.attempt_count);
    match checkpoint.mappings.get(slug) {
        Some(m) => format!(
            "{slug:<24}{status:<13}{attempts:<10}{:<12.2}{:<18}{}",
            m.confidence,
            m.source_type.as_str(),
            m.chosen_url
        ),
        None => format!("{slug:<24}{status:<13}{attempts:<10}{:<12}{:<18}-", "-", "-"),
    }
}

/// # Errors
///
/// Returns an error if the checkpoint cannot be read or written.
pub(crate) async fn run_reset_failed(config: &AppConfig) -> anyhow::Result<()> {
    let store = ProgressStore::open(config.checkpoint_path()).await?;
    let reset = store.reset_failed().await?;
    println!("reset {reset} failed brand(s) to pending");
    Ok(())
}

/// Rebuilds the mapping artifact without resolving anything.
///
/// # Errors
///
/// Returns an error if the brands config or checkpoint cannot be read, or
/// the artifact cannot be written.
pub(crate) async fn run_publish(config: &AppConfig) -> anyhow::Result<()> {
    let brands = brandres_core::load_brands(&config.brands_path)?.entities();
    let store = ProgressStore::open(config.checkpoint_path()).await?;
    let artifact = build_artifact(&brands, &store.snapshot().await, Utc::now());
    publish(&config.mapping_path(), &artifact).await?;
    println!(
        "published {} of {} brands to {}",
        artifact.resolved_count(),
        artifact.brands.len(),
        config.mapping_path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandres_core::{ProgressEntry, ProgressStatus, ResolvedMapping, SourceType};

    #[test]
    fn status_line_shows_mapping_details() {
        let mut cp = Checkpoint::default();
        cp.progress.insert(
            "acme".into(),
            ProgressEntry {
                status: ProgressStatus::Done,
                attempt_count: 2,
                ..ProgressEntry::pending("acme")
            },
        );
        cp.mappings.insert(
            "acme".into(),
            ResolvedMapping {
                brand_id: "acme".into(),
                chosen_url: "https://acme.example/logo.png".into(),
                confidence: 94.86,
                source_type: SourceType::DirectSite,
                alternatives: vec![],
                resolved_at: Utc::now(),
                revision: 1,
                content_hash: None,
            },
        );

        let line = status_line(&cp, "acme");
        assert!(line.starts_with("acme"));
        assert!(line.contains("done"));
        assert!(line.contains("94.86"));
        assert!(line.contains("direct_site"));
        assert!(line.ends_with("https://acme.example/logo.png"));
    }

    #[test]
    fn unknown_brand_reads_as_pending() {
        let line = status_line(&Checkpoint::default(), "ghost");
        assert!(line.contains("pending"));
        assert!(line.ends_with('-'));
    }
}
