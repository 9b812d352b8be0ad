use super::*;
use brandres_core::SourceType;
use tempfile::TempDir;

fn mapping(brand: &str, url: &str, confidence: f64) -> ResolvedMapping {
    ResolvedMapping {
        brand_id: brand.to_string(),
        chosen_url: url.to_string(),
        confidence,
        source_type: SourceType::DirectSite,
        alternatives: vec![],
        resolved_at: Utc::now(),
        revision: 0,
        content_hash: None,
    }
}

async fn store_in(dir: &TempDir) -> ProgressStore {
    ProgressStore::open(dir.path().join("checkpoint.json"))
        .await
        .unwrap()
}

async fn attempt(store: &ProgressStore, brand: &str, result: Option<ResolvedMapping>) -> RecordOutcome {
    store.begin_attempt(brand).await.unwrap();
    store.record_result(brand, result).await.unwrap()
}

#[tokio::test]
async fn missing_file_opens_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;
    assert!(store.get("acme").await.is_none());
    assert!(!store.is_complete("acme").await);
    assert_eq!(store.snapshot().await, Checkpoint::default());
}

#[tokio::test]
async fn begin_attempt_creates_entry_and_counts_attempts() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    let first = store.begin_attempt("acme").await.unwrap();
    assert_eq!(first.status, ProgressStatus::InProgress);
    assert_eq!(first.attempt_count, 1);
    assert!(first.last_attempt_at.is_some());

    // A crash leaves InProgress behind; the next run may start again.
    let second = store.begin_attempt("acme").await.unwrap();
    assert_eq!(second.attempt_count, 2);
}

#[tokio::test]
async fn first_mapping_gets_revision_one_and_is_persisted() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    let outcome = attempt(&store, "acme", Some(mapping("acme", "https://acme.example/logo.png", 86.7))).await;
    assert_eq!(outcome, RecordOutcome::Inserted { confidence: 86.7 });

    let reopened = store_in(&dir).await;
    assert!(reopened.is_complete("acme").await);
    let stored = reopened.mapping("acme").await.unwrap();
    assert_eq!(stored.revision, 1);
    assert_eq!(stored.chosen_url, "https://acme.example/logo.png");
}

#[tokio::test]
async fn weaker_or_equal_mapping_never_overwrites() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;
    attempt(&store, "acme", Some(mapping("acme", "https://acme.example/a.png", 80.0))).await;

    for offered in [80.0, 42.5] {
        store.reopen(&["acme".to_string()]).await.unwrap();
        let outcome = attempt(&store, "acme", Some(mapping("acme", "https://acme.example/b.png", offered))).await;
        assert_eq!(outcome, RecordOutcome::Kept { stored: 80.0, offered });
        assert_eq!(store.get("acme").await.unwrap().status, ProgressStatus::Done);
    }

    let stored = store.mapping("acme").await.unwrap();
    assert_eq!(stored.chosen_url, "https://acme.example/a.png");
    assert_eq!(stored.revision, 1);
}

#[tokio::test]
async fn stronger_mapping_overwrites_and_bumps_revision() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;
    attempt(&store, "acme", Some(mapping("acme", "https://acme.example/a.png", 60.0))).await;
    store.reopen(&["acme".to_string()]).await.unwrap();

    let outcome = attempt(&store, "acme", Some(mapping("acme", "https://acme.example/b.png", 91.0))).await;

    assert_eq!(
        outcome,
        RecordOutcome::Improved {
            previous: 60.0,
            confidence: 91.0,
            revision: 2
        }
    );
    let stored = store.mapping("acme").await.unwrap();
    assert_eq!(stored.chosen_url, "https://acme.example/b.png");
    assert_eq!(stored.revision, 2);
}

#[tokio::test]
async fn no_mapping_marks_failed_unless_one_is_stored() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    assert_eq!(attempt(&store, "ghost", None).await, RecordOutcome::Failed);
    assert_eq!(store.get("ghost").await.unwrap().status, ProgressStatus::Failed);
    assert!(!store.is_complete("ghost").await);

    attempt(&store, "acme", Some(mapping("acme", "https://acme.example/a.png", 70.0))).await;
    store.reopen(&["acme".to_string()]).await.unwrap();
    assert_eq!(
        attempt(&store, "acme", None).await,
        RecordOutcome::Retained { stored: 70.0 }
    );
    assert!(store.is_complete("acme").await);
}

#[tokio::test]
async fn failed_brand_needs_reset_before_retry() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;
    attempt(&store, "ghost", None).await;

    let err = store.begin_attempt("ghost").await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidTransition { from: ProgressStatus::Failed, .. }
    ));

    assert_eq!(store.reset_failed().await.unwrap(), 1);
    assert_eq!(store.get("ghost").await.unwrap().status, ProgressStatus::Pending);
    assert!(store.begin_attempt("ghost").await.is_ok());
}

#[tokio::test]
async fn scoped_reset_leaves_other_failures_alone() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;
    attempt(&store, "ghost", None).await;
    attempt(&store, "wraith", None).await;

    let reset = store
        .reset_failed_for(&["ghost".to_string(), "unknown".to_string()])
        .await
        .unwrap();

    assert_eq!(reset, 1);
    assert_eq!(store.get("ghost").await.unwrap().status, ProgressStatus::Pending);
    assert_eq!(store.get("wraith").await.unwrap().status, ProgressStatus::Failed);
    let reloaded = store_in(&dir).await;
    assert_eq!(reloaded.get("ghost").await.unwrap().status, ProgressStatus::Pending);
}

#[tokio::test]
async fn done_brand_cannot_restart_without_reopen() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;
    attempt(&store, "acme", Some(mapping("acme", "https://acme.example/a.png", 70.0))).await;

    assert!(store.begin_attempt("acme").await.is_err());
    assert_eq!(
        store.reopen(&["acme".to_string(), "unknown".to_string()]).await.unwrap(),
        1
    );
    assert!(store.begin_attempt("acme").await.is_ok());
}

#[tokio::test]
async fn recording_without_attempt_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    let err = store.record_result("acme", None).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownBrand(ref b) if b == "acme"));
}

#[tokio::test]
async fn corrupt_checkpoint_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    tokio::fs::write(&path, b"{ not json").await.unwrap();

    let err = ProgressStore::open(&path).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}

#[tokio::test]
async fn unknown_version_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    tokio::fs::write(&path, br#"{"version": 99}"#).await.unwrap();

    let err = ProgressStore::open(&path).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { ref reason, .. } if reason.contains("99")));
}

#[tokio::test]
async fn flush_leaves_no_temp_file() {
    let dir = TempDir::new().unwrap();
    let store = ProgressStore::open(dir.path().join("nested/checkpoint.json"))
        .await
        .unwrap();
    store.begin_attempt("acme").await.unwrap();
    store.flush().await.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path().join("nested"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["checkpoint.json".to_string()]);

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
    assert_eq!(raw["version"], 1);
    assert_eq!(raw["progress"]["acme"]["status"], "in_progress");
}
