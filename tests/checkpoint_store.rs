//! Checkpoint Store Integration Tests
//!
//! File-backed persistence: atomic replacement, session isolation, key
//! validation, and concurrent writers.

use std::sync::Arc;

use sentinels::core::CheckpointStore;
use sentinels::domain::{AuditRecord, RiskLevel};
use sentinels::FileCheckpointStore;
use tempfile::TempDir;

#[tokio::test]
async fn test_save_replaces_previous_checkpoint() {
    let temp = TempDir::new().unwrap();
    let store = FileCheckpointStore::open(temp.path()).unwrap();

    let mut record = AuditRecord::new();
    store.save("audit-1", &record, Some("enforcement")).await.unwrap();

    record.risk_level = RiskLevel::Critical;
    record.findings.push("VISA GATEWAY: blocked".to_string());
    store.save("audit-1", &record, None).await.unwrap();

    let checkpoint = store.load("audit-1").await.unwrap().unwrap();
    assert_eq!(checkpoint.session, "audit-1");
    assert_eq!(checkpoint.record, record);
    assert!(!checkpoint.is_paused());
    assert!(store.get_pending("audit-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_no_partial_files_left_behind() {
    let temp = TempDir::new().unwrap();
    let store = FileCheckpointStore::open(temp.path()).unwrap();

    for _ in 0..5 {
        store.save("audit-1", &AuditRecord::new(), None).await.unwrap();
    }

    let json_files: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".json"))
        .collect();
    assert_eq!(json_files, vec!["audit-1.json".to_string()]);
}

#[tokio::test]
async fn test_sessions_do_not_interfere() {
    let temp = TempDir::new().unwrap();
    let store = FileCheckpointStore::open(temp.path()).unwrap();

    store
        .save("a", &AuditRecord::new().with_red_team(true), Some("enforcement"))
        .await
        .unwrap();
    store.save("b", &AuditRecord::new(), None).await.unwrap();

    assert!(store.load("a").await.unwrap().unwrap().record.red_team_mode);
    assert!(!store.load("b").await.unwrap().unwrap().record.red_team_mode);
    assert_eq!(store.get_pending("a").await.unwrap().as_deref(), Some("enforcement"));
    assert_eq!(store.list_sessions().await.unwrap(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_invalid_session_keys_rejected() {
    let temp = TempDir::new().unwrap();
    let store = FileCheckpointStore::open(temp.path()).unwrap();

    for key in ["", "../outside", "a/b", ".hidden"] {
        assert!(
            store.save(key, &AuditRecord::new(), None).await.is_err(),
            "key {:?} accepted",
            key
        );
        assert!(store.load(key).await.is_err());
    }
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_an_error() {
    let temp = TempDir::new().unwrap();
    let store = FileCheckpointStore::open(temp.path()).unwrap();

    std::fs::write(temp.path().join("broken.json"), "{ not json").unwrap();
    assert!(store.load("broken").await.is_err());
}

#[tokio::test]
async fn test_concurrent_writers_leave_a_whole_checkpoint() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FileCheckpointStore::open(temp.path()).unwrap());

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let mut record = AuditRecord::new();
                record.retry_count = i;
                store.save("shared", &record, None).await
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let checkpoint = store.load("shared").await.unwrap().unwrap();
    assert!(checkpoint.record.retry_count < 8);
}
