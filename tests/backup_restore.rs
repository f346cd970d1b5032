//! Backup and restore integration tests

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use metrics_keeper::backup::{BackupManager, RestoreSummary};
use metrics_keeper::config::BackupConfig;
use metrics_keeper::metric::{Metric, MetricKind, MetricRecord, MetricValue};
use metrics_keeper::repository::{MemoryRepository, Repository};
use metrics_keeper::telemetry::ServiceStats;

fn backup_config(dir: &Path, interval_secs: u64) -> BackupConfig {
    BackupConfig {
        path: dir.to_path_buf(),
        file_name: "metrics-db.json".to_string(),
        interval_secs,
        restore: true,
    }
}

fn manager(dir: &Path, interval_secs: u64, repo: Arc<MemoryRepository>) -> BackupManager {
    BackupManager::new(&backup_config(dir, interval_secs), repo, ServiceStats::new())
}

/// Order-independent view of a repository's contents
fn contents(repo: &dyn Repository) -> HashSet<String> {
    repo.all()
        .iter()
        .map(|m| MetricRecord::to_line(m).unwrap())
        .collect()
}

#[test]
fn test_example_scenario_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let repo = MemoryRepository::new();
    repo.update_raw(MetricKind::Counter, "requests", "5").unwrap();
    repo.update_raw(MetricKind::Counter, "requests", "3").unwrap();
    repo.update_raw(MetricKind::Gauge, "temperature", "21.5").unwrap();
    repo.update_raw(MetricKind::Gauge, "temperature", "19.0").unwrap();
    manager(dir.path(), 300, repo).flush_now().unwrap();

    let fresh = MemoryRepository::new();
    let summary = manager(dir.path(), 300, fresh.clone()).restore();
    assert_eq!(summary, RestoreSummary { restored: 2, skipped: 0 });

    let mut restored = fresh.all_sorted();
    assert_eq!(restored.len(), 2);
    let temperature = restored.pop().unwrap();
    let requests = restored.pop().unwrap();
    assert_eq!(requests, Metric::counter("requests", 8).unwrap());
    assert_eq!(temperature.value(), MetricValue::Gauge(19.0));
}

#[test]
fn test_round_trip_is_set_equal() {
    let dir = tempfile::tempdir().unwrap();

    let repo = MemoryRepository::new();
    for i in 0..200i64 {
        repo.update(Metric::counter(format!("c{i}"), i * 7 - 300).unwrap())
            .unwrap();
        repo.update(Metric::gauge(format!("g{i}"), i as f64 / 3.0).unwrap())
            .unwrap();
    }
    manager(dir.path(), 300, repo.clone()).flush_now().unwrap();

    let fresh = MemoryRepository::new();
    manager(dir.path(), 300, fresh.clone()).restore();

    assert_eq!(fresh.len(), 400);
    assert_eq!(contents(&*fresh), contents(&*repo));
}

#[test]
fn test_partial_corruption_restores_valid_records() {
    let dir = tempfile::tempdir().unwrap();
    let lines = [
        r#"{"kind":"counter","name":"a","value":1}"#,
        r#"{"kind":"gauge","name":"b","value":2.5}"#,
        r#"{"kind":"counter","name":"c","valu"#,
        r#"{"kind":"gauge","name":"d","value":-4.25,"unit":"celsius"}"#,
    ];
    std::fs::write(
        dir.path().join("metrics-db.json"),
        format!("{}\n", lines.join("\n")),
    )
    .unwrap();

    let repo = MemoryRepository::new();
    let summary = manager(dir.path(), 300, repo.clone()).restore();

    assert_eq!(summary, RestoreSummary { restored: 3, skipped: 1 });
    assert!(repo.exists(MetricKind::Counter, "a"));
    assert!(repo.exists(MetricKind::Gauge, "b"));
    assert!(!repo.exists(MetricKind::Counter, "c"));
    assert_eq!(repo.get(MetricKind::Gauge, "d").unwrap().string_value(), "-4.25");
}

#[test]
fn test_invalid_utf8_line_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = b"{\"kind\":\"counter\",\"name\":\"a\",\"value\":1}\n".to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
    bytes.extend_from_slice(b"{\"kind\":\"counter\",\"name\":\"b\",\"value\":2}\n");
    std::fs::write(dir.path().join("metrics-db.json"), bytes).unwrap();

    let repo = MemoryRepository::new();
    let summary = manager(dir.path(), 300, repo.clone()).restore();
    assert_eq!(summary, RestoreSummary { restored: 2, skipped: 1 });
}

#[test]
fn test_unreadable_sink_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    // The backup "file" is a directory
    std::fs::create_dir(dir.path().join("metrics-db.json")).unwrap();

    let repo = MemoryRepository::new();
    let summary = manager(dir.path(), 300, repo.clone()).restore();
    assert_eq!(summary, RestoreSummary::default());
    assert!(repo.is_empty());
}

#[tokio::test]
async fn test_stop_flushes_before_interval_elapses() {
    let dir = tempfile::tempdir().unwrap();
    let repo = MemoryRepository::new();
    let backup = manager(dir.path(), 3600, repo.clone());

    backup.start();
    repo.update_raw(MetricKind::Counter, "requests", "5").unwrap();
    repo.update_raw(MetricKind::Gauge, "temperature", "21.5").unwrap();
    backup.stop().await;

    let fresh = MemoryRepository::new();
    manager(dir.path(), 3600, fresh.clone()).restore();
    assert_eq!(contents(&*fresh), contents(&*repo));
}

#[tokio::test]
async fn test_reset_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let repo = MemoryRepository::new();
    repo.update_raw(MetricKind::Counter, "requests", "5").unwrap();

    let backup = manager(dir.path(), 3600, repo.clone());
    backup.flush_now().unwrap();
    repo.reset_all();
    backup.stop().await;

    let written = std::fs::read_to_string(backup.file_path()).unwrap();
    assert!(written.is_empty());
}
