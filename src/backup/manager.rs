//! Backup manager
//!
//! Persists the whole repository to a newline-delimited file, either on a
//! fixed interval or after every change, and replays that file at startup.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::atomic::write_atomic;
use crate::config::BackupConfig;
use crate::error::Result;
use crate::metric::MetricRecord;
use crate::repository::{ChannelObserver, ObserverId, Repository};
use crate::telemetry::ServiceStats;

/// Lifecycle of the persistence loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    /// Constructed, loop not started
    Idle,
    /// Timer or observer loop running
    Running,
    /// Final flush done, loop halted
    Stopped,
}

/// Outcome of a restore pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: usize,
    pub skipped: usize,
}

/// Owns the backup loop for one repository
pub struct BackupManager {
    inner: Arc<BackupInner>,
    lifecycle: Mutex<Lifecycle>,
}

struct BackupInner {
    file_path: PathBuf,
    interval: Duration,
    restore: bool,
    repository: Arc<dyn Repository>,
    stats: Arc<ServiceStats>,
    /// Held for the duration of a flush; flushes never overlap
    flush_lock: Mutex<()>,
}

struct Lifecycle {
    state: BackupState,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    observer: Option<ObserverId>,
}

/// What wakes the loop up
enum Trigger {
    Ticker(Interval),
    Changes(mpsc::Receiver<()>),
}

impl Trigger {
    /// Wait for the next flush trigger; `false` when the source is gone
    async fn next(&mut self) -> bool {
        match self {
            Trigger::Ticker(interval) => {
                interval.tick().await;
                true
            }
            Trigger::Changes(rx) => rx.recv().await.is_some(),
        }
    }
}

impl BackupManager {
    /// Create a manager for `repository` using the backup settings
    pub fn new(
        config: &BackupConfig,
        repository: Arc<dyn Repository>,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self {
            inner: Arc::new(BackupInner {
                file_path: config.file_path(),
                interval: config.interval(),
                restore: config.restore,
                repository,
                stats,
                flush_lock: Mutex::new(()),
            }),
            lifecycle: Mutex::new(Lifecycle {
                state: BackupState::Idle,
                shutdown_tx: None,
                task: None,
                observer: None,
            }),
        }
    }

    pub fn state(&self) -> BackupState {
        self.lifecycle.lock().state
    }

    pub fn file_path(&self) -> &Path {
        &self.inner.file_path
    }

    /// Replay the backup file into the repository
    ///
    /// Must run before the API accepts writes. A missing or unreadable file
    /// means an empty start; corrupt lines are skipped.
    pub fn restore(&self) -> RestoreSummary {
        if !self.inner.restore {
            debug!("Restore disabled, starting empty");
            return RestoreSummary::default();
        }
        self.inner.restore()
    }

    /// Launch the background loop; requires a tokio runtime
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != BackupState::Idle {
            warn!(state = ?lifecycle.state, "Backup manager already started");
            return;
        }

        let trigger = if self.inner.interval.is_zero() {
            let (observer, rx) = ChannelObserver::channel();
            match self.inner.repository.register_observer(observer) {
                Ok(id) => lifecycle.observer = Some(id),
                Err(e) => {
                    error!(error = %e, "Failed to subscribe to repository changes");
                    return;
                }
            }
            info!(file = ?self.inner.file_path, "Backup running on every change");
            Trigger::Changes(rx)
        } else {
            let period = self.inner.interval;
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                file = ?self.inner.file_path,
                interval_secs = period.as_secs_f64(),
                "Backup running on interval"
            );
            Trigger::Ticker(interval)
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(self.inner.clone(), trigger, shutdown_rx));

        lifecycle.shutdown_tx = Some(shutdown_tx);
        lifecycle.task = Some(task);
        lifecycle.state = BackupState::Running;
    }

    /// Halt the loop and write one final flush before returning
    pub async fn stop(&self) {
        let (shutdown_tx, task, observer) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == BackupState::Stopped {
                return;
            }
            lifecycle.state = BackupState::Stopped;
            (
                lifecycle.shutdown_tx.take(),
                lifecycle.task.take(),
                lifecycle.observer.take(),
            )
        };

        if let Some(id) = observer {
            self.inner.repository.unregister_observer(id);
        }
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(true);
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Backup loop terminated abnormally");
            }
        }

        let inner = self.inner.clone();
        match tokio::task::spawn_blocking(move || inner.flush_logged()).await {
            Ok(Some(records)) => info!(file = ?self.inner.file_path, records, "Final backup written"),
            Ok(None) => error!(file = ?self.inner.file_path, "Final backup not written"),
            Err(e) => error!(error = %e, "Final backup task failed"),
        }
    }

    /// Flush right now on the calling thread
    ///
    /// Waits for an in-flight flush to finish first. Returns the number of
    /// records written.
    pub fn flush_now(&self) -> Result<usize> {
        self.inner.flush()
    }
}

impl BackupInner {
    fn restore(&self) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        let contents = match std::fs::read(&self.file_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(file = ?self.file_path, "No backup file, starting empty");
                return summary;
            }
            Err(e) => {
                warn!(file = ?self.file_path, error = %e, "Backup file unreadable, starting empty");
                return summary;
            }
        };

        for (idx, raw) in contents.split(|b| *b == b'\n').enumerate() {
            let line_no = idx + 1;
            let Ok(line) = std::str::from_utf8(raw) else {
                warn!(line = line_no, "Skipping backup record: not UTF-8");
                self.skip(&mut summary);
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }

            match MetricRecord::from_line(line).and_then(|m| self.repository.update(m)) {
                Ok(_) => {
                    summary.restored += 1;
                    self.stats.record_restored();
                }
                Err(e) => {
                    warn!(line = line_no, error = %e, "Skipping backup record");
                    self.skip(&mut summary);
                }
            }
        }

        info!(
            file = ?self.file_path,
            restored = summary.restored,
            skipped = summary.skipped,
            "Backup restored"
        );
        summary
    }

    fn skip(&self, summary: &mut RestoreSummary) {
        summary.skipped += 1;
        self.stats.record_skipped();
    }

    /// Snapshot the repository and atomically rewrite the backup file
    fn flush(&self) -> Result<usize> {
        let _guard = self.flush_lock.lock();

        let metrics = self.repository.all_sorted();
        let mut buf = String::with_capacity(metrics.len() * 64);
        let mut written = 0;
        for metric in &metrics {
            match MetricRecord::to_line(metric) {
                Ok(line) => {
                    buf.push_str(&line);
                    buf.push('\n');
                    written += 1;
                }
                Err(e) => warn!(name = %metric.name(), error = %e, "Skipping unencodable metric"),
            }
        }

        write_atomic(&self.file_path, buf.as_bytes())?;
        Ok(written)
    }

    /// Flush, recording the outcome; failures wait for the next trigger
    fn flush_logged(&self) -> Option<usize> {
        match self.flush() {
            Ok(written) => {
                self.stats.flush_completed();
                debug!(file = ?self.file_path, records = written, "Backup flushed");
                Some(written)
            }
            Err(e) => {
                self.stats.flush_failed();
                warn!(file = ?self.file_path, error = %e, "Backup flush failed");
                None
            }
        }
    }
}

async fn run_loop(
    inner: Arc<BackupInner>,
    mut trigger: Trigger,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => break,
            more = trigger.next() => {
                if !more {
                    break;
                }
                let inner = inner.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || inner.flush_logged()).await {
                    error!(error = %e, "Backup flush task failed");
                }
            }
        }
    }
    debug!("Backup loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricKind;
    use crate::repository::MemoryRepository;

    fn config(dir: &Path, interval_secs: u64) -> BackupConfig {
        BackupConfig {
            path: dir.to_path_buf(),
            file_name: "metrics.json".to_string(),
            interval_secs,
            restore: true,
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_flush_writes_sorted_records() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryRepository::new();
        repo.update_raw(MetricKind::Gauge, "temperature", "19.0").unwrap();
        repo.update_raw(MetricKind::Counter, "requests", "8").unwrap();

        let manager = BackupManager::new(&config(dir.path(), 300), repo, ServiceStats::new());
        assert_eq!(manager.flush_now().unwrap(), 2);

        assert_eq!(
            read_lines(manager.file_path()),
            vec![
                r#"{"kind":"counter","name":"requests","value":8}"#,
                r#"{"kind":"gauge","name":"temperature","value":19.0}"#,
            ]
        );
    }

    #[test]
    fn test_restore_disabled_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, "{\"kind\":\"counter\",\"name\":\"a\",\"value\":1}\n").unwrap();

        let repo = MemoryRepository::new();
        let mut cfg = config(dir.path(), 300);
        cfg.restore = false;
        let manager = BackupManager::new(&cfg, repo.clone(), ServiceStats::new());

        assert_eq!(manager.restore(), RestoreSummary::default());
        assert!(repo.is_empty());
    }

    #[test]
    fn test_restore_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryRepository::new();
        let manager = BackupManager::new(&config(dir.path(), 300), repo.clone(), ServiceStats::new());
        assert_eq!(manager.restore(), RestoreSummary::default());
        assert!(repo.is_empty());
    }

    #[test]
    fn test_restore_skips_kind_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("metrics.json"),
            concat!(
                "{\"kind\":\"counter\",\"name\":\"a\",\"value\":2}\n",
                "{\"kind\":\"gauge\",\"name\":\"a\",\"value\":1.5}\n",
                "{\"kind\":\"counter\",\"name\":\"a\",\"value\":3}\n",
            ),
        )
        .unwrap();

        let repo = MemoryRepository::new();
        let stats = ServiceStats::new();
        let manager = BackupManager::new(&config(dir.path(), 300), repo.clone(), stats.clone());

        assert_eq!(
            manager.restore(),
            RestoreSummary { restored: 2, skipped: 1 }
        );
        assert_eq!(repo.get(MetricKind::Counter, "a").unwrap().string_value(), "5");
        assert_eq!(stats.snapshot().records_skipped, 1);
    }

    #[test]
    fn test_flush_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the backup directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let repo = MemoryRepository::new();
        repo.update_raw(MetricKind::Counter, "a", "1").unwrap();
        let stats = ServiceStats::new();
        let manager = BackupManager::new(&config(&blocker, 300), repo, stats.clone());

        assert!(manager.flush_now().is_err());
        assert_eq!(manager.inner.flush_logged(), None);
        assert_eq!(stats.snapshot().flush_failures, 1);
    }

    #[tokio::test]
    async fn test_interval_mode_flushes_on_tick() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryRepository::new();
        let manager = BackupManager::new(&config(dir.path(), 1), repo.clone(), ServiceStats::new());

        manager.start();
        assert_eq!(manager.state(), BackupState::Running);
        repo.update_raw(MetricKind::Counter, "ticks", "1").unwrap();

        let expected: Vec<String> = repo
            .all_sorted()
            .iter()
            .map(|m| MetricRecord::to_line(m).unwrap())
            .collect();

        let path = manager.file_path().to_path_buf();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !path.exists() && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(read_lines(&path), expected);
        assert_eq!(expected, vec![r#"{"kind":"counter","name":"ticks","value":1}"#]);

        manager.stop().await;
        assert_eq!(manager.state(), BackupState::Stopped);
    }

    #[test]
    fn test_flush_waits_for_in_flight_flush() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryRepository::new();
        repo.update_raw(MetricKind::Counter, "a", "1").unwrap();
        let manager = Arc::new(BackupManager::new(
            &config(dir.path(), 300),
            repo.clone(),
            ServiceStats::new(),
        ));

        // Stand in for a flush already in progress
        let guard = manager.inner.flush_lock.lock();
        let waiter = {
            let manager = manager.clone();
            std::thread::spawn(move || manager.flush_now())
        };

        std::thread::sleep(Duration::from_millis(100));
        assert!(!waiter.is_finished());
        assert!(!manager.file_path().exists());

        // A change made while waiting still lands in the queued flush
        repo.update_raw(MetricKind::Counter, "a", "2").unwrap();
        drop(guard);

        assert_eq!(waiter.join().unwrap().unwrap(), 1);
        assert_eq!(
            read_lines(manager.file_path()),
            vec![r#"{"kind":"counter","name":"a","value":3}"#]
        );
    }

    #[tokio::test]
    async fn test_stop_without_start_still_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryRepository::new();
        repo.update_raw(MetricKind::Gauge, "load", "0.5").unwrap();
        let manager = BackupManager::new(&config(dir.path(), 300), repo, ServiceStats::new());

        manager.stop().await;
        assert_eq!(
            read_lines(manager.file_path()),
            vec![r#"{"kind":"gauge","name":"load","value":0.5}"#]
        );

        // Second stop is a no-op
        manager.stop().await;
        assert_eq!(manager.state(), BackupState::Stopped);
    }

    #[tokio::test]
    async fn test_start_twice_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryRepository::new();
        let manager = BackupManager::new(&config(dir.path(), 0), repo.clone(), ServiceStats::new());

        manager.start();
        manager.start();
        manager.stop().await;

        // The observer subscription is gone after stop
        repo.update_raw(MetricKind::Counter, "late", "1").unwrap();
        assert_eq!(manager.state(), BackupState::Stopped);
    }
}
