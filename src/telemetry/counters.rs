//! Service counters
//!
//! Lock-free counters shared by the API layer and the backup manager.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Self-instrumentation counters
#[derive(Debug, Default)]
pub struct ServiceStats {
    // Repository traffic
    pub updates_applied: AtomicU64,
    pub update_errors: AtomicU64,

    // Backup
    pub flushes_completed: AtomicU64,
    pub flush_failures: AtomicU64,

    // Restore
    pub records_restored: AtomicU64,
    pub records_skipped: AtomicU64,
}

impl ServiceStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[inline]
    pub fn update_applied(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn update_failed(&self) {
        self.update_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn flush_completed(&self) {
        self.flushes_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn flush_failed(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_restored(&self) {
        self.records_restored.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            update_errors: self.update_errors.load(Ordering::Relaxed),
            flushes_completed: self.flushes_completed.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            records_restored: self.records_restored.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters, served on `/stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub updates_applied: u64,
    pub update_errors: u64,
    pub flushes_completed: u64,
    pub flush_failures: u64,
    pub records_restored: u64,
    pub records_skipped: u64,
}
