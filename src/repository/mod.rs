//! Metric repository
//!
//! The storage contract shared by every backing store, plus the in-memory
//! implementation and change notification.

mod memory;
mod observer;

use std::sync::Arc;

use crate::error::Result;
use crate::metric::{Metric, MetricKind};

pub use memory::MemoryRepository;
pub use observer::{ChannelObserver, Observer, ObserverId, ObserverRegistry};

/// Create-or-update, read, list and reset over a metric store
///
/// Every successful mutation notifies registered observers exactly once,
/// after the change is visible to readers.
pub trait Repository: Send + Sync {
    /// Create the metric or apply the kind's update rule, returning the stored state
    fn update(&self, metric: Metric) -> Result<Metric>;

    /// Parse a raw wire value and apply it
    fn update_raw(&self, kind: MetricKind, name: &str, raw: &str) -> Result<Metric> {
        self.update(Metric::parse(kind, name, raw)?)
    }

    fn get(&self, kind: MetricKind, name: &str) -> Result<Metric>;

    /// Copy of every stored metric, unordered
    fn all(&self) -> Vec<Metric>;

    /// Copy of every stored metric ordered by kind, then name
    fn all_sorted(&self) -> Vec<Metric> {
        let mut metrics = self.all();
        metrics.sort_by(|a, b| (a.kind(), a.name()).cmp(&(b.kind(), b.name())));
        metrics
    }

    /// Number of stored metrics
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn exists(&self, kind: MetricKind, name: &str) -> bool {
        self.get(kind, name).is_ok()
    }

    /// Drop every metric
    fn reset_all(&self);

    fn register_observer(&self, observer: Arc<dyn Observer>) -> Result<ObserverId>;

    fn unregister_observer(&self, id: ObserverId) -> bool;
}
