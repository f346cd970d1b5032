//! In-memory repository
//!
//! Metrics are keyed by name in a sharded map; the shard lock held by the
//! entry API makes each read-modify-write linearizable per key.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::observer::{Observer, ObserverId, ObserverRegistry};
use super::Repository;
use crate::error::{Result, StoreError};
use crate::metric::{Metric, MetricKind};

/// Concurrency-safe in-memory metric store
#[derive(Default)]
pub struct MemoryRepository {
    metrics: DashMap<String, Metric>,
    observers: ObserverRegistry,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Repository for MemoryRepository {
    fn update(&self, metric: Metric) -> Result<Metric> {
        let stored = match self.metrics.entry(metric.name().to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().update(metric.value())?;
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                debug!(kind = %metric.kind(), name = %metric.name(), "Metric created");
                Metric::clone(&entry.insert(metric))
            }
        };

        self.observers.notify_all();
        Ok(stored)
    }

    fn get(&self, kind: MetricKind, name: &str) -> Result<Metric> {
        match self.metrics.get(name) {
            Some(metric) if metric.kind() == kind => Ok(Metric::clone(&metric)),
            _ => Err(StoreError::NotFound {
                kind,
                name: name.to_string(),
            }),
        }
    }

    fn all(&self) -> Vec<Metric> {
        self.metrics.iter().map(|entry| entry.value().clone()).collect()
    }

    fn len(&self) -> usize {
        self.metrics.len()
    }

    fn exists(&self, kind: MetricKind, name: &str) -> bool {
        self.metrics
            .get(name)
            .map(|metric| metric.kind() == kind)
            .unwrap_or(false)
    }

    fn reset_all(&self) {
        self.metrics.clear();
        debug!("All metrics reset");
        self.observers.notify_all();
    }

    fn register_observer(&self, observer: Arc<dyn Observer>) -> Result<ObserverId> {
        self.observers.register(observer)
    }

    fn unregister_observer(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }
}
