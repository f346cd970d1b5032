//! Service telemetry
//!
//! Atomic counters for the service itself, optionally exported to Prometheus.

mod counters;
mod exporter;

pub use counters::{ServiceStats, StatsSnapshot};
pub use exporter::init_metrics;
