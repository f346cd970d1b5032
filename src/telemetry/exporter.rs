//! Prometheus metrics exporter
//!
//! HTTP endpoint for Prometheus scraping of the service's own counters.

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;

use super::counters::{ServiceStats, StatsSnapshot};
use crate::config::MetricsConfig;
use crate::repository::Repository;

/// Initialize the Prometheus metrics exporter
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(
    config: &MetricsConfig,
    stats: Arc<ServiceStats>,
    repository: Arc<dyn Repository>,
) -> Result<()> {
    describe_counter!("metrics_keeper_updates_applied", "Metric updates applied");
    describe_counter!("metrics_keeper_update_errors", "Metric updates rejected");
    describe_counter!("metrics_keeper_flushes_completed", "Backup flushes written");
    describe_counter!("metrics_keeper_flush_failures", "Backup flushes that failed");
    describe_counter!("metrics_keeper_records_restored", "Records restored at startup");
    describe_counter!("metrics_keeper_records_skipped", "Corrupt records skipped at startup");
    describe_gauge!("metrics_keeper_metrics_stored", "Metrics currently held in the store");

    PrometheusBuilder::new()
        .with_http_listener(config.bind_addr)
        .install()?;

    tokio::spawn(sync_metrics_task(stats, repository));

    Ok(())
}

/// Periodically copy the atomic counters into the metrics facade
async fn sync_metrics_task(stats: Arc<ServiceStats>, repository: Arc<dyn Repository>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut last = StatsSnapshot::default();

    loop {
        interval.tick().await;

        let snapshot = stats.snapshot();
        sync_counter("metrics_keeper_updates_applied", snapshot.updates_applied, last.updates_applied);
        sync_counter("metrics_keeper_update_errors", snapshot.update_errors, last.update_errors);
        sync_counter("metrics_keeper_flushes_completed", snapshot.flushes_completed, last.flushes_completed);
        sync_counter("metrics_keeper_flush_failures", snapshot.flush_failures, last.flush_failures);
        sync_counter("metrics_keeper_records_restored", snapshot.records_restored, last.records_restored);
        sync_counter("metrics_keeper_records_skipped", snapshot.records_skipped, last.records_skipped);

        gauge!("metrics_keeper_metrics_stored").set(repository.len() as f64);

        last = snapshot;
    }
}

fn sync_counter(name: &'static str, current: u64, last: u64) {
    let delta = current.saturating_sub(last);
    if delta > 0 {
        counter!(name).increment(delta);
    }
}
