//! Request routing
//!
//! Translates HTTP requests into repository calls and repository errors
//! into status codes.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::http::{Request, Response};
use crate::error::StoreError;
use crate::metric::{Metric, MetricKind, MetricRecord};
use crate::repository::Repository;
use crate::telemetry::ServiceStats;

/// Shared handles every handler needs
#[derive(Clone)]
pub struct ApiState {
    pub repository: Arc<dyn Repository>,
    pub stats: Arc<ServiceStats>,
}

impl ApiState {
    pub fn new(repository: Arc<dyn Repository>, stats: Arc<ServiceStats>) -> Self {
        Self { repository, stats }
    }
}

/// Dispatch a request to its handler
pub fn route(request: &Request, state: &ApiState) -> Response {
    let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("POST", ["update"] | ["update", ""]) => update_from_json(state, &request.body),
        ("POST", ["update", kind, name, value]) => update_from_path(state, kind, name, value),
        ("POST", ["update", _] | ["update", _, ""]) => {
            Response::text("404 Not Found", "metric name required")
        }
        ("POST", ["update", _, _]) => Response::text("400 Bad Request", "metric value required"),
        ("GET", ["value", kind, name]) => get_value(state, kind, name),
        ("GET", [""]) => list_metrics(state),
        ("GET", ["stats"]) => stats(state),
        (_, ["update", ..] | ["value", _, _] | [""] | ["stats"]) => {
            Response::text("405 Method Not Allowed", "method not allowed")
        }
        _ => Response::text("404 Not Found", "not found"),
    }
}

fn update_from_path(state: &ApiState, kind: &str, name: &str, raw: &str) -> Response {
    if name.is_empty() {
        return Response::text("404 Not Found", "metric name required");
    }
    let result = kind
        .parse::<MetricKind>()
        .and_then(|kind| state.repository.update_raw(kind, name, raw));

    match record_outcome(state, result) {
        Ok(metric) => Response::text("200 OK", metric.string_value()),
        Err(e) => error_response(&e),
    }
}

fn update_from_json(state: &ApiState, body: &[u8]) -> Response {
    let result = serde_json::from_slice::<MetricRecord>(body)
        .map_err(|e| StoreError::InvalidValue(format!("malformed body: {e}")))
        .and_then(Metric::try_from)
        .and_then(|metric| state.repository.update(metric));

    match record_outcome(state, result).and_then(|metric| MetricRecord::try_from(&metric)) {
        Ok(record) => json_response(&record),
        Err(e) => error_response(&e),
    }
}

fn get_value(state: &ApiState, kind: &str, name: &str) -> Response {
    let kind = match kind.parse::<MetricKind>() {
        Ok(kind) => kind,
        Err(e) => return error_response(&e),
    };
    if !state.repository.exists(kind, name) {
        return Response::text("404 Not Found", format!("{kind} {name:?} not found"));
    }
    match state.repository.get(kind, name) {
        Ok(metric) => Response::text("200 OK", metric.string_value()),
        Err(e) => error_response(&e),
    }
}

fn list_metrics(state: &ApiState) -> Response {
    let records: Vec<MetricRecord> = state
        .repository
        .all_sorted()
        .iter()
        .filter_map(|metric| MetricRecord::try_from(metric).ok())
        .collect();
    json_response(&records)
}

fn stats(state: &ApiState) -> Response {
    json_response(&state.stats.snapshot())
}

fn record_outcome(state: &ApiState, result: Result<Metric, StoreError>) -> Result<Metric, StoreError> {
    match &result {
        Ok(metric) => {
            state.stats.update_applied();
            debug!(kind = %metric.kind(), name = %metric.name(), value = %metric.string_value(), "Metric updated");
        }
        Err(e) => {
            state.stats.update_failed();
            debug!(error = %e, "Metric update rejected");
        }
    }
    result
}

fn json_response<T: Serialize>(value: &T) -> Response {
    match serde_json::to_string_pretty(value) {
        Ok(body) => Response::json("200 OK", body),
        Err(e) => Response::text("500 Internal Server Error", e.to_string()),
    }
}

fn error_response(err: &StoreError) -> Response {
    Response::text(err.status(), err.to_string())
}
