//! Metric model
//!
//! Counters, gauges and their line record form.

mod kind;
mod record;
mod state;

pub use kind::{MetricKind, MetricValue};
pub use record::MetricRecord;
pub use state::Metric;
