//! Line-delimited record format
//!
//! One JSON object per line: `{"kind":"counter","name":"requests","value":8}`.
//! Unknown fields are ignored when decoding.

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::{Result, StoreError};

use super::kind::{MetricKind, MetricValue};
use super::state::Metric;

/// Serialized form of a metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub kind: MetricKind,
    pub name: String,
    pub value: Number,
}

impl MetricRecord {
    /// Decode one line
    pub fn from_line(line: &str) -> Result<Metric> {
        let record: MetricRecord = serde_json::from_str(line)
            .map_err(|e| StoreError::InvalidValue(format!("malformed record: {e}")))?;
        Metric::try_from(record)
    }

    /// Encode one line (without the trailing newline)
    pub fn to_line(metric: &Metric) -> Result<String> {
        let record = MetricRecord::try_from(metric)?;
        serde_json::to_string(&record)
            .map_err(|e| StoreError::InvalidValue(format!("encode {:?}: {e}", metric.name())))
    }
}

impl TryFrom<&Metric> for MetricRecord {
    type Error = StoreError;

    fn try_from(metric: &Metric) -> Result<Self> {
        let value = match metric.value() {
            MetricValue::Counter(v) => Number::from(v),
            MetricValue::Gauge(v) => Number::from_f64(v).ok_or_else(|| {
                StoreError::InvalidValue(format!("gauge {:?} is not finite", metric.name()))
            })?,
        };
        Ok(Self {
            kind: metric.kind(),
            name: metric.name().to_string(),
            value,
        })
    }
}

impl TryFrom<MetricRecord> for Metric {
    type Error = StoreError;

    fn try_from(record: MetricRecord) -> Result<Self> {
        let value = match record.kind {
            MetricKind::Counter => record.value.as_i64().map(MetricValue::Counter).ok_or_else(|| {
                StoreError::InvalidValue(format!("counter value {} is not an integer", record.value))
            })?,
            MetricKind::Gauge => {
                let v = record.value.as_f64().ok_or_else(|| {
                    StoreError::InvalidValue(format!("gauge value {} is not a float", record.value))
                })?;
                MetricValue::gauge(v)?
            }
        };
        Metric::new(record.name, value)
    }
}
