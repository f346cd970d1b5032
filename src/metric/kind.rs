//! Metric kinds and typed values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StoreError};

/// The two supported metric kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Accumulating 64-bit signed integer
    Counter,
    /// Last-write-wins 64-bit float
    Gauge,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }

    /// Parse a raw wire value as this kind
    pub fn parse_value(self, raw: &str) -> Result<MetricValue> {
        let raw = raw.trim();
        match self {
            MetricKind::Counter => raw
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|e| StoreError::InvalidValue(format!("counter value {raw:?}: {e}"))),
            MetricKind::Gauge => {
                let value = raw
                    .parse::<f64>()
                    .map_err(|e| StoreError::InvalidValue(format!("gauge value {raw:?}: {e}")))?;
                MetricValue::gauge(value)
            }
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(StoreError::InvalidValue(format!("unknown metric kind {other:?}"))),
        }
    }
}

/// A value tagged with its kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Counter(i64),
    Gauge(f64),
}

impl MetricValue {
    /// Build a gauge value, rejecting NaN and infinities
    pub fn gauge(value: f64) -> Result<Self> {
        if value.is_finite() {
            Ok(MetricValue::Gauge(value))
        } else {
            Err(StoreError::InvalidValue(format!("gauge value {value} is not finite")))
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Gauge(_) => MetricKind::Gauge,
        }
    }
}

impl fmt::Display for MetricValue {
    /// Integer for counters, shortest round-tripping decimal for gauges
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Counter(v) => write!(f, "{v}"),
            MetricValue::Gauge(v) => write!(f, "{v}"),
        }
    }
}
