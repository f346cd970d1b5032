//! Metric state

use crate::error::{Result, StoreError};

use super::kind::{MetricKind, MetricValue};

/// One named counter or gauge
///
/// The kind is carried by the value, so a metric can never change kind
/// after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    value: MetricValue,
}

impl Metric {
    /// Create a metric with its initial value
    pub fn new(name: impl Into<String>, value: MetricValue) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::InvalidValue("metric name must not be empty".into()));
        }
        if let MetricValue::Gauge(v) = value {
            MetricValue::gauge(v)?;
        }
        Ok(Self { name, value })
    }

    /// Create a counter
    pub fn counter(name: impl Into<String>, delta: i64) -> Result<Self> {
        Self::new(name, MetricValue::Counter(delta))
    }

    /// Create a gauge
    pub fn gauge(name: impl Into<String>, value: f64) -> Result<Self> {
        Self::new(name, MetricValue::gauge(value)?)
    }

    /// Parse a raw wire value into a metric of the given kind
    pub fn parse(kind: MetricKind, name: impl Into<String>, raw: &str) -> Result<Self> {
        Self::new(name, kind.parse_value(raw)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    pub fn value(&self) -> MetricValue {
        self.value
    }

    /// Apply an update: counters accumulate, gauges are replaced
    ///
    /// On error the stored value is left untouched.
    pub fn update(&mut self, update: MetricValue) -> Result<()> {
        match (&mut self.value, update) {
            (MetricValue::Counter(current), MetricValue::Counter(delta)) => {
                *current = current.checked_add(delta).ok_or_else(|| {
                    StoreError::InvalidValue(format!(
                        "counter {:?} would overflow adding {delta}",
                        self.name
                    ))
                })?;
            }
            (MetricValue::Gauge(current), MetricValue::Gauge(value)) => {
                MetricValue::gauge(value)?;
                *current = value;
            }
            (stored, requested) => {
                return Err(StoreError::KindMismatch {
                    name: self.name.clone(),
                    stored: stored.kind(),
                    requested: requested.kind(),
                });
            }
        }
        Ok(())
    }

    /// Canonical textual form of the current value
    pub fn string_value(&self) -> String {
        self.value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_accumulates() {
        let mut metric = Metric::counter("requests", 5).unwrap();
        metric.update(MetricValue::Counter(3)).unwrap();
        metric.update(MetricValue::Counter(-1)).unwrap();
        assert_eq!(metric.value(), MetricValue::Counter(7));
        assert_eq!(metric.string_value(), "7");
    }

    #[test]
    fn test_gauge_replaces() {
        let mut metric = Metric::gauge("temperature", 21.5).unwrap();
        metric.update(MetricValue::Gauge(19.0)).unwrap();
        assert_eq!(metric.value(), MetricValue::Gauge(19.0));
        assert_eq!(metric.string_value(), "19");
    }

    #[test]
    fn test_kind_mismatch_keeps_value() {
        let mut metric = Metric::counter("requests", 5).unwrap();
        let err = metric.update(MetricValue::Gauge(1.0)).unwrap_err();
        assert!(matches!(err, StoreError::KindMismatch { .. }));
        assert_eq!(metric.value(), MetricValue::Counter(5));
    }

    #[test]
    fn test_counter_overflow_rejected() {
        let mut metric = Metric::counter("big", i64::MAX).unwrap();
        assert!(metric.update(MetricValue::Counter(1)).is_err());
        assert_eq!(metric.value(), MetricValue::Counter(i64::MAX));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            Metric::counter("", 1),
            Err(StoreError::InvalidValue(_))
        ));
        assert!(Metric::new("x", MetricValue::Gauge(f64::NAN)).is_err());
    }
}
