//! Test doubles and fixtures for bridge consumers.
//!
//! Available with the `testing` feature or in this crate's own tests:
//!
//! ```toml
//! [dev-dependencies]
//! bridge = { path = "../bridge", features = ["testing"] }
//! ```

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::registry::{MetricSource, ProducerManager};
use crate::source::{Descriptor, Metric, MetricKind, Point, Resource, TimeSeries, Value};

/// Source returning a fixed snapshot that tests may swap between calls.
#[derive(Debug, Default)]
pub struct StaticSource {
    metrics: Mutex<Vec<Metric>>,
}

impl StaticSource {
    pub fn new(metrics: Vec<Metric>) -> Arc<Self> {
        Arc::new(Self {
            metrics: Mutex::new(metrics),
        })
    }

    pub fn set(&self, metrics: Vec<Metric>) {
        *self.metrics.lock().unwrap_or_else(|e| e.into_inner()) = metrics;
    }
}

impl MetricSource for StaticSource {
    fn read(&self) -> Vec<Metric> {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Keeps a source registered until dropped.
pub struct Registration {
    manager: Arc<ProducerManager>,
    source: Arc<dyn MetricSource>,
}

impl Registration {
    pub fn new(manager: Arc<ProducerManager>, source: Arc<dyn MetricSource>) -> Self {
        manager.add(Arc::clone(&source));
        Self { manager, source }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.manager.remove(&self.source);
    }
}

/// A single-series, single-point metric of the given kind.
pub fn single_point(
    name: &str,
    kind: MetricKind,
    at: DateTime<Utc>,
    value: impl Into<Value>,
) -> Metric {
    Metric {
        descriptor: Descriptor {
            name: name.to_string(),
            kind,
            ..Default::default()
        },
        resource: None,
        time_series: vec![TimeSeries {
            label_values: vec![],
            start_time: at,
            points: vec![Point::new(at, value)],
        }],
    }
}

/// An int64 gauge with one point, attached to `labels` as its resource.
pub fn int_gauge(
    name: &str,
    at: DateTime<Utc>,
    value: i64,
    labels: &[(&str, &str)],
) -> Metric {
    Metric {
        resource: Some(Resource::from_labels(labels.iter().copied())),
        ..single_point(name, MetricKind::GaugeInt64, at, value)
    }
}

/// A descriptor with no time-series at all.
pub fn descriptor_only(name: &str, kind: MetricKind) -> Metric {
    Metric {
        descriptor: Descriptor {
            name: name.to_string(),
            description: "descriptor without data".to_string(),
            unit: "1".to_string(),
            kind,
            label_keys: vec![],
        },
        resource: None,
        time_series: vec![],
    }
}
