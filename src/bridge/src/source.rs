//! Metric data model of the upstream in-process registry.
//!
//! A [`Metric`] is one named family: a [`Descriptor`] plus the time-series
//! that were recorded for it. Sources hand these out as snapshots; nothing
//! here is mutated by the bridge.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// One named metric family as read from a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metric {
    pub descriptor: Descriptor,
    /// Origin of every time-series in this metric, if the source attached one.
    pub resource: Option<Resource>,
    pub time_series: Vec<TimeSeries>,
}

/// Static metadata of a metric family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptor {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub kind: MetricKind,
    /// Keys for the label values carried by each time-series, in order.
    pub label_keys: Vec<LabelKey>,
}

/// Aggregation kind declared by a descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MetricKind {
    #[default]
    GaugeInt64,
    GaugeFloat64,
    GaugeDistribution,
    CumulativeInt64,
    CumulativeFloat64,
    CumulativeDistribution,
    Summary,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::GaugeInt64 => "gauge_int64",
            MetricKind::GaugeFloat64 => "gauge_float64",
            MetricKind::GaugeDistribution => "gauge_distribution",
            MetricKind::CumulativeInt64 => "cumulative_int64",
            MetricKind::CumulativeFloat64 => "cumulative_float64",
            MetricKind::CumulativeDistribution => "cumulative_distribution",
            MetricKind::Summary => "summary",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelKey {
    pub key: String,
    pub description: String,
}

impl LabelKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: String::new(),
        }
    }
}

/// A label value recorded on a time-series. `present` distinguishes an
/// empty string from a label that was never set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelValue {
    pub value: String,
    pub present: bool,
}

impl LabelValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            present: true,
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    /// One value per descriptor label key, in the same order.
    pub label_values: Vec<LabelValue>,
    pub start_time: DateTime<Utc>,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub time: DateTime<Utc>,
    pub value: Value,
}

impl Point {
    pub fn new(time: DateTime<Utc>, value: impl Into<Value>) -> Self {
        Self {
            time,
            value: value.into(),
        }
    }
}

/// Value carried by a single point.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int64(i64),
    Float64(f64),
    Distribution(Distribution),
    Summary(Summary),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Distribution(_) => "distribution",
            Value::Summary(_) => "summary",
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    pub count: i64,
    pub sum: f64,
    pub sum_of_squared_deviation: f64,
    pub bucket_bounds: Vec<f64>,
    pub bucket_counts: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub count: Option<i64>,
    pub sum: Option<f64>,
    /// `(percentile, value)` pairs.
    pub percentiles: Vec<(f64, f64)>,
}

/// Labels describing where a set of time-series came from (host, process, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resource {
    pub labels: HashMap<String, String>,
}

impl Resource {
    pub fn from_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
