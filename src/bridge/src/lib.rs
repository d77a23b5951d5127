//! Bridge from an in-process metric registry to the OTLP metrics data model.
//!
//! Register [`MetricSource`]s with a [`ProducerManager`] (or the process-wide
//! [`ProducerManager::global`]), then let an exporter pull converted metrics
//! through [`MetricBridge::produce`] once per export cycle. Metrics that can
//! not be represented in OTLP are dropped and reported in
//! [`Produced::dropped`]; everything else is still returned.

pub mod attributes;
pub mod convert;
pub mod error;
pub mod producer;
pub mod registry;
pub mod source;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use opentelemetry_proto::tonic::metrics::v1::{Metric as OtelMetric, metric::Data};

pub use error::{AggregateError, ConversionError, ConversionFailure, ProduceError};
pub use producer::{MetricBridge, MetricProducer, Produced, SCOPE_NAME};
pub use registry::{MetricSource, ProducerManager, SourceRegistry};

/// Number of data points held by an OTLP metric, whatever its data kind.
pub fn data_point_count(metric: &OtelMetric) -> usize {
    match &metric.data {
        Some(Data::Gauge(gauge)) => gauge.data_points.len(),
        Some(Data::Sum(sum)) => sum.data_points.len(),
        Some(Data::Histogram(histogram)) => histogram.data_points.len(),
        Some(Data::ExponentialHistogram(histogram)) => histogram.data_points.len(),
        Some(Data::Summary(summary)) => summary.data_points.len(),
        None => 0,
    }
}
