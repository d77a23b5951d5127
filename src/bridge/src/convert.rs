//! Conversion of one source [`Metric`] into an OTLP [`OtelMetric`].
//!
//! Conversion is all-or-nothing per metric: if any time-series or point
//! cannot be represented, the whole metric fails and nothing is emitted for
//! it.

use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::metrics::v1::{
    AggregationTemporality, Gauge, Metric as OtelMetric, NumberDataPoint, Sum, metric::Data,
    number_data_point,
};

use crate::attributes::LabelSet;
use crate::error::{ConversionError, ConversionFailure};
use crate::source::{Metric, MetricKind, TimeSeries, Value};

/// Numeric representation a descriptor kind maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberKind {
    Int,
    Double,
}

impl NumberKind {
    fn name(self) -> &'static str {
        match self {
            NumberKind::Int => "int64",
            NumberKind::Double => "float64",
        }
    }

    fn convert(self, value: &Value) -> Result<number_data_point::Value, ConversionFailure> {
        match (self, value) {
            (NumberKind::Int, Value::Int64(v)) => Ok(number_data_point::Value::AsInt(*v)),
            (NumberKind::Double, Value::Float64(v)) => Ok(number_data_point::Value::AsDouble(*v)),
            (expected, found) => Err(ConversionFailure::ValueKindMismatch {
                expected: expected.name(),
                found: found.kind_name(),
            }),
        }
    }
}

/// Converts `metric`, returning the OTLP metric and its data point count.
pub fn convert_metric(metric: &Metric) -> Result<(OtelMetric, usize), ConversionError> {
    let descriptor = &metric.descriptor;
    convert_data(metric)
        .map(|(data, points)| {
            let converted = OtelMetric {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                unit: descriptor.unit.clone(),
                data: Some(data),
                ..Default::default()
            };
            (converted, points)
        })
        .map_err(|reason| ConversionError::new(descriptor.name.clone(), reason))
}

fn convert_data(metric: &Metric) -> Result<(Data, usize), ConversionFailure> {
    match metric.descriptor.kind {
        MetricKind::GaugeInt64 => gauge(metric, NumberKind::Int),
        MetricKind::GaugeFloat64 => gauge(metric, NumberKind::Double),
        MetricKind::CumulativeInt64 => cumulative_sum(metric, NumberKind::Int),
        MetricKind::CumulativeFloat64 => cumulative_sum(metric, NumberKind::Double),
        kind @ (MetricKind::GaugeDistribution
        | MetricKind::CumulativeDistribution
        | MetricKind::Summary) => Err(ConversionFailure::UnsupportedKind(kind)),
    }
}

fn gauge(metric: &Metric, kind: NumberKind) -> Result<(Data, usize), ConversionFailure> {
    let data_points = number_data_points(metric, kind)?;
    let count = data_points.len();
    Ok((Data::Gauge(Gauge { data_points }), count))
}

fn cumulative_sum(metric: &Metric, kind: NumberKind) -> Result<(Data, usize), ConversionFailure> {
    let data_points = number_data_points(metric, kind)?;
    let count = data_points.len();
    let sum = Sum {
        data_points,
        aggregation_temporality: AggregationTemporality::Cumulative as i32,
        is_monotonic: true,
    };
    Ok((Data::Sum(sum), count))
}

fn number_data_points(
    metric: &Metric,
    kind: NumberKind,
) -> Result<Vec<NumberDataPoint>, ConversionFailure> {
    let base_labels = LabelSet::from_resource(metric.resource.as_ref());
    let mut data_points = Vec::new();
    for series in &metric.time_series {
        series_points(metric, series, &base_labels, kind, &mut data_points)?;
    }
    Ok(data_points)
}

fn series_points(
    metric: &Metric,
    series: &TimeSeries,
    base_labels: &LabelSet,
    kind: NumberKind,
    out: &mut Vec<NumberDataPoint>,
) -> Result<(), ConversionFailure> {
    if series.points.is_empty() {
        return Ok(());
    }

    let labels =
        base_labels.with_series_labels(&metric.descriptor.label_keys, &series.label_values)?;
    let attributes = labels.to_attributes();
    let start_time_unix_nano = unix_nanos(&series.start_time)?;

    for point in &series.points {
        out.push(NumberDataPoint {
            attributes: attributes.clone(),
            start_time_unix_nano,
            time_unix_nano: unix_nanos(&point.time)?,
            value: Some(kind.convert(&point.value)?),
            ..Default::default()
        });
    }
    Ok(())
}

/// Nanoseconds since the Unix epoch. Times before the epoch or beyond the
/// `i64` nanosecond range are rejected.
pub fn unix_nanos(time: &DateTime<Utc>) -> Result<u64, ConversionFailure> {
    time.timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .ok_or(ConversionFailure::TimestampOutOfRange(*time))
}
