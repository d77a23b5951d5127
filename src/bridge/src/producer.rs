//! The pull-based conversion engine exporters call once per export cycle.

use std::sync::Arc;

use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::metrics::v1::{Metric as OtelMetric, ScopeMetrics};
use tokio_util::sync::CancellationToken;

use crate::convert::convert_metric;
use crate::error::{AggregateError, ProduceError};
use crate::registry::{ProducerManager, SourceRegistry};

/// Instrumentation scope attached to every metric this bridge emits.
pub const SCOPE_NAME: &str = "census-bridge";

/// Result of one produce call.
///
/// `dropped` being set means the batch is partial: `scope_metrics` still
/// holds everything that converted, but the listed metrics were left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Produced {
    pub scope_metrics: Vec<ScopeMetrics>,
    pub dropped: Option<AggregateError>,
}

impl Produced {
    pub fn is_partial(&self) -> bool {
        self.dropped.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.scope_metrics.is_empty()
    }

    /// Total data points across all scopes.
    pub fn data_point_count(&self) -> usize {
        self.scope_metrics
            .iter()
            .flat_map(|scope| scope.metrics.iter())
            .map(crate::data_point_count)
            .sum()
    }

    /// Strict view: any dropped metric turns the call into an error.
    pub fn into_result(self) -> Result<Vec<ScopeMetrics>, ProduceError> {
        match self.dropped {
            Some(errors) => Err(ProduceError::Partial(errors)),
            None => Ok(self.scope_metrics),
        }
    }
}

/// A pull-based provider of converted metrics.
pub trait MetricProducer: Send + Sync {
    fn produce(&self, cancel: &CancellationToken) -> Result<Produced, ProduceError>;
}

/// Converts every metric of every registered source into OTLP scope metrics.
///
/// Holds no state between calls; concurrent calls are independent.
#[derive(Clone)]
pub struct MetricBridge {
    registry: Arc<dyn SourceRegistry>,
}

impl MetricBridge {
    /// Bridge over the process-wide [`ProducerManager`].
    pub fn new() -> Self {
        Self::with_registry(ProducerManager::global())
    }

    pub fn with_registry(registry: Arc<dyn SourceRegistry>) -> Self {
        Self { registry }
    }

    fn scope() -> InstrumentationScope {
        InstrumentationScope {
            name: SCOPE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        }
    }
}

impl Default for MetricBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricBridge").finish_non_exhaustive()
    }
}

impl MetricProducer for MetricBridge {
    fn produce(&self, cancel: &CancellationToken) -> Result<Produced, ProduceError> {
        if cancel.is_cancelled() {
            return Err(ProduceError::Cancelled);
        }

        let sources = self.registry.sources();
        if sources.is_empty() {
            return Ok(Produced::default());
        }

        let mut metrics: Vec<OtelMetric> = Vec::new();
        let mut errors = Vec::new();
        let mut read = 0usize;
        let mut points = 0usize;

        for source in &sources {
            let snapshot = source.read();
            read += snapshot.len();
            for metric in &snapshot {
                match convert_metric(metric) {
                    Ok((_, 0)) => {
                        tracing::debug!(
                            metric = %metric.descriptor.name,
                            "Skipping metric without data points"
                        );
                    }
                    Ok((converted, count)) => {
                        points += count;
                        metrics.push(converted);
                    }
                    Err(e) => errors.push(e),
                }
            }
        }

        tracing::debug!(
            sources = sources.len(),
            read,
            converted = metrics.len(),
            failed = errors.len(),
            points,
            "Produced metrics from registry"
        );

        let dropped = AggregateError::from_errors(errors);
        if let Some(ref dropped) = dropped {
            tracing::warn!(
                failed = dropped.len(),
                "Some metrics could not be converted and were dropped"
            );
        }

        let scope_metrics = if metrics.is_empty() {
            Vec::new()
        } else {
            vec![ScopeMetrics {
                scope: Some(Self::scope()),
                metrics,
                ..Default::default()
            }]
        };

        Ok(Produced {
            scope_metrics,
            dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Descriptor, Metric, MetricKind, Point, TimeSeries};
    use chrono::{TimeZone, Utc};

    fn registry_with(metrics: Vec<Metric>) -> Arc<ProducerManager> {
        let manager = Arc::new(ProducerManager::new());
        manager.add(Arc::new(move || metrics.clone()));
        manager
    }

    fn gauge(name: &str, value: i64) -> Metric {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Metric {
            descriptor: Descriptor {
                name: name.to_string(),
                ..Default::default()
            },
            resource: None,
            time_series: vec![TimeSeries {
                label_values: vec![],
                start_time: now,
                points: vec![Point::new(now, value)],
            }],
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let bridge = MetricBridge::with_registry(registry_with(vec![gauge("a", 1)]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(bridge.produce(&cancel), Err(ProduceError::Cancelled));
    }

    #[test]
    fn test_scope_identity() {
        let bridge = MetricBridge::with_registry(registry_with(vec![gauge("a", 1)]));
        let produced = bridge.produce(&CancellationToken::new()).unwrap();

        assert_eq!(produced.scope_metrics.len(), 1);
        let scope = produced.scope_metrics[0].scope.as_ref().unwrap();
        assert_eq!(scope.name, SCOPE_NAME);
        assert_eq!(scope.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_metrics_from_all_sources_share_one_scope() {
        let manager = registry_with(vec![gauge("a", 1), gauge("b", 2)]);
        manager.add(Arc::new(|| vec![gauge("c", 3)]));
        let bridge = MetricBridge::with_registry(manager);

        let produced = bridge.produce(&CancellationToken::new()).unwrap();
        assert_eq!(produced.scope_metrics.len(), 1);
        let names: Vec<&str> = produced.scope_metrics[0]
            .metrics
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(produced.data_point_count(), 3);
    }

    #[test]
    fn test_only_failures_yield_no_scope() {
        let bad = Metric {
            descriptor: Descriptor {
                name: "bad".to_string(),
                kind: MetricKind::Summary,
                ..Default::default()
            },
            ..Default::default()
        };
        let bridge = MetricBridge::with_registry(registry_with(vec![bad]));

        let produced = bridge.produce(&CancellationToken::new()).unwrap();
        assert!(produced.is_empty());
        assert!(produced.is_partial());
        assert!(matches!(
            produced.into_result(),
            Err(ProduceError::Partial(errors)) if errors.len() == 1
        ));
    }

    #[test]
    fn test_into_result_without_failures() {
        let bridge = MetricBridge::with_registry(registry_with(vec![gauge("a", 1)]));
        let scope_metrics = bridge
            .produce(&CancellationToken::new())
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(scope_metrics[0].metrics.len(), 1);
    }
}
