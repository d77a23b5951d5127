use std::sync::atomic::{AtomicI64, Ordering};

use bridge::MetricSource;
use bridge::source::{Descriptor, Metric, MetricKind, Point, Resource, TimeSeries};
use chrono::{DateTime, Utc};

/// Source publishing a few metrics about this process.
pub struct ProcessMetrics {
    started: DateTime<Utc>,
    resource: Resource,
    reads: AtomicI64,
}

impl ProcessMetrics {
    pub fn new(service_name: &str) -> Self {
        Self {
            started: Utc::now(),
            resource: Resource::from_labels([
                ("service.name", service_name.to_string()),
                ("process.pid", std::process::id().to_string()),
            ]),
            reads: AtomicI64::new(0),
        }
    }

    fn series(&self, point: Point) -> Vec<TimeSeries> {
        vec![TimeSeries {
            label_values: vec![],
            start_time: self.started,
            points: vec![point],
        }]
    }
}

impl MetricSource for ProcessMetrics {
    fn read(&self) -> Vec<Metric> {
        let now = Utc::now();
        let reads = self.reads.fetch_add(1, Ordering::Relaxed) + 1;
        let uptime = (now - self.started).num_milliseconds() as f64 / 1000.0;

        vec![
            Metric {
                descriptor: Descriptor {
                    name: "census_bridge/process/uptime".to_string(),
                    description: "Time since the bridge process started".to_string(),
                    unit: "s".to_string(),
                    kind: MetricKind::GaugeFloat64,
                    label_keys: vec![],
                },
                resource: Some(self.resource.clone()),
                time_series: self.series(Point::new(now, uptime)),
            },
            Metric {
                descriptor: Descriptor {
                    name: "census_bridge/source/reads".to_string(),
                    description: "Snapshots handed out by this source".to_string(),
                    unit: "1".to_string(),
                    kind: MetricKind::CumulativeInt64,
                    label_keys: vec![],
                },
                resource: Some(self.resource.clone()),
                time_series: self.series(Point::new(now, reads)),
            },
        ]
    }
}
