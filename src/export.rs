use anyhow::{Context, Result};
use bridge::attributes::resource_attributes;
use bridge::data_point_count;
use common::config::{ExporterConfig, ResourceConfig};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, metrics_service_client::MetricsServiceClient,
};
use opentelemetry_proto::tonic::metrics::v1::{ResourceMetrics, ScopeMetrics};
use opentelemetry_proto::tonic::resource::v1::Resource;
use tonic::transport::{Channel, Endpoint};

/// OTLP resource built from configuration. `service.name` always comes
/// from `service_name`, overriding a same-named extra attribute.
pub fn build_resource(config: &ResourceConfig) -> Resource {
    let mut labels = config.attributes.clone();
    labels.insert("service.name".to_string(), config.service_name.clone());

    Resource {
        attributes: resource_attributes(Some(&bridge::source::Resource { labels })),
        ..Default::default()
    }
}

pub fn build_request(
    resource: &Resource,
    scope_metrics: Vec<ScopeMetrics>,
) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: Some(resource.clone()),
            scope_metrics,
            ..Default::default()
        }],
    }
}

/// Destination for converted batches.
pub enum Exporter {
    Otlp {
        endpoint: String,
        client: Box<MetricsServiceClient<Channel>>,
    },
    Log,
}

impl Exporter {
    /// Builds the exporter. The OTLP channel connects lazily, so an
    /// unreachable collector only fails individual exports.
    pub fn from_config(config: &ExporterConfig) -> Result<Self> {
        let Some(endpoint) = &config.endpoint else {
            return Ok(Exporter::Log);
        };

        let channel = Endpoint::from_shared(endpoint.clone())
            .with_context(|| format!("Invalid exporter endpoint: {endpoint}"))?
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .connect_lazy();

        Ok(Exporter::Otlp {
            endpoint: endpoint.clone(),
            client: Box::new(MetricsServiceClient::new(channel)),
        })
    }

    pub async fn export(&mut self, request: ExportMetricsServiceRequest) -> Result<()> {
        match self {
            Exporter::Otlp { endpoint, client } => {
                let response = client
                    .export(request)
                    .await
                    .with_context(|| format!("Failed to export metrics to {endpoint}"))?
                    .into_inner();

                if let Some(partial) = response.partial_success {
                    if partial.rejected_data_points > 0 {
                        tracing::warn!(
                            rejected = partial.rejected_data_points,
                            message = %partial.error_message,
                            "Collector rejected some data points"
                        );
                    }
                }
                tracing::debug!(%endpoint, "Exported metrics");
                Ok(())
            }
            Exporter::Log => {
                for scope_metrics in request
                    .resource_metrics
                    .iter()
                    .flat_map(|rm| rm.scope_metrics.iter())
                {
                    for metric in &scope_metrics.metrics {
                        tracing::info!(
                            metric = %metric.name,
                            unit = %metric.unit,
                            points = data_point_count(metric),
                            "Exported metric"
                        );
                    }
                }
                Ok(())
            }
        }
    }
}
