mod demo;
mod export;

use std::sync::Arc;

use anyhow::{Context, Result};
use bridge::{MetricBridge, MetricProducer, MetricSource, ProduceError, ProducerManager};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::Configuration;
use opentelemetry_proto::tonic::resource::v1::Resource;
use tokio_util::sync::CancellationToken;

use crate::demo::ProcessMetrics;
use crate::export::{Exporter, build_request, build_resource};

#[derive(Parser)]
#[command(name = "census-bridge")]
#[command(about = "Periodically converts registered census metrics to OTLP and exports them")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<BridgeCommands>,
}

#[derive(Subcommand)]
enum BridgeCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for BridgeCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::init_logging(&cli.common);

    let config = utils::load_config(cli.common.config.as_ref())?;

    let command = cli.command.unwrap_or_default();
    let BridgeCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config)? {
        return Ok(());
    }

    utils::validate_config(&config)?;
    run(config).await
}

async fn run(config: Configuration) -> Result<()> {
    let manager = ProducerManager::global();

    let demo_source = config.demo.enabled.then(|| {
        Arc::new(ProcessMetrics::new(&config.resource.service_name)) as Arc<dyn MetricSource>
    });
    if let Some(source) = &demo_source {
        manager.add(Arc::clone(source));
        tracing::info!("Registered demo process metrics source");
    }

    let bridge = MetricBridge::with_registry(manager.clone());
    let resource = build_resource(&config.resource);
    let mut exporter = Exporter::from_config(&config.exporter)?;
    let cancel = CancellationToken::new();

    match &config.exporter.endpoint {
        Some(endpoint) => tracing::info!(
            %endpoint,
            interval = ?config.exporter.interval,
            "Exporting metrics over OTLP/gRPC"
        ),
        None => tracing::info!(
            interval = ?config.exporter.interval,
            "No exporter endpoint configured, logging metrics"
        ),
    }

    let mut ticker = tokio::time::interval(config.exporter.interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let cycle = export_cycle(
                    &bridge,
                    &mut exporter,
                    &resource,
                    config.exporter.strict,
                    &cancel,
                );
                if let Err(e) = cycle.await {
                    tracing::error!(error = ?e, "Export cycle failed");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl+c signal")?;
                tracing::info!("Shutting down");
                cancel.cancel();
                break;
            }
        }
    }

    if let Some(source) = &demo_source {
        manager.remove(source);
    }

    Ok(())
}

/// Pulls one batch from the bridge and hands it to the exporter. In strict
/// mode a batch with dropped metrics is not exported and fails the cycle.
async fn export_cycle(
    bridge: &MetricBridge,
    exporter: &mut Exporter,
    resource: &Resource,
    strict: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    // Sources may block while building their snapshot.
    let produced = {
        let bridge = bridge.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || bridge.produce(&cancel))
            .await
            .context("Produce task failed")?
    };

    let produced = match produced {
        Err(ProduceError::Cancelled) => {
            tracing::debug!("Export cycle cancelled");
            return Ok(());
        }
        other => other?,
    };

    let scope_metrics = if strict {
        produced
            .into_result()
            .context("Skipping batch in strict mode")?
    } else {
        if let Some(dropped) = &produced.dropped {
            tracing::warn!(
                dropped = dropped.len(),
                error = %dropped,
                "Exporting partial batch"
            );
        }
        produced.scope_metrics
    };

    if scope_metrics.is_empty() {
        tracing::debug!("Nothing to export");
        return Ok(());
    }

    let request = build_request(resource, scope_metrics);
    exporter.export(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge::source::MetricKind;
    use bridge::testing::{StaticSource, descriptor_only, int_gauge};
    use chrono::Utc;

    fn bridge_with(source: Arc<StaticSource>) -> MetricBridge {
        let manager = Arc::new(ProducerManager::new());
        manager.add(source);
        MetricBridge::with_registry(manager)
    }

    #[tokio::test]
    async fn test_export_cycle_with_partial_batch() {
        let bridge = bridge_with(StaticSource::new(vec![
            descriptor_only("latency", MetricKind::GaugeDistribution),
            int_gauge("queue_depth", Utc::now(), 3, &[("host", "a")]),
        ]));
        let resource = build_resource(&Default::default());

        let result = export_cycle(
            &bridge,
            &mut Exporter::Log,
            &resource,
            false,
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_strict_export_cycle_rejects_partial_batch() {
        let bridge = bridge_with(StaticSource::new(vec![
            descriptor_only("latency", MetricKind::GaugeDistribution),
            int_gauge("queue_depth", Utc::now(), 3, &[("host", "a")]),
        ]));

        let err = export_cycle(
            &bridge,
            &mut Exporter::Log,
            &Resource::default(),
            true,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProduceError>(),
            Some(ProduceError::Partial(errors)) if errors.metric_names().any(|name| name == "latency")
        ));
    }

    #[tokio::test]
    async fn test_strict_export_cycle_passes_clean_batch() {
        let bridge = bridge_with(StaticSource::new(vec![int_gauge("a", Utc::now(), 1, &[])]));

        let result = export_cycle(
            &bridge,
            &mut Exporter::Log,
            &Resource::default(),
            true,
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_export_cycle_after_cancel_is_noop() {
        let bridge = bridge_with(StaticSource::new(vec![int_gauge("a", Utc::now(), 1, &[])]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = export_cycle(
            &bridge,
            &mut Exporter::Log,
            &Resource::default(),
            false,
            &cancel,
        )
        .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_cli_defaults_to_start() {
        let cli = Cli::parse_from(["census-bridge"]);
        assert!(matches!(
            cli.command.unwrap_or_default(),
            BridgeCommands::Common(CommonCommands::Start)
        ));
    }

    #[test]
    fn test_cli_config_subcommand() {
        let cli = Cli::parse_from(["census-bridge", "-q", "config", "--json"]);
        assert!(cli.common.quiet);
        assert!(matches!(
            cli.command,
            Some(BridgeCommands::Common(CommonCommands::Config { json: true }))
        ));
    }
}
