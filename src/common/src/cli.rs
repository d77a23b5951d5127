use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared across all binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Common subcommands available for all services
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Start the bridge (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Log filter for the given flags. `RUST_LOG` wins when set.
    pub fn log_filter(args: &CommonArgs) -> EnvFilter {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        tracing_subscriber::fmt()
            .with_env_filter(log_filter(args))
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("census-bridge configuration:");
            println!("============================");
            match &config.exporter.endpoint {
                Some(endpoint) => println!("Exporter endpoint: {endpoint}"),
                None => println!("Exporter endpoint: none (log only)"),
            }
            println!("Export interval: {:?}", config.exporter.interval);
            println!("Export timeout: {:?}", config.exporter.timeout);
            println!("Strict export: {}", config.exporter.strict);
            println!("Service name: {}", config.resource.service_name);

            let mut attributes: Vec<_> = config.resource.attributes.iter().collect();
            attributes.sort();
            for (key, value) in attributes {
                println!("Resource attribute: {key}={value}");
            }

            println!(
                "Demo source: {}",
                if config.demo.enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.exporter.interval.is_zero() {
            anyhow::bail!("Export interval must be greater than zero");
        }

        if config.exporter.timeout.is_zero() {
            anyhow::bail!("Export timeout must be greater than zero");
        }

        if config.resource.service_name.trim().is_empty() {
            anyhow::bail!("Service name cannot be empty");
        }

        if let Some(endpoint) = &config.exporter.endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            anyhow::bail!("Exporter endpoint must start with http:// or https://: {endpoint}");
        }

        log::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Handle common CLI commands that don't require starting the bridge
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Start => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "census-bridge {} ({})",
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use std::time::Duration;

    #[test]
    fn test_common_commands_default() {
        let default_cmd = CommonCommands::default();
        assert!(matches!(default_cmd, CommonCommands::Start));
    }

    #[test]
    fn test_version_info() {
        let version = utils::version_info();
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(utils::validate_config(&Configuration::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Configuration::default();
        config.exporter.interval = Duration::ZERO;
        assert!(utils::validate_config(&config).is_err());

        let mut config = Configuration::default();
        config.exporter.timeout = Duration::ZERO;
        assert!(utils::validate_config(&config).is_err());

        let mut config = Configuration::default();
        config.resource.service_name = "  ".to_string();
        assert!(utils::validate_config(&config).is_err());

        let mut config = Configuration::default();
        config.exporter.endpoint = Some("collector:4317".to_string());
        assert!(utils::validate_config(&config).is_err());

        config.exporter.endpoint = Some("http://collector:4317".to_string());
        assert!(utils::validate_config(&config).is_ok());
    }

    #[test]
    fn test_start_is_not_handled() {
        let handled =
            utils::handle_common_command(&CommonCommands::Start, &Configuration::default())
                .unwrap();
        assert!(!handled);
    }

    #[test]
    fn test_args_parse() {
        #[derive(Parser)]
        struct Cli {
            #[command(flatten)]
            common: CommonArgs,
        }

        let cli = Cli::parse_from(["census-bridge", "--config", "bridge.toml", "-v"]);
        assert_eq!(cli.common.config, Some(PathBuf::from("bridge.toml")));
        assert!(cli.common.verbose);
        assert!(!cli.common.quiet);
    }
}
