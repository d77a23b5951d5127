use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

pub const CONFIG_FILE: &str = "census-bridge.toml";
pub const ENV_PREFIX: &str = "CENSUS_BRIDGE__";

/// Where and how often converted metrics are shipped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// OTLP/gRPC endpoint. Without one, exported batches are only logged.
    pub endpoint: Option<String>,
    /// Time between two export cycles
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Upper bound for a single export request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Skip the whole batch when any metric failed to convert
    #[serde(default)]
    pub strict: bool,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
            strict: false,
        }
    }
}

/// Resource attached to every exported batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub service_name: String,
    /// Additional resource attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("census-bridge"),
            attributes: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Register the built-in process metrics source
    pub enabled: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub exporter: ExporterConfig,
    pub resource: ResourceConfig,
    pub demo: DemoConfig,
}

impl Configuration {
    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
    }

    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Self::figment()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Like [`Configuration::load`] but reads the given TOML file instead of
    /// the default one. The file must exist.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Self::figment()
            .merge(Toml::file_exact(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();

        assert!(config.exporter.endpoint.is_none());
        assert_eq!(config.exporter.interval, Duration::from_secs(10));
        assert_eq!(config.exporter.timeout, Duration::from_secs(5));
        assert!(!config.exporter.strict);
        assert_eq!(config.resource.service_name, "census-bridge");
        assert!(config.resource.attributes.is_empty());
        assert!(config.demo.enabled);
    }

    #[test]
    fn test_configless_operation() {
        Jail::expect_with(|_jail| {
            let config = Configuration::load().unwrap();
            assert!(config.exporter.endpoint.is_none());
            assert_eq!(config.resource.service_name, "census-bridge");
            Ok(())
        });
    }

    #[test]
    fn test_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                [exporter]
                endpoint = "http://collector:4317"
                interval = "30s"

                [resource]
                service_name = "checkout"

                [resource.attributes]
                "deployment.environment" = "staging"
                "#,
            )?;

            let config = Configuration::load().unwrap();
            assert_eq!(
                config.exporter.endpoint.as_deref(),
                Some("http://collector:4317")
            );
            assert_eq!(config.exporter.interval, Duration::from_secs(30));
            assert_eq!(config.exporter.timeout, Duration::from_secs(5));
            assert_eq!(config.resource.service_name, "checkout");
            assert_eq!(
                config.resource.attributes["deployment.environment"],
                "staging"
            );
            Ok(())
        });
    }

    #[test]
    fn test_env_var_override() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE, "[exporter]\ninterval = \"30s\"\n")?;
            jail.set_env("CENSUS_BRIDGE__EXPORTER__INTERVAL", "1m");
            jail.set_env("CENSUS_BRIDGE__DEMO__ENABLED", "false");
            jail.set_env("CENSUS_BRIDGE__EXPORTER__STRICT", "true");
            jail.set_env("CENSUS_BRIDGE__RESOURCE__ATTRIBUTES__REGION", "eu-west-1");

            let config = Configuration::load().unwrap();
            assert_eq!(config.exporter.interval, Duration::from_secs(60));
            assert!(!config.demo.enabled);
            assert!(config.exporter.strict);
            assert_eq!(config.resource.attributes["region"], "eu-west-1");
            Ok(())
        });
    }

    #[test]
    fn test_load_from_path_requires_file() {
        Jail::expect_with(|jail| {
            assert!(Configuration::load_from_path(Path::new("missing.toml")).is_err());

            jail.create_file("custom.toml", "[exporter]\ntimeout = \"2s\"\n")?;
            let config = Configuration::load_from_path(Path::new("custom.toml")).unwrap();
            assert_eq!(config.exporter.timeout, Duration::from_secs(2));
            Ok(())
        });
    }
}
