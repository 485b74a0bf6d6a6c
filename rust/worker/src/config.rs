use std::time::Duration;

use chroma_config::helpers::{deserialize_duration_from_seconds, serialize_duration_to_seconds};
use chroma_log::LogConfig;
use chroma_tracing::OtelFilter;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "./chroma_config.yaml";
const ENV_PREFIX: &str = "CHROMA_";

/// # Description
/// The root config shared by the chroma services. It is read from a YAML
/// file and then from environment variables prefixed with `CHROMA_`.
/// Values in the environment take precedence over values in the file.
/// Nested fields are separated by `__`, for example
/// `CHROMA_QUERY_SERVICE__MY_PORT`.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct RootConfig {
    #[serde(default)]
    pub query_service: QueryServiceConfig,
}

impl RootConfig {
    /// Loads the config from `./chroma_config.yaml`.
    /// # Panics
    /// If the file or the environment holds invalid values.
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Loads the config from `path`. A missing file is not an error; the
    /// environment and the defaults still apply.
    /// # Panics
    /// If the file or the environment holds invalid values.
    pub fn load_from_path(path: &str) -> Self {
        match Self::try_load_from_path(path) {
            Ok(config) => config,
            Err(e) => panic!("Error loading config: {}", e),
        }
    }

    pub fn try_load_from_path(path: &str) -> Result<Self, figment::Error> {
        // Figment splits nested keys on `.`, so map our `__` separator.
        let mut f = figment::Figment::from(
            Env::prefixed(ENV_PREFIX).map(|k| k.as_str().replace("__", ".").into()),
        );
        if std::path::Path::new(path).exists() {
            f = figment::Figment::from(Yaml::file(path)).merge(f);
        }
        f.extract()
    }
}

fn default_service_name() -> String {
    "query-service".to_string()
}

fn default_port() -> u16 {
    50051
}

fn default_grpc_shutdown_grace_period() -> Duration {
    Duration::from_secs(1)
}

/// # Description
/// The config for the query service.
/// ## Description of parameters
/// - service_name: The name reported to the trace exporter.
/// - otel_endpoint: The OTLP collector. Traces are only exported when set.
/// - otel_filters: Per crate log levels on top of the defaults.
/// - my_port: The port the gRPC server listens on.
/// - grpc_shutdown_grace_period: Seconds to keep serving after SIGTERM.
/// - ingest: When set, loaded segments follow their collection topic.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct QueryServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub otel_endpoint: Option<String>,
    #[serde(default)]
    pub otel_filters: Vec<OtelFilter>,
    #[serde(default = "default_port")]
    pub my_port: u16,
    #[serde(
        default = "default_grpc_shutdown_grace_period",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub grpc_shutdown_grace_period: Duration,
    #[serde(default)]
    pub ingest: Option<LogConfig>,
}

impl Default for QueryServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            otel_endpoint: None,
            otel_filters: Vec::new(),
            my_port: default_port(),
            grpc_shutdown_grace_period: default_grpc_shutdown_grace_period(),
            ingest: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_tracing::init_tracer::OtelFilterLevel;
    use figment::Jail;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_default_path() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "chroma_config.yaml",
                r#"
                query_service:
                    service_name: "query-service-0"
                    otel_endpoint: "http://jaeger:4317"
                    my_port: 50052
                    grpc_shutdown_grace_period: 5
                "#,
            )?;
            let config = RootConfig::load();
            assert_eq!(config.query_service.service_name, "query-service-0");
            assert_eq!(
                config.query_service.otel_endpoint.as_deref(),
                Some("http://jaeger:4317")
            );
            assert_eq!(config.query_service.my_port, 50052);
            assert_eq!(
                config.query_service.grpc_shutdown_grace_period,
                Duration::from_secs(5)
            );
            assert!(config.query_service.ingest.is_none());
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_| {
            let config = RootConfig::load();
            assert_eq!(config.query_service.service_name, "query-service");
            assert_eq!(config.query_service.my_port, 50051);
            assert_eq!(
                config.query_service.grpc_shutdown_grace_period,
                Duration::from_secs(1)
            );
            assert!(config.query_service.otel_endpoint.is_none());
            assert!(config.query_service.otel_filters.is_empty());
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "chroma_config.yaml",
                r#"
                query_service:
                    my_port: 50052
                    ingest:
                        max_batch_size: 10
                "#,
            )?;
            jail.set_env("CHROMA_QUERY_SERVICE__MY_PORT", 50060);
            jail.set_env("CHROMA_QUERY_SERVICE__INGEST__MAX_REDELIVERIES", 7);
            let config = RootConfig::load();
            assert_eq!(config.query_service.my_port, 50060);
            let ingest = config.query_service.ingest.expect("ingest is configured");
            assert_eq!(ingest.max_batch_size, 10);
            assert_eq!(ingest.max_redeliveries, 7);
            assert_eq!(ingest.entries_per_ledger, LogConfig::default().entries_per_ledger);
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_otel_filters() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "chroma_config.yaml",
                r#"
                query_service:
                    otel_filters:
                        - crate_name: "tonic"
                          filter_level: "warn"
                "#,
            )?;
            let config = RootConfig::load();
            assert_eq!(
                config.query_service.otel_filters,
                vec![OtelFilter {
                    crate_name: "tonic".to_string(),
                    filter_level: OtelFilterLevel::Warn,
                }]
            );
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_invalid_value_is_an_error() {
        Jail::expect_with(|jail| {
            jail.set_env("CHROMA_QUERY_SERVICE__MY_PORT", "not-a-port");
            assert!(RootConfig::try_load_from_path(DEFAULT_CONFIG_PATH).is_err());
            Ok(())
        });
    }
}
