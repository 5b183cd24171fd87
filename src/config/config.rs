use std::collections::BTreeMap;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use crate::metrics::DEFAULT_DURATION_BUCKETS;

/// Prefix for environment overrides, e.g. `HELLO_BIND_ADDRESS` or
/// `HELLO_LOGGING__LEVEL`.
pub const ENV_PREFIX: &str = "HELLO_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct ConfigV1 {
    pub bind_address: String,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

impl Default for ConfigV1 {
    fn default() -> Self {
        ConfigV1 {
            bind_address: "0.0.0.0:3100".to_string(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// What the metrics registry exposes and how.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct MetricsConfig {
    /// Labels attached to every exposed sample.
    pub default_labels: BTreeMap<String, String>,
    /// Register process and runtime collectors.
    pub collect_default_metrics: bool,
    /// Upper bounds, in seconds, of the request-duration histogram.
    pub buckets: Vec<f64>,
    pub eventloop_lag_interval_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            default_labels: BTreeMap::from([(
                "app".to_string(),
                "hello-world-node-app".to_string(),
            )]),
            collect_default_metrics: true,
            buckets: DEFAULT_DURATION_BUCKETS.to_vec(),
            eventloop_lag_interval_ms: 1000,
        }
    }
}

/// Built-in defaults, the base layer every other source merges onto.
pub fn defaults() -> Figment {
    Figment::from(Serialized::defaults(Config::ConfigV1(ConfigV1::default())))
}

/// Load config from defaults, then the YAML file at `path` (if it exists),
/// then `HELLO_*` environment variables.
pub fn load_config(path: &Path) -> Result<ConfigV1, figment::Error> {
    let figment = defaults()
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));
    extract_config(&figment)
}

pub fn extract_config(figment: &Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
