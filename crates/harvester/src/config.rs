//! Harvester configuration

use anyhow::Result;
use serde::Deserialize;

/// Daemon configuration, read from `HARVESTER_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Namespace whose pods are sampled; unset means the context default
    #[serde(default)]
    pub namespace: Option<String>,

    /// Pod sampling interval in seconds
    #[serde(default = "default_pod_interval")]
    pub pod_interval_secs: u64,

    /// Node sampling interval in seconds
    #[serde(default = "default_node_interval")]
    pub node_interval_secs: u64,

    /// Root directory for per-run series stores
    #[serde(default = "default_store_root")]
    pub store_root: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Identifier of this run; defaults to a timestamp-derived one
    #[serde(default = "default_run_id")]
    pub run_id: String,

    /// Total drain budget shared by all sessions, in seconds
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,

    /// Field whose average orders the final report, highest first
    #[serde(default)]
    pub sort_by: Option<String>,

    /// JSON-lines file that receives the run's raw rows after analysis
    #[serde(default)]
    pub export_path: Option<String>,
}

fn default_pod_interval() -> u64 {
    10
}

fn default_node_interval() -> u64 {
    30
}

fn default_store_root() -> String {
    "./harvest".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_run_id() -> String {
    format!("run-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"))
}

fn default_drain_timeout() -> u64 {
    10
}

impl HarvesterConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("HARVESTER"))
            .build()?;

        Ok(config
            .try_deserialize()
            .unwrap_or_else(|_| HarvesterConfig {
                namespace: None,
                pod_interval_secs: default_pod_interval(),
                node_interval_secs: default_node_interval(),
                store_root: default_store_root(),
                api_port: default_api_port(),
                run_id: default_run_id(),
                drain_timeout_secs: default_drain_timeout(),
                sort_by: None,
                export_path: None,
            }))
    }
}
