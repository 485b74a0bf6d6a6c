use async_trait::async_trait;
use chroma_config::{
    assignment::config::AssignmentPolicyConfig, registry::Registry, Configurable,
};
use chroma_error::ChromaError;
use serde::{Deserialize, Serialize};

use super::{
    distributed::DistributedExecutor, local::LocalExecutor, retry::RetryConfig, Executor,
};

fn default_replication_factor() -> usize {
    2
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    60000
}

/// Configuration for the distributed executor.
/// # Fields
/// - `members` - The query nodes, as `host:port`
/// - `replication_factor` - The number of replicas a request may be sent to
/// - `connect_timeout_ms` - The timeout for connecting to a node
/// - `request_timeout_ms` - The timeout for a single request
/// - `retry` - The retry policy across replicas
/// - `assignment` - The assignment policy used to route collections to members
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
pub struct DistributedExecutorConfig {
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub assignment: AssignmentPolicyConfig,
}

impl Default for DistributedExecutorConfig {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            replication_factor: default_replication_factor(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryConfig::default(),
            assignment: AssignmentPolicyConfig::default(),
        }
    }
}

#[derive(Deserialize, Clone, Serialize, Debug, Default, PartialEq)]
pub struct LocalExecutorConfig {}

#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
pub enum ExecutorConfig {
    #[serde(alias = "distributed")]
    Distributed(DistributedExecutorConfig),
    #[serde(alias = "local")]
    Local(LocalExecutorConfig),
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig::Local(LocalExecutorConfig::default())
    }
}

#[async_trait]
impl Configurable<ExecutorConfig> for Executor {
    async fn try_from_config(
        config: &ExecutorConfig,
        registry: &Registry,
    ) -> Result<Self, Box<dyn ChromaError>> {
        match config {
            ExecutorConfig::Distributed(distributed_config) => {
                let distributed_executor =
                    DistributedExecutor::try_from_config(distributed_config, registry).await?;
                Ok(Executor::Distributed(distributed_executor))
            }
            ExecutorConfig::Local(local_config) => {
                let local_executor = LocalExecutor::try_from_config(local_config, registry).await?;
                Ok(Executor::Local(local_executor))
            }
        }
    }
}
