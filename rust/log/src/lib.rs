pub mod admin;
pub mod config;
pub mod consumer;
pub mod managed_log;
pub mod producer;
pub mod types;

use async_trait::async_trait;
use chroma_config::{
    registry::{Injectable, Registry},
    Configurable,
};
use chroma_error::ChromaError;

pub use admin::LogAdmin;
pub use config::LogConfig;
pub use consumer::{Consumer, ConsumerCallback};
pub use managed_log::{LogMessage, ManagedLog, TopicLog};
pub use producer::Producer;
pub use types::*;

/// The ingest log as wired into a service: one managed log with its admin,
/// producer and consumer. Clones share state.
#[derive(Clone, Debug)]
pub struct Log {
    pub admin: LogAdmin,
    pub producer: Producer,
    pub consumer: Consumer,
}

impl Log {
    pub fn new(config: &LogConfig) -> Result<Self, LogError> {
        let log = ManagedLog::new(config);
        let admin = LogAdmin::new(log.clone());
        admin.bootstrap()?;
        Ok(Self {
            admin,
            producer: Producer::new(log.clone()),
            consumer: Consumer::new(log, config.clone()),
        })
    }
}

impl Injectable for Log {}

#[async_trait]
impl Configurable<LogConfig> for Log {
    async fn try_from_config(
        config: &LogConfig,
        registry: &Registry,
    ) -> Result<Self, Box<dyn ChromaError>> {
        let log = Log::new(config).map_err(|err| err.boxed())?;
        registry.register(log.clone());
        Ok(log)
    }
}
