//! The query node: serves resident segments and runs query plans over them.

pub mod config;
pub mod server;

use chroma_config::{registry::Registry, Configurable};
use chroma_tracing::init_otel_tracing;

pub use config::{QueryServiceConfig, RootConfig, DEFAULT_CONFIG_PATH};
pub use server::{WorkerError, WorkerServer};

pub async fn query_service_entrypoint() {
    query_service_entrypoint_with_config_path(DEFAULT_CONFIG_PATH).await
}

pub async fn query_service_entrypoint_with_config_path(path: &str) {
    let config = RootConfig::load_from_path(path).query_service;
    if let Err(err) = init_otel_tracing(
        &config.service_name,
        &config.otel_filters,
        config.otel_endpoint.as_deref(),
    ) {
        eprintln!("Failed to initialize tracing: {}", err);
    }

    let registry = Registry::new();
    let worker_server = match WorkerServer::try_from_config(&config, &registry).await {
        Ok(worker_server) => worker_server,
        Err(err) => {
            tracing::error!("Failed to create worker server component: {}", err);
            return;
        }
    };

    if let Err(err) = WorkerServer::run(worker_server).await {
        tracing::error!("Worker server stopped with an error: {}", err);
    }
}
