use std::{collections::HashMap, sync::Arc, time::Duration};

use chroma_tracing::TraceContextInterceptor;
use chroma_types::chroma_proto::query_executor_client::QueryExecutorClient;
use parking_lot::Mutex;
use tonic::{
    codegen::InterceptedService,
    transport::{Channel, Endpoint},
};

use super::ExecutorError;

pub type QueryClient = QueryExecutorClient<InterceptedService<Channel, TraceContextInterceptor>>;

/// Caches one query client per endpoint.
///
/// Channels connect lazily on first use and multiplex every call made
/// through clones of the cached client. The map lock is only held to look
/// up or insert a client, never across a call.
#[derive(Clone, Debug)]
pub struct ClientManager {
    clients: Arc<Mutex<HashMap<String, QueryClient>>>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ClientManager {
    pub fn new(connect_timeout_ms: u64, request_timeout_ms: u64) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
        }
    }

    /// Returns the client for `endpoint` (`host:port`), creating it on the
    /// first request.
    pub fn client(&self, endpoint: &str) -> Result<QueryClient, ExecutorError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(endpoint) {
            return Ok(client.clone());
        }
        let channel = Endpoint::from_shared(format!("http://{}", endpoint))
            .map_err(|_| ExecutorError::InvalidEndpoint(endpoint.to_string()))?
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .connect_lazy();
        let client = QueryExecutorClient::with_interceptor(channel, TraceContextInterceptor);
        tracing::info!(endpoint, "Created query client");
        clients.insert(endpoint.to_string(), client.clone());
        Ok(client)
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.clients.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_error::{ChromaError, ErrorCodes};

    #[tokio::test]
    async fn test_clients_are_cached_per_endpoint() {
        let manager = ClientManager::new(100, 1000);
        manager.client("localhost:50051").unwrap();
        manager.client("localhost:50051").unwrap();
        manager.client("localhost:50052").unwrap();
        let mut endpoints = manager.endpoints();
        endpoints.sort();
        assert_eq!(endpoints, vec!["localhost:50051", "localhost:50052"]);
    }

    #[tokio::test]
    async fn test_invalid_endpoint() {
        let manager = ClientManager::new(100, 1000);
        let err = manager.client("not a uri").unwrap_err();
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
        assert!(manager.endpoints().is_empty());
    }
}
