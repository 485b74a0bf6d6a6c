use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use chroma_config::{
    assignment::assignment_policy::AssignmentPolicy, registry::Registry, Configurable,
};
use chroma_error::ChromaError;
use chroma_types::{
    chroma_proto,
    operator::{CountResult, GetResult, KnnBatchResult, Scan},
    plan::{Count, Get, Knn},
};
use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;
use tonic::Request;

use super::{
    client_manager::{ClientManager, QueryClient},
    config::DistributedExecutorConfig,
    endpoint::{EndpointResolver, RendezvousEndpointResolver},
    retry::{retry_across_endpoints, RetryConfig, Sleeper, TokioSleeper},
    ExecutorError,
};

/// A distributed executor that routes requests to the query nodes holding
/// the collection.
/// # Fields
/// - `resolver` - Maps a collection id to its replica endpoints
/// - `clients` - The per endpoint client cache
/// - `replication_factor` - The number of replicas a request may be sent to
/// - `retry` - The retry policy across replicas
/// # Notes
/// The replica order is shuffled on every call to spread load. Retries
/// rotate through the shuffled replicas.
#[derive(Clone, Debug)]
pub struct DistributedExecutor {
    resolver: Arc<dyn EndpointResolver>,
    clients: ClientManager,
    replication_factor: usize,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

#[async_trait]
impl Configurable<DistributedExecutorConfig> for DistributedExecutor {
    async fn try_from_config(
        config: &DistributedExecutorConfig,
        registry: &Registry,
    ) -> Result<Self, Box<dyn ChromaError>> {
        let mut assignment_policy =
            Box::<dyn AssignmentPolicy>::try_from_config(&config.assignment, registry).await?;
        assignment_policy.set_members(config.members.clone());
        Ok(Self::new(
            Arc::new(RendezvousEndpointResolver::with_policy(assignment_policy)),
            ClientManager::new(config.connect_timeout_ms, config.request_timeout_ms),
            config.replication_factor,
            config.retry.clone(),
        ))
    }
}

impl DistributedExecutor {
    pub fn new(
        resolver: Arc<dyn EndpointResolver>,
        clients: ClientManager,
        replication_factor: usize,
        retry: RetryConfig,
    ) -> Self {
        Self {
            resolver,
            clients,
            replication_factor,
            retry,
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Calls in flight stop retrying once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn endpoints(&self, scan: &Scan) -> Result<Vec<String>, ExecutorError> {
        let collection_id = scan
            .collection_and_segments
            .collection
            .collection_id
            .to_string();
        let mut endpoints = self
            .resolver
            .get_endpoints(&collection_id, self.replication_factor)?;
        endpoints.shuffle(&mut rand::thread_rng());
        Ok(endpoints)
    }

    async fn call<T, F, Fut>(&self, endpoints: &[String], mut rpc: F) -> Result<T, ExecutorError>
    where
        F: FnMut(QueryClient) -> Fut,
        Fut: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        let clients = &self.clients;
        retry_across_endpoints(
            endpoints,
            &self.retry,
            self.sleeper.as_ref(),
            &self.cancel,
            |endpoint| {
                let call = clients
                    .client(endpoint)
                    .map(&mut rpc)
                    .map_err(|e| tonic::Status::new(e.code().into(), e.to_string()));
                async move {
                    let response: tonic::Response<T> = call?.await?;
                    Ok::<_, tonic::Status>(response.into_inner())
                }
            },
        )
        .await
    }

    ///////////////////////// Plan Operations /////////////////////////
    #[tracing::instrument(
        skip_all,
        fields(collection_id = %plan.scan.collection_and_segments.collection.collection_id)
    )]
    pub async fn count(&self, plan: Count) -> Result<CountResult, ExecutorError> {
        let endpoints = self.endpoints(&plan.scan)?;
        let request = chroma_proto::CountPlan::from(plan);
        let result = self
            .call(&endpoints, |mut client| {
                let request = request.clone();
                async move { client.count(Request::new(request)).await }
            })
            .await?;
        Ok(result.into())
    }

    #[tracing::instrument(
        skip_all,
        fields(collection_id = %plan.scan.collection_and_segments.collection.collection_id)
    )]
    pub async fn get(&self, plan: Get) -> Result<GetResult, ExecutorError> {
        let endpoints = self.endpoints(&plan.scan)?;
        let request = chroma_proto::GetPlan::try_from(plan)?;
        let result = self
            .call(&endpoints, |mut client| {
                let request = request.clone();
                async move { client.get(Request::new(request)).await }
            })
            .await?;
        Ok(result.try_into()?)
    }

    #[tracing::instrument(
        skip_all,
        fields(collection_id = %plan.scan.collection_and_segments.collection.collection_id)
    )]
    pub async fn knn(&self, plan: Knn) -> Result<KnnBatchResult, ExecutorError> {
        let endpoints = self.endpoints(&plan.scan)?;
        let request = chroma_proto::KnnPlan::try_from(plan)?;
        let result = self
            .call(&endpoints, |mut client| {
                let request = request.clone();
                async move { client.knn(Request::new(request)).await }
            })
            .await?;
        Ok(result.try_into()?)
    }
}
