use std::{collections::HashMap, future::Future, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use chroma_config::{registry::Registry, Configurable};
use chroma_error::{ChromaError, ErrorCodes};
use chroma_frontend::{ExecutorError, LocalExecutor, LocalExecutorConfig};
use chroma_log::{Log, LogError, SubscriptionId, TopicName};
use chroma_segment::{LocalSegmentManager, ResidentSegment, SegmentError, SegmentIngestor};
use chroma_tracing::wrap_span_with_parent_context;
use chroma_types::{
    chroma_proto::{
        self,
        query_executor_server::{QueryExecutor, QueryExecutorServer},
        segment_server_server::{SegmentServer, SegmentServerServer},
    },
    operator::Scan,
    plan::{Count, Get, Knn},
    QueryConversionError, RecordConversionError, Segment, SegmentConversionError, SegmentUuid,
    Vector, VectorConversionError, VectorQuery,
};
use thiserror::Error;
use tokio::{
    net::TcpListener,
    signal::unix::{signal, SignalKind},
};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{
    transport::{server::Router, Server},
    Request, Response, Status,
};
use tracing::Instrument;

use crate::config::QueryServiceConfig;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error("Invalid segment: {0}")]
    SegmentConversion(#[from] SegmentConversionError),
    #[error("Invalid plan: {0}")]
    QueryConversion(#[from] QueryConversionError),
    #[error("Invalid record: {0}")]
    Record(#[from] RecordConversionError),
    #[error("Invalid vector: {0}")]
    Vector(#[from] VectorConversionError),
    #[error("Error following collection topic: {0}")]
    Log(#[from] LogError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error("Error reading segment: {0}")]
    Read(Box<dyn ChromaError>),
}

impl ChromaError for WorkerError {
    fn code(&self) -> ErrorCodes {
        match self {
            WorkerError::Segment(e) => e.code(),
            WorkerError::SegmentConversion(e) => e.code(),
            WorkerError::QueryConversion(e) => e.code(),
            WorkerError::Record(e) => e.code(),
            WorkerError::Vector(e) => e.code(),
            WorkerError::Log(e) => e.code(),
            WorkerError::Executor(e) => e.code(),
            WorkerError::Read(e) => e.code(),
        }
    }
}

impl From<WorkerError> for Status {
    fn from(err: WorkerError) -> Self {
        Status::new(err.code().into(), err.to_string())
    }
}

/// Serves the segments resident in this process.
///
/// Two services share the same segments: the segment server, which loads
/// and reads individual segments, and the query executor, which answers
/// `Count`, `Get` and `Knn` plans over them. When an ingest log is
/// configured every loaded segment follows its collection topic until it
/// is released.
#[derive(Clone)]
pub struct WorkerServer {
    segments: LocalSegmentManager,
    executor: LocalExecutor,
    log: Option<Log>,
    // Held across subscribe and unsubscribe so that a segment never ends up
    // with two subscriptions.
    subscriptions: Arc<tokio::sync::Mutex<HashMap<SegmentUuid, SubscriptionId>>>,
    port: u16,
    shutdown_grace_period: Duration,
}

#[async_trait]
impl Configurable<QueryServiceConfig> for WorkerServer {
    async fn try_from_config(
        config: &QueryServiceConfig,
        registry: &Registry,
    ) -> Result<Self, Box<dyn ChromaError>> {
        let executor =
            LocalExecutor::try_from_config(&LocalExecutorConfig::default(), registry).await?;
        let segments = registry
            .get::<LocalSegmentManager>()
            .map_err(|err| err.boxed())?;
        let log = match &config.ingest {
            Some(log_config) => Some(Log::try_from_config(log_config, registry).await?),
            None => None,
        };
        Ok(WorkerServer {
            segments,
            executor,
            log,
            subscriptions: Arc::default(),
            port: config.my_port,
            shutdown_grace_period: config.grpc_shutdown_grace_period,
        })
    }
}

impl WorkerServer {
    pub fn new(segments: LocalSegmentManager, log: Option<Log>) -> Self {
        let config = QueryServiceConfig::default();
        Self {
            executor: LocalExecutor::new(Arc::new(segments.clone())),
            segments,
            log,
            subscriptions: Arc::default(),
            port: config.my_port,
            shutdown_grace_period: config.grpc_shutdown_grace_period,
        }
    }

    pub fn segments(&self) -> &LocalSegmentManager {
        &self.segments
    }

    fn router(&self) -> Router {
        Server::builder()
            .add_service(SegmentServerServer::new(self.clone()))
            .add_service(QueryExecutorServer::new(self.clone()))
    }

    /// Listens on `[::]:{my_port}` until SIGTERM, then keeps serving for the
    /// shutdown grace period.
    pub async fn run(worker: WorkerServer) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(("::", worker.port)).await?;
        tracing::info!(addr = %listener.local_addr()?, "Worker listening");
        let shutdown_grace_period = worker.shutdown_grace_period;
        worker
            .serve(listener, async move {
                let mut sigterm = match signal(SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        tracing::error!("Failed to create signal handler: {:?}", e);
                        return;
                    }
                };
                sigterm.recv().await;
                tracing::info!("Received SIGTERM, waiting for grace period...");
                tokio::time::sleep(shutdown_grace_period).await;
                tracing::info!("Grace period ended, shutting down server...");
            })
            .await?;
        Ok(())
    }

    /// Serves on `listener` until `shutdown` resolves, then stops every
    /// ingest subscription.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), tonic::transport::Error> {
        let result = self
            .router()
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await;
        self.unsubscribe_all().await;
        result
    }

    /// Makes `segment` resident and, with an ingest log, subscribes it to
    /// its collection topic. Both steps are idempotent.
    ///
    /// Residency and subscription change together under the subscriptions
    /// lock, so a concurrent release never leaves a subscription behind.
    async fn load(&self, segment: &Segment) -> Result<ResidentSegment, WorkerError> {
        let Some(log) = &self.log else {
            return Ok(self.segments.load(segment)?);
        };
        let mut subscriptions = self.subscriptions.lock().await;
        let resident = self.segments.load(segment)?;
        if subscriptions.contains_key(&segment.id) {
            return Ok(resident);
        }
        let topic = TopicName::new(segment.collection.to_string());
        log.admin.create_topic(&topic)?;
        let ingestor = SegmentIngestor::new(segment.collection, vec![resident.writer()]);
        let subscription_id = ingestor
            .subscribe(&log.consumer, &topic.to_string())
            .await?;
        tracing::info!(
            segment_id = %segment.id,
            %topic,
            %subscription_id,
            "Following collection topic"
        );
        subscriptions.insert(segment.id, subscription_id);
        Ok(resident)
    }

    async fn load_scan(&self, scan: &Scan) -> Result<(), WorkerError> {
        self.load(&scan.collection_and_segments.metadata_segment)
            .await?;
        self.load(&scan.collection_and_segments.vector_segment)
            .await?;
        Ok(())
    }

    /// Stops ingestion into the segment and drops it. Returns whether it was
    /// resident.
    async fn release(&self, id: &SegmentUuid) -> bool {
        let Some(log) = &self.log else {
            return self.segments.release(id);
        };
        let mut subscriptions = self.subscriptions.lock().await;
        if let Some(subscription_id) = subscriptions.remove(id) {
            log.consumer.unsubscribe(subscription_id).await;
        }
        self.segments.release(id)
    }

    async fn unsubscribe_all(&self) {
        let Some(log) = &self.log else {
            return;
        };
        let mut subscriptions = self.subscriptions.lock().await;
        for (_, subscription_id) in subscriptions.drain() {
            log.consumer.unsubscribe(subscription_id).await;
        }
    }

    ///////////////////////// Segment Server /////////////////////////

    async fn load_segment_impl(
        &self,
        segment: chroma_proto::Segment,
    ) -> Result<chroma_proto::SegmentServerResponse, WorkerError> {
        let segment = Segment::try_from(segment)?;
        self.load(&segment).await?;
        Ok(chroma_proto::SegmentServerResponse { success: true })
    }

    async fn release_segment_impl(
        &self,
        segment: chroma_proto::Segment,
    ) -> Result<chroma_proto::SegmentServerResponse, WorkerError> {
        let segment_id = SegmentUuid::from_str(&segment.id)?;
        if !self.release(&segment_id).await {
            return Err(SegmentError::NotLoaded(segment_id).into());
        }
        Ok(chroma_proto::SegmentServerResponse { success: true })
    }

    async fn get_vectors_impl(
        &self,
        request: chroma_proto::GetVectorsRequest,
    ) -> Result<chroma_proto::GetVectorsResponse, WorkerError> {
        let segment_id = SegmentUuid::from_str(&request.segment_id)?;
        let reader = self.segments.get(&segment_id)?.vector_reader()?;
        let records = reader
            .get_vectors(request.ids.map(|ids| ids.ids), 0)
            .await
            .map_err(WorkerError::Read)?;
        let records = records
            .iter()
            .map(chroma_proto::VectorEmbeddingRecord::try_from)
            .collect::<Result<_, _>>()?;
        Ok(chroma_proto::GetVectorsResponse { records })
    }

    async fn query_vectors_impl(
        &self,
        request: chroma_proto::QueryVectorsRequest,
    ) -> Result<chroma_proto::QueryVectorsResponse, WorkerError> {
        let segment_id = SegmentUuid::from_str(&request.segment_id)?;
        let reader = self.segments.get(&segment_id)?.vector_reader()?;
        let vectors = request
            .vectors
            .into_iter()
            .map(Vector::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let query = VectorQuery {
            vectors,
            k: request.k,
            allowed_ids: request.allowed_ids.map(|allowed| allowed.ids),
            include_embeddings: request.include_embeddings,
        };
        let results = reader
            .query_vectors(query)
            .await
            .map_err(WorkerError::Read)?;
        let results = results
            .iter()
            .map(|results| {
                Ok(chroma_proto::VectorQueryResults {
                    results: results
                        .iter()
                        .map(chroma_proto::VectorQueryResult::try_from)
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<_, WorkerError>>()?;
        Ok(chroma_proto::QueryVectorsResponse { results })
    }

    ///////////////////////// Query Executor /////////////////////////

    async fn orchestrate_count(
        &self,
        plan: chroma_proto::CountPlan,
    ) -> Result<chroma_proto::CountResult, WorkerError> {
        let plan = Count::try_from(plan)?;
        self.load_scan(&plan.scan).await?;
        Ok(self.executor.count(plan).await?.into())
    }

    async fn orchestrate_get(
        &self,
        plan: chroma_proto::GetPlan,
    ) -> Result<chroma_proto::GetResult, WorkerError> {
        let plan = Get::try_from(plan)?;
        self.load_scan(&plan.scan).await?;
        Ok(self.executor.get(plan).await?.try_into()?)
    }

    async fn orchestrate_knn(
        &self,
        plan: chroma_proto::KnnPlan,
    ) -> Result<chroma_proto::KnnBatchResult, WorkerError> {
        let plan = Knn::try_from(plan)?;
        self.load_scan(&plan.scan).await?;
        Ok(self.executor.knn(plan).await?.try_into()?)
    }
}

#[async_trait]
impl SegmentServer for WorkerServer {
    async fn load_segment(
        &self,
        request: Request<chroma_proto::Segment>,
    ) -> Result<Response<chroma_proto::SegmentServerResponse>, Status> {
        let span = wrap_span_with_parent_context(
            tracing::info_span!("LoadSegment", segment_id = %request.get_ref().id),
            request.metadata(),
        );
        let response = self
            .load_segment_impl(request.into_inner())
            .instrument(span)
            .await?;
        Ok(Response::new(response))
    }

    async fn release_segment(
        &self,
        request: Request<chroma_proto::Segment>,
    ) -> Result<Response<chroma_proto::SegmentServerResponse>, Status> {
        let span = wrap_span_with_parent_context(
            tracing::info_span!("ReleaseSegment", segment_id = %request.get_ref().id),
            request.metadata(),
        );
        let response = self
            .release_segment_impl(request.into_inner())
            .instrument(span)
            .await?;
        Ok(Response::new(response))
    }

    async fn get_vectors(
        &self,
        request: Request<chroma_proto::GetVectorsRequest>,
    ) -> Result<Response<chroma_proto::GetVectorsResponse>, Status> {
        let span = wrap_span_with_parent_context(
            tracing::info_span!("GetVectors", segment_id = %request.get_ref().segment_id),
            request.metadata(),
        );
        let response = self
            .get_vectors_impl(request.into_inner())
            .instrument(span)
            .await?;
        Ok(Response::new(response))
    }

    async fn query_vectors(
        &self,
        request: Request<chroma_proto::QueryVectorsRequest>,
    ) -> Result<Response<chroma_proto::QueryVectorsResponse>, Status> {
        let span = wrap_span_with_parent_context(
            tracing::info_span!("QueryVectors", segment_id = %request.get_ref().segment_id),
            request.metadata(),
        );
        let response = self
            .query_vectors_impl(request.into_inner())
            .instrument(span)
            .await?;
        Ok(Response::new(response))
    }
}

#[async_trait]
impl QueryExecutor for WorkerServer {
    async fn count(
        &self,
        count: Request<chroma_proto::CountPlan>,
    ) -> Result<Response<chroma_proto::CountResult>, Status> {
        let span = wrap_span_with_parent_context(tracing::info_span!("Count"), count.metadata());
        let result = self
            .orchestrate_count(count.into_inner())
            .instrument(span)
            .await?;
        Ok(Response::new(result))
    }

    async fn get(
        &self,
        get: Request<chroma_proto::GetPlan>,
    ) -> Result<Response<chroma_proto::GetResult>, Status> {
        let span = wrap_span_with_parent_context(tracing::info_span!("Get"), get.metadata());
        let result = self
            .orchestrate_get(get.into_inner())
            .instrument(span)
            .await?;
        Ok(Response::new(result))
    }

    async fn knn(
        &self,
        knn: Request<chroma_proto::KnnPlan>,
    ) -> Result<Response<chroma_proto::KnnBatchResult>, Status> {
        let span = wrap_span_with_parent_context(tracing::info_span!("Knn"), knn.metadata());
        let result = self
            .orchestrate_knn(knn.into_inner())
            .instrument(span)
            .await?;
        Ok(Response::new(result))
    }
}
