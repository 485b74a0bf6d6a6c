use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chroma_error::{ChromaError, ErrorCodes};
use chroma_frontend::{
    ClientManager, DistributedExecutor, Executor, ExecutorError, RendezvousEndpointResolver,
    RetryConfig, Sleeper,
};
use chroma_tracing::{SPAN_ID_HEADER_KEY, TRACE_ID_HEADER_KEY};
use chroma_types::{
    chroma_proto::{
        self,
        query_executor_server::{QueryExecutor, QueryExecutorServer},
    },
    operator::{
        Filter, GetResult, KnnBatch, KnnBatchResult, KnnProjection, KnnProjectionOutput,
        KnnProjectionRecord, Limit, Projection, ProjectionRecord, Scan,
    },
    plan::{Count, Get, Knn},
    Collection, CollectionAndSegments, CollectionUuid, Metadata, MetadataValue, Segment,
    SegmentScope, SegmentType, SegmentUuid, Vector, CHROMA_DOCUMENT_KEY, CHROMA_URI_KEY,
};
use parking_lot::Mutex;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status};

/// A query node that fails with `failure` or answers with canned results.
/// While `transient_failures` is above zero each call consumes one and fails
/// with `Unavailable`.
#[derive(Clone, Default)]
struct MockQueryNode {
    failure: Option<tonic::Code>,
    transient_failures: Arc<AtomicUsize>,
    count: u32,
    get: GetResult,
    knn: KnnBatchResult,
    calls: Arc<AtomicUsize>,
    traced: Arc<AtomicUsize>,
}

impl MockQueryNode {
    fn answer<T>(
        &self,
        metadata: &tonic::metadata::MetadataMap,
        response: T,
    ) -> Result<Response<T>, Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if metadata.contains_key(TRACE_ID_HEADER_KEY)
            && metadata.contains_key(SPAN_ID_HEADER_KEY)
        {
            self.traced.fetch_add(1, Ordering::SeqCst);
        }
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Err(Status::unavailable("transient failure"));
        }
        match self.failure {
            Some(code) => Err(Status::new(code, "injected failure")),
            None => Ok(Response::new(response)),
        }
    }
}

#[async_trait]
impl QueryExecutor for MockQueryNode {
    async fn count(
        &self,
        request: Request<chroma_proto::CountPlan>,
    ) -> Result<Response<chroma_proto::CountResult>, Status> {
        self.answer(
            request.metadata(),
            chroma_proto::CountResult { count: self.count },
        )
    }

    async fn get(
        &self,
        request: Request<chroma_proto::GetPlan>,
    ) -> Result<Response<chroma_proto::GetResult>, Status> {
        let result = chroma_proto::GetResult::try_from(self.get.clone())?;
        self.answer(request.metadata(), result)
    }

    async fn knn(
        &self,
        request: Request<chroma_proto::KnnPlan>,
    ) -> Result<Response<chroma_proto::KnnBatchResult>, Status> {
        let result = chroma_proto::KnnBatchResult::try_from(self.knn.clone())?;
        self.answer(request.metadata(), result)
    }
}

async fn spawn(node: MockQueryNode) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder()
            .add_service(QueryExecutorServer::new(node))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
    });
    addr.to_string()
}

#[derive(Debug, Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}

fn executor(members: Vec<String>, sleeper: Arc<RecordingSleeper>) -> DistributedExecutor {
    let replication_factor = members.len();
    DistributedExecutor::new(
        Arc::new(RendezvousEndpointResolver::new(members)),
        ClientManager::new(1000, 5000),
        replication_factor,
        RetryConfig {
            jitter: 0.0,
            ..Default::default()
        },
    )
    .with_sleeper(sleeper)
}

fn scan() -> Scan {
    let collection = CollectionUuid::new();
    let segment = |scope, r#type| Segment {
        id: SegmentUuid::new(),
        r#type,
        scope,
        collection,
        metadata: None,
    };
    Scan {
        collection_and_segments: CollectionAndSegments {
            collection: Collection {
                collection_id: collection,
                name: "test".to_string(),
                dimension: Some(2),
                version: 0,
            },
            metadata_segment: segment(SegmentScope::METADATA, SegmentType::InMemoryMetadata),
            vector_segment: segment(SegmentScope::VECTOR, SegmentType::BruteForceVector),
        },
    }
}

fn record(id: &str, document: &str) -> ProjectionRecord {
    ProjectionRecord {
        id: id.to_string(),
        embedding: Some(Vector::Float32(vec![1.0, 2.0])),
        metadata: Some(Metadata::from([
            ("tag".to_string(), MetadataValue::Str(id.to_uppercase())),
            (
                CHROMA_DOCUMENT_KEY.to_string(),
                MetadataValue::Str(document.to_string()),
            ),
            (
                CHROMA_URI_KEY.to_string(),
                MetadataValue::Str(format!("file://{}", id)),
            ),
        ])),
    }
}

#[tokio::test]
async fn test_retries_on_unavailable_replica() {
    let down = MockQueryNode {
        failure: Some(tonic::Code::Unavailable),
        ..Default::default()
    };
    let up = MockQueryNode {
        count: 42,
        ..Default::default()
    };
    let members = vec![spawn(down.clone()).await, spawn(up.clone()).await];
    let sleeper = Arc::new(RecordingSleeper::default());
    let executor = executor(members, sleeper.clone());

    for _ in 0..4 {
        let result = executor.count(Count { scan: scan() }).await.unwrap();
        assert_eq!(result.count, 42);
    }
    // Every call ends on the healthy replica, after at most one failure.
    assert_eq!(up.calls.load(Ordering::SeqCst), 4);
    assert_eq!(
        sleeper.slept.lock().len(),
        down.calls.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_non_retryable_status_fails_fast() {
    let bad = MockQueryNode {
        failure: Some(tonic::Code::InvalidArgument),
        ..Default::default()
    };
    let other = bad.clone();
    let members = vec![spawn(bad.clone()).await, spawn(other).await];
    let sleeper = Arc::new(RecordingSleeper::default());
    let executor = executor(members, sleeper.clone());

    let err = executor.count(Count { scan: scan() }).await.unwrap_err();
    assert_eq!(err.code(), ErrorCodes::InvalidArgument);
    // Both nodes share the counter, so this counts calls across replicas.
    assert_eq!(bad.calls.load(Ordering::SeqCst), 1);
    assert!(sleeper.slept.lock().is_empty());
}

#[tokio::test]
async fn test_exhausted_retries_return_last_error() {
    let down = MockQueryNode {
        failure: Some(tonic::Code::Unavailable),
        ..Default::default()
    };
    let members = vec![spawn(down.clone()).await, spawn(down.clone()).await];
    let sleeper = Arc::new(RecordingSleeper::default());
    let executor = executor(members, sleeper.clone());

    let err = executor.count(Count { scan: scan() }).await.unwrap_err();
    assert!(matches!(
        err,
        ExecutorError::Grpc(ref status) if status.code() == tonic::Code::Unavailable
    ));
    assert_eq!(down.calls.load(Ordering::SeqCst), 5);
    let slept_ms: Vec<_> = sleeper.slept.lock().iter().map(|d| d.as_millis()).collect();
    assert_eq!(slept_ms, vec![100, 200, 400, 800]);
}

#[tokio::test]
async fn test_succeeds_on_fifth_attempt() {
    let transient_failures = Arc::new(AtomicUsize::new(4));
    let nodes: Vec<_> = (0..3)
        .map(|_| MockQueryNode {
            count: 7,
            transient_failures: transient_failures.clone(),
            ..Default::default()
        })
        .collect();
    let mut members = Vec::new();
    for node in &nodes {
        members.push(spawn(node.clone()).await);
    }
    let sleeper = Arc::new(RecordingSleeper::default());
    let executor = executor(members, sleeper.clone());

    let result = executor.count(Count { scan: scan() }).await.unwrap();
    assert_eq!(result.count, 7);
    assert_eq!(transient_failures.load(Ordering::SeqCst), 0);
    // Five attempts over three replicas visit two of them twice.
    let mut calls: Vec<_> = nodes
        .iter()
        .map(|node| node.calls.load(Ordering::SeqCst))
        .collect();
    calls.sort();
    assert_eq!(calls, vec![1, 2, 2]);
    let slept_ms: Vec<_> = sleeper.slept.lock().iter().map(|d| d.as_millis()).collect();
    assert_eq!(slept_ms, vec![100, 200, 400, 800]);
}

#[tokio::test]
async fn test_get_response_columns_follow_projection() {
    let node = MockQueryNode {
        get: GetResult {
            records: vec![record("a", "alpha"), record("b", "beta")],
        },
        ..Default::default()
    };
    let members = vec![spawn(node.clone()).await];
    let executor = Executor::Distributed(executor(members, Default::default()));

    let response = executor
        .get(Get {
            scan: scan(),
            filter: Filter::default(),
            limit: Limit::default(),
            proj: Projection {
                document: true,
                metadata: true,
                ..Default::default()
            },
        })
        .await
        .unwrap();
    assert_eq!(response.ids, vec!["a", "b"]);
    assert_eq!(
        response.documents,
        Some(vec![Some("alpha".to_string()), Some("beta".to_string())])
    );
    let metadatas = response.metadatas.unwrap();
    assert_eq!(
        metadatas[0],
        Some(Metadata::from([(
            "tag".to_string(),
            MetadataValue::Str("A".to_string())
        )]))
    );
    assert!(response.embeddings.is_none());
    assert!(response.uris.is_none());
    assert_eq!(node.traced.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_knn_response_keeps_remote_order() {
    let output = |ids: &[(&str, f32)]| KnnProjectionOutput {
        records: ids
            .iter()
            .map(|(id, distance)| KnnProjectionRecord {
                record: record(id, "doc"),
                distance: Some(*distance),
            })
            .collect(),
    };
    let node = MockQueryNode {
        knn: KnnBatchResult {
            results: vec![output(&[("b", 0.1), ("a", 0.4)]), output(&[])],
        },
        ..Default::default()
    };
    let members = vec![spawn(node).await];
    let executor = Executor::Distributed(executor(members, Default::default()));

    let response = executor
        .knn(Knn {
            scan: scan(),
            filter: Filter::default(),
            knn: KnnBatch {
                embeddings: vec![Vector::Float32(vec![0.0, 0.0]); 2],
                fetch: 2,
            },
            proj: KnnProjection {
                projection: Projection {
                    embedding: true,
                    uri: true,
                    ..Default::default()
                },
                distance: true,
            },
        })
        .await
        .unwrap();
    assert_eq!(
        response.ids,
        vec![vec!["b".to_string(), "a".to_string()], vec![]]
    );
    assert_eq!(
        response.distances,
        Some(vec![vec![Some(0.1), Some(0.4)], vec![]])
    );
    assert_eq!(
        response.uris,
        Some(vec![
            vec![Some("file://b".to_string()), Some("file://a".to_string())],
            vec![]
        ])
    );
    assert_eq!(response.embeddings.as_ref().map(|e| e[0].len()), Some(2));
    assert!(response.documents.is_none());
    assert!(response.metadatas.is_none());
}
