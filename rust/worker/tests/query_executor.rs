use std::sync::Arc;

use chroma_error::{ChromaError, ErrorCodes};
use chroma_frontend::{
    ClientManager, DistributedExecutor, Executor, RendezvousEndpointResolver, RetryConfig,
};
use chroma_segment::LocalSegmentManager;
use chroma_types::{
    operator::{Filter, KnnBatch, KnnProjection, Limit, Projection, Scan},
    plan::{Count, Get, Knn},
    Collection, CollectionAndSegments, CollectionUuid, DirectWhereComparison, EmbeddingRecord,
    MetadataValue, Operation, OperationRecord, PrimitiveOperator, Segment, SegmentScope,
    SegmentType, SegmentUuid, SeqId, UpdateMetadataValue, Vector, Where, WhereComparison,
    CHROMA_DOCUMENT_KEY,
};
use tokio::net::TcpListener;
use worker::WorkerServer;

async fn spawn(worker: WorkerServer) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { worker.serve(listener, std::future::pending()).await });
    addr.to_string()
}

fn executor(members: Vec<String>) -> Executor {
    Executor::Distributed(DistributedExecutor::new(
        Arc::new(RendezvousEndpointResolver::new(members)),
        ClientManager::new(1000, 5000),
        1,
        RetryConfig::default(),
    ))
}

fn scan(r#type: SegmentType) -> Scan {
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
                name: "colors".to_string(),
                dimension: Some(2),
                version: 0,
            },
            metadata_segment: segment(SegmentScope::METADATA, SegmentType::InMemoryMetadata),
            vector_segment: segment(SegmentScope::VECTOR, r#type),
        },
    }
}

/// Writes three colored records straight into the worker's segments.
async fn populate(worker: &WorkerServer, scan: &Scan) {
    let collection = scan.collection_and_segments.collection.collection_id;
    let records: Vec<_> = [("a", "red", 1.0), ("b", "blue", 2.0), ("c", "red", 3.0)]
        .into_iter()
        .enumerate()
        .map(|(i, (id, color, x))| EmbeddingRecord {
            seq_id: SeqId::from(i as u64 + 1),
            record: OperationRecord {
                id: id.to_string(),
                collection_id: collection,
                embedding: Some(Vector::Float32(vec![x, 0.0])),
                metadata: Some(
                    [
                        (
                            "color".to_string(),
                            UpdateMetadataValue::Str(color.to_string()),
                        ),
                        (
                            CHROMA_DOCUMENT_KEY.to_string(),
                            UpdateMetadataValue::Str(format!("{} document", id)),
                        ),
                    ]
                    .into_iter()
                    .collect(),
                ),
                operation: Operation::Add,
            },
        })
        .collect();
    for segment in [
        &scan.collection_and_segments.metadata_segment,
        &scan.collection_and_segments.vector_segment,
    ] {
        let resident = worker.segments().load(segment).unwrap();
        resident.writer().apply(&records).await.unwrap();
    }
}

fn red() -> Filter {
    Filter {
        query_ids: None,
        where_clause: Some(Where::DirectWhereComparison(DirectWhereComparison {
            key: "color".to_string(),
            comp: WhereComparison::Primitive(
                PrimitiveOperator::Equal,
                MetadataValue::Str("red".to_string()),
            ),
        })),
        where_document: None,
    }
}

#[tokio::test]
async fn test_count_over_the_wire() {
    let worker = WorkerServer::new(LocalSegmentManager::new(), None);
    let scan = scan(SegmentType::BruteForceVector);
    populate(&worker, &scan).await;
    let executor = executor(vec![spawn(worker).await]);

    let count = executor.count(Count { scan }).await.unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_get_over_the_wire() {
    let worker = WorkerServer::new(LocalSegmentManager::new(), None);
    let scan = scan(SegmentType::BruteForceVector);
    populate(&worker, &scan).await;
    let executor = executor(vec![spawn(worker).await]);

    let response = executor
        .get(Get {
            scan,
            filter: red(),
            limit: Limit::default(),
            proj: Projection {
                document: true,
                embedding: true,
                ..Default::default()
            },
        })
        .await
        .unwrap();
    assert_eq!(response.ids, vec!["a", "c"]);
    assert_eq!(
        response.documents,
        Some(vec![
            Some("a document".to_string()),
            Some("c document".to_string())
        ])
    );
    assert_eq!(
        response.embeddings,
        Some(vec![
            Some(Vector::Float32(vec![1.0, 0.0])),
            Some(Vector::Float32(vec![3.0, 0.0]))
        ])
    );
    assert!(response.metadatas.is_none());
}

#[tokio::test]
async fn test_knn_over_the_wire() {
    let worker = WorkerServer::new(LocalSegmentManager::new(), None);
    let scan = scan(SegmentType::HnswLocalMemory);
    populate(&worker, &scan).await;
    let executor = executor(vec![spawn(worker).await]);

    let response = executor
        .knn(Knn {
            scan,
            filter: red(),
            knn: KnnBatch {
                embeddings: vec![Vector::Float32(vec![2.9, 0.0])],
                fetch: 2,
            },
            proj: KnnProjection {
                projection: Projection {
                    metadata: true,
                    ..Default::default()
                },
                distance: true,
            },
        })
        .await
        .unwrap();
    assert_eq!(
        response.ids,
        vec![vec!["c".to_string(), "a".to_string()]]
    );
    let metadatas = response.metadatas.unwrap();
    assert_eq!(
        metadatas[0][0].as_ref().and_then(|m| m.get("color")),
        Some(&MetadataValue::Str("red".to_string()))
    );
    assert!(metadatas[0][0]
        .as_ref()
        .is_some_and(|m| !m.contains_key(CHROMA_DOCUMENT_KEY)));
    let distances = response.distances.unwrap();
    assert!(distances[0][0] < distances[0][1]);
}

#[tokio::test]
async fn test_plan_segments_load_on_demand() {
    let worker = WorkerServer::new(LocalSegmentManager::new(), None);
    let scan = scan(SegmentType::BruteForceVector);
    let executor = executor(vec![spawn(worker.clone()).await]);

    let count = executor.count(Count { scan: scan.clone() }).await.unwrap();
    assert_eq!(count, 0);
    let mut resident = worker.segments().resident_ids();
    resident.sort();
    let mut expected = vec![
        scan.collection_and_segments.metadata_segment.id,
        scan.collection_and_segments.vector_segment.id,
    ];
    expected.sort();
    assert_eq!(resident, expected);
}

#[tokio::test]
async fn test_unsupported_segment_is_not_retried() {
    let worker = WorkerServer::new(LocalSegmentManager::new(), None);
    let executor = executor(vec![spawn(worker).await]);

    let err = executor
        .count(Count {
            scan: scan(SegmentType::HnswDistributed),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCodes::Unimplemented);
}
