use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chroma_distance::{DistanceFunction, DISTANCE_FUNCTION_KEY};
use chroma_error::ChromaError;
use chroma_types::{
    EmbeddingRecord, Operation, Segment, SegmentUuid, SeqId, Vector, VectorEmbeddingRecord,
    VectorQuery, VectorQueryResult,
};

use crate::types::{SegmentError, SegmentWriter, VectorSegmentReader};

#[derive(Debug, Default)]
struct Inner {
    vectors: BTreeMap<String, VectorEmbeddingRecord>,
    dimension: Option<usize>,
    max_seq_id: Option<SeqId>,
}

impl Inner {
    fn accepts(&self, id: &str, vector: &Vector) -> bool {
        match self.dimension {
            Some(dimension) if dimension != vector.dimension() => {
                tracing::warn!(
                    id,
                    expected = dimension,
                    got = vector.dimension(),
                    "Vector dimension mismatch, skipping"
                );
                false
            }
            _ => true,
        }
    }

    fn put(&mut self, id: &str, seq_id: SeqId, vector: Vector) {
        self.dimension.get_or_insert(vector.dimension());
        self.vectors.insert(
            id.to_string(),
            VectorEmbeddingRecord {
                id: id.to_string(),
                seq_id,
                vector,
            },
        );
    }

    fn apply_one(&mut self, record: &EmbeddingRecord) {
        let EmbeddingRecord { seq_id, record } = record;
        let seq_id = *seq_id;
        let id = record.id.as_str();
        let exists = self.vectors.contains_key(id);
        match (record.operation, exists, record.embedding.as_ref()) {
            (Operation::Add, true, _) => {
                tracing::warn!(id, "Add of existing id, skipping");
            }
            (Operation::Add | Operation::Upsert, false, Some(vector)) => {
                if self.accepts(id, vector) {
                    self.put(id, seq_id, vector.clone());
                }
            }
            (Operation::Add | Operation::Upsert, false, None) => {
                tracing::warn!(id, "Insert without a vector, skipping");
            }
            (Operation::Update | Operation::Upsert, true, Some(vector)) => {
                if self.accepts(id, vector) {
                    self.put(id, seq_id, vector.clone());
                }
            }
            (Operation::Update | Operation::Upsert, true, None) => {
                if let Some(existing) = self.vectors.get_mut(id) {
                    existing.seq_id = seq_id;
                }
            }
            (Operation::Update, false, _) => {
                tracing::warn!(id, "Update of missing id, skipping");
            }
            (Operation::Delete, _, _) => {
                if self.vectors.remove(id).is_none() {
                    tracing::warn!(id, "Delete of missing id, skipping");
                }
            }
        }
        self.max_seq_id = Some(self.max_seq_id.map_or(seq_id, |max| max.max(seq_id)));
    }
}

/// Exact nearest neighbour search over vectors held in memory.
///
/// The distance function comes from the `hnsw:space` segment setting and
/// defaults to l2. Results are ordered by distance, then by id.
#[derive(Clone, Debug)]
pub struct BruteForceVectorSegment {
    pub id: SegmentUuid,
    distance_function: DistanceFunction,
    inner: Arc<tokio::sync::RwLock<Inner>>,
}

impl BruteForceVectorSegment {
    pub fn new(id: SegmentUuid, distance_function: DistanceFunction) -> Self {
        Self {
            id,
            distance_function,
            inner: Arc::default(),
        }
    }

    pub fn from_segment(segment: &Segment) -> Result<Self, SegmentError> {
        let distance_function = match segment.metadata_str(DISTANCE_FUNCTION_KEY) {
            Some(space) => DistanceFunction::try_from(space)?,
            None => DistanceFunction::default(),
        };
        Ok(Self::new(segment.id, distance_function))
    }

    pub fn distance_function(&self) -> DistanceFunction {
        self.distance_function
    }
}

#[async_trait]
impl VectorSegmentReader for BruteForceVectorSegment {
    async fn get_vectors(
        &self,
        ids: Option<Vec<String>>,
        _version: u64,
    ) -> Result<Vec<VectorEmbeddingRecord>, Box<dyn ChromaError>> {
        let inner = self.inner.read().await;
        Ok(match ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| inner.vectors.get(id).cloned())
                .collect(),
            None => inner.vectors.values().cloned().collect(),
        })
    }

    async fn query_vectors(
        &self,
        query: VectorQuery,
    ) -> Result<Vec<Vec<VectorQueryResult>>, Box<dyn ChromaError>> {
        let inner = self.inner.read().await;
        let allowed = query
            .allowed_ids
            .as_ref()
            .map(|ids| ids.iter().map(String::as_str).collect::<HashSet<_>>());
        let candidates: Vec<_> = inner
            .vectors
            .values()
            .filter(|record| {
                allowed
                    .as_ref()
                    .map_or(true, |allowed| allowed.contains(record.id.as_str()))
            })
            .map(|record| (record, record.vector.to_f32()))
            .collect();

        let mut results = Vec::with_capacity(query.vectors.len());
        for target in &query.vectors {
            if let Some(expected) = inner.dimension {
                if expected != target.dimension() {
                    return Err(Box::new(SegmentError::DimensionMismatch {
                        expected,
                        got: target.dimension(),
                    }));
                }
            }
            let target = target.to_f32();
            let mut scored: Vec<_> = candidates
                .iter()
                .map(|(record, vector)| {
                    (self.distance_function.distance(vector, &target), *record)
                })
                .collect();
            scored.sort_by(|(a, ra), (b, rb)| a.total_cmp(b).then_with(|| ra.id.cmp(&rb.id)));
            results.push(
                scored
                    .into_iter()
                    .take(query.k as usize)
                    .map(|(distance, record)| VectorQueryResult {
                        id: record.id.clone(),
                        seq_id: record.seq_id,
                        distance,
                        vector: query.include_embeddings.then(|| record.vector.clone()),
                    })
                    .collect(),
            );
        }
        Ok(results)
    }
}

#[async_trait]
impl SegmentWriter for BruteForceVectorSegment {
    async fn apply(&self, records: &[EmbeddingRecord]) -> Result<(), Box<dyn ChromaError>> {
        let mut inner = self.inner.write().await;
        for record in records {
            if inner.max_seq_id.is_some_and(|max| record.seq_id <= max) {
                continue;
            }
            inner.apply_one(record);
        }
        Ok(())
    }

    async fn max_seq_id(&self) -> Option<SeqId> {
        self.inner.read().await.max_seq_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_error::ErrorCodes;
    use chroma_types::{
        CollectionUuid, Metadata, MetadataValue, OperationRecord, SegmentScope, SegmentType,
    };

    fn record(
        seq: u64,
        id: &str,
        operation: Operation,
        vector: Option<Vec<f32>>,
    ) -> EmbeddingRecord {
        EmbeddingRecord {
            seq_id: SeqId::from(seq),
            record: OperationRecord {
                id: id.to_string(),
                collection_id: CollectionUuid::default(),
                embedding: vector.map(Vector::Float32),
                metadata: None,
                operation,
            },
        }
    }

    fn query(vector: Vec<f32>, k: u32, allowed_ids: Option<Vec<&str>>) -> VectorQuery {
        VectorQuery {
            vectors: vec![Vector::Float32(vector)],
            k,
            allowed_ids: allowed_ids.map(|ids| ids.into_iter().map(String::from).collect()),
            include_embeddings: false,
        }
    }

    async fn populated() -> BruteForceVectorSegment {
        let segment = BruteForceVectorSegment::new(SegmentUuid::new(), DistanceFunction::Euclidean);
        segment
            .apply(&[
                record(1, "far", Operation::Add, Some(vec![10.0, 10.0])),
                record(2, "b", Operation::Add, Some(vec![1.0, 0.0])),
                record(3, "a", Operation::Add, Some(vec![0.0, 1.0])),
                record(4, "origin", Operation::Add, Some(vec![0.0, 0.0])),
            ])
            .await
            .unwrap();
        segment
    }

    #[tokio::test]
    async fn test_results_ordered_by_distance_then_id() {
        let segment = populated().await;
        let results = segment.query_vectors(query(vec![0.0, 0.0], 3, None)).await.unwrap();
        assert_eq!(results.len(), 1);
        let ids: Vec<_> = results[0].iter().map(|r| r.id.as_str()).collect();
        // a and b are equidistant from the origin.
        assert_eq!(ids, vec!["origin", "a", "b"]);
        assert_eq!(results[0][0].distance, 0.0);
        assert_eq!(results[0][1].distance, 1.0);
        assert!(results[0][0].vector.is_none());
    }

    #[tokio::test]
    async fn test_allow_list_restricts_results() {
        let segment = populated().await;
        let results = segment
            .query_vectors(query(vec![0.0, 0.0], 10, Some(vec!["far", "b", "missing"])))
            .await
            .unwrap();
        let ids: Vec<_> = results[0].iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "far"]);

        let results = segment
            .query_vectors(query(vec![0.0, 0.0], 10, Some(vec![])))
            .await
            .unwrap();
        assert_eq!(results, vec![vec![]]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_invalid_argument() {
        let segment = populated().await;
        let err = segment
            .query_vectors(query(vec![0.0, 0.0, 0.0], 1, None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
    }

    #[tokio::test]
    async fn test_get_vectors_skips_missing_ids() {
        let segment = populated().await;
        let records = segment
            .get_vectors(Some(vec!["a".to_string(), "nope".to_string()]), 0)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vector, Vector::Float32(vec![0.0, 1.0]));
        assert_eq!(records[0].seq_id, SeqId::from(3u64));
        assert_eq!(segment.get_vectors(None, 0).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_writes_are_idempotent() {
        let segment = populated().await;
        segment
            .apply(&[
                record(5, "a", Operation::Update, Some(vec![5.0, 5.0])),
                record(6, "far", Operation::Delete, None),
                record(7, "ghost", Operation::Update, Some(vec![1.0, 1.0])),
                record(8, "c", Operation::Upsert, Some(vec![2.0, 2.0])),
            ])
            .await
            .unwrap();
        // Replaying older records changes nothing.
        segment
            .apply(&[
                record(1, "far", Operation::Add, Some(vec![10.0, 10.0])),
                record(3, "a", Operation::Upsert, Some(vec![0.0, 1.0])),
            ])
            .await
            .unwrap();
        let records = segment.get_vectors(None, 0).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "origin"]);
        assert_eq!(records[0].vector, Vector::Float32(vec![5.0, 5.0]));
        assert_eq!(segment.max_seq_id().await, Some(SeqId::from(8u64)));
    }

    #[test]
    fn test_distance_function_from_segment_metadata() {
        let mut segment = Segment {
            id: SegmentUuid::new(),
            r#type: SegmentType::BruteForceVector,
            scope: SegmentScope::VECTOR,
            collection: CollectionUuid::new(),
            metadata: None,
        };
        assert_eq!(
            BruteForceVectorSegment::from_segment(&segment)
                .unwrap()
                .distance_function(),
            DistanceFunction::Euclidean
        );
        segment.metadata = Some(Metadata::from([(
            DISTANCE_FUNCTION_KEY.to_string(),
            MetadataValue::Str("cosine".to_string()),
        )]));
        assert_eq!(
            BruteForceVectorSegment::from_segment(&segment)
                .unwrap()
                .distance_function(),
            DistanceFunction::Cosine
        );
        segment.metadata = Some(Metadata::from([(
            DISTANCE_FUNCTION_KEY.to_string(),
            MetadataValue::Str("manhattan".to_string()),
        )]));
        assert!(BruteForceVectorSegment::from_segment(&segment).is_err());
    }
}
