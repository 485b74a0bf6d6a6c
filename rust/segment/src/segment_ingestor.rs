use std::sync::Arc;

use chroma_error::ChromaError;
use chroma_log::{Consumer, ConsumerCallback, LogError, SubscriptionId};
use chroma_types::{min_seqid, CollectionUuid, EmbeddingRecord, SeqId};
use futures::FutureExt;

use crate::types::SegmentWriter;

/// Feeds records consumed from a collection topic into that collection's
/// segments.
///
/// Writers skip records they have already applied, so the ingestor can be
/// resubscribed from the oldest position any writer has seen.
#[derive(Clone)]
pub struct SegmentIngestor {
    collection: CollectionUuid,
    writers: Vec<Arc<dyn SegmentWriter>>,
}

impl std::fmt::Debug for SegmentIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentIngestor")
            .field("collection", &self.collection)
            .field("writers", &self.writers.len())
            .finish()
    }
}

impl SegmentIngestor {
    pub fn new(collection: CollectionUuid, writers: Vec<Arc<dyn SegmentWriter>>) -> Self {
        Self {
            collection,
            writers,
        }
    }

    pub async fn ingest(&self, records: Vec<EmbeddingRecord>) -> Result<(), Box<dyn ChromaError>> {
        let records: Vec<_> = records
            .into_iter()
            .filter(|record| {
                let ours = record.record.collection_id == self.collection;
                if !ours {
                    tracing::warn!(
                        id = %record.record.id,
                        collection_id = %record.record.collection_id,
                        "Record belongs to another collection, skipping"
                    );
                }
                ours
            })
            .collect();
        if records.is_empty() {
            return Ok(());
        }
        for writer in &self.writers {
            writer.apply(&records).await?;
        }
        tracing::debug!(
            collection_id = %self.collection,
            count = records.len(),
            "Ingested records"
        );
        Ok(())
    }

    /// The position every writer has reached. A writer that has seen
    /// nothing pulls this back to the start of the topic.
    pub async fn resume_point(&self) -> SeqId {
        let mut resume = None;
        for writer in &self.writers {
            let Some(max_seq_id) = writer.max_seq_id().await else {
                return min_seqid();
            };
            resume = Some(resume.map_or(max_seq_id, |r: SeqId| r.min(max_seq_id)));
        }
        resume.unwrap_or_else(min_seqid)
    }

    pub fn callback(&self) -> ConsumerCallback {
        let ingestor = self.clone();
        Arc::new(move |records: Vec<EmbeddingRecord>| {
            let ingestor = ingestor.clone();
            async move { ingestor.ingest(records).await }.boxed()
        })
    }

    /// Subscribes to `topic`, resuming after the last record every writer
    /// has applied.
    pub async fn subscribe(
        &self,
        consumer: &Consumer,
        topic: &str,
    ) -> Result<SubscriptionId, LogError> {
        let start = self.resume_point().await;
        consumer
            .subscribe(topic, self.callback(), Some(start), None, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chroma_log::{Log, LogConfig, TopicName};
    use chroma_types::{
        MetadataValue, Operation, OperationRecord, SegmentUuid, UpdateMetadataValue, Vector,
    };

    use crate::{
        brute_force_vector::BruteForceVectorSegment,
        in_memory_metadata::InMemoryMetadataSegment,
        types::{MetadataQuery, MetadataSegmentReader, VectorSegmentReader},
    };
    use chroma_distance::DistanceFunction;

    fn add(collection: CollectionUuid, id: &str, x: f32) -> OperationRecord {
        OperationRecord {
            id: id.to_string(),
            collection_id: collection,
            embedding: Some(Vector::Float32(vec![x, 0.0])),
            metadata: Some(
                [("x".to_string(), UpdateMetadataValue::Float(x as f64))]
                    .into_iter()
                    .collect(),
            ),
            operation: Operation::Add,
        }
    }

    async fn wait_for_count(segment: &InMemoryMetadataSegment, expected: usize) {
        for _ in 0..200 {
            if segment.count(0).await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("segment never reached {} records", expected);
    }

    #[tokio::test]
    async fn test_ingests_topic_into_segments() {
        let log = Log::new(&LogConfig::default()).unwrap();
        let collection = CollectionUuid::new();
        let topic = TopicName::new(collection.to_string()).to_string();
        log.producer.create_topic(&topic).await.unwrap();

        // Written before the subscription exists; must still be ingested.
        log.producer
            .submit(&topic, add(collection, "a", 1.0))
            .await
            .unwrap();

        let metadata = InMemoryMetadataSegment::new(SegmentUuid::new());
        let vectors = BruteForceVectorSegment::new(SegmentUuid::new(), DistanceFunction::Euclidean);
        let writers: Vec<Arc<dyn SegmentWriter>> =
            vec![Arc::new(metadata.clone()), Arc::new(vectors.clone())];
        let ingestor = SegmentIngestor::new(collection, writers);
        assert_eq!(ingestor.resume_point().await, min_seqid());
        let subscription = ingestor.subscribe(&log.consumer, &topic).await.unwrap();

        log.producer
            .submit_batch(
                &topic,
                vec![add(collection, "b", 2.0), add(CollectionUuid::new(), "stray", 3.0)],
            )
            .await
            .unwrap();
        wait_for_count(&metadata, 2).await;
        log.consumer.unsubscribe(subscription).await;

        let rows = metadata
            .get_metadata(MetadataQuery {
                include_metadata: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            rows[1].metadata.as_ref().unwrap().get("x"),
            Some(&MetadataValue::Float(2.0))
        );
        assert_eq!(vectors.get_vectors(None, 0).await.unwrap().len(), 2);
        assert_eq!(
            ingestor.resume_point().await,
            metadata.max_seq_id().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_resubscribe_does_not_duplicate() {
        let log = Log::new(&LogConfig::default()).unwrap();
        let collection = CollectionUuid::new();
        let topic = TopicName::new(collection.to_string()).to_string();
        log.producer.create_topic(&topic).await.unwrap();

        let metadata = InMemoryMetadataSegment::new(SegmentUuid::new());
        let writers: Vec<Arc<dyn SegmentWriter>> = vec![Arc::new(metadata.clone())];
        let ingestor = SegmentIngestor::new(collection, writers);
        let first = ingestor.subscribe(&log.consumer, &topic).await.unwrap();
        log.producer
            .submit(&topic, add(collection, "a", 1.0))
            .await
            .unwrap();
        wait_for_count(&metadata, 1).await;
        log.consumer.unsubscribe(first).await;

        // Replaying from the start only re-applies records already seen.
        let replay = log
            .consumer
            .subscribe(&topic, ingestor.callback(), Some(min_seqid()), None, None)
            .await
            .unwrap();
        log.producer
            .submit(&topic, add(collection, "b", 2.0))
            .await
            .unwrap();
        wait_for_count(&metadata, 2).await;
        log.consumer.unsubscribe(replay).await;
        assert_eq!(metadata.count(0).await.unwrap(), 2);
    }
}
