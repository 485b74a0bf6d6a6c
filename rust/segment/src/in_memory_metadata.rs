use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chroma_error::ChromaError;
use chroma_types::{
    merge_update_metadata, EmbeddingRecord, Metadata, MetadataEmbeddingRecord, Operation,
    SegmentUuid, SeqId,
};

use crate::types::{MetadataQuery, MetadataSegmentReader, SegmentWriter};

#[derive(Debug, Default)]
struct Inner {
    // Keyed by insertion position so reads come back in insertion order.
    rows: BTreeMap<u64, MetadataEmbeddingRecord>,
    positions: HashMap<String, u64>,
    next_position: u64,
    max_seq_id: Option<SeqId>,
}

impl Inner {
    fn insert(&mut self, row: MetadataEmbeddingRecord) {
        let position = self.next_position;
        self.next_position += 1;
        self.positions.insert(row.id.clone(), position);
        self.rows.insert(position, row);
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut MetadataEmbeddingRecord> {
        let position = self.positions.get(id)?;
        self.rows.get_mut(position)
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.positions.remove(id) {
            Some(position) => self.rows.remove(&position).is_some(),
            None => false,
        }
    }

    fn apply_one(&mut self, record: &EmbeddingRecord) {
        let EmbeddingRecord { seq_id, record } = record;
        let seq_id = *seq_id;
        let exists = self.positions.contains_key(&record.id);
        match (record.operation, exists) {
            (Operation::Add, true) => {
                tracing::warn!(id = %record.id, "Add of existing id, skipping");
            }
            (Operation::Add | Operation::Upsert, false) => {
                self.insert(MetadataEmbeddingRecord {
                    id: record.id.clone(),
                    seq_id,
                    metadata: new_metadata(record.metadata.as_ref()),
                });
            }
            (Operation::Update | Operation::Upsert, true) => {
                if let Some(row) = self.get_mut(&record.id) {
                    row.seq_id = seq_id;
                    if let Some(update) = record.metadata.as_ref() {
                        let mut metadata = row.metadata.take().unwrap_or_default();
                        merge_update_metadata(&mut metadata, update);
                        row.metadata = (!metadata.is_empty()).then_some(metadata);
                    }
                }
            }
            (Operation::Update, false) => {
                tracing::warn!(id = %record.id, "Update of missing id, skipping");
            }
            (Operation::Delete, _) => {
                if !self.remove(&record.id) {
                    tracing::warn!(id = %record.id, "Delete of missing id, skipping");
                }
            }
        }
        self.max_seq_id = Some(self.max_seq_id.map_or(seq_id, |max| max.max(seq_id)));
    }
}

fn new_metadata(update: Option<&chroma_types::UpdateMetadata>) -> Option<Metadata> {
    let mut metadata = Metadata::new();
    merge_update_metadata(&mut metadata, update?);
    (!metadata.is_empty()).then_some(metadata)
}

/// Metadata segment held entirely in memory.
///
/// Rows keep the order in which their ids were first inserted. The segment
/// keeps only its latest state, so reads at any version see that state.
#[derive(Clone, Debug)]
pub struct InMemoryMetadataSegment {
    pub id: SegmentUuid,
    inner: Arc<tokio::sync::RwLock<Inner>>,
}

impl InMemoryMetadataSegment {
    pub fn new(id: SegmentUuid) -> Self {
        Self {
            id,
            inner: Arc::default(),
        }
    }
}

#[async_trait]
impl MetadataSegmentReader for InMemoryMetadataSegment {
    async fn get_metadata(
        &self,
        query: MetadataQuery,
    ) -> Result<Vec<MetadataEmbeddingRecord>, Box<dyn ChromaError>> {
        let inner = self.inner.read().await;
        let allowed = query
            .ids
            .as_ref()
            .map(|ids| ids.iter().map(String::as_str).collect::<HashSet<_>>());
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(inner
            .rows
            .values()
            .filter(|row| {
                allowed
                    .as_ref()
                    .map_or(true, |allowed| allowed.contains(row.id.as_str()))
            })
            .filter(|row| {
                query
                    .where_clause
                    .as_ref()
                    .map_or(true, |w| w.eval(row.metadata.as_ref(), row.document()))
            })
            .filter(|row| {
                query
                    .where_document
                    .as_ref()
                    .map_or(true, |w| w.eval(row.metadata.as_ref(), row.document()))
            })
            .skip(query.offset as usize)
            .take(limit)
            .map(|row| MetadataEmbeddingRecord {
                id: row.id.clone(),
                seq_id: row.seq_id,
                metadata: if query.include_metadata {
                    row.metadata.clone()
                } else {
                    None
                },
            })
            .collect())
    }

    async fn count(&self, _version: u64) -> Result<usize, Box<dyn ChromaError>> {
        Ok(self.inner.read().await.rows.len())
    }
}

#[async_trait]
impl SegmentWriter for InMemoryMetadataSegment {
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
