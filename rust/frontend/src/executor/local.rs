use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chroma_config::{registry::Registry, Configurable};
use chroma_error::ChromaError;
use chroma_segment::{LocalSegmentManager, MetadataQuery, MetadataSegmentReader, SegmentProvider};
use chroma_types::{
    operator::{
        CountResult, GetResult, KnnBatchResult, KnnProjectionOutput, KnnProjectionRecord,
        ProjectionRecord,
    },
    plan::{Count, Get, Knn},
    Metadata, VectorQuery,
};

use super::{config::LocalExecutorConfig, ExecutorError};

/// Answers plans by reading the segments named in the scan directly.
#[derive(Clone)]
pub struct LocalExecutor {
    segments: Arc<dyn SegmentProvider>,
}

impl std::fmt::Debug for LocalExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalExecutor").finish_non_exhaustive()
    }
}

#[async_trait]
impl Configurable<LocalExecutorConfig> for LocalExecutor {
    async fn try_from_config(
        _config: &LocalExecutorConfig,
        registry: &Registry,
    ) -> Result<Self, Box<dyn ChromaError>> {
        // Share the manager with anything else in the process serving
        // the same segments, such as an ingest subscription.
        let manager = match registry.get::<LocalSegmentManager>() {
            Ok(manager) => manager,
            Err(_) => {
                let manager = LocalSegmentManager::new();
                registry.register(manager.clone());
                manager
            }
        };
        Ok(Self::new(Arc::new(manager)))
    }
}

impl LocalExecutor {
    pub fn new(segments: Arc<dyn SegmentProvider>) -> Self {
        Self { segments }
    }

    #[tracing::instrument(
        skip_all,
        fields(collection_id = %plan.scan.collection_and_segments.collection.collection_id)
    )]
    pub async fn count(&self, plan: Count) -> Result<CountResult, ExecutorError> {
        let collection_and_segments = plan.scan.collection_and_segments;
        let reader = self
            .segments
            .metadata_reader(&collection_and_segments.metadata_segment)?;
        let count = reader
            .count(collection_and_segments.collection.version)
            .await?;
        Ok(CountResult {
            count: u32::try_from(count).unwrap_or(u32::MAX),
        })
    }

    #[tracing::instrument(
        skip_all,
        fields(collection_id = %plan.scan.collection_and_segments.collection.collection_id)
    )]
    pub async fn get(&self, plan: Get) -> Result<GetResult, ExecutorError> {
        let Get {
            scan,
            filter,
            limit,
            proj,
        } = plan;
        let collection_and_segments = scan.collection_and_segments;
        let version = collection_and_segments.collection.version;
        let rows = self
            .segments
            .metadata_reader(&collection_and_segments.metadata_segment)?
            .get_metadata(MetadataQuery {
                version,
                where_clause: filter.where_clause,
                where_document: filter.where_document,
                ids: filter.query_ids,
                limit: limit.limit,
                offset: limit.offset,
                include_metadata: proj.needs_metadata(),
            })
            .await?;

        let mut embeddings = if proj.embedding && !rows.is_empty() {
            let ids = rows.iter().map(|row| row.id.clone()).collect();
            self.segments
                .vector_reader(&collection_and_segments.vector_segment)?
                .get_vectors(Some(ids), version)
                .await?
                .into_iter()
                .map(|record| (record.id, record.vector))
                .collect()
        } else {
            HashMap::new()
        };

        let records = rows
            .into_iter()
            .map(|row| ProjectionRecord {
                embedding: embeddings.remove(&row.id),
                id: row.id,
                metadata: row.metadata,
            })
            .collect();
        Ok(GetResult { records })
    }

    #[tracing::instrument(
        skip_all,
        fields(collection_id = %plan.scan.collection_and_segments.collection.collection_id)
    )]
    pub async fn knn(&self, plan: Knn) -> Result<KnnBatchResult, ExecutorError> {
        let Knn {
            scan,
            filter,
            knn,
            proj,
        } = plan;
        let collection_and_segments = scan.collection_and_segments;
        let version = collection_and_segments.collection.version;
        let metadata_reader = self
            .segments
            .metadata_reader(&collection_and_segments.metadata_segment)?;

        let allowed_ids = if filter.is_empty() {
            None
        } else {
            let candidates = metadata_reader
                .get_metadata(MetadataQuery {
                    version,
                    where_clause: filter.where_clause,
                    where_document: filter.where_document,
                    ids: filter.query_ids,
                    ..Default::default()
                })
                .await?;
            Some(
                candidates
                    .into_iter()
                    .map(|row| row.id)
                    .collect::<Vec<_>>(),
            )
        };

        // An empty allow-list must never reach the vector segment, where it
        // would read as no restriction.
        if allowed_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            tracing::debug!("Filter matched no records, skipping vector query");
            return Ok(KnnBatchResult {
                results: vec![KnnProjectionOutput::default(); knn.embeddings.len()],
            });
        }

        let neighbours = self
            .segments
            .vector_reader(&collection_and_segments.vector_segment)?
            .query_vectors(VectorQuery {
                vectors: knn.embeddings,
                k: knn.fetch,
                allowed_ids,
                include_embeddings: proj.projection.embedding,
            })
            .await?;

        let metadatas = if proj.projection.needs_metadata() {
            let mut seen = HashSet::new();
            let ids: Vec<_> = neighbours
                .iter()
                .flatten()
                .filter(|result| seen.insert(result.id.as_str()))
                .map(|result| result.id.clone())
                .collect();
            lookup_metadata(metadata_reader.as_ref(), ids, version).await?
        } else {
            HashMap::new()
        };

        let results = neighbours
            .into_iter()
            .map(|results| KnnProjectionOutput {
                records: results
                    .into_iter()
                    .map(|result| KnnProjectionRecord {
                        record: ProjectionRecord {
                            embedding: result.vector.filter(|_| proj.projection.embedding),
                            metadata: metadatas.get(&result.id).cloned().flatten(),
                            id: result.id,
                        },
                        distance: proj.distance.then_some(result.distance),
                    })
                    .collect(),
            })
            .collect();
        Ok(KnnBatchResult { results })
    }
}

async fn lookup_metadata(
    reader: &dyn MetadataSegmentReader,
    ids: Vec<String>,
    version: u64,
) -> Result<HashMap<String, Option<Metadata>>, ExecutorError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = reader
        .get_metadata(MetadataQuery {
            version,
            ids: Some(ids),
            include_metadata: true,
            ..Default::default()
        })
        .await?;
    Ok(rows.into_iter().map(|row| (row.id, row.metadata)).collect())
}
