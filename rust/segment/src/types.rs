use async_trait::async_trait;
use chroma_distance::DistanceFunctionError;
use chroma_error::{ChromaError, ErrorCodes};
use chroma_types::{
    EmbeddingRecord, MetadataEmbeddingRecord, SegmentScope, SegmentType, SegmentUuid, SeqId,
    VectorEmbeddingRecord, VectorQuery, VectorQueryResult, Where,
};
use thiserror::Error;

/// Arguments of a metadata segment read.
///
/// `ids` restricts the scan to the listed user ids; `offset` and `limit`
/// apply after filtering, in segment order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataQuery {
    pub version: u64,
    pub where_clause: Option<Where>,
    pub where_document: Option<Where>,
    pub ids: Option<Vec<String>>,
    pub limit: Option<u32>,
    pub offset: u32,
    pub include_metadata: bool,
}

#[async_trait]
pub trait MetadataSegmentReader: Send + Sync {
    async fn get_metadata(
        &self,
        query: MetadataQuery,
    ) -> Result<Vec<MetadataEmbeddingRecord>, Box<dyn ChromaError>>;

    async fn count(&self, version: u64) -> Result<usize, Box<dyn ChromaError>>;
}

#[async_trait]
pub trait VectorSegmentReader: Send + Sync {
    /// Returns one record per id that exists in the segment, or every
    /// record when `ids` is `None`.
    async fn get_vectors(
        &self,
        ids: Option<Vec<String>>,
        version: u64,
    ) -> Result<Vec<VectorEmbeddingRecord>, Box<dyn ChromaError>>;

    /// Returns one result list per query vector, nearest first.
    async fn query_vectors(
        &self,
        query: VectorQuery,
    ) -> Result<Vec<Vec<VectorQueryResult>>, Box<dyn ChromaError>>;
}

/// Applies ingested records to a segment.
///
/// Records at or below `max_seq_id` have already been applied and are
/// skipped, so a redelivered batch leaves the segment unchanged.
#[async_trait]
pub trait SegmentWriter: Send + Sync {
    async fn apply(&self, records: &[EmbeddingRecord]) -> Result<(), Box<dyn ChromaError>>;

    async fn max_seq_id(&self) -> Option<SeqId>;
}

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Expected dimension {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Cannot obtain distance function from segment")]
    DistanceFunction(#[from] DistanceFunctionError),
    #[error("Segment {0} is not loaded")]
    NotLoaded(SegmentUuid),
    #[error("Segment type {} with scope {scope:?} is not supported", .segment_type.urn())]
    Unsupported {
        segment_type: SegmentType,
        scope: SegmentScope,
    },
    #[error("Segment {id} does not serve {expected:?} reads")]
    WrongScope {
        id: SegmentUuid,
        expected: SegmentScope,
    },
}

impl ChromaError for SegmentError {
    fn code(&self) -> ErrorCodes {
        match self {
            SegmentError::DimensionMismatch { .. } => ErrorCodes::InvalidArgument,
            SegmentError::DistanceFunction(e) => e.code(),
            SegmentError::NotLoaded(_) => ErrorCodes::NotFound,
            SegmentError::Unsupported { .. } => ErrorCodes::Unimplemented,
            SegmentError::WrongScope { .. } => ErrorCodes::InvalidArgument,
        }
    }
}
