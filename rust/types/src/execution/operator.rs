use super::error::QueryConversionError;
use crate::{
    chroma_proto, decode_metadata, encode_metadata, Collection, CollectionAndSegments, Metadata,
    Vector, Where,
};

/// The `Scan` operator names the collection and the segments to read from.
#[derive(Clone, Debug, PartialEq)]
pub struct Scan {
    pub collection_and_segments: CollectionAndSegments,
}

impl TryFrom<chroma_proto::ScanOperator> for Scan {
    type Error = QueryConversionError;

    fn try_from(value: chroma_proto::ScanOperator) -> Result<Self, Self::Error> {
        Ok(Self {
            collection_and_segments: CollectionAndSegments {
                collection: Collection::try_from(
                    value
                        .collection
                        .ok_or(QueryConversionError::field("collection"))?,
                )?,
                metadata_segment: value
                    .metadata
                    .ok_or(QueryConversionError::field("metadata segment"))?
                    .try_into()?,
                vector_segment: value
                    .knn
                    .ok_or(QueryConversionError::field("vector segment"))?
                    .try_into()?,
            },
        })
    }
}

impl From<Scan> for chroma_proto::ScanOperator {
    fn from(value: Scan) -> Self {
        let CollectionAndSegments {
            collection,
            metadata_segment,
            vector_segment,
        } = value.collection_and_segments;
        Self {
            collection: Some(collection.into()),
            knn: Some(vector_segment.into()),
            metadata: Some(metadata_segment.into()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountResult {
    pub count: u32,
}

impl From<chroma_proto::CountResult> for CountResult {
    fn from(value: chroma_proto::CountResult) -> Self {
        Self { count: value.count }
    }
}

impl From<CountResult> for chroma_proto::CountResult {
    fn from(value: CountResult) -> Self {
        Self { count: value.count }
    }
}

/// The `Filter` operator restricts the candidate set.
///
/// `query_ids` is an explicit allow-list of user ids. The where clauses are
/// evaluated against metadata and the stored document respectively.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    pub query_ids: Option<Vec<String>>,
    pub where_clause: Option<Where>,
    pub where_document: Option<Where>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.query_ids.is_none() && self.where_clause.is_none() && self.where_document.is_none()
    }
}

impl TryFrom<chroma_proto::FilterOperator> for Filter {
    type Error = QueryConversionError;

    fn try_from(value: chroma_proto::FilterOperator) -> Result<Self, Self::Error> {
        Ok(Self {
            query_ids: value.ids.map(|uids| uids.ids),
            where_clause: value.r#where.map(Where::try_from).transpose()?,
            where_document: value.where_document.map(Where::try_from).transpose()?,
        })
    }
}

impl TryFrom<Filter> for chroma_proto::FilterOperator {
    type Error = QueryConversionError;

    fn try_from(value: Filter) -> Result<Self, Self::Error> {
        Ok(Self {
            ids: value.query_ids.map(|ids| chroma_proto::UserIds { ids }),
            r#where: value
                .where_clause
                .map(chroma_proto::Where::try_from)
                .transpose()?,
            where_document: value
                .where_document
                .map(chroma_proto::WhereDocument::try_from)
                .transpose()?,
        })
    }
}

/// The `KnnBatch` operator carries the query vectors and how many
/// neighbours to fetch for each.
#[derive(Clone, Debug, PartialEq)]
pub struct KnnBatch {
    pub embeddings: Vec<Vector>,
    pub fetch: u32,
}

impl TryFrom<chroma_proto::KnnOperator> for KnnBatch {
    type Error = QueryConversionError;

    fn try_from(value: chroma_proto::KnnOperator) -> Result<Self, Self::Error> {
        Ok(Self {
            embeddings: value
                .embeddings
                .into_iter()
                .map(Vector::try_from)
                .collect::<Result<_, _>>()?,
            fetch: value.fetch,
        })
    }
}

impl TryFrom<KnnBatch> for chroma_proto::KnnOperator {
    type Error = QueryConversionError;

    fn try_from(value: KnnBatch) -> Result<Self, Self::Error> {
        Ok(Self {
            embeddings: value
                .embeddings
                .iter()
                .map(chroma_proto::Vector::try_from)
                .collect::<Result<_, _>>()?,
            fetch: value.fetch,
        })
    }
}

/// The `Limit` operator skips `offset` matches and keeps at most `limit`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Limit {
    pub offset: u32,
    pub limit: Option<u32>,
}

impl From<chroma_proto::LimitOperator> for Limit {
    fn from(value: chroma_proto::LimitOperator) -> Self {
        Self {
            offset: value.offset,
            limit: value.limit,
        }
    }
}

impl From<Limit> for chroma_proto::LimitOperator {
    fn from(value: Limit) -> Self {
        Self {
            offset: value.offset,
            limit: value.limit,
        }
    }
}

/// The `Projection` operator selects which fields to materialize.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Projection {
    pub document: bool,
    pub embedding: bool,
    pub metadata: bool,
    pub uri: bool,
}

impl Projection {
    /// Documents and uris live under reserved metadata keys, so any of the
    /// three needs a metadata lookup.
    pub fn needs_metadata(&self) -> bool {
        self.document || self.metadata || self.uri
    }
}

impl From<chroma_proto::ProjectionOperator> for Projection {
    fn from(value: chroma_proto::ProjectionOperator) -> Self {
        Self {
            document: value.document,
            embedding: value.embedding,
            metadata: value.metadata,
            uri: value.uri,
        }
    }
}

impl From<Projection> for chroma_proto::ProjectionOperator {
    fn from(value: Projection) -> Self {
        Self {
            document: value.document,
            embedding: value.embedding,
            metadata: value.metadata,
            uri: value.uri,
        }
    }
}

/// One matched record. Metadata is raw and may hold reserved keys; cleaning
/// happens when the response is assembled.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionRecord {
    pub id: String,
    pub embedding: Option<Vector>,
    pub metadata: Option<Metadata>,
}

impl TryFrom<chroma_proto::ProjectionRecord> for ProjectionRecord {
    type Error = QueryConversionError;

    fn try_from(value: chroma_proto::ProjectionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            embedding: value.embedding.map(Vector::try_from).transpose()?,
            metadata: decode_metadata(value.metadata)?,
        })
    }
}

impl TryFrom<ProjectionRecord> for chroma_proto::ProjectionRecord {
    type Error = QueryConversionError;

    fn try_from(value: ProjectionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            embedding: value
                .embedding
                .as_ref()
                .map(chroma_proto::Vector::try_from)
                .transpose()?,
            metadata: encode_metadata(value.metadata),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetResult {
    pub records: Vec<ProjectionRecord>,
}

impl TryFrom<chroma_proto::GetResult> for GetResult {
    type Error = QueryConversionError;

    fn try_from(value: chroma_proto::GetResult) -> Result<Self, Self::Error> {
        Ok(Self {
            records: value
                .records
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<GetResult> for chroma_proto::GetResult {
    type Error = QueryConversionError;

    fn try_from(value: GetResult) -> Result<Self, Self::Error> {
        Ok(Self {
            records: value
                .records
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// The `KnnProjection` operator is a `Projection` plus the distance column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KnnProjection {
    pub projection: Projection,
    pub distance: bool,
}

impl From<chroma_proto::KnnProjectionOperator> for KnnProjection {
    fn from(value: chroma_proto::KnnProjectionOperator) -> Self {
        Self {
            projection: value.projection.map(Into::into).unwrap_or_default(),
            distance: value.distance,
        }
    }
}

impl From<KnnProjection> for chroma_proto::KnnProjectionOperator {
    fn from(value: KnnProjection) -> Self {
        Self {
            projection: Some(value.projection.into()),
            distance: value.distance,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct KnnProjectionRecord {
    pub record: ProjectionRecord,
    pub distance: Option<f32>,
}

impl TryFrom<chroma_proto::KnnProjectionRecord> for KnnProjectionRecord {
    type Error = QueryConversionError;

    fn try_from(value: chroma_proto::KnnProjectionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            record: value
                .record
                .ok_or(QueryConversionError::field("record"))?
                .try_into()?,
            distance: value.distance,
        })
    }
}

impl TryFrom<KnnProjectionRecord> for chroma_proto::KnnProjectionRecord {
    type Error = QueryConversionError;

    fn try_from(value: KnnProjectionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            record: Some(value.record.try_into()?),
            distance: value.distance,
        })
    }
}

/// Results for one query vector, nearest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KnnProjectionOutput {
    pub records: Vec<KnnProjectionRecord>,
}

impl TryFrom<chroma_proto::KnnResult> for KnnProjectionOutput {
    type Error = QueryConversionError;

    fn try_from(value: chroma_proto::KnnResult) -> Result<Self, Self::Error> {
        Ok(Self {
            records: value
                .records
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<KnnProjectionOutput> for chroma_proto::KnnResult {
    type Error = QueryConversionError;

    fn try_from(value: KnnProjectionOutput) -> Result<Self, Self::Error> {
        Ok(Self {
            records: value
                .records
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct KnnBatchResult {
    pub results: Vec<KnnProjectionOutput>,
}

impl TryFrom<chroma_proto::KnnBatchResult> for KnnBatchResult {
    type Error = QueryConversionError;

    fn try_from(value: chroma_proto::KnnBatchResult) -> Result<Self, Self::Error> {
        Ok(Self {
            results: value
                .results
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<KnnBatchResult> for chroma_proto::KnnBatchResult {
    type Error = QueryConversionError;

    fn try_from(value: KnnBatchResult) -> Result<Self, Self::Error> {
        Ok(Self {
            results: value
                .results
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}
