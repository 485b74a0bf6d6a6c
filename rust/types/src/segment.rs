use super::{
    decode_metadata, encode_metadata, CollectionUuid, Metadata, MetadataValue,
    MetadataValueConversionError, SegmentScope, SegmentScopeConversionError,
};
use crate::chroma_proto;
use chroma_error::{ChromaError, ErrorCodes};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// SegmentUuid is a wrapper around Uuid to provide a type for the segment id.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SegmentUuid(pub Uuid);

impl SegmentUuid {
    pub fn new() -> Self {
        SegmentUuid(Uuid::new_v4())
    }
}

impl FromStr for SegmentUuid {
    type Err = SegmentConversionError;

    fn from_str(s: &str) -> Result<Self, SegmentConversionError> {
        Uuid::parse_str(s)
            .map(SegmentUuid)
            .map_err(|_| SegmentConversionError::InvalidUuid)
    }
}

impl std::fmt::Display for SegmentUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Segment implementation tags. Unrecognized tags are kept verbatim so the
/// serving side can answer with a precise unimplemented status.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SegmentType {
    BruteForceVector,
    HnswLocalMemory,
    HnswDistributed,
    InMemoryMetadata,
    Sqlite,
    Other(String),
}

impl SegmentType {
    pub fn urn(&self) -> &str {
        match self {
            SegmentType::BruteForceVector => "urn:chroma:segment/vector/brute-force",
            SegmentType::HnswLocalMemory => "urn:chroma:segment/vector/hnsw-local-memory",
            SegmentType::HnswDistributed => "urn:chroma:segment/vector/hnsw-distributed",
            SegmentType::InMemoryMetadata => "urn:chroma:segment/metadata/in-memory",
            SegmentType::Sqlite => "urn:chroma:segment/metadata/sqlite",
            SegmentType::Other(urn) => urn,
        }
    }
}

impl From<SegmentType> for String {
    fn from(segment_type: SegmentType) -> String {
        segment_type.urn().to_string()
    }
}

impl From<&str> for SegmentType {
    fn from(segment_type: &str) -> Self {
        match segment_type {
            "urn:chroma:segment/vector/brute-force" => SegmentType::BruteForceVector,
            "urn:chroma:segment/vector/hnsw-local-memory" => SegmentType::HnswLocalMemory,
            "urn:chroma:segment/vector/hnsw-distributed" => SegmentType::HnswDistributed,
            "urn:chroma:segment/metadata/in-memory" => SegmentType::InMemoryMetadata,
            "urn:chroma:segment/metadata/sqlite" => SegmentType::Sqlite,
            other => SegmentType::Other(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub id: SegmentUuid,
    pub r#type: SegmentType,
    pub scope: SegmentScope,
    pub collection: CollectionUuid,
    pub metadata: Option<Metadata>,
}

impl Segment {
    /// Reads a string valued setting from the segment metadata.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        match self.metadata.as_ref()?.get(key)? {
            MetadataValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SegmentConversionError {
    #[error("Invalid UUID")]
    InvalidUuid,
    #[error("Segment has no owning collection")]
    MissingCollection,
    #[error(transparent)]
    MetadataValueConversionError(#[from] MetadataValueConversionError),
    #[error(transparent)]
    SegmentScopeConversionError(#[from] SegmentScopeConversionError),
}

impl ChromaError for SegmentConversionError {
    fn code(&self) -> ErrorCodes {
        match self {
            SegmentConversionError::InvalidUuid => ErrorCodes::InvalidArgument,
            SegmentConversionError::MissingCollection => ErrorCodes::InvalidArgument,
            SegmentConversionError::SegmentScopeConversionError(e) => e.code(),
            SegmentConversionError::MetadataValueConversionError(e) => e.code(),
        }
    }
}

impl TryFrom<chroma_proto::Segment> for Segment {
    type Error = SegmentConversionError;

    fn try_from(proto_segment: chroma_proto::Segment) -> Result<Self, Self::Error> {
        let id = SegmentUuid::from_str(&proto_segment.id)?;
        let collection = proto_segment
            .collection
            .as_deref()
            .ok_or(SegmentConversionError::MissingCollection)?
            .parse()
            .map_err(|_| SegmentConversionError::InvalidUuid)?;
        Ok(Segment {
            id,
            r#type: proto_segment.r#type.as_str().into(),
            scope: proto_segment.scope.try_into()?,
            collection,
            metadata: decode_metadata(proto_segment.metadata)?,
        })
    }
}

impl From<Segment> for chroma_proto::Segment {
    fn from(segment: Segment) -> Self {
        chroma_proto::Segment {
            id: segment.id.to_string(),
            r#type: segment.r#type.into(),
            scope: chroma_proto::SegmentScope::from(segment.scope) as i32,
            collection: Some(segment.collection.to_string()),
            metadata: encode_metadata(segment.metadata),
        }
    }
}
