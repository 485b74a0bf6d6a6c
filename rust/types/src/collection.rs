use super::{Segment, SegmentConversionError};
use crate::chroma_proto;
use chroma_error::{ChromaError, ErrorCodes};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// CollectionUuid is a wrapper around Uuid to provide a type for the collection id.
#[derive(
    Copy, Clone, Debug, Default, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize,
)]
pub struct CollectionUuid(pub Uuid);

impl CollectionUuid {
    pub fn new() -> Self {
        CollectionUuid(Uuid::new_v4())
    }
}

impl std::str::FromStr for CollectionUuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(CollectionUuid)
    }
}

impl std::fmt::Display for CollectionUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Collection {
    pub collection_id: CollectionUuid,
    pub name: String,
    pub dimension: Option<u32>,
    /// The as-of version reads are evaluated at.
    pub version: u64,
}

#[derive(Error, Debug)]
pub enum CollectionConversionError {
    #[error("Invalid UUID")]
    InvalidUuid,
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Segment(#[from] SegmentConversionError),
}

impl ChromaError for CollectionConversionError {
    fn code(&self) -> ErrorCodes {
        match self {
            CollectionConversionError::InvalidUuid => ErrorCodes::InvalidArgument,
            CollectionConversionError::MissingField(_) => ErrorCodes::InvalidArgument,
            CollectionConversionError::Segment(e) => e.code(),
        }
    }
}

impl TryFrom<chroma_proto::Collection> for Collection {
    type Error = CollectionConversionError;

    fn try_from(proto_collection: chroma_proto::Collection) -> Result<Self, Self::Error> {
        Ok(Collection {
            collection_id: proto_collection
                .id
                .parse()
                .map_err(|_| CollectionConversionError::InvalidUuid)?,
            name: proto_collection.name,
            dimension: proto_collection.dimension,
            version: proto_collection.version,
        })
    }
}

impl From<Collection> for chroma_proto::Collection {
    fn from(value: Collection) -> Self {
        chroma_proto::Collection {
            id: value.collection_id.to_string(),
            name: value.name,
            dimension: value.dimension,
            version: value.version,
        }
    }
}

/// A collection together with the segments that serve its reads.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionAndSegments {
    pub collection: Collection,
    pub metadata_segment: Segment,
    pub vector_segment: Segment,
}
