use crate::{chroma_proto, ConversionError};
use chroma_error::{ChromaError, ErrorCodes};

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentScope {
    VECTOR,
    METADATA,
    RECORD,
}

impl From<SegmentScope> for String {
    fn from(scope: SegmentScope) -> String {
        match scope {
            SegmentScope::VECTOR => "VECTOR".to_string(),
            SegmentScope::METADATA => "METADATA".to_string(),
            SegmentScope::RECORD => "RECORD".to_string(),
        }
    }
}

impl TryFrom<&str> for SegmentScope {
    type Error = SegmentScopeConversionError;

    fn try_from(scope: &str) -> Result<Self, Self::Error> {
        match scope {
            "VECTOR" => Ok(SegmentScope::VECTOR),
            "METADATA" => Ok(SegmentScope::METADATA),
            "RECORD" => Ok(SegmentScope::RECORD),
            _ => Err(SegmentScopeConversionError::InvalidScope),
        }
    }
}

#[derive(Error, Debug)]
pub enum SegmentScopeConversionError {
    #[error("Invalid segment scope, valid scopes are: Vector, Metadata, Record")]
    InvalidScope,
    #[error(transparent)]
    DecodeError(#[from] ConversionError),
}

impl_base_convert_error!(SegmentScopeConversionError, {
    SegmentScopeConversionError::InvalidScope => ErrorCodes::InvalidArgument,
});

impl From<chroma_proto::SegmentScope> for SegmentScope {
    fn from(value: chroma_proto::SegmentScope) -> Self {
        match value {
            chroma_proto::SegmentScope::Vector => Self::VECTOR,
            chroma_proto::SegmentScope::Metadata => Self::METADATA,
            chroma_proto::SegmentScope::Record => Self::RECORD,
        }
    }
}

impl From<SegmentScope> for chroma_proto::SegmentScope {
    fn from(value: SegmentScope) -> Self {
        match value {
            SegmentScope::VECTOR => Self::Vector,
            SegmentScope::METADATA => Self::Metadata,
            SegmentScope::RECORD => Self::Record,
        }
    }
}

impl TryFrom<i32> for SegmentScope {
    type Error = SegmentScopeConversionError;

    fn try_from(scope: i32) -> Result<Self, Self::Error> {
        chroma_proto::SegmentScope::try_from(scope)
            .map(SegmentScope::from)
            .map_err(|_| SegmentScopeConversionError::InvalidScope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_scope_try_from() {
        let converted: SegmentScope = chroma_proto::SegmentScope::Metadata.into();
        assert_eq!(converted, SegmentScope::METADATA);
        assert_eq!(SegmentScope::try_from("VECTOR").unwrap(), SegmentScope::VECTOR);
        assert!(SegmentScope::try_from(17).is_err());
    }
}
