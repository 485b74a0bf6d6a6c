use super::ConversionError;
use crate::chroma_proto;
use chroma_error::{ChromaError, ErrorCodes};
use thiserror::Error;

/// Element type of a vector. Fixed per collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarEncoding {
    FLOAT32,
    INT32,
}

impl ScalarEncoding {
    /// Bytes per element on the wire.
    pub fn element_size(&self) -> usize {
        match self {
            ScalarEncoding::FLOAT32 => std::mem::size_of::<f32>(),
            ScalarEncoding::INT32 => std::mem::size_of::<i32>(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScalarEncodingConversionError {
    #[error("Invalid encoding, valid encodings are: Float32, Int32")]
    InvalidEncoding,
    #[error(transparent)]
    DecodeError(#[from] ConversionError),
}

impl_base_convert_error!(ScalarEncodingConversionError, {
    ScalarEncodingConversionError::InvalidEncoding => ErrorCodes::InvalidArgument,
});

impl From<chroma_proto::ScalarEncoding> for ScalarEncoding {
    fn from(encoding: chroma_proto::ScalarEncoding) -> Self {
        match encoding {
            chroma_proto::ScalarEncoding::Float32 => ScalarEncoding::FLOAT32,
            chroma_proto::ScalarEncoding::Int32 => ScalarEncoding::INT32,
        }
    }
}

impl From<ScalarEncoding> for chroma_proto::ScalarEncoding {
    fn from(encoding: ScalarEncoding) -> Self {
        match encoding {
            ScalarEncoding::FLOAT32 => chroma_proto::ScalarEncoding::Float32,
            ScalarEncoding::INT32 => chroma_proto::ScalarEncoding::Int32,
        }
    }
}

impl TryFrom<i32> for ScalarEncoding {
    type Error = ScalarEncodingConversionError;

    fn try_from(encoding: i32) -> Result<Self, Self::Error> {
        chroma_proto::ScalarEncoding::try_from(encoding)
            .map(ScalarEncoding::from)
            .map_err(|_| ScalarEncodingConversionError::InvalidEncoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_encoding_try_from() {
        let converted: ScalarEncoding = (chroma_proto::ScalarEncoding::Int32 as i32)
            .try_into()
            .unwrap();
        assert_eq!(converted, ScalarEncoding::INT32);
        assert!(ScalarEncoding::try_from(9).is_err());
    }
}
