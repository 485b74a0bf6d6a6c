use super::{
    decode_update_metadata, encode_update_metadata, CollectionUuid, ConversionError, Metadata,
    MetadataValue, Operation, OperationConversionError, ScalarEncoding,
    ScalarEncodingConversionError, SeqId, SeqIdError, UpdateMetadata, CHROMA_DOCUMENT_KEY,
};
use crate::chroma_proto;
use chroma_error::{ChromaError, ErrorCodes};
use thiserror::Error;

/*
===========================================
Vector
===========================================
*/

/// A vector with its declared element type.
#[derive(Clone, Debug, PartialEq)]
pub enum Vector {
    Float32(Vec<f32>),
    Int32(Vec<i32>),
}

impl Vector {
    pub fn encoding(&self) -> ScalarEncoding {
        match self {
            Vector::Float32(_) => ScalarEncoding::FLOAT32,
            Vector::Int32(_) => ScalarEncoding::INT32,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Vector::Float32(v) => v.len(),
            Vector::Int32(v) => v.len(),
        }
    }

    /// Components widened to f32 for distance computation.
    pub fn to_f32(&self) -> Vec<f32> {
        match self {
            Vector::Float32(v) => v.clone(),
            Vector::Int32(v) => v.iter().map(|x| *x as f32).collect(),
        }
    }
}

impl From<Vec<f32>> for Vector {
    fn from(value: Vec<f32>) -> Self {
        Vector::Float32(value)
    }
}

#[derive(Error, Debug)]
pub enum VectorConversionError {
    #[error("Vector byte length {actual} does not match dimension {dimension} x {element_size}")]
    InvalidByteLength {
        dimension: usize,
        element_size: usize,
        actual: usize,
    },
    #[error(transparent)]
    ScalarEncodingConversionError(#[from] ScalarEncodingConversionError),
    #[error("Vector dimension {0} exceeds the wire limit")]
    DimensionTooLarge(usize),
    #[error("Vector dimension {0} is negative")]
    NegativeDimension(i32),
    #[error(transparent)]
    DecodeError(#[from] ConversionError),
}

impl_base_convert_error!(VectorConversionError, {
    VectorConversionError::InvalidByteLength { .. } => ErrorCodes::InvalidArgument,
    VectorConversionError::ScalarEncodingConversionError(inner) => inner.code(),
    VectorConversionError::DimensionTooLarge(_) => ErrorCodes::InvalidArgument,
    VectorConversionError::NegativeDimension(_) => ErrorCodes::InvalidArgument,
});

impl TryFrom<chroma_proto::Vector> for Vector {
    type Error = VectorConversionError;

    fn try_from(proto_vector: chroma_proto::Vector) -> Result<Self, Self::Error> {
        let encoding = ScalarEncoding::try_from(proto_vector.encoding)?;
        let element_size = encoding.element_size();
        let dimension = usize::try_from(proto_vector.dimension)
            .map_err(|_| VectorConversionError::NegativeDimension(proto_vector.dimension))?;
        if proto_vector.vector.len() != dimension * element_size {
            return Err(VectorConversionError::InvalidByteLength {
                dimension,
                element_size,
                actual: proto_vector.vector.len(),
            });
        }
        let words = proto_vector.vector.chunks_exact(element_size).map(|chunk| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(chunk);
            buf
        });
        Ok(match encoding {
            ScalarEncoding::FLOAT32 => Vector::Float32(words.map(f32::from_le_bytes).collect()),
            ScalarEncoding::INT32 => Vector::Int32(words.map(i32::from_le_bytes).collect()),
        })
    }
}

impl TryFrom<&Vector> for chroma_proto::Vector {
    type Error = VectorConversionError;

    fn try_from(vector: &Vector) -> Result<Self, Self::Error> {
        let dimension = i32::try_from(vector.dimension())
            .map_err(|_| VectorConversionError::DimensionTooLarge(vector.dimension()))?;
        let bytes = match vector {
            Vector::Float32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Vector::Int32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        };
        Ok(chroma_proto::Vector {
            dimension,
            vector: bytes,
            encoding: chroma_proto::ScalarEncoding::from(vector.encoding()) as i32,
        })
    }
}

/*
===========================================
Records
===========================================
*/

/// A mutation as submitted by a writer. Documents travel in the metadata
/// under the reserved document key.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationRecord {
    pub id: String,
    pub collection_id: CollectionUuid,
    pub embedding: Option<Vector>,
    pub metadata: Option<UpdateMetadata>,
    pub operation: Operation,
}

impl OperationRecord {
    pub fn document(&self) -> Option<&str> {
        match self.metadata.as_ref()?.get(CHROMA_DOCUMENT_KEY)? {
            super::UpdateMetadataValue::Str(document) => Some(document),
            _ => None,
        }
    }
}

/// An operation record after the log has assigned it a sequence id.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingRecord {
    pub seq_id: SeqId,
    pub record: OperationRecord,
}

#[derive(Error, Debug)]
pub enum RecordConversionError {
    #[error("Invalid UUID")]
    InvalidUuid,
    #[error(transparent)]
    DecodeError(#[from] ConversionError),
    #[error(transparent)]
    OperationConversionError(#[from] OperationConversionError),
    #[error(transparent)]
    VectorConversionError(#[from] VectorConversionError),
    #[error(transparent)]
    SeqIdError(#[from] SeqIdError),
    #[error("Vector missing from record")]
    MissingVector,
}

impl_base_convert_error!(RecordConversionError, {
    RecordConversionError::InvalidUuid => ErrorCodes::InvalidArgument,
    RecordConversionError::OperationConversionError(inner) => inner.code(),
    RecordConversionError::VectorConversionError(inner) => inner.code(),
    RecordConversionError::SeqIdError(inner) => inner.code(),
    RecordConversionError::MissingVector => ErrorCodes::InvalidArgument,
});

impl TryFrom<chroma_proto::SubmitEmbeddingRecord> for OperationRecord {
    type Error = RecordConversionError;

    fn try_from(proto: chroma_proto::SubmitEmbeddingRecord) -> Result<Self, Self::Error> {
        let collection_id = proto
            .collection_id
            .parse()
            .map_err(|_| RecordConversionError::InvalidUuid)?;
        Ok(OperationRecord {
            id: proto.id,
            collection_id,
            embedding: proto.vector.map(Vector::try_from).transpose()?,
            metadata: decode_update_metadata(proto.metadata),
            operation: Operation::try_from(proto.operation)?,
        })
    }
}

impl TryFrom<OperationRecord> for chroma_proto::SubmitEmbeddingRecord {
    type Error = RecordConversionError;

    fn try_from(record: OperationRecord) -> Result<Self, Self::Error> {
        Ok(chroma_proto::SubmitEmbeddingRecord {
            id: record.id,
            vector: record
                .embedding
                .as_ref()
                .map(chroma_proto::Vector::try_from)
                .transpose()?,
            metadata: encode_update_metadata(record.metadata),
            operation: chroma_proto::Operation::from(record.operation) as i32,
            collection_id: record.collection_id.to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VectorEmbeddingRecord {
    pub id: String,
    pub seq_id: SeqId,
    pub vector: Vector,
}

impl TryFrom<&VectorEmbeddingRecord> for chroma_proto::VectorEmbeddingRecord {
    type Error = RecordConversionError;

    fn try_from(record: &VectorEmbeddingRecord) -> Result<Self, Self::Error> {
        Ok(chroma_proto::VectorEmbeddingRecord {
            id: record.id.clone(),
            seq_id: record.seq_id.to_bytes().to_vec(),
            vector: Some((&record.vector).try_into()?),
        })
    }
}

impl TryFrom<chroma_proto::VectorEmbeddingRecord> for VectorEmbeddingRecord {
    type Error = RecordConversionError;

    fn try_from(proto: chroma_proto::VectorEmbeddingRecord) -> Result<Self, Self::Error> {
        Ok(VectorEmbeddingRecord {
            id: proto.id,
            seq_id: SeqId::from_bytes(&proto.seq_id)?,
            vector: proto
                .vector
                .ok_or(RecordConversionError::MissingVector)?
                .try_into()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VectorQueryResult {
    pub id: String,
    pub seq_id: SeqId,
    pub distance: f32,
    pub vector: Option<Vector>,
}

impl TryFrom<&VectorQueryResult> for chroma_proto::VectorQueryResult {
    type Error = RecordConversionError;

    fn try_from(result: &VectorQueryResult) -> Result<Self, Self::Error> {
        Ok(chroma_proto::VectorQueryResult {
            id: result.id.clone(),
            seq_id: result.seq_id.to_bytes().to_vec(),
            distance: result.distance,
            vector: result
                .vector
                .as_ref()
                .map(chroma_proto::Vector::try_from)
                .transpose()?,
        })
    }
}

impl TryFrom<chroma_proto::VectorQueryResult> for VectorQueryResult {
    type Error = RecordConversionError;

    fn try_from(proto: chroma_proto::VectorQueryResult) -> Result<Self, Self::Error> {
        Ok(VectorQueryResult {
            id: proto.id,
            seq_id: SeqId::from_bytes(&proto.seq_id)?,
            distance: proto.distance,
            vector: proto.vector.map(Vector::try_from).transpose()?,
        })
    }
}

/// A batch of nearest neighbour queries against one vector segment.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorQuery {
    pub vectors: Vec<Vector>,
    pub k: u32,
    /// `None` searches everything; `Some(empty)` matches nothing.
    pub allowed_ids: Option<Vec<String>>,
    pub include_embeddings: bool,
}

/// A row of the metadata segment. Metadata still carries reserved keys.
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataEmbeddingRecord {
    pub id: String,
    pub seq_id: SeqId,
    pub metadata: Option<Metadata>,
}

impl MetadataEmbeddingRecord {
    pub fn document(&self) -> Option<&str> {
        match self.metadata.as_ref()?.get(CHROMA_DOCUMENT_KEY)? {
            MetadataValue::Str(document) => Some(document),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UpdateMetadataValue;
    use prost::Message;

    #[test]
    fn test_vector_codec_round_trip() {
        for dim in [0usize, 1, 3, 128] {
            let floats = Vector::Float32((0..dim).map(|i| i as f32 * 0.25 - 1.0).collect());
            let ints = Vector::Int32((0..dim).map(|i| i as i32 - 7).collect());
            for vector in [floats, ints] {
                let proto = chroma_proto::Vector::try_from(&vector).unwrap();
                assert_eq!(proto.dimension as usize, dim);
                assert_eq!(proto.vector.len(), dim * 4);
                let bytes = proto.encode_to_vec();
                let decoded =
                    Vector::try_from(chroma_proto::Vector::decode(bytes.as_slice()).unwrap())
                        .unwrap();
                assert_eq!(decoded, vector);
            }
        }
    }

    #[test]
    fn test_vector_decode_rejects_bad_length() {
        for len in [3usize, 5, 8, 16] {
            let proto = chroma_proto::Vector {
                dimension: 3,
                vector: vec![0u8; len],
                encoding: chroma_proto::ScalarEncoding::Float32 as i32,
            };
            let result = Vector::try_from(proto);
            assert!(matches!(
                result,
                Err(VectorConversionError::InvalidByteLength { actual, .. }) if actual == len
            ));
        }
        let unknown = chroma_proto::Vector {
            dimension: 0,
            vector: vec![],
            encoding: 9,
        };
        let err = Vector::try_from(unknown).unwrap_err();
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
    }

    #[test]
    fn test_vector_decode_rejects_negative_dimension() {
        let proto = chroma_proto::Vector {
            dimension: -2,
            vector: vec![0u8; 8],
            encoding: chroma_proto::ScalarEncoding::Float32 as i32,
        };
        let err = Vector::try_from(proto).unwrap_err();
        assert!(matches!(err, VectorConversionError::NegativeDimension(-2)));
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
    }

    #[test]
    fn test_submit_record_round_trip() {
        let record = OperationRecord {
            id: "id-1".to_string(),
            collection_id: CollectionUuid::new(),
            embedding: Some(Vector::Float32(vec![1.0, 2.0])),
            metadata: Some(UpdateMetadata::from([
                (
                    CHROMA_DOCUMENT_KEY.to_string(),
                    UpdateMetadataValue::Str("hello".to_string()),
                ),
                ("drop".to_string(), UpdateMetadataValue::None),
            ])),
            operation: Operation::Upsert,
        };
        let proto = chroma_proto::SubmitEmbeddingRecord::try_from(record.clone()).unwrap();
        let back = OperationRecord::try_from(proto).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.document(), Some("hello"));
    }

    #[test]
    fn test_vector_embedding_record_requires_valid_seq_id() {
        let proto = chroma_proto::VectorEmbeddingRecord {
            id: "a".to_string(),
            seq_id: vec![1, 2, 3],
            vector: None,
        };
        assert!(matches!(
            VectorEmbeddingRecord::try_from(proto),
            Err(RecordConversionError::SeqIdError(_))
        ));
    }
}
