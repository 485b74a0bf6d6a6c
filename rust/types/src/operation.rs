use super::ConversionError;
use crate::chroma_proto;
use chroma_error::{ChromaError, ErrorCodes};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Add,
    Update,
    Upsert,
    Delete,
}

#[derive(Error, Debug)]
pub enum OperationConversionError {
    #[error("Invalid operation, valid operations are: Add, Upsert, Update, Delete")]
    InvalidOperation,
    #[error(transparent)]
    DecodeError(#[from] ConversionError),
}

impl_base_convert_error!(OperationConversionError, {
    OperationConversionError::InvalidOperation => ErrorCodes::InvalidArgument,
});

impl From<chroma_proto::Operation> for Operation {
    fn from(op: chroma_proto::Operation) -> Self {
        match op {
            chroma_proto::Operation::Add => Operation::Add,
            chroma_proto::Operation::Upsert => Operation::Upsert,
            chroma_proto::Operation::Update => Operation::Update,
            chroma_proto::Operation::Delete => Operation::Delete,
        }
    }
}

impl From<Operation> for chroma_proto::Operation {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Add => chroma_proto::Operation::Add,
            Operation::Upsert => chroma_proto::Operation::Upsert,
            Operation::Update => chroma_proto::Operation::Update,
            Operation::Delete => chroma_proto::Operation::Delete,
        }
    }
}

impl TryFrom<i32> for Operation {
    type Error = OperationConversionError;

    fn try_from(op: i32) -> Result<Self, Self::Error> {
        chroma_proto::Operation::try_from(op)
            .map(Operation::from)
            .map_err(|_| OperationConversionError::InvalidOperation)
    }
}
