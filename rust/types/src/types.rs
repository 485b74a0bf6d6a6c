use chroma_error::{ChromaError, ErrorCodes};
use thiserror::Error;

/// Implements `ChromaError` for conversion errors that wrap `ConversionError`
/// in a `DecodeError` variant, with match arms for the remaining variants.
macro_rules! impl_base_convert_error {
    ($err:ty, { $($variant:pat => $action:expr),* $(,)? }) => {
        impl ChromaError for $err {
            fn code(&self) -> ErrorCodes {
                match self {
                    Self::DecodeError(inner) => inner.code(),
                    $( $variant => $action, )*
                }
            }
        }
    };
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Error decoding protobuf message")]
    DecodeError,
}

impl ChromaError for ConversionError {
    fn code(&self) -> ErrorCodes {
        match self {
            ConversionError::DecodeError => ErrorCodes::InvalidArgument,
        }
    }
}
