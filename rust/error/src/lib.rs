// Status codes mirror the gRPC status code space so that an error raised in
// any crate can cross a process boundary without losing its class.
// https://grpc.github.io/grpc/core/md_doc_statuscodes.html
use std::error::Error;

#[cfg(feature = "tonic")]
mod tonic;
#[cfg(feature = "tonic")]
pub use tonic::*;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum ErrorCodes {
    // Ok is a keyword in Rust, hence "Success".
    Success = 0,
    Cancelled = 1,
    // Ambiguous failure, possibly transport level. Retryable.
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    // Peer is unreachable. Retryable.
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

/// Coarse classification used by callers that need to decide whether to
/// ask again later or give up.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ErrorClass {
    Transient,
    Validation,
    NotFound,
    Fatal,
}

impl ErrorCodes {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCodes::InvalidArgument => "InvalidArgumentError",
            ErrorCodes::NotFound => "NotFoundError",
            ErrorCodes::Unimplemented => "UnimplementedError",
            ErrorCodes::Unavailable => "UnavailableError",
            ErrorCodes::Internal => "InternalError",
            _ => "ChromaError",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorCodes::Unavailable | ErrorCodes::Unknown => ErrorClass::Transient,
            ErrorCodes::InvalidArgument
            | ErrorCodes::OutOfRange
            | ErrorCodes::FailedPrecondition
            | ErrorCodes::Unimplemented => ErrorClass::Validation,
            ErrorCodes::NotFound => ErrorClass::NotFound,
            _ => ErrorClass::Fatal,
        }
    }

    /// Only transport level unavailable/unknown conditions may be retried.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

pub trait ChromaError: Error + Send {
    fn code(&self) -> ErrorCodes;
    fn boxed(self) -> Box<dyn ChromaError>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
    fn should_trace_error(&self) -> bool {
        true
    }
}

impl Error for Box<dyn ChromaError> {}

impl ChromaError for Box<dyn ChromaError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }

    fn should_trace_error(&self) -> bool {
        self.as_ref().should_trace_error()
    }
}

impl ChromaError for std::io::Error {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::Unknown
    }
}
