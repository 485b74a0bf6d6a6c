use chroma_config::assignment::rendezvous_hash::AssignmentError;
use chroma_error::{ChromaError, ErrorCodes};
use chroma_segment::SegmentError;
use chroma_types::{
    plan::{Count, Get, Knn},
    CountResponse, GetResponse, IncludeList, QueryConversionError, QueryResponse,
};
use thiserror::Error;

pub mod client_manager;
pub mod config;
pub mod distributed;
pub mod endpoint;
pub mod local;
pub mod retry;

pub use distributed::DistributedExecutor;
pub use local::LocalExecutor;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Error assigning collection to a query node: {0}")]
    Assignment(#[from] AssignmentError),
    #[error("Error converting: {0}")]
    Conversion(#[from] QueryConversionError),
    #[error("Memberlist is empty")]
    EmptyMemberlist,
    #[error("Request was cancelled")]
    Cancelled,
    #[error("Error from grpc: {0}")]
    Grpc(#[from] tonic::Status),
    #[error("Invalid endpoint {0}")]
    InvalidEndpoint(String),
    #[error("Error reading segment: {0}")]
    Segment(#[from] SegmentError),
    #[error("Internal error: {0}")]
    Internal(Box<dyn ChromaError>),
}

impl ChromaError for ExecutorError {
    fn code(&self) -> ErrorCodes {
        match self {
            ExecutorError::Assignment(e) => e.code(),
            ExecutorError::Conversion(e) => e.code(),
            ExecutorError::EmptyMemberlist => ErrorCodes::Unavailable,
            ExecutorError::Cancelled => ErrorCodes::Cancelled,
            ExecutorError::Grpc(status) => status.code().into(),
            ExecutorError::InvalidEndpoint(_) => ErrorCodes::InvalidArgument,
            ExecutorError::Segment(e) => e.code(),
            ExecutorError::Internal(e) => e.code(),
        }
    }
}

impl From<Box<dyn ChromaError>> for ExecutorError {
    fn from(value: Box<dyn ChromaError>) -> Self {
        ExecutorError::Internal(value)
    }
}

/// Answers query plans either in process or by fanning out to query nodes.
#[derive(Clone, Debug)]
pub enum Executor {
    Distributed(DistributedExecutor),
    Local(LocalExecutor),
}

impl Executor {
    pub async fn count(&self, plan: Count) -> Result<CountResponse, ExecutorError> {
        let result = match self {
            Executor::Distributed(distributed_executor) => distributed_executor.count(plan).await?,
            Executor::Local(local_executor) => local_executor.count(plan).await?,
        };
        Ok(result.count)
    }

    pub async fn get(&self, plan: Get) -> Result<GetResponse, ExecutorError> {
        let include = IncludeList::from(&plan.proj);
        let result = match self {
            Executor::Distributed(distributed_executor) => distributed_executor.get(plan).await?,
            Executor::Local(local_executor) => local_executor.get(plan).await?,
        };
        Ok((result, include).into())
    }

    pub async fn knn(&self, plan: Knn) -> Result<QueryResponse, ExecutorError> {
        let include = IncludeList::from(&plan.proj);
        let result = match self {
            Executor::Distributed(distributed_executor) => distributed_executor.knn(plan).await?,
            Executor::Local(local_executor) => local_executor.knn(plan).await?,
        };
        Ok((result, include).into())
    }
}
