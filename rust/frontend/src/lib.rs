//! Query plan execution for the Chroma query plane.
//!
//! An [`Executor`] answers `Count`, `Get` and `Knn` plans either in
//! process, against segments resident in this process, or by fanning the
//! plan out to the query nodes that hold the collection.

pub mod executor;

pub use executor::{
    client_manager::ClientManager,
    config::{DistributedExecutorConfig, ExecutorConfig, LocalExecutorConfig},
    endpoint::{EndpointResolver, RendezvousEndpointResolver},
    retry::{RetryConfig, Sleeper, TokioSleeper},
    DistributedExecutor, Executor, ExecutorError, LocalExecutor,
};
