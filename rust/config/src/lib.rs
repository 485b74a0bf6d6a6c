pub mod assignment;
pub mod helpers;
pub mod registry;

use async_trait::async_trait;
use chroma_error::ChromaError;

/// Builds a component from its config section.
///
/// Every component that is wired up at startup implements this for its own
/// config type. Shared handles that several components need (for example a
/// log or a segment manager) are passed through the `Registry`.
#[async_trait]
pub trait Configurable<T, E = Box<dyn ChromaError>> {
    async fn try_from_config(config: &T, registry: &registry::Registry) -> Result<Self, E>
    where
        Self: Sized;
}
