#[macro_use]
mod types;
mod api_types;
mod collection;
mod execution;
mod metadata;
mod operation;
mod record;
mod scalar_encoding;
mod segment;
mod segment_scope;
mod seq_id;

// Re-export the types module, so that we can use it as a single import in other modules.
pub use api_types::*;
pub use collection::*;
pub use execution::*;
pub use metadata::*;
pub use operation::*;
pub use record::*;
pub use scalar_encoding::*;
pub use segment::*;
pub use segment_scope::*;
pub use seq_id::*;
pub use types::*;

#[allow(clippy::all)]
pub mod chroma_proto;
