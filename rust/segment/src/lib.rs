pub mod brute_force_vector;
pub mod in_memory_metadata;
pub mod local_segment_manager;
pub mod segment_ingestor;
pub mod types;

pub use brute_force_vector::BruteForceVectorSegment;
pub use in_memory_metadata::InMemoryMetadataSegment;
pub use local_segment_manager::{LocalSegmentManager, ResidentSegment, SegmentProvider};
pub use segment_ingestor::SegmentIngestor;
pub use types::*;
