use std::{collections::HashMap, sync::Arc};

use chroma_config::registry::Injectable;
use chroma_types::{Segment, SegmentScope, SegmentType, SegmentUuid};
use parking_lot::Mutex;

use crate::{
    brute_force_vector::BruteForceVectorSegment,
    in_memory_metadata::InMemoryMetadataSegment,
    types::{MetadataSegmentReader, SegmentError, SegmentWriter, VectorSegmentReader},
};

/// A live segment instance.
#[derive(Clone, Debug)]
pub enum ResidentSegment {
    Vector(BruteForceVectorSegment),
    Metadata(InMemoryMetadataSegment),
}

impl ResidentSegment {
    /// Instantiates the implementation for a segment descriptor.
    pub fn from_segment(segment: &Segment) -> Result<Self, SegmentError> {
        match (&segment.r#type, segment.scope) {
            (
                SegmentType::BruteForceVector | SegmentType::HnswLocalMemory,
                SegmentScope::VECTOR,
            ) => Ok(Self::Vector(BruteForceVectorSegment::from_segment(segment)?)),
            (SegmentType::InMemoryMetadata, SegmentScope::METADATA) => Ok(Self::Metadata(
                InMemoryMetadataSegment::new(segment.id),
            )),
            (segment_type, scope) => Err(SegmentError::Unsupported {
                segment_type: segment_type.clone(),
                scope,
            }),
        }
    }

    pub fn id(&self) -> SegmentUuid {
        match self {
            ResidentSegment::Vector(segment) => segment.id,
            ResidentSegment::Metadata(segment) => segment.id,
        }
    }

    pub fn writer(&self) -> Arc<dyn SegmentWriter> {
        match self {
            ResidentSegment::Vector(segment) => Arc::new(segment.clone()),
            ResidentSegment::Metadata(segment) => Arc::new(segment.clone()),
        }
    }

    pub fn vector_reader(&self) -> Result<Arc<dyn VectorSegmentReader>, SegmentError> {
        match self {
            ResidentSegment::Vector(segment) => Ok(Arc::new(segment.clone())),
            ResidentSegment::Metadata(segment) => Err(SegmentError::WrongScope {
                id: segment.id,
                expected: SegmentScope::VECTOR,
            }),
        }
    }

    pub fn metadata_reader(&self) -> Result<Arc<dyn MetadataSegmentReader>, SegmentError> {
        match self {
            ResidentSegment::Metadata(segment) => Ok(Arc::new(segment.clone())),
            ResidentSegment::Vector(segment) => Err(SegmentError::WrongScope {
                id: segment.id,
                expected: SegmentScope::METADATA,
            }),
        }
    }
}

/// Maps segment descriptors to live segment instances.
pub trait SegmentProvider: Send + Sync {
    fn metadata_reader(
        &self,
        segment: &Segment,
    ) -> Result<Arc<dyn MetadataSegmentReader>, SegmentError>;

    fn vector_reader(&self, segment: &Segment)
        -> Result<Arc<dyn VectorSegmentReader>, SegmentError>;
}

/// Owns the segments resident in this process, keyed by segment id.
///
/// The lock is only held to look up or insert an entry; segment reads and
/// writes happen on the cloned handle.
#[derive(Clone, Debug, Default)]
pub struct LocalSegmentManager {
    segments: Arc<Mutex<HashMap<SegmentUuid, ResidentSegment>>>,
}

impl Injectable for LocalSegmentManager {}

impl LocalSegmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `segment` resident. Loading a resident segment returns the
    /// existing instance.
    pub fn load(&self, segment: &Segment) -> Result<ResidentSegment, SegmentError> {
        let mut segments = self.segments.lock();
        if let Some(resident) = segments.get(&segment.id) {
            return Ok(resident.clone());
        }
        let resident = ResidentSegment::from_segment(segment)?;
        tracing::info!(
            segment_id = %segment.id,
            segment_type = segment.r#type.urn(),
            "Loaded segment"
        );
        segments.insert(segment.id, resident.clone());
        Ok(resident)
    }

    pub fn get(&self, id: &SegmentUuid) -> Result<ResidentSegment, SegmentError> {
        self.segments
            .lock()
            .get(id)
            .cloned()
            .ok_or(SegmentError::NotLoaded(*id))
    }

    /// Drops the segment. Returns whether it was resident.
    pub fn release(&self, id: &SegmentUuid) -> bool {
        let released = self.segments.lock().remove(id).is_some();
        if released {
            tracing::info!(segment_id = %id, "Released segment");
        }
        released
    }

    pub fn resident_ids(&self) -> Vec<SegmentUuid> {
        self.segments.lock().keys().copied().collect()
    }
}

impl SegmentProvider for LocalSegmentManager {
    fn metadata_reader(
        &self,
        segment: &Segment,
    ) -> Result<Arc<dyn MetadataSegmentReader>, SegmentError> {
        self.load(segment)?.metadata_reader()
    }

    fn vector_reader(
        &self,
        segment: &Segment,
    ) -> Result<Arc<dyn VectorSegmentReader>, SegmentError> {
        self.load(segment)?.vector_reader()
    }
}
