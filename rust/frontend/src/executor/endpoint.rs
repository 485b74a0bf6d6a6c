use std::fmt::Debug;

use chroma_config::assignment::assignment_policy::{
    AssignmentPolicy, RendezvousHashingAssignmentPolicy,
};

use super::ExecutorError;

/// Maps a record locator (a collection id) to the query nodes holding it.
pub trait EndpointResolver: Send + Sync + Debug {
    /// Returns up to `replication_factor` endpoints, best first. Never
    /// returns an empty list.
    fn get_endpoints(
        &self,
        record_locator: &str,
        replication_factor: usize,
    ) -> Result<Vec<String>, ExecutorError>;
}

/// Resolves endpoints by rendezvous hashing the locator over a static
/// member list.
pub struct RendezvousEndpointResolver {
    policy: Box<dyn AssignmentPolicy>,
}

impl Debug for RendezvousEndpointResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendezvousEndpointResolver")
            .field("members", &self.policy.get_members())
            .finish()
    }
}

impl RendezvousEndpointResolver {
    pub fn new(members: Vec<String>) -> Self {
        Self::with_policy(Box::new(RendezvousHashingAssignmentPolicy::new(members)))
    }

    pub fn with_policy(policy: Box<dyn AssignmentPolicy>) -> Self {
        Self { policy }
    }
}

impl EndpointResolver for RendezvousEndpointResolver {
    fn get_endpoints(
        &self,
        record_locator: &str,
        replication_factor: usize,
    ) -> Result<Vec<String>, ExecutorError> {
        let members = self.policy.get_members().len();
        if members == 0 {
            return Err(ExecutorError::EmptyMemberlist);
        }
        // Ask for no more replicas than there are members.
        let k = replication_factor.clamp(1, members);
        Ok(self.policy.assign(record_locator, k)?)
    }
}
