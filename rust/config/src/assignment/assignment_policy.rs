use super::{
    config::{AssignmentPolicyConfig, HasherType},
    rendezvous_hash::{AssignmentError, Hasher, Murmur3Hasher},
};
use crate::{registry::Registry, Configurable};
use async_trait::async_trait;
use chroma_error::ChromaError;

/// Assigns a key to an ordered set of members.
pub trait AssignmentPolicy: Send + Sync {
    fn assign(&self, key: &str, k: usize) -> Result<Vec<String>, AssignmentError>;
    fn get_members(&self) -> Vec<String>;
    fn set_members(&mut self, members: Vec<String>);
}

#[derive(Clone, Debug, Default)]
pub struct RendezvousHashingAssignmentPolicy {
    hasher: Murmur3Hasher,
    members: Vec<String>,
}

impl RendezvousHashingAssignmentPolicy {
    pub fn new(members: Vec<String>) -> Self {
        Self {
            hasher: Murmur3Hasher {},
            members,
        }
    }
}

impl AssignmentPolicy for RendezvousHashingAssignmentPolicy {
    fn assign(&self, key: &str, k: usize) -> Result<Vec<String>, AssignmentError> {
        self.hasher.assign(&self.members, key, k)
    }

    fn get_members(&self) -> Vec<String> {
        self.members.clone()
    }

    fn set_members(&mut self, members: Vec<String>) {
        self.members = members;
    }
}

#[async_trait]
impl Configurable<AssignmentPolicyConfig> for RendezvousHashingAssignmentPolicy {
    async fn try_from_config(
        config: &AssignmentPolicyConfig,
        _registry: &Registry,
    ) -> Result<Self, Box<dyn ChromaError>> {
        let AssignmentPolicyConfig::RendezvousHashing(config) = config;
        let hasher = match config.hasher {
            HasherType::Murmur3 => Murmur3Hasher {},
        };
        Ok(Self {
            hasher,
            members: Vec::new(),
        })
    }
}

#[async_trait]
impl Configurable<AssignmentPolicyConfig> for Box<dyn AssignmentPolicy> {
    async fn try_from_config(
        config: &AssignmentPolicyConfig,
        registry: &Registry,
    ) -> Result<Self, Box<dyn ChromaError>> {
        match config {
            AssignmentPolicyConfig::RendezvousHashing(_) => Ok(Box::new(
                RendezvousHashingAssignmentPolicy::try_from_config(config, registry).await?,
            )),
        }
    }
}
