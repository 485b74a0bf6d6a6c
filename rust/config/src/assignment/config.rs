use serde::{Deserialize, Serialize};

/// The hash function used to score members.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum HasherType {
    #[default]
    Murmur3,
}

/// How record locators (collection ids) are assigned to members.
///
/// Deserialized from YAML such as:
///
/// ```yaml
/// assignment:
///   rendezvous_hashing:
///     hasher: Murmur3
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum AssignmentPolicyConfig {
    #[serde(alias = "rendezvous_hashing")]
    RendezvousHashing(RendezvousHashingAssignmentPolicyConfig),
}

impl Default for AssignmentPolicyConfig {
    fn default() -> Self {
        AssignmentPolicyConfig::RendezvousHashing(
            RendezvousHashingAssignmentPolicyConfig::default(),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RendezvousHashingAssignmentPolicyConfig {
    #[serde(default)]
    pub hasher: HasherType,
}
