use chroma_error::{ChromaError, ErrorCodes};
use std::io::Cursor;
use thiserror::Error;

use murmur3::murmur3_x64_128;

/// Scores a (member, key) pair. The members with the highest scores own the key.
pub trait Hasher {
    fn hash(&self, member: &str, key: &str) -> Result<u64, AssignmentError>;

    /// Returns the `k` members with the highest score for `key`, best first.
    fn assign(
        &self,
        members: impl IntoIterator<Item = impl AsRef<str>>,
        key: &str,
        k: usize,
    ) -> Result<Vec<String>, AssignmentError> {
        if key.is_empty() {
            return Err(AssignmentError::EmptyKey);
        }
        let mut scored = members
            .into_iter()
            .map(|m| {
                self.hash(m.as_ref(), key)
                    .map(|score| (score, m.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if scored.len() < k {
            return Err(AssignmentError::InsufficientMember(k, scored.len()));
        }
        // Ties are broken by member name so the result is deterministic.
        scored.sort_by(|(sa, ma), (sb, mb)| sb.cmp(sa).then_with(|| ma.cmp(mb)));
        Ok(scored.into_iter().take(k).map(|(_, m)| m).collect())
    }

    fn assign_one(
        &self,
        members: impl IntoIterator<Item = impl AsRef<str>>,
        key: &str,
    ) -> Result<String, AssignmentError> {
        self.assign(members, key, 1)?
            .pop()
            .ok_or(AssignmentError::InsufficientMember(1, 0))
    }
}

#[derive(Error, Debug)]
pub enum AssignmentError {
    #[error("Cannot assign empty key")]
    EmptyKey,
    #[error("Insufficient members: requested {0}, available {1}")]
    InsufficientMember(usize, usize),
    #[error("Error hashing member")]
    HashError,
}

impl ChromaError for AssignmentError {
    fn code(&self) -> ErrorCodes {
        match self {
            AssignmentError::EmptyKey => ErrorCodes::InvalidArgument,
            AssignmentError::InsufficientMember(_, _) => ErrorCodes::Unavailable,
            AssignmentError::HashError => ErrorCodes::Internal,
        }
    }
}

fn merge_hashes(x: u64, y: u64) -> u64 {
    let mut acc = x ^ y;
    acc ^= acc >> 33;
    acc = acc.wrapping_mul(0xFF51AFD7ED558CCD);
    acc ^= acc >> 33;
    acc = acc.wrapping_mul(0xC4CEB9FE1A85EC53);
    acc ^= acc >> 33;
    acc
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Murmur3Hasher {}

impl Hasher for Murmur3Hasher {
    fn hash(&self, member: &str, key: &str) -> Result<u64, AssignmentError> {
        let member_hash = murmur3_x64_128(&mut Cursor::new(member), 0)
            .map_err(|_| AssignmentError::HashError)?;
        let key_hash =
            murmur3_x64_128(&mut Cursor::new(key), 0).map_err(|_| AssignmentError::HashError)?;
        // Only the low 64 bits of each 128 bit hash are used.
        Ok(merge_hashes(member_hash as u64, key_hash as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockHasher {}

    impl Hasher for MockHasher {
        fn hash(&self, member: &str, _key: &str) -> Result<u64, AssignmentError> {
            match member {
                "a" => Ok(1),
                "b" => Ok(2),
                "c" => Ok(3),
                _ => Err(AssignmentError::HashError),
            }
        }
    }

    #[test]
    fn test_highest_score_wins() {
        let hasher = MockHasher {};
        assert_eq!(hasher.assign_one(["a", "b", "c"], "key").unwrap(), "c");
        assert_eq!(hasher.assign(["a", "b", "c"], "key", 2).unwrap(), vec!["c", "b"]);
    }

    #[test]
    fn test_assign_errors() {
        let hasher = MockHasher {};
        assert!(matches!(
            hasher.assign(["a"], "key", 2),
            Err(AssignmentError::InsufficientMember(2, 1))
        ));
        assert!(matches!(
            hasher.assign(["a"], "", 1),
            Err(AssignmentError::EmptyKey)
        ));
        assert!(matches!(
            hasher.assign(["a", "z"], "key", 1),
            Err(AssignmentError::HashError)
        ));
    }

    #[test]
    fn test_assignment_is_stable() {
        let hasher = Murmur3Hasher {};
        let members = ["node-0", "node-1", "node-2", "node-3"];
        let first = hasher.assign(members, "collection", 3).unwrap();
        let mut shuffled = members;
        shuffled.reverse();
        assert_eq!(hasher.assign(shuffled, "collection", 3).unwrap(), first);
    }

    #[test]
    fn test_even_distribution() {
        let member_count = 10;
        let tolerance = 25;
        let hasher = Murmur3Hasher {};
        let nodes = (0..member_count)
            .map(|i| format!("member{}", i))
            .collect::<Vec<_>>();

        let mut counts = vec![0i32; member_count];
        let num_keys = 1000;
        for i in 0..num_keys {
            let member = hasher.assign_one(&nodes, &format!("key_{}", i)).unwrap();
            let index = nodes.iter().position(|x| *x == member).unwrap();
            counts[index] += 1;
        }

        let expected = (num_keys / member_count) as i32;
        for count in counts {
            assert!((count - expected).abs() < tolerance);
        }
    }
}
