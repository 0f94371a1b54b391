//! Canonical state signatures and the visited set

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use super::state::Action;

/// SHA-256 over the normalized action sequence and the observation digest
///
/// Two states that reached the same observation through the same
/// (normalized) actions share a signature and are expanded only once.
pub fn state_signature(actions: &[Action], observation: &str) -> String {
    let observation_digest = Sha256::digest(experiencestore::normalize_descriptor(observation).as_bytes());

    let mut hasher = Sha256::new();
    for (i, action) in actions.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(action.normalized().as_bytes());
    }
    hasher.update([0u8]);
    hasher.update(observation_digest);
    hex::encode(hasher.finalize())
}

/// Signatures of every state generated so far
#[derive(Debug, Default)]
pub struct VisitedSet {
    signatures: BTreeSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the signature was already present
    pub fn insert(&mut self, signature: String) -> bool {
        self.signatures.insert(signature)
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.signatures.contains(signature)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_hex_sha256() {
        let sig = state_signature(&[Action::new("search", "flights")], "3 results");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_ignores_case_and_punctuation() {
        let a = state_signature(&[Action::new("Search", "Flights!")], "Found: 3");
        let b = state_signature(&[Action::new("search", "flights")], "found 3");
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_depends_on_order_and_observation() {
        let x = Action::new("a", "");
        let y = Action::new("b", "");
        let xy = state_signature(&[x.clone(), y.clone()], "");
        let yx = state_signature(&[y.clone(), x.clone()], "");
        assert_ne!(xy, yx);
        assert_ne!(state_signature(&[x.clone()], "one"), state_signature(&[x], "two"));
    }

    #[test]
    fn test_signature_separates_action_boundaries() {
        // "a b" as one action vs "a" then "b"
        let joined = state_signature(&[Action::new("a", "b")], "");
        let split = state_signature(&[Action::new("a", ""), Action::new("b", "")], "");
        assert_ne!(joined, split);
    }

    #[test]
    fn test_visited_insert() {
        let mut visited = VisitedSet::new();
        assert!(visited.insert("abc".to_string()));
        assert!(!visited.insert("abc".to_string()));
        assert!(visited.contains("abc"));
        assert_eq!(visited.len(), 1);
    }
}
