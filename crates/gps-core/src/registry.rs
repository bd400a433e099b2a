//! Identifier → session registry.
//!
//! At most one live session per device identifier exists at any instant
//! (testable property 8): registering a second login for the same
//! identifier replaces the mapping and returns the session it displaced so
//! the driver can close it.

use std::collections::HashMap;

/// Maps device identifiers to the session currently serving them.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<String, u64>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: HashMap::new() }
    }

    /// Binds `identifier` to `session_id`, returning the session that
    /// previously owned this identifier, if any (the caller should close
    /// it — a re-login always wins over the stale connection).
    pub fn register(&mut self, identifier: String, session_id: u64) -> Option<u64> {
        self.sessions.insert(identifier, session_id)
    }

    /// Looks up the session currently serving `identifier`.
    #[must_use]
    pub fn lookup(&self, identifier: &str) -> Option<u64> {
        self.sessions.get(identifier).copied()
    }

    /// Removes `identifier` from the registry only if it still points at
    /// `session_id` — a closing session must not evict a newer login that
    /// has already replaced it.
    pub fn remove_if_owner(&mut self, identifier: &str, session_id: u64) -> bool {
        if self.sessions.get(identifier) == Some(&session_id) {
            self.sessions.remove(identifier);
            true
        } else {
            false
        }
    }

    /// Every currently registered `(identifier, session_id)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.sessions.iter().map(|(id, session_id)| (id.as_str(), *session_id))
    }

    /// Number of identifiers currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relogin_replaces_and_returns_previous_owner() {
        let mut registry = Registry::new();
        assert_eq!(registry.register("355172107461053".to_string(), 1), None);
        assert_eq!(registry.register("355172107461053".to_string(), 2), Some(1));
        assert_eq!(registry.lookup("355172107461053"), Some(2));
    }

    #[test]
    fn remove_if_owner_ignores_stale_session() {
        let mut registry = Registry::new();
        registry.register("id".to_string(), 1);
        registry.register("id".to_string(), 2);

        // The session that lost the race (id 1) must not evict id 2's entry.
        assert!(!registry.remove_if_owner("id", 1));
        assert_eq!(registry.lookup("id"), Some(2));

        assert!(registry.remove_if_owner("id", 2));
        assert_eq!(registry.lookup("id"), None);
    }

    #[test]
    fn at_most_one_session_per_identifier() {
        let mut registry = Registry::new();
        registry.register("a".to_string(), 1);
        registry.register("a".to_string(), 2);
        registry.register("a".to_string(), 3);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("a"), Some(3));
    }
}
