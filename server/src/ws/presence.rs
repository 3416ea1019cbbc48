//! In-memory online-user registry.
//!
//! Maps user identity to the connection identity currently reachable for
//! live delivery. Entries exist only while the owning socket is open and
//! never leave process memory. Held by AppState, not a module-level
//! singleton, so tests construct their own.

use dashmap::DashMap;

use crate::ws::ConnectionId;

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: DashMap<String, ConnectionId>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert or overwrite the mapping for a user. Last writer wins when a
    /// second tab/device announces the same user.
    pub fn set_online(&self, user_id: &str, connection_id: ConnectionId) {
        self.entries.insert(user_id.to_string(), connection_id);
    }

    /// Remove the mapping if present; no-op otherwise.
    pub fn set_offline(&self, user_id: &str) {
        self.entries.remove(user_id);
    }

    /// Connection currently registered for a user, if any.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionId> {
        self.entries.get(user_id).map(|entry| *entry.value())
    }

    /// Remove every entry whose value is the given connection identity.
    /// Used on transport disconnect, where the closing socket cannot name
    /// its user. Removes all matches should several users ever point at
    /// the same connection.
    pub fn remove_by_connection(&self, connection_id: ConnectionId) {
        self.entries.retain(|_, conn| *conn != connection_id);
    }

    /// Sorted snapshot of online user identities.
    pub fn roster(&self) -> Vec<String> {
        let mut users: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        users.sort();
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn lookup_follows_most_recent_set_online() {
        let registry = PresenceRegistry::new();
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();

        registry.set_online("u1", c1);
        assert_eq!(registry.lookup("u1"), Some(c1));

        // Reconnection overwrites the stale connection identity
        registry.set_online("u1", c2);
        assert_eq!(registry.lookup("u1"), Some(c2));

        registry.set_offline("u1");
        assert_eq!(registry.lookup("u1"), None);
    }

    #[test]
    fn set_offline_is_idempotent() {
        let registry = PresenceRegistry::new();
        registry.set_online("u1", Uuid::new_v4());

        registry.set_offline("u1");
        let after_once = registry.roster();
        registry.set_offline("u1");
        assert_eq!(registry.roster(), after_once);
        assert!(registry.roster().is_empty());
    }

    #[test]
    fn remove_by_connection_only_affects_matching_entries() {
        let registry = PresenceRegistry::new();
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();

        registry.set_online("u1", c1);
        registry.set_online("u2", c2);

        registry.remove_by_connection(c1);
        assert_eq!(registry.lookup("u1"), None);
        assert_eq!(registry.lookup("u2"), Some(c2));
        assert_eq!(registry.roster(), vec!["u2".to_string()]);
    }

    #[test]
    fn remove_by_connection_removes_all_matches() {
        let registry = PresenceRegistry::new();
        let shared = Uuid::new_v4();

        registry.set_online("u1", shared);
        registry.set_online("u2", shared);
        registry.set_online("u3", Uuid::new_v4());

        registry.remove_by_connection(shared);
        assert_eq!(registry.roster(), vec!["u3".to_string()]);
    }

    #[test]
    fn replay_matches_sequential_application() {
        // Applying a mutation sequence always equals replaying it against
        // an empty registry.
        let c = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

        let apply = |registry: &PresenceRegistry| {
            registry.set_online("a", c[0]);
            registry.set_online("b", c[1]);
            registry.set_offline("a");
            registry.set_online("a", c[2]);
            registry.remove_by_connection(c[1]);
            registry.set_offline("missing");
        };

        let first = PresenceRegistry::new();
        apply(&first);
        let replay = PresenceRegistry::new();
        apply(&replay);

        assert_eq!(first.roster(), replay.roster());
        assert_eq!(first.roster(), vec!["a".to_string()]);
        assert_eq!(first.lookup("a"), Some(c[2]));
        assert_eq!(first.lookup("b"), None);
    }

    #[test]
    fn roster_is_sorted() {
        let registry = PresenceRegistry::new();
        registry.set_online("zeta", Uuid::new_v4());
        registry.set_online("alpha", Uuid::new_v4());
        registry.set_online("mid", Uuid::new_v4());

        assert_eq!(
            registry.roster(),
            vec!["alpha".to_string(), "mid".to_string(), "zeta".to_string()]
        );
    }
}
