//! Connection registry.
//!
//! Maps each [`UserId`] to the single connection currently serving it.
//! The registry is plain data: it has no locking and no I/O. The server
//! crate gives exactly one task ownership of it, which is what makes
//! every lookup a consistent snapshot.
//!
//! Rules:
//! - `register` replaces any earlier entry for the same user and hands the
//!   replaced entry back, so the caller can drop (close) its mailbox.
//! - `unregister` only removes the entry if it still belongs to the given
//!   connection. A late unregister from a replaced connection is a no-op.
//!
//! The registry is generic over the mailbox type `M` so it can be driven
//! by channel senders in production and by plain vectors in tests.

use std::collections::HashMap;

use crate::identity::{ConnectionId, Identity, UserId};

/// One registered connection.
#[derive(Debug)]
pub struct Entry<M> {
    pub conn_id: ConnectionId,
    pub identity: Identity,
    pub mailbox: M,
}

/// Result of routing one direct message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Queued onto the receiver's mailbox.
    Delivered,

    /// Receiver not registered; the message is dropped silently.
    Miss,

    /// Receiver's mailbox was full and the frame was discarded.
    Dropped,

    /// Receiver's mailbox was full and the receiver was disconnected.
    Evicted,
}

/// `user_id -> Entry` map.
#[derive(Debug)]
pub struct Registry<M> {
    entries: HashMap<UserId, Entry<M>>,
}

impl<M> Default for Registry<M> {
    fn default() -> Self {
        Registry {
            entries: HashMap::new(),
        }
    }
}

impl<M> Registry<M> {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Insert a connection, keyed by its user id.
    ///
    /// Returns the entry it replaced, if any.
    pub fn register(
        &mut self,
        conn_id: ConnectionId,
        identity: Identity,
        mailbox: M,
    ) -> Option<Entry<M>> {
        let user_id = identity.user_id;
        self.entries.insert(
            user_id,
            Entry {
                conn_id,
                identity,
                mailbox,
            },
        )
    }

    /// Remove `user_id` only if its entry belongs to `conn_id`.
    pub fn unregister(&mut self, conn_id: ConnectionId, user_id: UserId) -> Option<Entry<M>> {
        match self.entries.get(&user_id) {
            Some(entry) if entry.conn_id == conn_id => self.entries.remove(&user_id),
            _ => None,
        }
    }

    /// Remove `user_id` regardless of which connection serves it.
    pub fn evict(&mut self, user_id: UserId) -> Option<Entry<M>> {
        self.entries.remove(&user_id)
    }

    /// The entry currently serving `user_id`.
    pub fn get(&self, user_id: UserId) -> Option<&Entry<M>> {
        self.entries.get(&user_id)
    }

    /// Same as [`Registry::get`], for mailboxes written through `&mut`
    /// (plain buffers rather than channel senders).
    pub fn get_mut(&mut self, user_id: UserId) -> Option<&mut Entry<M>> {
        self.entries.get_mut(&user_id)
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.entries.contains_key(&user_id)
    }

    /// Every entry except the one for `except`.
    pub fn others(&self, except: UserId) -> impl Iterator<Item = &Entry<M>> {
        self.entries
            .iter()
            .filter(move |(id, _)| **id != except)
            .map(|(_, entry)| entry)
    }

    pub fn others_mut(&mut self, except: UserId) -> impl Iterator<Item = &mut Entry<M>> {
        self.entries
            .iter_mut()
            .filter(move |(id, _)| **id != except)
            .map(|(_, entry)| entry)
    }

    /// Identities of everyone currently registered, ordered by user id.
    pub fn identities(&self) -> Vec<Identity> {
        let mut out: Vec<Identity> = self
            .entries
            .values()
            .map(|entry| entry.identity.clone())
            .collect();
        out.sort_by_key(|identity| identity.user_id);
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new(1, "alice")
    }

    fn bob() -> Identity {
        Identity::new(2, "bob")
    }

    #[test]
    fn register_then_lookup() {
        let mut registry = Registry::new();
        assert!(registry.register(ConnectionId(1), alice(), "a").is_none());
        assert!(registry.register(ConnectionId(2), bob(), "b").is_none());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(UserId(1)).map(|e| e.mailbox), Some("a"));
        assert!(registry.get(UserId(3)).is_none());
    }

    #[test]
    fn reregister_returns_replaced_entry() {
        let mut registry = Registry::new();
        registry.register(ConnectionId(1), alice(), "old");

        let replaced = registry
            .register(ConnectionId(5), alice(), "new")
            .expect("old entry handed back");

        assert_eq!(replaced.conn_id, ConnectionId(1));
        assert_eq!(replaced.mailbox, "old");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(UserId(1)).map(|e| e.conn_id), Some(ConnectionId(5)));
    }

    #[test]
    fn stale_unregister_keeps_newer_connection() {
        let mut registry = Registry::new();
        registry.register(ConnectionId(1), alice(), ());
        registry.register(ConnectionId(2), alice(), ());

        assert!(registry.unregister(ConnectionId(1), UserId(1)).is_none());
        assert!(registry.contains(UserId(1)));

        assert!(registry.unregister(ConnectionId(2), UserId(1)).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_twice_is_noop() {
        let mut registry = Registry::new();
        registry.register(ConnectionId(1), alice(), ());

        assert!(registry.unregister(ConnectionId(1), UserId(1)).is_some());
        assert!(registry.unregister(ConnectionId(1), UserId(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn get_mut_writes_through_to_the_entry() {
        let mut registry = Registry::new();
        registry.register(ConnectionId(1), alice(), Vec::new());

        registry.get_mut(UserId(1)).unwrap().mailbox.push("hi");
        assert!(registry.get_mut(UserId(2)).is_none());

        assert_eq!(registry.get(UserId(1)).unwrap().mailbox, vec!["hi"]);
    }

    #[test]
    fn others_excludes_subject() {
        let mut registry = Registry::new();
        registry.register(ConnectionId(1), alice(), ());
        registry.register(ConnectionId(2), bob(), ());
        registry.register(ConnectionId(3), Identity::new(3, "carol"), ());

        let mut ids: Vec<i64> = registry.others(UserId(2)).map(|e| e.identity.user_id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);

        assert_eq!(registry.others_mut(UserId(9)).count(), 3);
    }

    #[test]
    fn identities_are_sorted() {
        let mut registry = Registry::new();
        registry.register(ConnectionId(1), bob(), ());
        registry.register(ConnectionId(2), alice(), ());

        assert_eq!(registry.identities(), vec![alice(), bob()]);
    }

    #[test]
    fn evict_ignores_connection() {
        let mut registry = Registry::new();
        registry.register(ConnectionId(8), bob(), ());
        assert!(registry.evict(UserId(2)).is_some());
        assert!(registry.evict(UserId(2)).is_none());
    }
}
