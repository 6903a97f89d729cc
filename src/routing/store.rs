//! Bounded message store
//!
//! Entries are kept in admission order under a key that is never reused,
//! so a stale key held by the scheduler or a pending handoff simply stops
//! resolving once its entry is gone.

use crate::routing::error::{StoreError, StoreResult};
use crate::routing::types::{EntryState, MessageKey, NodeAddress, Payload, ProtocolHeader};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use std::time::Duration;
use tokio::time::Instant;

/// Stable handle to a queued entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey(u64);

/// A queued message and its expiry deadline
#[derive(Debug, Clone)]
pub struct MessageEntry {
    pub header: ProtocolHeader,
    pub payload: Payload,
    pub admitted_at: Instant,
    pub expires_at: Instant,
}

impl MessageEntry {
    pub fn key(&self) -> MessageKey {
        self.header.key()
    }

    pub fn copies(&self) -> u16 {
        self.header.copies
    }

    /// Time since admission
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.admitted_at)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn state(&self, local: NodeAddress) -> EntryState {
        if self.header.originator == local {
            EntryState::Fresh
        } else if self.header.copies == 0 {
            EntryState::PendingGrant
        } else {
            EntryState::Granted
        }
    }
}

pub struct MessageStore {
    entries: BTreeMap<EntryKey, MessageEntry>,
    index: HashMap<MessageKey, EntryKey>,
    capacity: usize,
    next_key: u64,
}

impl MessageStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            index: HashMap::with_capacity(capacity),
            capacity,
            next_key: 0,
        }
    }

    /// Append an entry that expires `lifetime` after `now`.
    ///
    /// A full store rejects the newcomer; nothing already queued is evicted.
    pub fn admit(
        &mut self,
        header: ProtocolHeader,
        payload: Payload,
        lifetime: Duration,
        now: Instant,
    ) -> StoreResult<EntryKey> {
        if self.is_full() {
            return Err(StoreError::QueueFull(self.capacity));
        }

        let identity = header.key();
        if self.index.contains_key(&identity) {
            return Err(StoreError::Duplicate(identity));
        }

        let key = EntryKey(self.next_key);
        self.next_key += 1;

        self.entries.insert(
            key,
            MessageEntry {
                header,
                payload,
                admitted_at: now,
                expires_at: now + lifetime,
            },
        );
        self.index.insert(identity, key);

        Ok(key)
    }

    pub fn find(&self, identity: &MessageKey) -> Option<EntryKey> {
        self.index.get(identity).copied()
    }

    pub fn get(&self, key: EntryKey) -> Option<&MessageEntry> {
        self.entries.get(&key)
    }

    /// Overwrite the copy budget, returning the previous one
    pub fn set_copies(&mut self, key: EntryKey, copies: u16) -> Option<u16> {
        self.entries
            .get_mut(&key)
            .map(|entry| std::mem::replace(&mut entry.header.copies, copies))
    }

    /// Rearm the expiry; the previous deadline no longer applies
    pub fn reset_expiry(&mut self, key: EntryKey, lifetime: Duration, now: Instant) -> bool {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.expires_at = now + lifetime;
                true
            }
            None => false,
        }
    }

    /// Detach an entry. Removing twice is harmless.
    pub fn remove(&mut self, key: EntryKey) -> Option<MessageEntry> {
        let entry = self.entries.remove(&key)?;
        self.index.remove(&entry.key());
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn first(&self) -> Option<EntryKey> {
        self.entries.keys().next().copied()
    }

    /// Entry admitted after `key`. Works even if `key` was removed meanwhile.
    pub fn next_after(&self, key: EntryKey) -> Option<EntryKey> {
        self.entries
            .range((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(k, _)| *k)
    }

    pub fn is_tail(&self, key: EntryKey) -> bool {
        self.next_after(key).is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryKey, &MessageEntry)> {
        self.entries.iter().map(|(k, e)| (*k, e))
    }

    /// Earliest pending expiry deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.expires_at).min()
    }

    /// Remove and return every entry whose deadline has passed
    pub fn expire(&mut self, now: Instant) -> Vec<(EntryKey, MessageEntry)> {
        let expired: Vec<EntryKey> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| *k)
            .collect();

        expired
            .into_iter()
            .filter_map(|key| self.remove(key).map(|entry| (key, entry)))
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            queued: self.entries.len(),
            capacity: self.capacity,
            pending_grant: self.entries.values().filter(|e| e.copies() == 0).count(),
            total_copies: self.entries.values().map(|e| e.copies() as u64).sum(),
        }
    }
}

/// Store occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub queued: usize,
    pub capacity: usize,
    pub pending_grant: usize,
    pub total_copies: u64,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queue: {}/{} entries, {} awaiting grant, {} copies held",
            self.queued, self.capacity, self.pending_grant, self.total_copies
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIFETIME: Duration = Duration::from_secs(60);

    fn header(id: u16) -> ProtocolHeader {
        ProtocolHeader::new(NodeAddress::from_byte(1), NodeAddress::from_byte(2), id, 8)
    }

    #[test]
    fn test_admit_and_find() {
        let now = Instant::now();
        let mut store = MessageStore::new(5);

        let key = store.admit(header(1), Payload::zeroed(), LIFETIME, now).unwrap();

        assert_eq!(store.find(&header(1).key()), Some(key));
        assert_eq!(store.get(key).unwrap().copies(), 8);
        assert!(store.find(&header(2).key()).is_none());
    }

    #[test]
    fn test_entry_age() {
        let now = Instant::now();
        let mut store = MessageStore::new(5);
        let key = store.admit(header(1), Payload::zeroed(), LIFETIME, now).unwrap();

        let entry = store.get(key).unwrap();
        assert_eq!(entry.age(now + Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(entry.age(now), Duration::ZERO);
    }

    #[test]
    fn test_identity_includes_originator() {
        let now = Instant::now();
        let mut store = MessageStore::new(5);

        let a = header(1);
        let mut b = header(1);
        b.originator = NodeAddress::from_byte(9);

        store.admit(a, Payload::zeroed(), LIFETIME, now).unwrap();
        store.admit(b, Payload::zeroed(), LIFETIME, now).unwrap();
        assert_eq!(store.len(), 2);

        let dup = store.admit(a.with_copies(0), Payload::zeroed(), LIFETIME, now);
        assert!(matches!(dup, Err(StoreError::Duplicate(_))));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_full_store_rejects_newcomer() {
        let now = Instant::now();
        let mut store = MessageStore::new(3);

        for id in 0..3 {
            store.admit(header(id), Payload::zeroed(), LIFETIME, now).unwrap();
        }

        let result = store.admit(header(3), Payload::zeroed(), LIFETIME, now);
        assert_eq!(result, Err(StoreError::QueueFull(3)));
        assert_eq!(store.len(), 3);
        assert!(store.find(&header(0).key()).is_some());
        assert!(store.find(&header(3).key()).is_none());
    }

    #[test]
    fn test_capacity_holds_under_churn() {
        let now = Instant::now();
        let mut store = MessageStore::new(4);
        let mut keys = Vec::new();

        for id in 0..40u16 {
            if let Ok(key) = store.admit(header(id), Payload::zeroed(), LIFETIME, now) {
                keys.push(key);
            }
            if id % 3 == 0 {
                if let Some(key) = keys.pop() {
                    store.remove(key);
                }
            }
            assert!(store.len() <= store.capacity());
        }
    }

    #[test]
    fn test_remove_is_idempotent() {
        let now = Instant::now();
        let mut store = MessageStore::new(5);
        let key = store.admit(header(1), Payload::zeroed(), LIFETIME, now).unwrap();

        assert!(store.remove(key).is_some());
        assert!(store.remove(key).is_none());
        assert!(store.find(&header(1).key()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_traversal_order_survives_removal() {
        let now = Instant::now();
        let mut store = MessageStore::new(5);
        let a = store.admit(header(1), Payload::zeroed(), LIFETIME, now).unwrap();
        let b = store.admit(header(2), Payload::zeroed(), LIFETIME, now).unwrap();
        let c = store.admit(header(3), Payload::zeroed(), LIFETIME, now).unwrap();

        assert_eq!(store.first(), Some(a));
        assert_eq!(store.next_after(a), Some(b));
        assert!(store.is_tail(c));

        store.remove(b);
        assert_eq!(store.next_after(b), Some(c));
        assert_eq!(store.next_after(a), Some(c));
    }

    #[test]
    fn test_expiry() {
        let now = Instant::now();
        let mut store = MessageStore::new(5);
        let short = store
            .admit(header(1), Payload::zeroed(), Duration::from_secs(1), now)
            .unwrap();
        store.admit(header(2), Payload::zeroed(), LIFETIME, now).unwrap();

        assert_eq!(store.next_deadline(), Some(now + Duration::from_secs(1)));
        assert!(store.expire(now + Duration::from_millis(500)).is_empty());

        let expired = store.expire(now + Duration::from_secs(2));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, short);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reset_expiry_supersedes_deadline() {
        let now = Instant::now();
        let mut store = MessageStore::new(5);
        let key = store
            .admit(header(1), Payload::zeroed(), Duration::from_secs(1), now)
            .unwrap();

        store.reset_expiry(key, LIFETIME, now);
        assert!(store.expire(now + Duration::from_secs(2)).is_empty());
        assert_eq!(store.expire(now + LIFETIME).len(), 1);
    }

    #[test]
    fn test_stats() {
        let now = Instant::now();
        let mut store = MessageStore::new(5);
        store.admit(header(1), Payload::zeroed(), LIFETIME, now).unwrap();
        store
            .admit(header(2).with_copies(0), Payload::zeroed(), LIFETIME, now)
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.pending_grant, 1);
        assert_eq!(stats.total_copies, 8);
    }
}
