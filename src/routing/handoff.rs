//! Bookkeeping for reliable handoffs whose outcome has not arrived yet

use crate::routing::store::EntryKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier the transport echoes back with a reliable-send outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandoffId(pub u32);

impl fmt::Display for HandoffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handoff-{}", self.0)
    }
}

/// How outstanding handoffs are remembered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffTracking {
    /// Every in-flight handoff keeps its own entry reference
    #[default]
    PerHandoff,
    /// One slot shared by all handoffs. Starting a second handoff before
    /// the first completes overwrites the slot, so the first outcome is
    /// applied to the second entry (or lost). Kept for compatibility with
    /// deployed nodes.
    SingleSlot,
}

#[derive(Debug)]
pub struct HandoffTracker {
    mode: HandoffTracking,
    next_id: u32,
    slot: Option<EntryKey>,
    in_flight: HashMap<HandoffId, EntryKey>,
}

impl HandoffTracker {
    pub fn new(mode: HandoffTracking) -> Self {
        Self {
            mode,
            next_id: 0,
            slot: None,
            in_flight: HashMap::new(),
        }
    }

    pub fn begin(&mut self, entry: EntryKey) -> HandoffId {
        let id = HandoffId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        match self.mode {
            HandoffTracking::PerHandoff => {
                self.in_flight.insert(id, entry);
            }
            HandoffTracking::SingleSlot => {
                self.slot = Some(entry);
            }
        }
        id
    }

    /// Entry whose handoff succeeded, or `None` for a stale completion
    pub fn complete(&mut self, id: HandoffId) -> Option<EntryKey> {
        match self.mode {
            HandoffTracking::PerHandoff => self.in_flight.remove(&id),
            HandoffTracking::SingleSlot => self.slot.take(),
        }
    }

    /// Forget a handoff that exhausted its retransmissions
    pub fn fail(&mut self, id: HandoffId) -> Option<EntryKey> {
        match self.mode {
            HandoffTracking::PerHandoff => self.in_flight.remove(&id),
            // the slot may already belong to a newer handoff
            HandoffTracking::SingleSlot => None,
        }
    }

    pub fn in_flight(&self) -> usize {
        match self.mode {
            HandoffTracking::PerHandoff => self.in_flight.len(),
            HandoffTracking::SingleSlot => usize::from(self.slot.is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::store::MessageStore;
    use crate::routing::types::{NodeAddress, Payload, ProtocolHeader};
    use std::time::Duration;
    use tokio::time::Instant;

    fn two_entries() -> (EntryKey, EntryKey) {
        let mut store = MessageStore::new(5);
        let mut keys = (0..2u16).map(|id| {
            let header =
                ProtocolHeader::new(NodeAddress::from_byte(1), NodeAddress::from_byte(2), id, 8);
            store
                .admit(header, Payload::zeroed(), Duration::from_secs(60), Instant::now())
                .unwrap()
        });
        let a = keys.next().unwrap();
        let b = keys.next().unwrap();
        (a, b)
    }

    #[test]
    fn test_per_handoff_keeps_both() {
        let (a, b) = two_entries();
        let mut tracker = HandoffTracker::new(HandoffTracking::PerHandoff);

        let first = tracker.begin(a);
        let second = tracker.begin(b);
        assert_ne!(first, second);
        assert_eq!(tracker.in_flight(), 2);

        assert_eq!(tracker.complete(first), Some(a));
        assert_eq!(tracker.complete(second), Some(b));
        assert_eq!(tracker.complete(second), None);
    }

    #[test]
    fn test_single_slot_overwrites() {
        let (a, b) = two_entries();
        let mut tracker = HandoffTracker::new(HandoffTracking::SingleSlot);

        let first = tracker.begin(a);
        let _second = tracker.begin(b);
        assert_eq!(tracker.in_flight(), 1);

        // the first completion is attributed to the newest entry
        assert_eq!(tracker.complete(first), Some(b));
        assert_eq!(tracker.complete(first), None);
    }

    #[test]
    fn test_failure_forgets_handoff() {
        let (a, _) = two_entries();
        let mut tracker = HandoffTracker::new(HandoffTracking::PerHandoff);

        let id = tracker.begin(a);
        assert_eq!(tracker.fail(id), Some(a));
        assert_eq!(tracker.complete(id), None);
        assert_eq!(tracker.in_flight(), 0);
    }
}
