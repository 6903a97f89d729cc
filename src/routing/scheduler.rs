//! Broadcast scheduler
//!
//! Walks the store cyclically, one entry per tick. Steps inside a cycle
//! are paced by `packet_delay`; finishing a cycle (or finding the store
//! empty) waits `queue_delay`, so a listening relay gets a window to
//! answer before the next advertisement.

use crate::routing::store::{EntryKey, MessageStore};
use std::time::Duration;

/// Outcome of one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Entry to advertise now, if any
    pub advert: Option<EntryKey>,
    /// When the next tick is due
    pub next_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct BroadcastScheduler {
    packet_delay: Duration,
    queue_delay: Duration,
    /// Last entry the walk visited, sent or skipped
    cursor: Option<EntryKey>,
    last_advertised: Option<EntryKey>,
}

impl BroadcastScheduler {
    pub fn new(packet_delay: Duration, queue_delay: Duration) -> Self {
        Self {
            packet_delay,
            queue_delay,
            cursor: None,
            last_advertised: None,
        }
    }

    /// Delay before the first tick after start
    pub fn initial_delay(&self) -> Duration {
        self.queue_delay
    }

    pub fn last_advertised(&self) -> Option<EntryKey> {
        self.last_advertised
    }

    pub fn tick(&mut self, store: &MessageStore) -> Tick {
        let candidate = match self
            .cursor
            .and_then(|cursor| store.next_after(cursor))
            .or_else(|| store.first())
        {
            Some(key) => key,
            None => {
                return Tick {
                    advert: None,
                    next_delay: self.queue_delay,
                }
            }
        };
        self.cursor = Some(candidate);

        let copies = store.get(candidate).map(|e| e.copies()).unwrap_or(0);
        if copies < 1 {
            return Tick {
                advert: None,
                next_delay: self.packet_delay,
            };
        }

        self.last_advertised = Some(candidate);
        let next_delay = if store.is_tail(candidate) {
            self.queue_delay
        } else {
            self.packet_delay
        };

        Tick {
            advert: Some(candidate),
            next_delay,
        }
    }
}
