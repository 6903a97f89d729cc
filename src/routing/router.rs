//! Spray-and-wait routing state machine
//!
//! The router is sans-io: it is fed inbound frames, reliable-send outcomes
//! and timer ticks together with the current time, and queues the frames to
//! send as [`Action`]s and the application-visible outcomes as
//! [`RoutingEvent`]s. The node task drains both after every call.

use crate::metrics::recorder;
use crate::network::{Channel, TransportEvent};
use crate::routing::config::SprayConfig;
use crate::routing::copies::{ceiling_halve, LifetimePolicy};
use crate::routing::error::WireError;
use crate::routing::handoff::{HandoffId, HandoffTracker};
use crate::routing::scheduler::BroadcastScheduler;
use crate::routing::store::{MessageStore, StoreStats};
use crate::routing::types::{EntryState, MessageKey, NodeAddress, Payload, ProtocolHeader};
use crate::routing::wire;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// How many delivered identities the destination remembers
const DELIVERED_WINDOW: usize = 32;

/// A frame the router wants on the air
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Broadcast {
        frame: Bytes,
    },
    Unicast {
        to: NodeAddress,
        frame: Bytes,
    },
    Reliable {
        to: NodeAddress,
        frame: Bytes,
        handoff: HandoffId,
        max_retransmissions: u8,
    },
}

/// Routing outcomes reported to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingEvent {
    /// A message addressed to this node arrived (reported once per message)
    MessageReceived {
        key: MessageKey,
        from: NodeAddress,
        payload: Payload,
    },
    /// The destination confirmed a message this node held
    DeliveryConfirmed { key: MessageKey },
    /// A custodian handed this node a share of the budget
    CopiesGranted {
        key: MessageKey,
        copies: u16,
        from: NodeAddress,
    },
    /// A handoff was acknowledged; `retained` is the budget kept here
    HandoffCompleted {
        key: MessageKey,
        to: NodeAddress,
        retained: u16,
    },
    HandoffTimedOut {
        handoff: HandoffId,
        to: NodeAddress,
    },
    EntryExpired {
        key: MessageKey,
        state: EntryState,
    },
}

pub struct Router {
    local: NodeAddress,
    config: SprayConfig,
    lifetime: Box<dyn LifetimePolicy>,
    store: MessageStore,
    scheduler: BroadcastScheduler,
    handoffs: HandoffTracker,
    /// Next local message id; wraps after 65 536 messages
    sequence: u16,
    delivered: VecDeque<MessageKey>,
    actions: Vec<Action>,
    events: Vec<RoutingEvent>,
}

impl Router {
    pub fn new(local: NodeAddress, config: SprayConfig) -> Self {
        let lifetime = config.lifetime_policy();
        Self {
            local,
            lifetime,
            store: MessageStore::new(config.queue_capacity),
            scheduler: BroadcastScheduler::new(config.packet_delay, config.queue_delay),
            handoffs: HandoffTracker::new(config.handoff_tracking),
            sequence: 0,
            delivered: VecDeque::with_capacity(DELIVERED_WINDOW),
            actions: Vec::new(),
            events: Vec::new(),
            config,
        }
    }

    /// Replace the lifetime policy chosen by the config
    pub fn with_lifetime_policy(mut self, policy: Box<dyn LifetimePolicy>) -> Self {
        self.lifetime = policy;
        self
    }

    pub fn local(&self) -> NodeAddress {
        self.local
    }

    pub fn queue_depth(&self) -> usize {
        self.store.len()
    }

    /// Reliable handoffs whose outcome has not been reported yet
    pub fn handoffs_in_flight(&self) -> usize {
        self.handoffs.in_flight()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn entry_state(&self, key: &MessageKey) -> Option<EntryState> {
        self.store
            .find(key)
            .and_then(|entry| self.store.get(entry))
            .map(|entry| entry.state(self.local))
    }

    pub fn copies_of(&self, key: &MessageKey) -> Option<u16> {
        self.store
            .find(key)
            .and_then(|entry| self.store.get(entry))
            .map(|entry| entry.copies())
    }

    /// Delay before the first scheduler tick
    pub fn initial_delay(&self) -> Duration {
        self.scheduler.initial_delay()
    }

    /// Earliest pending expiry
    pub fn next_deadline(&self) -> Option<Instant> {
        self.store.next_deadline()
    }

    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    pub fn take_events(&mut self) -> Vec<RoutingEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queue a new locally originated message.
    ///
    /// Returns `None` when the store cannot take it.
    pub fn submit(
        &mut self,
        payload: Payload,
        destination: NodeAddress,
        now: Instant,
    ) -> Option<MessageKey> {
        if self.store.is_full() {
            tracing::debug!(queued = self.store.len(), "store full, submit rejected");
            recorder::record_admission_rejected();
            return None;
        }

        let copies = self.config.initial_copies;
        let header = ProtocolHeader::new(self.local, destination, self.sequence, copies);
        self.sequence = self.sequence.wrapping_add(1);

        let lifetime = self.lifetime.lifetime_for(copies, self.store.len());
        match self.store.admit(header, payload, lifetime, now) {
            Ok(_) => {
                let key = header.key();
                tracing::debug!(%key, copies, ?lifetime, "message queued");
                Some(key)
            }
            Err(e) => {
                // only reachable once the id space wrapped onto a live entry
                tracing::debug!("submit rejected: {e}");
                recorder::record_admission_rejected();
                None
            }
        }
    }

    /// Scheduler timer fired. Returns the delay until the next tick.
    pub fn on_tick(&mut self, now: Instant) -> Duration {
        self.expire(now);

        let tick = self.scheduler.tick(&self.store);
        if let Some(entry) = tick.advert.and_then(|key| self.store.get(key)) {
            tracing::trace!(key = %entry.key(), copies = entry.copies(), "advertising");
            self.actions.push(Action::Broadcast {
                frame: wire::encode_advert(&entry.header, &entry.payload),
            });
            recorder::record_advert_sent();
        }

        tick.next_delay
    }

    pub fn handle_transport(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Frame {
                from,
                channel,
                data,
            } => self.handle_frame(from, channel, &data, now),
            TransportEvent::HandoffSent { handoff, to, .. } => self.on_handoff_sent(handoff, to),
            TransportEvent::HandoffTimedOut { handoff, to, .. } => {
                self.on_handoff_timed_out(handoff, to)
            }
        }
    }

    pub fn handle_frame(&mut self, from: NodeAddress, channel: Channel, data: &[u8], now: Instant) {
        let frame = match wire::decode(data) {
            Ok(frame) => frame,
            Err(WireError::ProtocolMismatch { version, magic }) => {
                tracing::trace!(%from, version, ?magic, "foreign frame ignored");
                recorder::record_frame_ignored("protocol_mismatch");
                return;
            }
            Err(e) => {
                tracing::trace!(%from, "malformed frame: {e}");
                recorder::record_frame_ignored("malformed");
                return;
            }
        };

        match channel {
            Channel::Broadcast => self.on_advert(from, frame.header, frame.payload, now),
            Channel::Unicast => self.on_request(from, frame.header),
            Channel::Reliable => self.on_grant(from, frame.header, now),
        }
    }

    fn on_advert(
        &mut self,
        from: NodeAddress,
        header: ProtocolHeader,
        payload: Option<Payload>,
        now: Instant,
    ) {
        let key = header.key();

        if header.originator == self.local {
            recorder::record_frame_ignored("echo");
            return;
        }

        let for_us = header.destination == self.local;
        if header.copies == 1 && !for_us {
            recorder::record_frame_ignored("destination_only");
            return;
        }

        if for_us {
            if !self.delivered.contains(&key) {
                if self.delivered.len() == DELIVERED_WINDOW {
                    self.delivered.pop_front();
                }
                self.delivered.push_back(key);

                tracing::debug!(%key, %from, "message received");
                recorder::record_message_received();
                self.events.push(RoutingEvent::MessageReceived {
                    key,
                    from,
                    payload: payload.unwrap_or_default(),
                });
            }
            // answered every time so each custodian learns of the delivery
            self.request(from, &header);
            return;
        }

        if let Some(existing) = self.store.find(&key) {
            let held = self.store.get(existing).map(|e| e.header);
            match held {
                Some(held) if held.copies > 0 => {
                    recorder::record_frame_ignored("already_held");
                }
                Some(held) => {
                    // still waiting for a grant, ask again
                    self.request(from, &held);
                }
                None => {}
            }
            return;
        }

        if self.store.is_full() {
            tracing::trace!(%key, "store full, advertisement dropped");
            recorder::record_admission_rejected();
            return;
        }

        let placeholder = header.with_copies(0);
        let admitted = self.store.admit(
            placeholder,
            payload.unwrap_or_default(),
            self.config.unconfirmed_timeout,
            now,
        );
        if admitted.is_ok() {
            tracing::debug!(%key, %from, "awaiting grant");
            self.request(from, &placeholder);
        }
    }

    fn request(&mut self, to: NodeAddress, header: &ProtocolHeader) {
        self.actions.push(Action::Unicast {
            to,
            frame: wire::encode_header(header),
        });
        recorder::record_request_sent();
    }

    fn on_request(&mut self, from: NodeAddress, header: ProtocolHeader) {
        let key = header.key();
        let Some(entry_key) = self.store.find(&key) else {
            recorder::record_frame_ignored("unknown_entry");
            return;
        };
        let Some(held) = self.store.get(entry_key).map(|e| e.header) else {
            return;
        };

        if held.destination == from {
            self.store.remove(entry_key);
            tracing::debug!(%key, "delivery confirmed");
            recorder::record_delivery_confirmed();
            self.events.push(RoutingEvent::DeliveryConfirmed { key });
            return;
        }

        if held.copies == 0 {
            recorder::record_frame_ignored("no_copies");
            return;
        }

        let grant = ceiling_halve(held.copies);
        let handoff = self.handoffs.begin(entry_key);
        tracing::debug!(%key, to = %from, grant, %handoff, "handing off copies");

        self.actions.push(Action::Reliable {
            to: from,
            frame: wire::encode_header(&held.with_copies(grant)),
            handoff,
            max_retransmissions: self.config.max_retransmissions,
        });
        recorder::record_handoff_started();
    }

    fn on_grant(&mut self, from: NodeAddress, header: ProtocolHeader, now: Instant) {
        let key = header.key();
        let Some(entry_key) = self.store.find(&key) else {
            recorder::record_frame_ignored("unknown_entry");
            return;
        };
        if header.copies == 0 {
            recorder::record_frame_ignored("empty_grant");
            return;
        }

        let lifetime = self.lifetime.lifetime_for(header.copies, self.store.len());
        self.store.set_copies(entry_key, header.copies);
        self.store.reset_expiry(entry_key, lifetime, now);

        tracing::debug!(%key, %from, copies = header.copies, ?lifetime, "copies granted");
        recorder::record_copies_granted();
        self.events.push(RoutingEvent::CopiesGranted {
            key,
            copies: header.copies,
            from,
        });
    }

    pub fn on_handoff_sent(&mut self, handoff: HandoffId, to: NodeAddress) {
        let Some(entry_key) = self.handoffs.complete(handoff) else {
            tracing::trace!(%handoff, "stale handoff completion");
            recorder::record_frame_ignored("stale_completion");
            return;
        };
        let Some(held) = self.store.get(entry_key).map(|e| e.header) else {
            tracing::trace!(%handoff, "handoff completed for a removed entry");
            return;
        };

        let retained = ceiling_halve(held.copies);
        self.store.set_copies(entry_key, retained);

        let key = held.key();
        tracing::debug!(%key, %to, retained, "handoff completed");
        recorder::record_handoff_completed();
        self.events.push(RoutingEvent::HandoffCompleted { key, to, retained });
    }

    /// The entry keeps its budget and is offered again next cycle
    pub fn on_handoff_timed_out(&mut self, handoff: HandoffId, to: NodeAddress) {
        self.handoffs.fail(handoff);
        tracing::debug!(%handoff, %to, "handoff timed out");
        recorder::record_handoff_timed_out();
        self.events.push(RoutingEvent::HandoffTimedOut { handoff, to });
    }

    /// Evict every entry whose deadline has passed
    pub fn expire(&mut self, now: Instant) -> usize {
        let expired = self.store.expire(now);
        for (_, entry) in &expired {
            let key = entry.key();
            let state = entry.state(self.local);
            tracing::debug!(%key, ?state, "entry expired");
            self.events.push(RoutingEvent::EntryExpired { key, state });
        }
        if !expired.is_empty() {
            recorder::record_entries_expired(expired.len());
        }
        expired.len()
    }

    /// Log every queued entry at trace level
    pub fn dump_queue(&self, now: Instant) {
        tracing::trace!(local = %self.local, "{}", self.store.stats());
        for (slot, entry) in self.store.iter() {
            tracing::trace!(
                ?slot,
                key = %entry.key(),
                copies = entry.copies(),
                age = ?entry.age(now),
                expires_in = ?entry.expires_at.saturating_duration_since(now),
                payload = ?entry.payload,
                "queued"
            );
        }
    }
}
