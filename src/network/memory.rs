//! Simulated radio medium for in-process nodes
//!
//! Every attached node shares one medium. Links are up by default and can
//! be cut and restored to model intermittent contacts; each frame is lost
//! with the configured probability. Reliable unicast retries a lost frame
//! up to its retransmission bound and reports the outcome to the sender.

use crate::network::error::{NetworkError, NetworkResult};
use crate::network::transport::Transport;
use crate::network::types::{Channel, EventSender, TransportEvent};
use crate::routing::{ChannelSet, HandoffId, NodeAddress};
use bytes::Bytes;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Configuration for the simulated medium
#[derive(Debug, Clone, Default)]
pub struct MediumConfig {
    /// Per-frame loss probability (0.0 - 1.0)
    pub loss_rate: f32,
    /// Seed for reproducible loss patterns
    pub seed: Option<u64>,
}

impl MediumConfig {
    /// Lossless medium
    pub fn perfect() -> Self {
        Self::default()
    }

    pub fn with_loss(loss_rate: f32) -> Self {
        Self {
            loss_rate,
            ..Default::default()
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Statistics collected by the medium
#[derive(Debug, Default)]
pub struct MediumStats {
    pub frames_sent: AtomicU64,
    pub frames_lost: AtomicU64,
    pub frames_delivered: AtomicU64,
    pub reliable_sends: AtomicU64,
    pub reliable_timeouts: AtomicU64,
}

impl MediumStats {
    pub fn actual_loss_rate(&self) -> f32 {
        let sent = self.frames_sent.load(Ordering::Relaxed);
        let lost = self.frames_lost.load(Ordering::Relaxed);
        if sent > 0 {
            lost as f32 / sent as f32
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Sent: {}, Delivered: {}, Lost: {} ({:.1}%), Reliable: {} ({} timed out)",
            self.frames_sent.load(Ordering::Relaxed),
            self.frames_delivered.load(Ordering::Relaxed),
            self.frames_lost.load(Ordering::Relaxed),
            self.actual_loss_rate() * 100.0,
            self.reliable_sends.load(Ordering::Relaxed),
            self.reliable_timeouts.load(Ordering::Relaxed),
        )
    }
}

fn channel_number(channels: &ChannelSet, channel: Channel) -> u16 {
    match channel {
        Channel::Broadcast => channels.broadcast,
        Channel::Unicast => channels.unicast,
        Channel::Reliable => channels.reliable,
    }
}

fn link_key(a: NodeAddress, b: NodeAddress) -> (NodeAddress, NodeAddress) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Default)]
struct Port {
    channels: Option<ChannelSet>,
    events: Option<EventSender>,
}

struct Medium {
    loss_rate: f32,
    rng: StdRng,
    ports: HashMap<NodeAddress, Port>,
    down: HashSet<(NodeAddress, NodeAddress)>,
}

impl Medium {
    fn link_up(&self, a: NodeAddress, b: NodeAddress) -> bool {
        a != b && !self.down.contains(&link_key(a, b))
    }

    fn roll_loss(&mut self) -> bool {
        self.loss_rate > 0.0 && self.rng.gen::<f32>() < self.loss_rate
    }

    /// One transmission attempt; true if the frame reached `to`
    fn transmit(
        &mut self,
        stats: &MediumStats,
        from: NodeAddress,
        to: NodeAddress,
        channel: Channel,
        number: u16,
        data: &Bytes,
    ) -> bool {
        stats.frames_sent.fetch_add(1, Ordering::Relaxed);

        let target = match self.ports.get(&to) {
            Some(Port {
                channels: Some(channels),
                events: Some(events),
            }) if self.link_up(from, to) && channel_number(channels, channel) == number => {
                events.clone()
            }
            _ => {
                stats.frames_lost.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        if self.roll_loss() {
            stats.frames_lost.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let event = TransportEvent::Frame {
            from,
            channel,
            data: data.clone(),
        };
        if target.send(event).is_err() {
            stats.frames_lost.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        stats.frames_delivered.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// Shared medium; clone to hand it to several test harnesses
#[derive(Clone)]
pub struct MemoryNetwork {
    medium: Arc<Mutex<Medium>>,
    stats: Arc<MediumStats>,
}

impl MemoryNetwork {
    pub fn new(config: MediumConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            medium: Arc::new(Mutex::new(Medium {
                loss_rate: config.loss_rate,
                rng,
                ports: HashMap::new(),
                down: HashSet::new(),
            })),
            stats: Arc::new(MediumStats::default()),
        }
    }

    /// Register a node address and get its transport
    pub fn attach(&self, addr: NodeAddress) -> NetworkResult<MemoryTransport> {
        let mut medium = self.medium.lock();
        if medium.ports.contains_key(&addr) {
            return Err(NetworkError::AddressInUse(addr));
        }
        medium.ports.insert(addr, Port::default());

        Ok(MemoryTransport {
            addr,
            network: self.clone(),
            channels: None,
            events: None,
        })
    }

    /// Bring the link between two nodes up or down
    pub fn set_link(&self, a: NodeAddress, b: NodeAddress, up: bool) {
        let mut medium = self.medium.lock();
        if up {
            medium.down.remove(&link_key(a, b));
        } else {
            medium.down.insert(link_key(a, b));
        }
    }

    pub fn is_linked(&self, a: NodeAddress, b: NodeAddress) -> bool {
        self.medium.lock().link_up(a, b)
    }

    pub fn stats(&self) -> Arc<MediumStats> {
        self.stats.clone()
    }
}

/// One node's attachment to a [`MemoryNetwork`]
pub struct MemoryTransport {
    addr: NodeAddress,
    network: MemoryNetwork,
    channels: Option<ChannelSet>,
    events: Option<EventSender>,
}

impl MemoryTransport {
    fn open_channels(&self) -> NetworkResult<ChannelSet> {
        self.channels.ok_or(NetworkError::NotOpen)
    }
}

impl Transport for MemoryTransport {
    fn local_addr(&self) -> NodeAddress {
        self.addr
    }

    fn open(&mut self, channels: ChannelSet, events: EventSender) -> NetworkResult<()> {
        if self.channels.is_some() {
            return Err(NetworkError::AlreadyOpen);
        }

        let mut medium = self.network.medium.lock();
        let port = medium.ports.entry(self.addr).or_default();
        port.channels = Some(channels);
        port.events = Some(events.clone());

        self.channels = Some(channels);
        self.events = Some(events);
        Ok(())
    }

    fn close(&mut self) {
        if self.channels.take().is_none() {
            return;
        }
        self.events = None;

        let mut medium = self.network.medium.lock();
        if let Some(port) = medium.ports.get_mut(&self.addr) {
            port.channels = None;
            port.events = None;
        }
    }

    fn broadcast(&mut self, frame: Bytes) -> NetworkResult<()> {
        let number = self.open_channels()?.broadcast;
        let stats = &self.network.stats;
        let mut medium = self.network.medium.lock();

        let neighbours: Vec<NodeAddress> = medium
            .ports
            .keys()
            .copied()
            .filter(|addr| *addr != self.addr)
            .collect();

        for to in neighbours {
            medium.transmit(stats, self.addr, to, Channel::Broadcast, number, &frame);
        }
        Ok(())
    }

    fn unicast(&mut self, to: NodeAddress, frame: Bytes) -> NetworkResult<()> {
        let number = self.open_channels()?.unicast;
        let mut medium = self.network.medium.lock();
        medium.transmit(
            &self.network.stats,
            self.addr,
            to,
            Channel::Unicast,
            number,
            &frame,
        );
        Ok(())
    }

    fn reliable_unicast(
        &mut self,
        to: NodeAddress,
        frame: Bytes,
        handoff: HandoffId,
        max_retransmissions: u8,
    ) -> NetworkResult<()> {
        let number = self.open_channels()?.reliable;
        let events = self.events.clone().ok_or(NetworkError::NotOpen)?;
        let stats = &self.network.stats;
        stats.reliable_sends.fetch_add(1, Ordering::Relaxed);

        let attempts = max_retransmissions.max(1);
        let delivered_after = {
            let mut medium = self.network.medium.lock();
            (0..attempts).find(|_| {
                medium.transmit(stats, self.addr, to, Channel::Reliable, number, &frame)
            })
        };

        let outcome = match delivered_after {
            Some(retransmissions) => TransportEvent::HandoffSent {
                handoff,
                to,
                retransmissions,
            },
            None => {
                stats.reliable_timeouts.fetch_add(1, Ordering::Relaxed);
                TransportEvent::HandoffTimedOut {
                    handoff,
                    to,
                    retransmissions: attempts,
                }
            }
        };

        events.send(outcome).map_err(|_| NetworkError::ChannelClosed)
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.network.medium.lock().ports.remove(&self.addr);
    }
}
