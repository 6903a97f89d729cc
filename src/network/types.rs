use crate::routing::{HandoffId, NodeAddress};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Link primitive a frame travelled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Unreliable one-hop broadcast (advertisements)
    Broadcast,
    /// Unreliable unicast (requests)
    Unicast,
    /// Acknowledged unicast with retransmissions (handoffs)
    Reliable,
}

/// Everything a transport reports back to the routing task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Inbound frame from a neighbour
    Frame {
        from: NodeAddress,
        channel: Channel,
        data: Bytes,
    },
    /// A reliable send was acknowledged
    HandoffSent {
        handoff: HandoffId,
        to: NodeAddress,
        retransmissions: u8,
    },
    /// A reliable send ran out of retransmissions
    HandoffTimedOut {
        handoff: HandoffId,
        to: NodeAddress,
        retransmissions: u8,
    },
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;
