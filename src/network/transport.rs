//! Link-layer seam
//!
//! The routing task talks to the radio only through this trait. Sends
//! never block; reliable outcomes come back later as
//! [`TransportEvent::HandoffSent`] or [`TransportEvent::HandoffTimedOut`]
//! on the event sender handed to [`Transport::open`].
//!
//! [`TransportEvent::HandoffSent`]: crate::network::TransportEvent::HandoffSent
//! [`TransportEvent::HandoffTimedOut`]: crate::network::TransportEvent::HandoffTimedOut

use crate::network::error::NetworkResult;
use crate::network::types::EventSender;
use crate::routing::{ChannelSet, HandoffId, NodeAddress};
use bytes::Bytes;

pub trait Transport: Send + 'static {
    /// Address the link layer was configured with
    fn local_addr(&self) -> NodeAddress;

    /// Open the broadcast, unicast and reliable channels
    fn open(&mut self, channels: ChannelSet, events: EventSender) -> NetworkResult<()>;

    /// Close all three channels. Closing twice is a no-op.
    fn close(&mut self);

    fn broadcast(&mut self, frame: Bytes) -> NetworkResult<()>;

    fn unicast(&mut self, to: NodeAddress, frame: Bytes) -> NetworkResult<()>;

    /// Send with acknowledgement, retrying up to `max_retransmissions`
    /// times. The outcome is reported asynchronously under `handoff`.
    fn reliable_unicast(
        &mut self,
        to: NodeAddress,
        frame: Bytes,
        handoff: HandoffId,
        max_retransmissions: u8,
    ) -> NetworkResult<()>;
}
