//! Link layer abstraction
//!
//! The routing core sends frames through a [`Transport`] over three
//! channels: broadcast for advertisements, unicast for requests and
//! reliable unicast for handoffs. [`MemoryNetwork`] is a shared in-process
//! medium with link control and seeded loss for simulations and tests.

pub mod error;
pub mod memory;
pub mod transport;
pub mod types;

pub use error::{NetworkError, NetworkResult};
pub use memory::{MediumConfig, MediumStats, MemoryNetwork, MemoryTransport};
pub use transport::Transport;
pub use types::{Channel, EventReceiver, EventSender, TransportEvent};
