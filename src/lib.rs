//! Binary spray-and-wait routing for intermittently connected nodes
//!
//! A node stores messages in a small bounded queue and advertises them on
//! a broadcast channel. Relays that hear an advertisement ask for a share
//! of the message's copy budget; once a holder is down to one copy it waits
//! for the destination to pass by. No end-to-end path is ever required.
//!
//! - [`routing`]: the sans-io routing core
//! - [`network`]: transport seam and an in-memory radio medium
//! - [`node`]: tokio task driving a router over a transport
//! - [`metrics`]: counters and gauges through the `metrics` facade

pub mod metrics;
pub mod network;
pub mod node;
pub mod routing;

pub use network::{MediumConfig, MemoryNetwork, Transport};
pub use node::{NodeError, NodeHandle, NodeResult, SprayNode, SprayNodeBuilder};
pub use routing::{MessageKey, NodeAddress, Payload, RoutingEvent, SprayConfig, SprayConfigBuilder};
