//! Binary spray-and-wait routing core
//!
//! A message starts with a copy budget that is halved each time a relay
//! asks for a share. Once a holder is down to a single copy it only
//! advertises to the destination itself.
//!
//! Everything in here is synchronous and driven by the node task:
//! - [`Router`]: the state machine reacting to adverts, requests and grants
//! - [`MessageStore`]: bounded, order-preserving queue with expiry
//! - [`BroadcastScheduler`]: cyclic advertisement pacing
//! - [`wire`]: frame codec

pub mod config;
pub mod copies;
pub mod error;
pub mod handoff;
pub mod router;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod wire;

pub use config::{ChannelSet, LifetimeMode, SprayConfig, SprayConfigBuilder};
pub use copies::{ceiling_halve, FixedLifetime, LifetimePolicy, ScaledLifetime};
pub use error::{ConfigError, ConfigResult, StoreError, StoreResult, WireError, WireResult};
pub use handoff::{HandoffId, HandoffTracker, HandoffTracking};
pub use router::{Action, Router, RoutingEvent};
pub use scheduler::{BroadcastScheduler, Tick};
pub use store::{EntryKey, MessageEntry, MessageStore, StoreStats};
pub use types::{
    EntryState, MessageKey, NodeAddress, Payload, ProtocolHeader, PAYLOAD_LEN, PROTOCOL_MAGIC,
    PROTOCOL_VERSION,
};
