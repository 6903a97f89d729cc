//! Async node runtime
//!
//! One tokio task per node owns the [`Router`](crate::routing::Router) and
//! its transport. Timers, inbound frames and application commands are
//! serialised through a single `select!` loop, so routing state is never
//! shared between tasks.

pub mod error;
pub mod node;
pub mod types;

pub use error::{NodeError, NodeResult};
pub use node::{NodeHandle, SprayNode, SprayNodeBuilder};
pub use types::Command;
