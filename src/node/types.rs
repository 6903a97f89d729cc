use crate::routing::{MessageKey, NodeAddress, Payload, StoreStats};
use tokio::sync::oneshot;

/// Requests from a [`NodeHandle`](crate::node::NodeHandle) to the node task
#[derive(Debug)]
pub enum Command {
    Submit {
        payload: Payload,
        destination: NodeAddress,
        reply: oneshot::Sender<Option<MessageKey>>,
    },
    QueueDepth {
        reply: oneshot::Sender<usize>,
    },
    Stats {
        reply: oneshot::Sender<StoreStats>,
    },
    /// Log the queue contents at trace level
    DumpQueue,
    Stop {
        reply: oneshot::Sender<()>,
    },
}
