//! Spray-and-wait node task and its handle

use crate::metrics::recorder;
use crate::network::{EventReceiver, Transport};
use crate::node::error::{NodeError, NodeResult};
use crate::node::types::Command;
use crate::routing::{
    Action, LifetimePolicy, MessageKey, NodeAddress, Payload, Router, RoutingEvent, SprayConfig,
    StoreStats,
};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

const COMMAND_BUFFER: usize = 64;

/// Stand-in deadline for the disabled expiry branch
const IDLE: Duration = Duration::from_secs(24 * 60 * 60);

/// A running spray-and-wait node.
///
/// Created through [`SprayNode::builder`] or [`SprayNode::start`]; the
/// node itself lives inside its task and is reached through a
/// [`NodeHandle`].
pub struct SprayNode<T: Transport> {
    router: Router,
    transport: T,
    inbound: EventReceiver,
    commands: mpsc::Receiver<Command>,
    events: Option<mpsc::Sender<RoutingEvent>>,
}

impl<T: Transport> SprayNode<T> {
    pub fn builder(transport: T) -> SprayNodeBuilder<T> {
        SprayNodeBuilder::new(transport)
    }

    /// Start a node with `config` and no event subscriber
    pub fn start(transport: T, config: SprayConfig) -> NodeResult<NodeHandle> {
        SprayNodeBuilder::new(transport).config(config).start()
    }

    async fn run(self) {
        let SprayNode {
            mut router,
            mut transport,
            mut inbound,
            mut commands,
            events,
        } = self;

        let advert = time::sleep(router.initial_delay());
        tokio::pin!(advert);

        loop {
            let expiry = router.next_deadline();
            let mut stop_reply = None;

            tokio::select! {
                () = &mut advert => {
                    let now = Instant::now();
                    let next = router.on_tick(now);
                    advert.as_mut().reset(now + next);
                }
                () = time::sleep_until(expiry.unwrap_or_else(|| Instant::now() + IDLE)), if expiry.is_some() => {
                    router.expire(Instant::now());
                }
                Some(event) = inbound.recv() => {
                    router.handle_transport(event, Instant::now());
                }
                command = commands.recv() => match command {
                    Some(Command::Submit { payload, destination, reply }) => {
                        let _ = reply.send(router.submit(payload, destination, Instant::now()));
                    }
                    Some(Command::QueueDepth { reply }) => {
                        let _ = reply.send(router.queue_depth());
                    }
                    Some(Command::Stats { reply }) => {
                        let _ = reply.send(router.stats());
                    }
                    Some(Command::DumpQueue) => router.dump_queue(Instant::now()),
                    Some(Command::Stop { reply }) => stop_reply = Some(Some(reply)),
                    // every handle is gone
                    None => stop_reply = Some(None),
                },
            }

            flush(&mut router, &mut transport);
            emit_events(&mut router, events.as_ref());
            recorder::set_queue_depth(router.queue_depth());

            if let Some(reply) = stop_reply {
                transport.close();
                tracing::debug!(local = %router.local(), queued = router.queue_depth(), "node stopped");
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                break;
            }
        }
    }
}

fn flush<T: Transport>(router: &mut Router, transport: &mut T) {
    for action in router.take_actions() {
        let result = match action {
            Action::Broadcast { frame } => transport.broadcast(frame),
            Action::Unicast { to, frame } => transport.unicast(to, frame),
            Action::Reliable {
                to,
                frame,
                handoff,
                max_retransmissions,
            } => {
                let sent = transport.reliable_unicast(to, frame, handoff, max_retransmissions);
                if sent.is_err() {
                    // no outcome will ever be reported for this handoff
                    router.on_handoff_timed_out(handoff, to);
                }
                sent
            }
        };

        if let Err(e) = result {
            tracing::warn!("Failed to send frame: {}", e);
        }
    }
}

/// Hand routing events to the subscriber without ever waiting on it
fn emit_events(router: &mut Router, events: Option<&mpsc::Sender<RoutingEvent>>) {
    let pending = router.take_events();
    let Some(tx) = events else {
        return;
    };

    for event in pending {
        match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!("Event subscriber lagging, dropped {:?}", event);
                recorder::record_event_dropped();
            }
        }
    }
}

/// Builder for spray-and-wait nodes
pub struct SprayNodeBuilder<T: Transport> {
    transport: T,
    config: SprayConfig,
    events: Option<mpsc::Sender<RoutingEvent>>,
    lifetime: Option<Box<dyn LifetimePolicy>>,
}

impl<T: Transport> SprayNodeBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: SprayConfig::default(),
            events: None,
            lifetime: None,
        }
    }

    pub fn config(mut self, config: SprayConfig) -> Self {
        self.config = config;
        self
    }

    /// Subscribe to routing events
    pub fn events(mut self, tx: mpsc::Sender<RoutingEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Override the lifetime policy derived from the config
    pub fn lifetime_policy(mut self, policy: Box<dyn LifetimePolicy>) -> Self {
        self.lifetime = Some(policy);
        self
    }

    /// Open the transport and spawn the node task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> NodeResult<NodeHandle> {
        self.config.validate()?;

        let SprayNodeBuilder {
            mut transport,
            config,
            events,
            lifetime,
        } = self;

        let local = transport.local_addr();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        transport.open(config.channels, inbound_tx)?;

        let mut router = Router::new(local, config);
        if let Some(policy) = lifetime {
            router = router.with_lifetime_policy(policy);
        }

        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let node = SprayNode {
            router,
            transport,
            inbound,
            commands,
            events,
        };

        tracing::debug!(%local, "node started");
        tokio::spawn(node.run());

        Ok(NodeHandle {
            local,
            commands: commands_tx,
        })
    }
}

/// Cloneable handle to a running node
#[derive(Clone)]
pub struct NodeHandle {
    local: NodeAddress,
    commands: mpsc::Sender<Command>,
}

impl NodeHandle {
    pub fn local(&self) -> NodeAddress {
        self.local
    }

    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> NodeResult<R> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| NodeError::Stopped)?;
        rx.await.map_err(|_| NodeError::Stopped)
    }

    /// Queue a message for `destination`.
    ///
    /// `Ok(None)` means the store was full and the message was dropped.
    pub async fn submit(
        &self,
        payload: Payload,
        destination: NodeAddress,
    ) -> NodeResult<Option<MessageKey>> {
        self.request(|reply| Command::Submit {
            payload,
            destination,
            reply,
        })
        .await
    }

    pub async fn queue_depth(&self) -> NodeResult<usize> {
        self.request(|reply| Command::QueueDepth { reply }).await
    }

    pub async fn stats(&self) -> NodeResult<StoreStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub async fn dump_queue(&self) -> NodeResult<()> {
        self.commands
            .send(Command::DumpQueue)
            .await
            .map_err(|_| NodeError::Stopped)
    }

    /// Close the transport and end the node task. Queued messages are
    /// dropped.
    pub async fn stop(&self) -> NodeResult<()> {
        self.request(|reply| Command::Stop { reply }).await
    }
}
