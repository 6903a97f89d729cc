use spraywait::network::{MediumConfig, MemoryNetwork, Transport, TransportEvent};
use spraywait::routing::{
    wire, ChannelSet, EntryState, NodeAddress, Payload, ProtocolHeader, RoutingEvent,
    SprayConfig, SprayConfigBuilder,
};
use spraywait::{NodeError, NodeHandle, SprayNode};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

const SOURCE: NodeAddress = NodeAddress::from_byte(8);
const RELAY: NodeAddress = NodeAddress::from_byte(5);
const DESTINATION: NodeAddress = NodeAddress::from_byte(3);

fn start(
    network: &MemoryNetwork,
    addr: NodeAddress,
    config: SprayConfig,
) -> (NodeHandle, mpsc::Receiver<RoutingEvent>) {
    let (tx, rx) = mpsc::channel(256);
    let handle = SprayNode::builder(network.attach(addr).unwrap())
        .config(config)
        .events(tx)
        .start()
        .unwrap();
    (handle, rx)
}

fn drain(rx: &mut mpsc::Receiver<RoutingEvent>) -> Vec<RoutingEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn payload() -> Payload {
    Payload::new(b"Johann").unwrap()
}

/// Source and destination in range of each other
#[tokio::test(start_paused = true)]
async fn test_direct_delivery() {
    let network = MemoryNetwork::new(MediumConfig::perfect());
    let (source, mut source_events) = start(&network, SOURCE, SprayConfig::default());
    let (_destination, mut dest_events) = start(&network, DESTINATION, SprayConfig::default());

    let key = source
        .submit(payload(), DESTINATION)
        .await
        .unwrap()
        .unwrap();

    // first advertisement goes out after one queue delay
    sleep(Duration::from_secs(4)).await;

    assert_eq!(source.queue_depth().await.unwrap(), 0);
    assert_eq!(
        drain(&mut source_events),
        vec![RoutingEvent::DeliveryConfirmed { key }]
    );
    assert_eq!(
        drain(&mut dest_events),
        vec![RoutingEvent::MessageReceived {
            key,
            from: SOURCE,
            payload: payload()
        }]
    );
    println!("✓ Delivered {} directly", key);
}

/// Source sprays half its budget to a relay, which later meets the
/// destination the source never sees
#[tokio::test(start_paused = true)]
async fn test_relay_ferries_message() {
    let network = MemoryNetwork::new(MediumConfig::perfect());
    let (source, mut source_events) = start(&network, SOURCE, SprayConfig::default());
    let (relay, mut relay_events) = start(&network, RELAY, SprayConfig::default());
    let (_destination, mut dest_events) = start(&network, DESTINATION, SprayConfig::default());

    network.set_link(SOURCE, DESTINATION, false);
    network.set_link(RELAY, DESTINATION, false);

    let key = source
        .submit(payload(), DESTINATION)
        .await
        .unwrap()
        .unwrap();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(
        drain(&mut source_events),
        vec![RoutingEvent::HandoffCompleted {
            key,
            to: RELAY,
            retained: 4
        }]
    );
    assert_eq!(
        drain(&mut relay_events),
        vec![RoutingEvent::CopiesGranted {
            key,
            copies: 4,
            from: SOURCE
        }]
    );
    assert_eq!(relay.stats().await.unwrap().total_copies, 4);
    assert!(drain(&mut dest_events).is_empty());

    // relay moves out of the source's range and into the destination's
    network.set_link(SOURCE, RELAY, false);
    network.set_link(RELAY, DESTINATION, true);
    sleep(Duration::from_secs(4)).await;

    assert_eq!(relay.queue_depth().await.unwrap(), 0);
    assert_eq!(
        drain(&mut relay_events),
        vec![RoutingEvent::DeliveryConfirmed { key }]
    );
    assert_eq!(
        drain(&mut dest_events),
        vec![RoutingEvent::MessageReceived {
            key,
            from: RELAY,
            payload: payload()
        }]
    );

    // the source never hears of the delivery and holds its half until expiry
    assert_eq!(source.queue_depth().await.unwrap(), 1);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(source.queue_depth().await.unwrap(), 0);
    assert_eq!(
        drain(&mut source_events),
        vec![RoutingEvent::EntryExpired {
            key,
            state: EntryState::Fresh
        }]
    );
}

/// With a single copy only the destination may answer
#[tokio::test(start_paused = true)]
async fn test_single_copy_waits_for_destination() {
    let network = MemoryNetwork::new(MediumConfig::perfect());
    let config = SprayConfigBuilder::new().initial_copies(1).build().unwrap();
    let (source, _source_events) = start(&network, SOURCE, config);
    let (relay, mut relay_events) = start(&network, RELAY, SprayConfig::default());
    let (_destination, mut dest_events) = start(&network, DESTINATION, SprayConfig::default());

    network.set_link(SOURCE, DESTINATION, false);
    source
        .submit(payload(), DESTINATION)
        .await
        .unwrap()
        .unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(relay.queue_depth().await.unwrap(), 0);
    assert!(drain(&mut relay_events).is_empty());
    assert_eq!(source.queue_depth().await.unwrap(), 1);

    network.set_link(SOURCE, DESTINATION, true);
    sleep(Duration::from_secs(4)).await;

    assert_eq!(source.queue_depth().await.unwrap(), 0);
    assert_eq!(drain(&mut dest_events).len(), 1);
}

/// A custodian that advertises and then goes silent leaves only a
/// short-lived placeholder behind
#[tokio::test(start_paused = true)]
async fn test_unanswered_request_placeholder_expires() {
    let network = MemoryNetwork::new(MediumConfig::perfect());
    let (relay, mut relay_events) = start(&network, RELAY, SprayConfig::default());

    let mut custodian = network.attach(SOURCE).unwrap();
    let (tx, mut custodian_rx) = mpsc::unbounded_channel();
    custodian.open(ChannelSet::default(), tx).unwrap();

    let header = ProtocolHeader::new(SOURCE, DESTINATION, 7, 8);
    custodian
        .broadcast(wire::encode_advert(&header, &payload()))
        .unwrap();
    sleep(Duration::from_millis(500)).await;

    assert_eq!(relay.queue_depth().await.unwrap(), 1);
    match custodian_rx.try_recv().unwrap() {
        TransportEvent::Frame { from, data, .. } => {
            assert_eq!(from, RELAY);
            let request = wire::decode(&data).unwrap();
            assert_eq!(request.header.key(), header.key());
            assert_eq!(request.header.copies, 0);
        }
        other => panic!("expected a request, got {:?}", other),
    }

    sleep(Duration::from_secs(1)).await;
    assert_eq!(relay.queue_depth().await.unwrap(), 0);
    assert_eq!(
        drain(&mut relay_events),
        vec![RoutingEvent::EntryExpired {
            key: header.key(),
            state: EntryState::PendingGrant
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_rejects_submit() {
    let network = MemoryNetwork::new(MediumConfig::perfect());
    let config = SprayConfigBuilder::new().queue_capacity(2).build().unwrap();
    let (source, _events) = start(&network, SOURCE, config);

    assert!(source.submit(payload(), DESTINATION).await.unwrap().is_some());
    assert!(source.submit(payload(), DESTINATION).await.unwrap().is_some());
    assert!(source.submit(payload(), DESTINATION).await.unwrap().is_none());

    let stats = source.stats().await.unwrap();
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.capacity, 2);
}

#[tokio::test(start_paused = true)]
async fn test_foreign_channels_are_not_heard() {
    let network = MemoryNetwork::new(MediumConfig::perfect());
    let (source, _source_events) = start(&network, SOURCE, SprayConfig::default());
    let other_channels = SprayConfigBuilder::new()
        .channels(ChannelSet {
            broadcast: 200,
            unicast: 201,
            reliable: 202,
        })
        .build()
        .unwrap();
    let (relay, _relay_events) = start(&network, RELAY, other_channels);

    source
        .submit(payload(), DESTINATION)
        .await
        .unwrap()
        .unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(relay.queue_depth().await.unwrap(), 0);
    assert_eq!(source.stats().await.unwrap().total_copies, 8);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_node_goes_silent() {
    let network = MemoryNetwork::new(MediumConfig::perfect());
    let (source, _source_events) = start(&network, SOURCE, SprayConfig::default());
    let (destination, mut dest_events) = start(&network, DESTINATION, SprayConfig::default());

    destination.stop().await.unwrap();
    source
        .submit(payload(), DESTINATION)
        .await
        .unwrap()
        .unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(source.queue_depth().await.unwrap(), 1);
    assert!(drain(&mut dest_events).is_empty());
    assert!(matches!(
        destination.submit(payload(), SOURCE).await,
        Err(NodeError::Stopped)
    ));
}
