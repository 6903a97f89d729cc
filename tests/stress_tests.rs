//! Stress tests for spray-and-wait routing over a lossy medium
//!
//! Run with: cargo test --test stress_tests -- --nocapture

use spraywait::network::{MediumConfig, MemoryNetwork};
use spraywait::routing::{NodeAddress, Payload, RoutingEvent, SprayConfig};
use spraywait::{NodeHandle, SprayNode};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

fn start(
    network: &MemoryNetwork,
    addr: NodeAddress,
) -> (NodeHandle, mpsc::Receiver<RoutingEvent>) {
    let (tx, rx) = mpsc::channel(1024);
    let handle = SprayNode::builder(network.attach(addr).unwrap())
        .config(SprayConfig::default())
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

/// Lost adverts and lost requests only delay delivery, and the destination
/// reports the message once however many adverts it hears
#[tokio::test(start_paused = true)]
async fn test_delivery_under_loss() {
    let source_addr = NodeAddress::from_byte(1);
    let dest_addr = NodeAddress::from_byte(2);
    let network = MemoryNetwork::new(MediumConfig::with_loss(0.3).seeded(7));
    let (source, mut source_events) = start(&network, source_addr);
    let (_destination, mut dest_events) = start(&network, dest_addr);

    let key = source
        .submit(Payload::new(b"lossy").unwrap(), dest_addr)
        .await
        .unwrap()
        .unwrap();
    sleep(Duration::from_secs(45)).await;

    let received = drain(&mut dest_events)
        .into_iter()
        .filter(|e| matches!(e, RoutingEvent::MessageReceived { .. }))
        .count();
    assert_eq!(received, 1);
    assert_eq!(source.queue_depth().await.unwrap(), 0);
    assert!(drain(&mut source_events).contains(&RoutingEvent::DeliveryConfirmed { key }));

    let stats = network.stats();
    println!("✓ {}", stats.summary());
    assert!(stats.frames_lost.load(Ordering::Relaxed) <= stats.frames_sent.load(Ordering::Relaxed));
}

/// Many custodians advertising into full queues never push any store past
/// its capacity
#[tokio::test(start_paused = true)]
async fn test_queue_bound_under_flood() {
    let network = MemoryNetwork::new(MediumConfig::with_loss(0.1).seeded(11));
    let unreachable = NodeAddress::from_byte(99);
    let nodes: Vec<_> = (1..=6u8)
        .map(|low| start(&network, NodeAddress::from_byte(low)))
        .collect();

    for (i, (node, _)) in nodes.iter().enumerate() {
        for n in 0..3u8 {
            let payload = Payload::new(&[b'a' + i as u8, b'0' + n]).unwrap();
            node.submit(payload, unreachable).await.unwrap().unwrap();
        }
    }

    for second in 0..30 {
        sleep(Duration::from_secs(1)).await;
        for (node, _) in &nodes {
            let stats = node.stats().await.unwrap();
            assert!(
                stats.queued <= stats.capacity,
                "{} over capacity at {}s: {}",
                node.local(),
                second,
                stats
            );
        }
    }

    let mut granted = 0;
    for (node, mut events) in nodes {
        granted += drain(&mut events)
            .iter()
            .filter(|e| matches!(e, RoutingEvent::CopiesGranted { .. }))
            .count();
        println!("✓ {}: {}", node.local(), node.stats().await.unwrap());
    }
    assert!(granted > 0, "no relay picked up any copies");
    println!("✓ {}", network.stats().summary());
}
