//! Delayed-bus simulation
//!
//! A source node at the depot hands part of a message's copy budget to a
//! bus while they are in range. The bus then drives past the destination,
//! which was never reachable from the source, and delivers the message.
//!
//! Usage: `spraywait-sim [config.json]`

use anyhow::Context;
use spraywait::network::{MediumConfig, MemoryNetwork};
use spraywait::routing::{NodeAddress, Payload, RoutingEvent, SprayConfig, SprayConfigBuilder};
use spraywait::{NodeHandle, SprayNode};
use std::time::Duration;
use tokio::sync::mpsc;

const SOURCE: NodeAddress = NodeAddress::from_byte(8);
const BUS: NodeAddress = NodeAddress::from_byte(5);
const DESTINATION: NodeAddress = NodeAddress::from_byte(3);

fn demo_config() -> anyhow::Result<SprayConfig> {
    // the default timings scaled down so the run takes a few seconds
    let config = SprayConfigBuilder::new()
        .packet_delay(Duration::from_millis(100))
        .queue_delay(Duration::from_millis(300))
        .unconfirmed_timeout(Duration::from_millis(250))
        .max_lifetime(Duration::from_secs(6))
        .build()?;
    Ok(config)
}

fn spawn_node(
    network: &MemoryNetwork,
    addr: NodeAddress,
    name: &'static str,
    config: &SprayConfig,
) -> anyhow::Result<NodeHandle> {
    let (tx, mut rx) = mpsc::channel::<RoutingEvent>(64);
    let transport = network.attach(addr)?;
    let handle = SprayNode::builder(transport)
        .config(config.clone())
        .events(tx)
        .start()
        .with_context(|| format!("failed to start {name}"))?;

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                RoutingEvent::MessageReceived { key, from, payload } => {
                    println!(
                        "📬 [{name}] received {key} via {from}: {:?}",
                        String::from_utf8_lossy(payload.trimmed())
                    );
                }
                other => tracing::info!(node = name, "{:?}", other),
            }
        }
    });

    Ok(handle)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    spraywait::metrics::init_metrics();

    let config = match std::env::args().nth(1) {
        Some(path) => SprayConfig::from_json_file(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => demo_config()?,
    };
    let cycle = config.queue_delay;

    println!("\n╔══════════════════════════════════════════════╗");
    println!("║        Spray-and-Wait: Delayed Bus           ║");
    println!("╚══════════════════════════════════════════════╝\n");
    println!("📍 Source:      {SOURCE}");
    println!("🚌 Bus:         {BUS}");
    println!("🎯 Destination: {DESTINATION}");
    println!("📦 Copies:      {}\n", config.initial_copies);

    let network = MemoryNetwork::new(MediumConfig::with_loss(0.1).seeded(42));
    let source = spawn_node(&network, SOURCE, "source", &config)?;
    let bus = spawn_node(&network, BUS, "bus", &config)?;
    let destination = spawn_node(&network, DESTINATION, "destination", &config)?;

    // bus waits at the depot; the destination is out of everyone's range
    network.set_link(SOURCE, DESTINATION, false);
    network.set_link(BUS, DESTINATION, false);

    let key = source
        .submit(Payload::new(b"Johann")?, DESTINATION)
        .await?
        .context("source queue is full")?;
    println!("✉️  Submitted {key}\n");

    tokio::time::sleep(cycle * 4).await;
    println!("\n🚌 Bus leaves the depot\n");
    network.set_link(SOURCE, BUS, false);
    network.set_link(BUS, DESTINATION, true);

    tokio::time::sleep(cycle * 4).await;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (name, node) in [
        ("source", &source),
        ("bus", &bus),
        ("destination", &destination),
    ] {
        node.dump_queue().await?;
        println!("{name:>12}: {}", node.stats().await?);
    }
    println!("{:>12}: {}", "medium", network.stats().summary());

    for node in [&source, &bus, &destination] {
        node.stop().await?;
    }

    Ok(())
}
