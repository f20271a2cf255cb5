//! Simulate a group of devices on an in-memory radio.
//!
//! Every node shares one [`ManualClock`], so a run is deterministic and
//! finishes as fast as the CPU allows: time is stepped by the configured
//! tick interval and every frame in flight is delivered between steps.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::sync::Arc;
use sync_core::{LocalState, PeerSnapshot, MAX_PEERS};
use sync_engine::{Clock, ManualClock, MemoryRadio, MemoryTransport, SyncEngine};
use sync_types::{MacAddress, SyncMode};
use tracing::info;

use crate::config::Config;
use crate::handler::DisplayHandler;

/// Brightness node 0 pushes to the group once paired.
const DEMO_BRIGHTNESS: u8 = 200;

/// Final state of one simulated node.
#[derive(Debug, Serialize)]
pub struct NodeReport {
    /// Device name
    pub name: String,
    /// Radio address
    pub address: MacAddress,
    /// Mirror or independent
    pub sync_mode: SyncMode,
    /// State announced in heartbeats
    pub local_state: LocalState,
    /// State the renderer ended up showing
    pub display: LocalState,
    /// Last clock offset estimate (ms)
    pub time_offset: i32,
    /// Callbacks delivered
    pub events: u64,
    /// Peer table
    pub peers: Vec<PeerSnapshot>,
}

/// Outcome of a simulation run.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Simulated time (ms)
    pub elapsed_ms: u64,
    /// One entry per node, in creation order
    pub nodes: Vec<NodeReport>,
}

struct Node {
    engine: SyncEngine<MemoryTransport>,
    handler: Arc<DisplayHandler>,
}

fn node_address(i: usize) -> MacAddress {
    MacAddress::new([0x02, 0x4E, 0x50, 0x00, 0x00, i as u8 + 1])
}

/// Deliver frames until every inbox is empty.
fn pump(nodes: &[Node]) {
    loop {
        let mut delivered = 0;
        for node in nodes {
            while let Some((from, bytes)) = node.engine.transport().try_recv() {
                node.engine.handle_frame(from, &bytes);
                delivered += 1;
            }
        }
        if delivered == 0 {
            break;
        }
    }
}

fn tick_all(nodes: &[Node]) {
    for node in nodes {
        node.engine.tick();
    }
    pump(nodes);
}

/// Run `devices` nodes for `seconds` of simulated time.
pub fn simulate(config: &Config, devices: usize, seconds: u64) -> Result<Report> {
    if !(2..=MAX_PEERS + 1).contains(&devices) {
        bail!("--devices must be between 2 and {}", MAX_PEERS + 1);
    }
    let protocol = config.protocol().context("Invalid timing configuration")?;
    let step = config.timing.tick_interval_ms;

    let radio = MemoryRadio::new();
    let clock = ManualClock::new(0);
    let nodes = (0..devices)
        .map(|i| -> Result<Node> {
            let name = format!("{}-{}", config.device.name, i);
            let handler = Arc::new(DisplayHandler::new(name.clone()));
            let engine = SyncEngine::new(
                name,
                protocol,
                radio.attach(node_address(i)),
                Arc::new(clock.clone()),
                handler.clone(),
            )?;
            engine.set_auto_pair(config.device.auto_pair);
            engine.set_sync_mode(config.device.sync_mode);
            Ok(Node { engine, handler })
        })
        .collect::<Result<Vec<_>>>()?;

    // Heartbeats first so everyone is discovered, then pair
    tick_all(&nodes);
    for node in &nodes {
        node.engine.start_pairing();
    }
    pump(&nodes);
    info!(
        paired = nodes.iter().filter(|n| n.engine.has_paired_peer()).count(),
        "pairing round complete"
    );

    let leader = &nodes[0];
    let state = LocalState {
        brightness: DEMO_BRIGHTNESS,
        ..leader.engine.local_state()
    };
    leader.engine.set_local_state(state);
    leader.handler.set_display(state);
    leader.engine.broadcast_brightness(DEMO_BRIGHTNESS);
    pump(&nodes);

    let end = seconds * 1000;
    while clock.now_ms() < end {
        clock.set((clock.now_ms() + step).min(end));
        tick_all(&nodes);
    }

    Ok(Report {
        elapsed_ms: clock.now_ms(),
        nodes: nodes
            .iter()
            .map(|node| NodeReport {
                name: node.engine.local_name(),
                address: node.engine.local_address(),
                sync_mode: node.engine.sync_mode(),
                local_state: node.engine.local_state(),
                display: node.handler.display(),
                time_offset: node.engine.time_offset(),
                events: node.handler.event_count(),
                peers: node.engine.peers(),
            })
            .collect(),
    })
}

/// Run the simulate command.
pub fn run(config: &Config, devices: usize, seconds: u64, json: bool) -> Result<()> {
    let report = simulate(config, devices, seconds)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== nebula-sync simulation ({} ms) ===", report.elapsed_ms);
    for node in &report.nodes {
        println!();
        println!("{} [{}] {}", node.name, node.address, node.sync_mode);
        println!(
            "  Display: mode {} index {} brightness {} delay {}ms",
            node.display.mode, node.display.index, node.display.brightness, node.display.frame_delay
        );
        println!("  Offset:  {}ms, {} callbacks", node.time_offset, node.events);
        if node.peers.is_empty() {
            println!("  Peers:   none");
        }
        for snapshot in &node.peers {
            let peer = &snapshot.peer;
            println!(
                "  [{}] {} {:<12} {:?} {}",
                snapshot.index,
                peer.address,
                peer.name,
                peer.state,
                if peer.online { "online" } else { "offline" }
            );
        }
    }

    Ok(())
}
