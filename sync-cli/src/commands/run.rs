//! Run one node over the UDP radio emulation.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use sync_engine::{spawn_driver, SyncEngine, SystemClock, Transport};
use tracing::info;

use crate::config::Config;
use crate::handler::DisplayHandler;
use crate::udp::UdpTransport;

/// How often the peer table is printed.
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Run the node until Ctrl-C.
pub async fn run(config: &Config, pair: bool) -> Result<()> {
    let protocol = config.protocol().context("Invalid timing configuration")?;
    let address = config
        .device_address()
        .context("Failed to generate a device address")?;
    let transport = UdpTransport::bind(
        address,
        &config.network.bind_address,
        &config.network.broadcast_address,
    )
    .await?;
    info!(
        "Listening on {} as {} ({})",
        transport.socket_address()?,
        config.device.name,
        transport.local_address()
    );

    let handler = Arc::new(DisplayHandler::new(config.device.name.clone()));
    let engine = Arc::new(SyncEngine::new(
        config.device.name.clone(),
        protocol,
        transport,
        Arc::new(SystemClock::new()),
        handler.clone(),
    )?);
    engine.set_auto_pair(config.device.auto_pair);
    engine.set_sync_mode(config.device.sync_mode);

    let driver = spawn_driver(Arc::clone(&engine), config.tick_interval());
    if pair {
        engine.start_pairing();
    }

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.tick().await;
    loop {
        tokio::select! {
            _ = status.tick() => print_status(&engine, &handler),
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
        if driver.is_receiver_finished() {
            info!("Radio link closed");
            break;
        }
    }

    driver.shutdown().await;
    println!();
    print_status(&engine, &handler);
    Ok(())
}

fn print_status(engine: &SyncEngine<UdpTransport>, handler: &DisplayHandler) {
    let display = handler.display();
    println!(
        "{} [{}] {} | brightness {} delay {}ms | offset {}ms | {} peer(s)",
        engine.local_name(),
        engine.local_address(),
        engine.sync_mode(),
        display.brightness,
        display.frame_delay,
        engine.time_offset(),
        engine.peer_count()
    );
    for snapshot in engine.peers() {
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
