//! Background tasks driving a [`SyncEngine`].
//!
//! Two tasks share the engine: the receive loop feeds every inbound frame
//! to [`SyncEngine::handle_frame`] and the tick loop calls
//! [`SyncEngine::tick`] on a fixed interval. They touch the peer table
//! concurrently; the engine's lock serializes them and its action queue
//! keeps callbacks in the order the protocol produced them.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::SyncEngine;
use crate::transport::{Transport, TransportError};

/// Handles to a running engine's tasks.
#[derive(Debug)]
pub struct SyncDriver {
    receiver: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl SyncDriver {
    /// Whether the receive loop has ended (transport closed).
    pub fn is_receiver_finished(&self) -> bool {
        self.receiver.is_finished()
    }

    /// Stop both tasks and wait for them to wind down.
    pub async fn shutdown(self) {
        self.receiver.abort();
        self.ticker.abort();
        let _ = self.receiver.await;
        let _ = self.ticker.await;
        tracing::info!("Sync driver stopped");
    }
}

/// Spawn the receive and tick loops for `engine`.
pub fn spawn_driver<T: Transport + 'static>(
    engine: Arc<SyncEngine<T>>,
    tick_interval: Duration,
) -> SyncDriver {
    let rx_engine = Arc::clone(&engine);
    let receiver = tokio::spawn(async move {
        loop {
            match rx_engine.transport().recv().await {
                Ok((from, bytes)) => rx_engine.handle_frame(from, &bytes),
                Err(TransportError::Closed) => {
                    tracing::info!("Transport closed, receive loop exiting");
                    break;
                }
                Err(e) => tracing::warn!("Receive error: {}", e),
            }
        }
    });

    let ticker = tokio::spawn(async move {
        tracing::info!(
            "Sync driver started (tick interval: {}ms)",
            tick_interval.as_millis()
        );
        let mut timer = interval(tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            engine.tick();
        }
    });

    SyncDriver { receiver, ticker }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::handler::NoopHandler;
    use crate::transport::{MemoryRadio, MockTransport};
    use sync_core::ProtocolConfig;
    use sync_types::{Frame, MacAddress, Message, PairPayload};

    fn addr(n: u8) -> MacAddress {
        MacAddress::new([0x02, 0, 0, 0, 0, n])
    }

    async fn until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn receive_loop_feeds_engine() {
        let radio = MemoryRadio::new();
        let remote = radio.attach(addr(2));
        let engine = Arc::new(
            SyncEngine::new(
                "Poi-1",
                ProtocolConfig::default(),
                radio.attach(addr(1)),
                Arc::new(ManualClock::new(0)),
                Arc::new(NoopHandler),
            )
            .unwrap(),
        );
        let driver = spawn_driver(Arc::clone(&engine), Duration::from_secs(3600));

        let request = Frame::new(
            0,
            Message::PairRequest(PairPayload {
                address: addr(2),
                name: "Poi-2".into(),
                accepted: false,
            }),
        );
        remote
            .send(MacAddress::BROADCAST, &request.to_bytes().unwrap())
            .unwrap();

        until(|| engine.has_paired_peer()).await;
        driver.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tick_loop_sends_heartbeat() {
        let radio = MemoryRadio::new();
        let listener = radio.attach(addr(2));
        let engine = Arc::new(
            SyncEngine::new(
                "Poi-1",
                ProtocolConfig::default(),
                radio.attach(addr(1)),
                Arc::new(ManualClock::new(0)),
                Arc::new(NoopHandler),
            )
            .unwrap(),
        );
        let driver = spawn_driver(Arc::clone(&engine), Duration::from_millis(10));

        let (from, bytes) = listener.recv().await.unwrap();
        assert_eq!(from, addr(1));
        assert!(matches!(
            Frame::from_bytes(&bytes).unwrap().message,
            Message::Heartbeat(_)
        ));
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn receive_loop_ends_when_transport_closes() {
        let engine = Arc::new(
            SyncEngine::new(
                "Poi-1",
                ProtocolConfig::default(),
                MockTransport::new(addr(1)),
                Arc::new(ManualClock::new(0)),
                Arc::new(NoopHandler),
            )
            .unwrap(),
        );
        let driver = spawn_driver(engine, Duration::from_secs(3600));
        until(|| driver.is_receiver_finished()).await;
        driver.shutdown().await;
    }
}
