//! Multi-device scenarios over an in-memory radio.
//!
//! Time is driven by `ManualClock`s and frames are pumped by hand, so every
//! run is deterministic.

use nebula_sync_engine::{
    Clock, ManualClock, MemoryRadio, MemoryTransport, SyncEngine, SyncHandler, Transport,
};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use sync_core::{PeerSnapshot, PeerState, ProtocolConfig, LIVENESS_TIMEOUT_MS};
use sync_types::{MacAddress, SyncMode};

type Engine = SyncEngine<MemoryTransport>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Mode(u8, u8),
    Brightness(u8),
    FrameRate(u8),
    Offset(i32),
    Peer(PeerSnapshot),
    Removed(MacAddress),
}

/// Records callbacks and, like a real control surface, mirrors every
/// applied change back through the engine.
#[derive(Default)]
struct Recorder {
    engine: OnceLock<Weak<Engine>>,
    seen: Mutex<Vec<Seen>>,
}

impl Recorder {
    fn push(&self, event: Seen) {
        self.seen.lock().unwrap().push(event);
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn brightness(&self) -> Vec<u8> {
        self.seen()
            .into_iter()
            .filter_map(|e| match e {
                Seen::Brightness(level) => Some(level),
                _ => None,
            })
            .collect()
    }

    fn peer_updates(&self, address: MacAddress) -> Vec<PeerSnapshot> {
        self.seen()
            .into_iter()
            .filter_map(|e| match e {
                Seen::Peer(snapshot) if snapshot.peer.address == address => Some(snapshot),
                _ => None,
            })
            .collect()
    }

    fn engine(&self) -> Option<Arc<Engine>> {
        self.engine.get().and_then(Weak::upgrade)
    }
}

impl SyncHandler for Recorder {
    fn on_mode_change(&self, mode: u8, index: u8) {
        self.push(Seen::Mode(mode, index));
        if let Some(engine) = self.engine() {
            engine.broadcast_mode_change(mode, index);
        }
    }

    fn on_brightness(&self, level: u8) {
        self.push(Seen::Brightness(level));
        if let Some(engine) = self.engine() {
            engine.broadcast_brightness(level);
        }
    }

    fn on_frame_rate(&self, delay: u8) {
        self.push(Seen::FrameRate(delay));
        if let Some(engine) = self.engine() {
            engine.broadcast_frame_rate(delay);
        }
    }

    fn on_sync_time(&self, offset_ms: i32) {
        self.push(Seen::Offset(offset_ms));
    }

    fn on_peer_update(&self, peer: &PeerSnapshot) {
        self.push(Seen::Peer(peer.clone()));
    }

    fn on_peer_removed(&self, address: MacAddress) {
        self.push(Seen::Removed(address));
    }
}

struct Device {
    engine: Arc<Engine>,
    handler: Arc<Recorder>,
    clock: ManualClock,
}

impl Device {
    fn address(&self) -> MacAddress {
        self.engine.local_address()
    }

    fn peer_for(&self, other: &Device) -> Option<PeerSnapshot> {
        self.engine
            .peers()
            .into_iter()
            .find(|p| p.peer.address == other.address())
    }
}

fn addr(n: u8) -> MacAddress {
    MacAddress::new([0x02, 0xAA, 0, 0, 0, n])
}

fn device(radio: &MemoryRadio, n: u8) -> Device {
    let handler = Arc::new(Recorder::default());
    let clock = ManualClock::new(0);
    let engine = Arc::new(
        SyncEngine::new(
            format!("Poi-{}", n),
            ProtocolConfig::default(),
            radio.attach(addr(n)),
            Arc::new(clock.clone()),
            handler.clone(),
        )
        .unwrap(),
    );
    let _ = handler.engine.set(Arc::downgrade(&engine));
    Device {
        engine,
        handler,
        clock,
    }
}

/// Deliver frames until every inbox is empty.
fn pump(devices: &[&Device]) {
    loop {
        let mut delivered = 0;
        for device in devices {
            while let Some((from, bytes)) = device.engine.transport().try_recv() {
                device.engine.handle_frame(from, &bytes);
                delivered += 1;
            }
        }
        if delivered == 0 {
            break;
        }
    }
}

/// Advance every clock to `t` in `step` increments, ticking and pumping.
fn run_until(devices: &[&Device], t: u64, step: u64) {
    let mut now = devices[0].clock.now_ms();
    while now < t {
        now = (now + step).min(t);
        for device in devices {
            device.clock.set(now);
            device.engine.tick();
        }
        pump(devices);
    }
}

fn paired_pair(radio: &MemoryRadio) -> (Device, Device) {
    let a = device(radio, 1);
    let b = device(radio, 2);
    a.engine.start_pairing();
    pump(&[&a, &b]);
    assert!(a.engine.has_paired_peer());
    assert!(b.engine.has_paired_peer());
    (a, b)
}

// ===========================================
// Scenario A: simultaneous pairing
// ===========================================

#[test]
fn simultaneous_pairing_pairs_both_sides() {
    let radio = MemoryRadio::new();
    let a = device(&radio, 1);
    let b = device(&radio, 2);

    a.engine.start_pairing();
    b.engine.start_pairing();
    pump(&[&a, &b]);

    let a_view = a.peer_for(&b).expect("A knows B");
    let b_view = b.peer_for(&a).expect("B knows A");
    assert_eq!(a_view.peer.state, PeerState::Paired);
    assert_eq!(b_view.peer.state, PeerState::Paired);
    assert_eq!(a_view.peer.name, b.engine.local_name());
    assert_eq!(b_view.peer.name, a.engine.local_name());
    assert_eq!(a.engine.peer_count(), 1);
    assert_eq!(b.engine.peer_count(), 1);
    assert!(a.engine.transport().is_registered(&b.address()));
    assert!(b.engine.transport().is_registered(&a.address()));
    assert_eq!(a.clock.now_ms(), 0, "paired without waiting for a heartbeat");
}

#[test]
fn one_sided_pairing_pairs_both_sides() {
    let radio = MemoryRadio::new();
    let (a, b) = paired_pair(&radio);
    assert_eq!(a.peer_for(&b).unwrap().peer.name, "Poi-2");
    assert_eq!(b.peer_for(&a).unwrap().peer.name, "Poi-1");
}

// ===========================================
// Scenario B: mirror without echo
// ===========================================

#[test]
fn mirrored_brightness_is_applied_and_not_echoed() {
    let radio = MemoryRadio::new();
    let (a, b) = paired_pair(&radio);

    a.engine.broadcast_brightness(200);
    pump(&[&a, &b]);

    assert_eq!(b.handler.brightness(), vec![200]);
    assert!(a.handler.brightness().is_empty(), "B echoed the change back");
}

#[test]
fn mirrored_mode_and_frame_rate_reach_peer() {
    let radio = MemoryRadio::new();
    let (a, b) = paired_pair(&radio);

    a.engine.broadcast_mode_change(2, 7);
    a.engine.broadcast_frame_rate(15);
    pump(&[&a, &b]);

    let seen = b.handler.seen();
    assert!(seen.contains(&Seen::Mode(2, 7)));
    assert!(seen.contains(&Seen::FrameRate(15)));
    assert!(!a.handler.seen().contains(&Seen::Mode(2, 7)));
}

#[test]
fn mirror_without_paired_peer_sends_nothing() {
    let radio = MemoryRadio::new();
    let a = device(&radio, 1);
    let b = device(&radio, 2);

    assert!(!a.engine.has_paired_peer());
    a.engine.broadcast_brightness(10);

    assert!(b.engine.transport().try_recv().is_none());
}

// ===========================================
// Scenario C: liveness timeout
// ===========================================

#[test]
fn silent_peer_goes_offline_once() {
    let radio = MemoryRadio::new();
    let (a, b) = paired_pair(&radio);

    radio.silence(a.address());
    run_until(&[&a, &b], LIVENESS_TIMEOUT_MS - 1, 500);
    assert!(b.peer_for(&a).unwrap().peer.online);

    run_until(&[&a, &b], LIVENESS_TIMEOUT_MS, 1);
    assert!(!b.peer_for(&a).unwrap().peer.online);
    assert!(!b.engine.has_paired_peer());

    run_until(&[&a, &b], 3 * LIVENESS_TIMEOUT_MS, 500);
    let offline: Vec<_> = b
        .handler
        .peer_updates(a.address())
        .into_iter()
        .filter(|s| !s.peer.online)
        .collect();
    assert_eq!(offline.len(), 1, "offline edge reported exactly once");
    assert_eq!(b.peer_for(&a).unwrap().peer.state, PeerState::Paired);
}

#[test]
fn returning_peer_comes_back_online() {
    let radio = MemoryRadio::new();
    let (a, b) = paired_pair(&radio);

    radio.silence(a.address());
    run_until(&[&a, &b], 12_000, 1_000);
    radio.restore(a.address());
    run_until(&[&a, &b], 16_000, 1_000);

    assert!(b.peer_for(&a).unwrap().peer.online);
    let updates = b.handler.peer_updates(a.address());
    let last = updates.last().unwrap();
    assert!(last.peer.online);
}

// ===========================================
// Scenario D: unanswered request is evicted
// ===========================================

#[test]
fn unanswered_pair_request_is_evicted() {
    let radio = MemoryRadio::new();
    let a = device(&radio, 1);
    let b = device(&radio, 2);
    b.engine.set_auto_pair(false);

    // A discovers B from its heartbeat, then asks to pair
    b.engine.tick();
    pump(&[&a, &b]);
    a.engine.start_pairing();
    pump(&[&a, &b]);
    assert_eq!(a.peer_for(&b).unwrap().peer.state, PeerState::PairRequestSent);

    run_until(&[&a, &b], 29_000, 1_000);
    assert!(a.peer_for(&b).is_some());

    // B keeps heartbeating; only the request age matters
    a.clock.set(30_000);
    a.engine.tick();
    assert!(a.peer_for(&b).is_none());
    assert!(a.handler.seen().contains(&Seen::Removed(b.address())));
    assert!(b
        .peer_for(&a)
        .map_or(true, |p| p.peer.state != PeerState::Paired));
}

// ===========================================
// Scenario E: independent unicast
// ===========================================

#[test]
fn peer_brightness_targets_one_peer_in_independent_mode() {
    let radio = MemoryRadio::new();
    let a = device(&radio, 1);
    let b = device(&radio, 2);
    let c = device(&radio, 3);
    a.engine.start_pairing();
    pump(&[&a, &b, &c]);
    assert_eq!(a.engine.peer_count(), 2);

    a.engine.set_sync_mode(SyncMode::Independent);
    let target = a.engine.peer(1).unwrap().peer.address;
    a.engine.send_peer_brightness(1, 50);
    pump(&[&a, &b, &c]);

    let (hit, missed) = if target == c.address() { (&c, &b) } else { (&b, &c) };
    assert_eq!(hit.handler.brightness(), vec![50]);
    assert!(missed.handler.brightness().is_empty());
}

// ===========================================
// Unpairing and time sync
// ===========================================

#[test]
fn unpair_all_clears_both_sides() {
    let radio = MemoryRadio::new();
    let (a, b) = paired_pair(&radio);

    a.engine.unpair_all();
    pump(&[&a, &b]);

    assert_eq!(a.engine.peer_count(), 0);
    assert_eq!(b.engine.peer_count(), 0);
    assert!(!a.engine.transport().is_registered(&b.address()));
    assert!(!b.engine.transport().is_registered(&a.address()));
    assert!(b.handler.seen().contains(&Seen::Removed(a.address())));
}

#[test]
fn unpair_peer_removes_one_entry() {
    let radio = MemoryRadio::new();
    let a = device(&radio, 1);
    let b = device(&radio, 2);
    let c = device(&radio, 3);
    a.engine.start_pairing();
    pump(&[&a, &b, &c]);

    a.engine.unpair_peer(0);
    pump(&[&a, &b, &c]);

    assert_eq!(a.engine.peer_count(), 1);
    assert_eq!(b.engine.peer_count() + c.engine.peer_count(), 1);
}

#[test]
fn time_offset_sign_convention() {
    let radio = MemoryRadio::new();
    let (a, b) = paired_pair(&radio);

    // A's clock reads 100 ms ahead of B's
    a.clock.set(1_100);
    b.clock.set(1_000);
    a.engine.tick();
    pump(&[&a, &b]);

    assert_eq!(b.engine.time_offset(), 100);
    assert!(b.handler.seen().contains(&Seen::Offset(100)));
}
