//! Shared fixtures for unit tests.

use sync_types::{HeartbeatPayload, MacAddress, Message, PairPayload, SyncMode};

use crate::{Action, PeerIndex, ProtocolConfig, SyncEvent, SyncProtocol};

pub(crate) fn addr(n: u8) -> MacAddress {
    MacAddress::new([0x02, 0, 0, 0, 0, n])
}

pub(crate) fn protocol(n: u8) -> SyncProtocol {
    SyncProtocol::new(addr(n), format!("Poi-{}", n), ProtocolConfig::default())
}

pub(crate) fn pair_request(n: u8) -> Message {
    Message::PairRequest(PairPayload {
        address: addr(n),
        name: format!("Poi-{}", n),
        accepted: false,
    })
}

pub(crate) fn pair_response(n: u8, accepted: bool) -> Message {
    Message::PairResponse(PairPayload {
        address: addr(n),
        name: format!("Poi-{}", n),
        accepted,
    })
}

pub(crate) fn heartbeat(name: &str) -> Message {
    Message::Heartbeat(HeartbeatPayload {
        mode: 1,
        index: 2,
        brightness: 100,
        frame_delay: 25,
        uptime_ms: 9_000,
        sync_mode: Some(SyncMode::Mirror),
        name: name.into(),
    })
}

/// Pair `proto` with device `n` through an inbound request.
pub(crate) fn pair_with(proto: &mut SyncProtocol, n: u8, now: u64) -> PeerIndex {
    proto.handle_message(addr(n), pair_request(n), now);
    proto
        .registry()
        .find(&addr(n))
        .expect("pair request should create an entry")
}

pub(crate) fn sends(actions: &[Action]) -> Vec<(MacAddress, &Message)> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::Send { to, message } => Some((*to, message)),
            _ => None,
        })
        .collect()
}

pub(crate) fn events(actions: &[Action]) -> Vec<&SyncEvent> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::Emit(event) => Some(event),
            _ => None,
        })
        .collect()
}
