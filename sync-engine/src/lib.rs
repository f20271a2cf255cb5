//! # sync-engine
//!
//! Runtime for the nebula-sync peer protocol.
//!
//! [`SyncEngine`] wraps the pure [`SyncProtocol`](sync_core::SyncProtocol)
//! state machine and interprets its actions against a [`Transport`], a
//! [`Clock`] and the application's [`SyncHandler`].
//!
//! ## Architecture
//!
//! ```text
//! control surface ──▶ SyncEngine ──▶ Transport ──▶ radio
//!                        │  ▲
//!                        ▼  │ handle_frame / tick
//!                  sync-core (pure)        SyncHandler ──▶ renderer
//! ```
//!
//! The receive path and the main-loop tick may run concurrently (see
//! [`spawn_driver`]); both serialize on the engine's single protocol lock.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_engine::{MemoryRadio, NoopHandler, SyncEngine, SystemClock};
//!
//! let radio = MemoryRadio::new();
//! let transport = radio.attach("02:00:00:00:00:01".parse()?);
//! let engine = SyncEngine::new(
//!     "Poi-A",
//!     Default::default(),
//!     transport,
//!     Arc::new(SystemClock::new()),
//!     Arc::new(NoopHandler),
//! )?;
//! engine.start_pairing();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod driver;
pub mod engine;
pub mod guard;
pub mod handler;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{spawn_driver, SyncDriver};
pub use engine::{EngineError, SyncEngine};
pub use guard::{ApplyGuard, RemoteApplyGuard};
pub use handler::{NoopHandler, SyncHandler};
pub use transport::{
    MemoryRadio, MemoryTransport, MockTransport, PeerList, Transport, TransportError,
    MAX_REGISTERED_PEERS,
};
