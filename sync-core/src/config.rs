//! Protocol timing configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Interval between heartbeat broadcasts.
pub const HEARTBEAT_INTERVAL_MS: u64 = 2_000;

/// Silence after which a paired peer is considered offline.
pub const LIVENESS_TIMEOUT_MS: u64 = 10_000;

/// Age after which an unpaired discovery entry is purged.
pub const DISCOVERY_TIMEOUT_MS: u64 = 30_000;

/// Interval between clock broadcasts in mirror mode.
pub const TIME_SYNC_INTERVAL_MS: u64 = 5_000;

/// Invalid protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An interval or timeout was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// Peers would flap offline between two heartbeats.
    #[error("liveness timeout ({liveness_ms} ms) must exceed heartbeat interval ({heartbeat_ms} ms)")]
    LivenessBelowHeartbeat {
        /// Configured liveness timeout
        liveness_ms: u64,
        /// Configured heartbeat interval
        heartbeat_ms: u64,
    },
}

/// Timings used by [`SyncProtocol`](crate::SyncProtocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Heartbeat broadcast interval (ms).
    pub heartbeat_interval_ms: u64,
    /// Offline threshold for paired peers (ms).
    pub liveness_timeout_ms: u64,
    /// Discovery entry lifetime (ms).
    pub discovery_timeout_ms: u64,
    /// Clock broadcast interval (ms).
    pub time_sync_interval_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            liveness_timeout_ms: LIVENESS_TIMEOUT_MS,
            discovery_timeout_ms: DISCOVERY_TIMEOUT_MS,
            time_sync_interval_ms: TIME_SYNC_INTERVAL_MS,
        }
    }
}

impl ProtocolConfig {
    /// Check the timings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("heartbeat interval", self.heartbeat_interval_ms),
            ("liveness timeout", self.liveness_timeout_ms),
            ("discovery timeout", self.discovery_timeout_ms),
            ("time sync interval", self.time_sync_interval_ms),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(name));
        }
        if self.liveness_timeout_ms <= self.heartbeat_interval_ms {
            return Err(ConfigError::LivenessBelowHeartbeat {
                liveness_ms: self.liveness_timeout_ms,
                heartbeat_ms: self.heartbeat_interval_ms,
            });
        }
        Ok(())
    }
}
