//! Configuration loading for nebula-sync.
//!
//! Configuration is loaded from a TOML file (default: `nebula-sync.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use sync_core::{
    ProtocolConfig, DISCOVERY_TIMEOUT_MS, HEARTBEAT_INTERVAL_MS, LIVENESS_TIMEOUT_MS,
    TIME_SYNC_INTERVAL_MS,
};
use sync_types::{MacAddress, SyncError, SyncMode};

/// Root configuration for nebula-sync.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Device identity.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Protocol timings.
    #[serde(default)]
    pub timing: TimingConfig,
    /// UDP radio emulation.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Device identity.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Name announced in heartbeats and pair messages (default: "Poi").
    #[serde(default = "default_name")]
    pub name: String,
    /// Radio address; a random locally-administered one when absent.
    pub address: Option<MacAddress>,
    /// Answer pair requests automatically (default: true).
    #[serde(default = "default_auto_pair")]
    pub auto_pair: bool,
    /// Mirror or independent operation (default: mirror).
    #[serde(default)]
    pub sync_mode: SyncMode,
}

/// Protocol timings in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Heartbeat broadcast interval (default: 2000).
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Offline threshold for paired peers (default: 10000).
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_ms: u64,
    /// Discovery entry lifetime (default: 30000).
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_ms: u64,
    /// Clock broadcast interval in mirror mode (default: 5000).
    #[serde(default = "default_time_sync_interval")]
    pub time_sync_interval_ms: u64,
    /// How often the engine is ticked (default: 50).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

/// UDP radio emulation.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Local socket address (default: 0.0.0.0:4210).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Destination for every outgoing datagram (default: 255.255.255.255:4210).
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: String,
}

/// Log output.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_name() -> String {
    "Poi".to_string()
}

fn default_auto_pair() -> bool {
    true
}

fn default_heartbeat_interval() -> u64 {
    HEARTBEAT_INTERVAL_MS
}

fn default_liveness_timeout() -> u64 {
    LIVENESS_TIMEOUT_MS
}

fn default_discovery_timeout() -> u64 {
    DISCOVERY_TIMEOUT_MS
}

fn default_time_sync_interval() -> u64 {
    TIME_SYNC_INTERVAL_MS
}

fn default_tick_interval() -> u64 {
    50
}

fn default_bind_address() -> String {
    "0.0.0.0:4210".to_string()
}

fn default_broadcast_address() -> String {
    "255.255.255.255:4210".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            address: None,
            auto_pair: default_auto_pair(),
            sync_mode: SyncMode::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval(),
            liveness_timeout_ms: default_liveness_timeout(),
            discovery_timeout_ms: default_discovery_timeout(),
            time_sync_interval_ms: default_time_sync_interval(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            broadcast_address: default_broadcast_address(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// timings are unusable.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.protocol()?;
        Ok(config)
    }

    /// Protocol timings, validated.
    pub fn protocol(&self) -> Result<ProtocolConfig, ConfigError> {
        let protocol = ProtocolConfig {
            heartbeat_interval_ms: self.timing.heartbeat_interval_ms,
            liveness_timeout_ms: self.timing.liveness_timeout_ms,
            discovery_timeout_ms: self.timing.discovery_timeout_ms,
            time_sync_interval_ms: self.timing.time_sync_interval_ms,
        };
        protocol.validate()?;
        if self.timing.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(sync_core::ConfigError::Zero(
                "tick interval",
            )));
        }
        Ok(protocol)
    }

    /// Engine tick period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.timing.tick_interval_ms)
    }

    /// Configured radio address, or a fresh random one.
    pub fn device_address(&self) -> Result<MacAddress, SyncError> {
        match self.device.address {
            Some(address) => Ok(address),
            None => MacAddress::random_local(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Values parsed but cannot be used.
    #[error(transparent)]
    Invalid(#[from] sync_core::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.device.name, "Poi");
        assert!(config.device.auto_pair);
        assert_eq!(config.network.bind_address, "0.0.0.0:4210");
        assert_eq!(config.protocol().unwrap(), ProtocolConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[device]
name = "Left"
address = "02:00:00:00:00:07"
auto_pair = false
sync_mode = "independent"

[timing]
heartbeat_interval_ms = 1000
liveness_timeout_ms = 4000

[network]
bind_address = "127.0.0.1:5000"

[logging]
filter = "debug"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.device.name, "Left");
        assert_eq!(
            config.device_address().unwrap(),
            MacAddress::new([0x02, 0, 0, 0, 0, 7])
        );
        assert!(!config.device.auto_pair);
        assert_eq!(config.device.sync_mode, SyncMode::Independent);
        assert_eq!(config.timing.heartbeat_interval_ms, 1000);
        assert_eq!(config.timing.discovery_timeout_ms, DISCOVERY_TIMEOUT_MS);
        assert_eq!(config.network.bind_address, "127.0.0.1:5000");
        assert_eq!(config.network.broadcast_address, "255.255.255.255:4210");
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn config_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.timing.liveness_timeout_ms, LIVENESS_TIMEOUT_MS);
        assert_eq!(config.device.sync_mode, SyncMode::Mirror);
        assert!(config.device.address.is_none());
    }

    #[test]
    fn missing_address_is_random_and_local() {
        let address = Config::default().device_address().unwrap();
        assert_eq!(address.as_bytes()[0] & 0x03, 0x02);
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[device]\nname = \"Right\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.device.name, "Right");
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn from_file_bad_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[device\nname = 3").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn from_file_rejects_bad_timings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[timing]\nheartbeat_interval_ms = 5000\nliveness_timeout_ms = 5000"
        )
        .unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(sync_core::ConfigError::LivenessBelowHeartbeat { .. })
        ));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let config: Config = toml::from_str("[timing]\ntick_interval_ms = 0").unwrap();
        assert!(matches!(
            config.protocol(),
            Err(ConfigError::Invalid(sync_core::ConfigError::Zero(_)))
        ));
    }
}
