//! Relay configuration – reads/writes `~/.mocap-relay/config.toml`.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, `MOCAP_*`
//! environment variables, command-line flags.

use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use mocap_hal::buffer::DEFAULT_BUFFER_CAPACITY;
use mocap_hal::listener::DEFAULT_DATA_PORT;
use mocap_runtime::{HistogramConfig, LogFormat};
use mocap_types::RelayError;
use serde::{Deserialize, Serialize};

/// Which loop the process runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Relay,
    Histogram,
}

/// Where frames come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// UDP frames from the capture server.
    #[default]
    Network,
    /// Synthetic frames generated in-process.
    Sim,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Relay => write!(f, "relay"),
            Mode::Histogram => write!(f, "histogram"),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Network => write!(f, "network"),
            SourceKind::Sim => write!(f, "sim"),
        }
    }
}

/// Everything the relay process needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Local interface frames are received on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_addr: Option<Ipv4Addr>,

    /// Capture server address; frames from other hosts are ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_addr: Option<Ipv4Addr>,

    /// UDP port the capture server sends frames to.
    pub data_port: u16,

    /// Multicast group the capture server sends to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multicast_group: Option<Ipv4Addr>,

    /// Destination of published pose datagrams.
    pub publish_addr: SocketAddr,

    /// Pause between drains, in milliseconds.
    pub poll_interval_ms: u64,

    /// Frames held between the receiver and the loop before the oldest is
    /// dropped.
    pub buffer_capacity: usize,

    pub mode: Mode,
    pub source: SourceKind,

    /// Print every relayed frame to stdout.
    pub echo_frames: bool,

    pub log_format: LogFormat,

    /// Rigid bodies per synthetic frame (`source = "sim"`).
    pub sim_bodies: usize,

    /// Synthetic frame rate in Hz (`source = "sim"`).
    pub sim_rate_hz: u32,

    pub histogram: HistogramConfig,
}

/// Default pose destination: the local-subnet multicast group.
pub const DEFAULT_PUBLISH_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(239, 255, 76, 67), 7667));

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            local_addr: None,
            server_addr: None,
            data_port: DEFAULT_DATA_PORT,
            multicast_group: None,
            publish_addr: DEFAULT_PUBLISH_ADDR,
            poll_interval_ms: 1,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            mode: Mode::default(),
            source: SourceKind::default(),
            echo_frames: false,
            log_format: LogFormat::default(),
            sim_bodies: 3,
            sim_rate_hz: 120,
            histogram: HistogramConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Period between synthetic frames.
    pub fn sim_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.sim_rate_hz.max(1)))
    }

    /// Check that the configuration can start a run.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.source == SourceKind::Network {
            if self.local_addr.is_none() {
                return Err(RelayError::Config(
                    "local address is required (--local-addr or MOCAP_LOCAL_ADDR)".to_string(),
                ));
            }
            if self.server_addr.is_none() {
                return Err(RelayError::Config(
                    "server address is required (--server-addr or MOCAP_SERVER_ADDR)".to_string(),
                ));
            }
        }
        if self.buffer_capacity == 0 {
            return Err(RelayError::Config("buffer_capacity must be at least 1".to_string()));
        }
        if self.source == SourceKind::Sim && self.sim_rate_hz == 0 {
            return Err(RelayError::Config("sim_rate_hz must be at least 1".to_string()));
        }
        if self.mode == Mode::Histogram {
            self.histogram.validate()?;
        }
        Ok(())
    }
}

/// Return the path to `~/.mocap-relay/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mocap-relay").join("config.toml")
}

/// Load the config from a specific path.  Returns `None` if the file does not
/// exist.  Environment overrides are not applied here.
pub fn load_from(path: &Path) -> Result<Option<RelayConfig>, RelayError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        RelayError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw).map_err(|e| {
        RelayError::Config(format!("failed to parse config at {}: {e}", path.display()))
    })?;
    Ok(Some(cfg))
}

/// Resolve the file layer: an explicit path must exist, the default path
/// may be absent.
pub fn load_layered(explicit: Option<&Path>) -> Result<RelayConfig, RelayError> {
    let mut cfg = match explicit {
        Some(path) => load_from(path)?.ok_or_else(|| {
            RelayError::Config(format!("config file {} does not exist", path.display()))
        })?,
        None => load_from(&config_path())?.unwrap_or_default(),
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `MOCAP_*` environment variable overrides to `cfg`.  Values that do
/// not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `MOCAP_LOCAL_ADDR` | `local_addr` |
/// | `MOCAP_SERVER_ADDR` | `server_addr` |
/// | `MOCAP_PUBLISH_ADDR` | `publish_addr` |
/// | `MOCAP_POLL_INTERVAL_MS` | `poll_interval_ms` |
/// | `MOCAP_LOG_FORMAT` | `log_format` |
pub fn apply_env_overrides(cfg: &mut RelayConfig) {
    if let Ok(v) = std::env::var("MOCAP_LOCAL_ADDR")
        && let Ok(addr) = v.trim().parse() {
            cfg.local_addr = Some(addr);
        }
    if let Ok(v) = std::env::var("MOCAP_SERVER_ADDR")
        && let Ok(addr) = v.trim().parse() {
            cfg.server_addr = Some(addr);
        }
    if let Ok(v) = std::env::var("MOCAP_PUBLISH_ADDR")
        && let Ok(addr) = v.trim().parse() {
            cfg.publish_addr = addr;
        }
    if let Ok(v) = std::env::var("MOCAP_POLL_INTERVAL_MS")
        && let Ok(ms) = v.trim().parse() {
            cfg.poll_interval_ms = ms;
        }
    if let Ok(v) = std::env::var("MOCAP_LOG_FORMAT")
        && let Ok(format) = v.parse() {
            cfg.log_format = format;
        }
}

/// Save the config to a specific path, creating its directory if necessary.
pub fn save_to(cfg: &RelayConfig, path: &Path) -> Result<(), RelayError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            RelayError::Config(format!("failed to create config directory: {e}"))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RelayError::Serialization(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        RelayError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}
