//! Command-line flags.  Every flag is optional and overrides the matching
//! config field when given.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::config::{Mode, RelayConfig, SourceKind};

#[derive(Debug, Parser)]
#[command(
    name = "mocap-relay",
    version,
    about = "Relay motion-capture rigid-body poses onto MOCAP#<n> channels",
    after_help = "Example:\n  mocap-relay -l 192.168.1.20 -s 192.168.1.10\n  mocap-relay -l 192.168.1.20 -s 192.168.1.10 --mode histogram > time.txt"
)]
pub struct Cli {
    /// Local interface address frames are received on.
    #[arg(short = 'l', long, value_name = "IP")]
    pub local_addr: Option<Ipv4Addr>,

    /// Capture server address.
    #[arg(short = 's', long, value_name = "IP")]
    pub server_addr: Option<Ipv4Addr>,

    /// Destination of published pose datagrams.
    #[arg(long, value_name = "IP:PORT")]
    pub publish_addr: Option<SocketAddr>,

    /// Relay poses, or collect inter-frame arrival statistics.
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Frame source.
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// Pause between drains, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Print every relayed frame to stdout.
    #[arg(long)]
    pub echo_frames: bool,

    /// Config file (default `~/.mocap-relay/config.toml`).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the resolved configuration to the config file and exit.
    #[arg(long)]
    pub save_config: bool,
}

impl Cli {
    /// Overlay the flags that were given onto `cfg`.
    pub fn apply_to(&self, cfg: &mut RelayConfig) {
        if let Some(addr) = self.local_addr {
            cfg.local_addr = Some(addr);
        }
        if let Some(addr) = self.server_addr {
            cfg.server_addr = Some(addr);
        }
        if let Some(addr) = self.publish_addr {
            cfg.publish_addr = addr;
        }
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if let Some(source) = self.source {
            cfg.source = source;
        }
        if let Some(ms) = self.poll_interval_ms {
            cfg.poll_interval_ms = ms;
        }
        if self.echo_frames {
            cfg.echo_frames = true;
        }
    }
}
