//! UDP transport for pose records.
//!
//! Each `(channel, record)` pair is serialized as one JSON [`PoseMessage`]
//! datagram and sent to a fixed destination, typically a multicast group
//! such as `239.255.76.67:7667`.  Any number of subscribers on the segment
//! can join the group and filter on `channel`.
//!
//! A failed send marks the publisher unhealthy; there is no reconnect.

use std::net::{SocketAddr, UdpSocket};

use mocap_types::{PoseMessage, PoseRecord, RelayError};
use tracing::{debug, error, info};

/// Multicast TTL: stay on the local segment.
const MULTICAST_TTL: u32 = 1;

/// Publishes pose records as JSON datagrams.
#[derive(Debug)]
pub struct UdpPublisher {
    socket: UdpSocket,
    destination: SocketAddr,
    healthy: bool,
    sent: u64,
}

impl UdpPublisher {
    /// Bind an ephemeral local socket and target `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Io`] if the socket cannot be created or
    /// configured.
    pub fn connect(destination: SocketAddr) -> Result<Self, RelayError> {
        let bind_addr: SocketAddr = if destination.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr)?;
        if destination.ip().is_multicast() && destination.is_ipv4() {
            socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
        }
        info!(%destination, local = ?socket.local_addr().ok(), "udp publisher ready");
        Ok(Self {
            socket,
            destination,
            healthy: true,
            sent: 0,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Number of datagrams sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl crate::publisher::PosePublisher for UdpPublisher {
    fn publish(&mut self, channel: &str, record: &PoseRecord) -> Result<(), RelayError> {
        if !self.healthy {
            return Err(RelayError::TransportUnhealthy(format!(
                "udp publisher to {} is down",
                self.destination
            )));
        }
        let message = PoseMessage {
            channel: channel.to_string(),
            record: *record,
        };
        let payload = serde_json::to_vec(&message)
            .map_err(|e| RelayError::Serialization(e.to_string()))?;

        match self.socket.send_to(&payload, self.destination) {
            Ok(_) => {
                self.sent += 1;
                debug!(channel, bytes = payload.len(), "pose datagram sent");
                Ok(())
            }
            Err(e) => {
                self.healthy = false;
                error!(channel, destination = %self.destination, error = %e, "udp send failed");
                Err(RelayError::Publish {
                    channel: channel.to_string(),
                    details: e.to_string(),
                })
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}
