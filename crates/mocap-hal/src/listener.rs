//! [`UdpFrameListener`] – background receiver for capture-server frames.
//!
//! The listener owns a UDP socket on the local interface and a thread that
//! reads one frame per datagram, stamps it with its monotonic arrival time
//! and pushes it into a shared [`FrameBuffer`].  Datagrams from any host other
//! than the configured server are ignored, as are datagrams that fail to
//! decode.
//!
//! A datagram carries the rigid bodies of one frame, in the capture server's
//! order:
//!
//! ```json
//! {"rigid_bodies": [
//!   {"position": {"x": 1.0, "y": 2.0, "z": 3.0},
//!    "orientation": {"qx": 0.0, "qy": 0.0, "qz": 0.0, "qw": 1.0}}
//! ]}
//! ```

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mocap_types::{Frame, RelayError, RigidBody};
use serde::Deserialize;
use tracing::{debug, error, info, trace, warn};

use crate::buffer::FrameBuffer;
use crate::source::ReceiverThread;

/// Largest datagram the listener accepts.
const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Default data port of the capture server.
pub const DEFAULT_DATA_PORT: u16 = 1511;

/// How often the receive thread wakes up to check its stop flag.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Socket parameters for [`UdpFrameListener`].
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address of the local interface to receive on.
    pub local_addr: Ipv4Addr,
    /// Address of the capture server; datagrams from other hosts are dropped.
    /// [`Ipv4Addr::UNSPECIFIED`] accepts any sender.
    pub server_addr: Ipv4Addr,
    /// UDP port frames arrive on (`0` picks an ephemeral port).
    pub data_port: u16,
    /// Multicast group to join on `local_addr`.  `None` receives unicast on
    /// `local_addr` only.
    pub multicast_group: Option<Ipv4Addr>,
    pub read_timeout: Duration,
}

impl ListenerConfig {
    pub fn new(local_addr: Ipv4Addr, server_addr: Ipv4Addr) -> Self {
        Self {
            local_addr,
            server_addr,
            data_port: DEFAULT_DATA_PORT,
            multicast_group: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

#[derive(Deserialize)]
struct FrameDatagram {
    rigid_bodies: Vec<RigidBody>,
}

/// A running frame listener.  Dropping it stops and joins the receive thread.
pub struct UdpFrameListener {
    local: SocketAddr,
    receiver: ReceiverThread,
}

impl UdpFrameListener {
    /// Bind the data socket and start receiving into `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Io`] if the socket cannot be bound or the
    /// multicast group cannot be joined, and [`RelayError::Source`] if the
    /// receive thread cannot be spawned.
    pub fn start(config: ListenerConfig, buffer: FrameBuffer) -> Result<Self, RelayError> {
        let bind_ip = match config.multicast_group {
            Some(_) => Ipv4Addr::UNSPECIFIED,
            None => config.local_addr,
        };
        let socket = UdpSocket::bind((bind_ip, config.data_port))?;
        if let Some(group) = config.multicast_group {
            socket.join_multicast_v4(&group, &config.local_addr)?;
            info!(%group, interface = %config.local_addr, "joined capture multicast group");
        }
        socket.set_read_timeout(Some(config.read_timeout))?;
        let local = socket.local_addr()?;
        info!(%local, server = %config.server_addr, "frame listener bound");

        let server = config.server_addr;
        let receiver = ReceiverThread::spawn("mocap-frame-listener", move |stop| {
            receive_loop(&socket, server, &buffer, &stop);
        })?;

        Ok(Self { local, receiver })
    }

    /// Address the data socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Stop the receive thread and wait for it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Source`] if the receive thread panicked.
    pub fn join(self) -> Result<(), RelayError> {
        self.receiver.join()
    }

    /// Hand back the underlying thread handle, e.g. to manage it alongside
    /// other receivers.
    pub fn into_receiver(self) -> ReceiverThread {
        self.receiver
    }
}

fn receive_loop(socket: &UdpSocket, server: Ipv4Addr, buffer: &FrameBuffer, stop: &AtomicBool) {
    let epoch = Instant::now();
    let mut datagram = vec![0u8; MAX_DATAGRAM_SIZE];

    while !stop.load(Ordering::SeqCst) {
        let (len, peer) = match socket.recv_from(&mut datagram) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                error!(error = %e, "frame socket failed, listener exiting");
                break;
            }
        };
        let arrival = epoch.elapsed();

        if !server.is_unspecified() && peer.ip() != server {
            trace!(%peer, "ignoring datagram from non-server host");
            continue;
        }

        match serde_json::from_slice::<FrameDatagram>(&datagram[..len]) {
            Ok(decoded) => {
                trace!(bodies = decoded.rigid_bodies.len(), "frame received");
                buffer.push(Frame::new(arrival, decoded.rigid_bodies));
            }
            Err(e) => warn!(%peer, bytes = len, error = %e, "malformed frame datagram"),
        }
    }
    debug!("frame listener stopped");
}
