//! The pose sink the relay publishes into.
//!
//! The relay never talks to a transport directly.  It hands every
//! `(channel, record)` pair to a [`PosePublisher`], and asks the publisher
//! once per polling round whether the transport is still usable.
//!
//! - [`BusPublisher`] – forwards into the in-process [`PoseBus`].
//! - [`UdpPublisher`][crate::udp_publisher::UdpPublisher] – JSON datagrams to
//!   a UDP multicast group.

use mocap_types::{PoseMessage, PoseRecord, RelayError};
use tracing::trace;

use crate::bus::PoseBus;

/// Every transport the relay can publish to implements this trait.
///
/// # Contract
///
/// * `publish` – serializes `record` into the transport's wire format and
///   sends it on `channel`.  No retries: a failure is reported and the
///   message is gone.
/// * `is_healthy` – `false` once the transport can no longer deliver.  The
///   relay treats an unhealthy publisher as fatal.
pub trait PosePublisher: Send {
    /// Publish one pose record on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Publish`] or
    /// [`RelayError::TransportUnhealthy`] when the message could not be
    /// handed to the transport.
    fn publish(&mut self, channel: &str, record: &PoseRecord) -> Result<(), RelayError>;

    /// Liveness of the underlying transport.
    fn is_healthy(&self) -> bool;
}

impl<P: PosePublisher + ?Sized> PosePublisher for Box<P> {
    fn publish(&mut self, channel: &str, record: &PoseRecord) -> Result<(), RelayError> {
        (**self).publish(channel, record)
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}

/// Publishes onto an in-process [`PoseBus`].
///
/// Healthy until the bus is closed.
#[derive(Clone, Debug)]
pub struct BusPublisher {
    bus: PoseBus,
}

impl BusPublisher {
    pub fn new(bus: PoseBus) -> Self {
        Self { bus }
    }
}

impl PosePublisher for BusPublisher {
    fn publish(&mut self, channel: &str, record: &PoseRecord) -> Result<(), RelayError> {
        let delivered = self.bus.publish(PoseMessage {
            channel: channel.to_string(),
            record: *record,
        })?;
        trace!(channel, delivered, "pose published on bus");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.bus.is_closed()
    }
}
