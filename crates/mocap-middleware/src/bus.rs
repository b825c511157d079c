//! Headless, channel-addressed publish/subscribe bus.
//!
//! Uses a [`tokio::sync::broadcast`] channel under the hood so that every
//! subscriber receives every [`PoseMessage`] without any single subscriber
//! blocking the relay.  A [`ChannelSubscriber`] filters on the exact channel
//! name (e.g. `"MOCAP#2"`) and is polled without blocking, like the relay's
//! own frame source.
//!
//! Publishing never waits: a slow subscriber loses the oldest messages, logs
//! the lag and carries on from the oldest message still buffered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mocap_types::{PoseMessage, RelayError};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Default channel capacity (number of buffered messages before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 1024;

/// Shared pose bus. Clone it cheaply – all clones share the same underlying
/// broadcast channel and the same open/closed state.
#[derive(Clone, Debug)]
pub struct PoseBus {
    sender: broadcast::Sender<PoseMessage>,
    closed: Arc<AtomicBool>,
}

impl PoseBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 (a Tokio broadcast restriction).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publish `message` to every current subscriber.
    ///
    /// Returns the number of receivers that were handed the message.
    /// Returns `Ok(0)` when nobody is listening (this is a normal condition,
    /// not an error).
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::TransportUnhealthy`] once the bus has been
    /// [closed][PoseBus::close].
    pub fn publish(&self, message: PoseMessage) -> Result<usize, RelayError> {
        if self.is_closed() {
            return Err(RelayError::TransportUnhealthy(format!(
                "pose bus closed, dropping message for {}",
                message.channel
            )));
        }
        // SendError only means there are no receivers right now.
        Ok(self.sender.send(message).unwrap_or(0))
    }

    /// Subscribe to a single channel, e.g. `"MOCAP#1"`.
    pub fn subscribe_channel(&self, channel: impl Into<String>) -> ChannelSubscriber {
        ChannelSubscriber {
            channel: channel.into(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Mark the bus as unusable.  Subsequent publishes fail and
    /// [`PoseBus::is_closed`] reports `true`.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("pose bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for PoseBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Channel subscriber
// ---------------------------------------------------------------------------

/// A subscriber that only delivers messages published on one channel.
pub struct ChannelSubscriber {
    channel: String,
    receiver: broadcast::Receiver<PoseMessage>,
}

impl ChannelSubscriber {
    /// Next queued message on this subscriber's channel.  Returns `None` when
    /// no matching message is waiting.
    pub fn try_recv(&mut self) -> Option<PoseMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(msg) if msg.channel == self.channel => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(channel = %self.channel, lagged_by = n, "ChannelSubscriber lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}
