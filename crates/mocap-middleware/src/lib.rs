//! `mocap-middleware` – hands pose records to the outside world.
//!
//! # Modules
//!
//! - [`channel`] – maps a rigid body's slot in a frame to its `MOCAP#<n>`
//!   channel name.
//! - [`publisher`] – the [`PosePublisher`] sink trait and the in-process
//!   [`BusPublisher`].
//! - [`bus`] – headless, channel-addressed publish/subscribe bus built on
//!   Tokio broadcast channels.
//! - [`udp_publisher`] – [`UdpPublisher`]: JSON datagrams to a UDP
//!   (multicast) group.

pub mod bus;
pub mod channel;
pub mod publisher;
pub mod udp_publisher;

pub use bus::{ChannelSubscriber, PoseBus};
pub use channel::{CHANNEL_PREFIX, channel_name};
pub use publisher::{BusPublisher, PosePublisher};
pub use udp_publisher::UdpPublisher;
