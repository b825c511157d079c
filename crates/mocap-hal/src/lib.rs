//! `mocap-hal` – where frames come from.
//!
//! Everything that talks to the capture server lives behind the
//! [`FrameSource`] trait.  A background receiver thread fills a
//! [`FrameBuffer`]; the relay drains it with non-blocking polls.
//!
//! # Modules
//!
//! - [`source`] – the [`FrameSource`] trait and [`ReceiverThread`], the
//!   stoppable handle shared by every background receiver.
//! - [`buffer`] – [`FrameBuffer`]: bounded, lock-protected frame queue.
//! - [`listener`] – [`UdpFrameListener`]: receives frame datagrams from the
//!   capture server and stamps them with their arrival time.
//! - [`sim`] – [`ScriptedSource`] and [`SimulatedStream`] for running the
//!   relay without capture hardware.

pub mod buffer;
pub mod listener;
pub mod sim;
pub mod source;

pub use buffer::FrameBuffer;
pub use listener::{ListenerConfig, UdpFrameListener};
pub use sim::{ScriptedSource, SimulatedStream};
pub use source::{FrameSource, ReceiverThread};
