//! `mocap-runtime` – the loops that run the relay.
//!
//! # Modules
//!
//! - [`relay_loop`] – [`RelayLoop`]: drains a
//!   [`FrameSource`][mocap_hal::FrameSource], converts every rigid body to a
//!   pose record and publishes it on its `MOCAP#<n>` channel.
//! - [`histogram`] – [`HistogramLoop`] and [`ArrivalHistogram`]: the
//!   diagnostic mode that bins inter-frame arrival gaps instead of relaying.
//! - [`lifecycle`] – [`RunFlag`]: the shutdown signal the interrupt handler
//!   clears.
//! - [`sleeper`] – [`PollSleeper`]: what a loop does between drains.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.
//!
//! Both loops are single-threaded; the only concurrency is the receiver
//! thread behind the frame source and the interrupt handler behind the
//! [`RunFlag`].

pub mod histogram;
pub mod lifecycle;
pub mod relay_loop;
pub mod sleeper;
pub mod telemetry;

pub use histogram::{ArrivalHistogram, HistogramConfig, HistogramLoop, REPORT_HEADER};
pub use lifecycle::RunFlag;
pub use relay_loop::{DEFAULT_POLL_INTERVAL, RelayLoop, RelayLoopConfig, RelayStats};
pub use sleeper::{PollSleeper, ThreadSleeper};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
