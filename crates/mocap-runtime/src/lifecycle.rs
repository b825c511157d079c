//! [`RunFlag`] – cooperative shutdown signal shared by the active loop and
//! the interrupt handler.
//!
//! The flag starts out running.  [`RunFlag::stop`] clears it exactly once;
//! loops read it at the top of every polling round.  Clones share state, so
//! the interrupt handler gets a clone and the loop keeps the original.
//!
//! ```rust
//! use mocap_runtime::lifecycle::RunFlag;
//!
//! let run = RunFlag::new();
//! let handler_side = run.clone();
//! assert!(run.is_running());
//! handler_side.stop();
//! assert!(!run.is_running());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

#[derive(Clone, Debug)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag.  Returns `true` for the call that actually cleared it.
    pub fn stop(&self) -> bool {
        let was_running = self.0.swap(false, Ordering::SeqCst);
        if was_running {
            info!("shutdown requested");
        }
        was_running
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_observed_by_every_clone() {
        let run = RunFlag::new();
        let a = run.clone();
        let b = run.clone();
        assert!(a.is_running() && b.is_running());
        run.stop();
        assert!(!a.is_running());
        assert!(!b.is_running());
    }

    #[test]
    fn only_first_stop_reports_transition() {
        let run = RunFlag::new();
        assert!(run.stop());
        assert!(!run.stop());
    }

    #[test]
    fn stop_from_another_thread_is_visible() {
        let run = RunFlag::new();
        let remote = run.clone();
        std::thread::spawn(move || remote.stop()).join().unwrap();
        assert!(!run.is_running());
    }
}
