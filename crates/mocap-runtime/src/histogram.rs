//! Inter-frame arrival statistics.
//!
//! [`HistogramLoop`] is the diagnostic alternative to the relay: it drains
//! only frame timestamps, bins the gap between each consecutive pair into an
//! [`ArrivalHistogram`], and leaves the report for the caller to print once
//! the run flag is cleared.
//!
//! Bucket assignment scales by `bins + 1`, not `bins`:
//!
//! ```text
//! bucket = floor((delta_ms − min_ms) / (max_ms − min_ms) × (bins + 1))
//! ```
//!
//! clamped to `[0, bins − 1]`, so the top bucket also absorbs the last
//! 1/(bins+1) of the range.  Reports must stay comparable with existing
//! captures binned the same way.
//!
//! The report is two columns, bucket midpoint in milliseconds and count,
//! which gnuplot plots directly:
//!
//! ```text
//! gnuplot> plot 'time.txt' using 1:2 title 'Time Stats' with bars
//! ```

use std::io::{self, Write};
use std::time::Duration;

use mocap_hal::FrameSource;
use mocap_types::RelayError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::lifecycle::RunFlag;
use crate::relay_loop::DEFAULT_POLL_INTERVAL;
use crate::sleeper::{PollSleeper, ThreadSleeper};

/// Header line written above the bucket lines.
pub const REPORT_HEADER: &str = "# Time diff (ms), Count";

/// Range and resolution of an [`ArrivalHistogram`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    pub min_ms: f64,
    pub max_ms: f64,
    pub bins: usize,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            min_ms: 0.5,
            max_ms: 7.0,
            bins: 100,
        }
    }
}

impl HistogramConfig {
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] for zero bins or an empty or inverted
    /// range.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.bins == 0 {
            return Err(RelayError::Config("histogram needs at least one bin".to_string()));
        }
        if !(self.min_ms.is_finite() && self.max_ms.is_finite()) || self.max_ms <= self.min_ms {
            return Err(RelayError::Config(format!(
                "histogram range [{}, {}] ms is empty",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }
}

/// Fixed-range histogram of inter-arrival gaps.
#[derive(Debug, Clone)]
pub struct ArrivalHistogram {
    config: HistogramConfig,
    counts: Vec<u64>,
    previous: Option<Duration>,
}

impl ArrivalHistogram {
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if `config` fails
    /// [`HistogramConfig::validate`].
    pub fn new(config: HistogramConfig) -> Result<Self, RelayError> {
        config.validate()?;
        Ok(Self {
            config,
            counts: vec![0; config.bins],
            previous: None,
        })
    }

    /// Bucket that `delta_ms` falls into.  Total: anything below the range
    /// lands in bucket 0, anything above in the last bucket.
    pub fn bucket_index(&self, delta_ms: f64) -> usize {
        let HistogramConfig { min_ms, max_ms, bins } = self.config;
        let scaled = ((delta_ms - min_ms) / (max_ms - min_ms) * (bins + 1) as f64).floor();
        if scaled.is_nan() || scaled <= 0.0 {
            0
        } else if scaled >= bins as f64 {
            bins - 1
        } else {
            scaled as usize
        }
    }

    /// Count one gap.
    pub fn record_delta(&mut self, delta_ms: f64) {
        let bucket = self.bucket_index(delta_ms);
        self.counts[bucket] += 1;
    }

    /// Count the gap between `timestamp` and the previous arrival.  The
    /// first arrival only primes the accumulator.  Returns the gap in
    /// milliseconds, if one was recorded.
    pub fn record_arrival(&mut self, timestamp: Duration) -> Option<f64> {
        let previous = self.previous.replace(timestamp)?;
        let delta_ms = timestamp.abs_diff(previous).as_secs_f64() * 1000.0;
        self.record_delta(delta_ms);
        Some(delta_ms)
    }

    /// Centre of bucket `bin` in milliseconds.
    pub fn midpoint(&self, bin: usize) -> f64 {
        let HistogramConfig { min_ms, max_ms, bins } = self.config;
        min_ms + (max_ms - min_ms) * (0.5 + bin as f64) / bins as f64
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of gaps recorded.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `(midpoint_ms, count)` for every bucket, ascending.
    pub fn buckets(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(bin, &count)| (self.midpoint(bin), count))
    }

    /// Write the header and one `<midpoint>, <count>` line per bucket.
    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{REPORT_HEADER}")?;
        for (midpoint, count) in self.buckets() {
            writeln!(out, "{}, {}", format_ms(midpoint), count)?;
        }
        Ok(())
    }
}

/// Up to six decimals, trailing zeros trimmed: `0.5325`, `3.75`, `7`.
fn format_ms(value: f64) -> String {
    let text = format!("{value:.6}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HistogramLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Drains timestamps from a [`FrameSource`] into an [`ArrivalHistogram`]
/// until the run flag is cleared.
pub struct HistogramLoop<S, Z = ThreadSleeper> {
    source: S,
    sleeper: Z,
    poll_interval: Duration,
    histogram: ArrivalHistogram,
}

impl<S: FrameSource> HistogramLoop<S, ThreadSleeper> {
    pub fn new(source: S, histogram: ArrivalHistogram) -> Self {
        Self::with_sleeper(source, histogram, ThreadSleeper, DEFAULT_POLL_INTERVAL)
    }
}

impl<S: FrameSource, Z: PollSleeper> HistogramLoop<S, Z> {
    pub fn with_sleeper(
        source: S,
        histogram: ArrivalHistogram,
        sleeper: Z,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            sleeper,
            poll_interval,
            histogram,
        }
    }

    /// Collect gaps until `run` is cleared and return the histogram.
    pub fn run(&mut self, run: &RunFlag) -> &ArrivalHistogram {
        info!(
            min_ms = self.histogram.config.min_ms,
            max_ms = self.histogram.config.max_ms,
            bins = self.histogram.config.bins,
            "collecting inter-frame arrival statistics"
        );
        while run.is_running() {
            while let Some(timestamp) = self.source.poll_timestamp() {
                if let Some(delta_ms) = self.histogram.record_arrival(timestamp) {
                    debug!(delta_ms, "arrival gap");
                }
            }
            self.sleeper.idle(self.poll_interval);
        }
        info!(samples = self.histogram.total(), "arrival statistics complete");
        &self.histogram
    }
}
