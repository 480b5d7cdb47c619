//! Fixed-duration progress clock
//!
//! Progress is derived from the tick count, never accumulated, and is exactly
//! 100.0 from the final tick on.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Ticks in a full recording
pub const DEFAULT_TOTAL_TICKS: u32 = 30;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Progress after `ticks` of `total_ticks`, clamped to 100
pub fn progress_at(ticks: u32, total_ticks: u32) -> f64 {
    if total_ticks == 0 || ticks >= total_ticks {
        return 100.0;
    }
    f64::from(ticks) * 100.0 / f64::from(total_ticks)
}

pub struct ProgressClock {
    interval: Interval,
    ticks: u32,
    total_ticks: u32,
    stopped: bool,
}

impl ProgressClock {
    /// Clock whose first tick fires one `tick_interval` from now
    pub fn new(total_ticks: u32, tick_interval: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + tick_interval, tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            ticks: 0,
            total_ticks,
            stopped: false,
        }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn progress(&self) -> f64 {
        progress_at(self.ticks, self.total_ticks)
    }

    pub fn is_complete(&self) -> bool {
        self.ticks >= self.total_ticks
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Count one tick without waiting
    pub fn advance(&mut self) -> f64 {
        if !self.stopped {
            self.ticks = self.ticks.saturating_add(1);
            if self.is_complete() {
                self.stop();
            }
        }
        self.progress()
    }

    /// Wait for the next tick and return the new progress
    ///
    /// Returns `None` once the clock is stopped.
    pub async fn next_tick(&mut self) -> Option<f64> {
        if self.stopped {
            return None;
        }
        self.interval.tick().await;
        Some(self.advance())
    }

    /// Stop the clock; returns true only on the first call
    pub fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;
        debug!(ticks = self.ticks, "Progress clock stopped");
        true
    }
}
