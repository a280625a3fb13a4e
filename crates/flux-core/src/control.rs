//! Run control shared between the tick loop and whoever drives it.
//!
//! The engine binary hands a clone of the [`Arc<RunControl>`] to its
//! shutdown handler; the tick loop polls it between ticks and wakes early
//! from its inter-tick sleep when a stop arrives.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::config::WorldConfig;

/// Reason why the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// A stop was requested.
    OperatorStop,
}

/// Shared run control state.
#[derive(Debug)]
pub struct RunControl {
    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Wakes the tick loop out of its inter-tick sleep.
    stop_notify: Notify,

    /// Current tick interval in milliseconds (runtime-adjustable).
    tick_interval_ms: AtomicU64,

    /// Maximum number of ticks (0 = unlimited).
    max_ticks: u64,

    /// Wall-clock time when the control was created.
    started_at: DateTime<Utc>,
}

impl RunControl {
    /// Create run control with the given pacing and bound.
    pub fn new(tick_interval_ms: u64, max_ticks: u64) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            tick_interval_ms: AtomicU64::new(tick_interval_ms),
            max_ticks,
            started_at: Utc::now(),
        }
    }

    /// Create run control from the `world` config section.
    pub fn from_config(world: &WorldConfig) -> Self {
        Self::new(world.tick_interval_ms, world.max_ticks)
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Ask the tick loop to stop after the current tick.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_one();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Sleep for the current tick interval, returning early on a stop.
    pub async fn pause_between_ticks(&self) {
        let interval_ms = self.tick_interval_ms();
        if interval_ms == 0 || self.is_stop_requested() {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)) => {}
            () = self.stop_notify.notified() => {}
        }
    }

    // -----------------------------------------------------------------------
    // Pacing and bounds
    // -----------------------------------------------------------------------

    /// Current tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Change the tick interval; takes effect from the next sleep.
    pub fn set_tick_interval_ms(&self, ms: u64) {
        self.tick_interval_ms.store(ms, Ordering::Release);
    }

    /// Configured tick limit (0 = unlimited).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Whether `tick` is the last tick allowed to run.
    pub const fn tick_limit_reached(&self, tick: u64) -> bool {
        self.max_ticks > 0 && tick >= self.max_ticks
    }

    /// When this control was created.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole seconds since this control was created.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        u64::try_from(elapsed.num_seconds()).unwrap_or(0)
    }
}
