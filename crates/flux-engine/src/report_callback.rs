//! Tick callback that tracks the run and builds the final report.
//!
//! After each tick, this callback logs the tick summary as JSON at debug
//! level, records peak grid energy, and every `snapshot_interval` ticks
//! captures a full grid snapshot.

use serde::Serialize;
use tracing::{debug, info, warn};

use flux_core::runner::TickCallback;
use flux_core::tick::{SimulationState, TickSummary};
use flux_core::SimulationResult;
use flux_world::BlockSnapshot;

/// What the engine prints when the run ends.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Simulation name from config.
    pub world_name: String,
    /// How the run ended.
    pub result: SimulationResult,
    /// Highest grid total seen at the end of any tick.
    pub peak_energy: u128,
    /// Tick at which the latest snapshot was taken.
    pub snapshot_tick: u64,
    /// Latest grid snapshot.
    pub blocks: Vec<BlockSnapshot>,
}

/// Callback that accumulates the run report.
pub struct ReportCallback {
    snapshot_interval: u64,
    peak_energy: u128,
    snapshot_tick: u64,
    latest: Vec<BlockSnapshot>,
}

impl ReportCallback {
    /// Create a callback snapshotting every `snapshot_interval` ticks
    /// (0 = only at the end).
    pub const fn new(snapshot_interval: u64) -> Self {
        Self {
            snapshot_interval,
            peak_energy: 0,
            snapshot_tick: 0,
            latest: Vec::new(),
        }
    }

    /// Take a snapshot outside the tick cycle, e.g. before the first tick
    /// or after the last.
    pub fn capture(&mut self, state: &SimulationState) {
        self.snapshot_tick = state.clock.tick();
        self.latest = state.world.snapshot();
    }

    /// Finish the run and assemble the report.
    pub fn into_report(self, world_name: String, result: SimulationResult) -> RunReport {
        RunReport {
            world_name,
            result,
            peak_energy: self.peak_energy,
            snapshot_tick: self.snapshot_tick,
            blocks: self.latest,
        }
    }
}

impl TickCallback for ReportCallback {
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState) {
        match serde_json::to_string(summary) {
            Ok(json) => debug!(tick = summary.tick, summary = %json, "Tick summary"),
            Err(e) => warn!(tick = summary.tick, error = %e, "failed to serialize tick summary"),
        }

        self.peak_energy = self.peak_energy.max(summary.total_energy);

        let due = self.snapshot_interval > 0
            && summary.tick.checked_rem(self.snapshot_interval) == Some(0);
        if due {
            self.capture(state);
            info!(
                tick = summary.tick,
                blocks = self.latest.len(),
                total_energy = %summary.total_energy,
                "Grid snapshot taken"
            );
        }
    }
}
