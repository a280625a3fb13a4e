//! Simulation loop runner.
//!
//! This module provides [`run_simulation`], the top-level async function
//! that drives the tick loop with support for:
//!
//! - **Bounded simulation**: stop after `max_ticks`
//! - **Variable tick speed**: tick interval adjustable at runtime
//! - **Clean stop**: a stop request ends the loop between ticks
//!
//! The runner wraps the single-tick [`run_tick`] function and adds the
//! control plane around it.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::control::{RunControl, SimulationEndReason};
use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Result of the simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Callback invoked after each tick completes.
///
/// The callback receives the tick summary and the current simulation
/// state.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails. Conservation anomalies and
/// transaction misuse are fatal.
pub async fn run_simulation(
    state: &mut SimulationState,
    control: &Arc<RunControl>,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = control.max_ticks(),
        tick_interval_ms = control.tick_interval_ms(),
        blocks = state.world.block_count(),
        "Simulation starting"
    );

    loop {
        // --- Check stop request (before tick) ---
        if control.is_stop_requested() {
            info!("Stop requested");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::OperatorStop,
                final_summary: last_summary,
                total_ticks,
            });
        }

        // --- Execute tick ---
        let summary = tick::run_tick(state)?;

        total_ticks = total_ticks.saturating_add(1);

        // --- Notify callback ---
        callback.on_tick(&summary, state);

        // --- Check tick limit (after tick) ---
        if control.tick_limit_reached(summary.tick) {
            info!(
                tick = summary.tick,
                max_ticks = control.max_ticks(),
                "Tick limit reached"
            );
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::MaxTicksReached,
                final_summary: Some(summary),
                total_ticks,
            });
        }

        last_summary = Some(summary);

        // --- Sleep for tick interval ---
        control.pause_between_ticks().await;
    }
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            total_energy = %summary.total_energy,
            generated = summary.flows.generated,
            consumed = summary.flows.consumed,
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use flux_energy::EnergyStore;
    use flux_types::{BlockKind, BlockPos, WorldSide};
    use flux_world::{BlockEntity, GridWorld};

    use super::*;

    fn make_simulation_state() -> SimulationState {
        let mut world = GridWorld::new(WorldSide::Server);
        let store = EnergyStore::new(100, 10, 10).expect("valid store");
        world
            .add_block(
                BlockPos::new(0, 0, 0),
                BlockEntity::new(BlockKind::Generator { output_per_tick: 10 }, store),
            )
            .unwrap();
        let store = EnergyStore::new(100, 10, 10).expect("valid store");
        world
            .add_block(
                BlockPos::new(1, 0, 0),
                BlockEntity::new(BlockKind::Consumer { draw_per_tick: 3 }, store),
            )
            .unwrap();
        SimulationState::new(world)
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let mut state = make_simulation_state();
        let control = Arc::new(RunControl::new(0, 5));
        let mut cb = NoOpCallback;

        let result = run_simulation(&mut state, &control, &mut cb).await.unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(result.final_summary.map(|s| s.tick), Some(5));
    }

    #[tokio::test]
    async fn stop_before_first_tick() {
        let mut state = make_simulation_state();
        let control = Arc::new(RunControl::new(0, 0));
        control.request_stop();
        let mut cb = NoOpCallback;

        let result = run_simulation(&mut state, &control, &mut cb).await.unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
    }

    #[tokio::test]
    async fn stop_from_callback_interrupts_the_sleep() {
        struct StopAfterOne {
            control: Arc<RunControl>,
        }
        impl TickCallback for StopAfterOne {
            fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {
                self.control.request_stop();
            }
        }

        let mut state = make_simulation_state();
        // A minute between ticks: the test only finishes if the stop wakes
        // the sleep.
        let control = Arc::new(RunControl::new(60_000, 0));
        let mut cb = StopAfterOne {
            control: Arc::clone(&control),
        };

        let result = run_simulation(&mut state, &control, &mut cb).await.unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 1);
        assert_eq!(result.final_summary.map(|s| s.tick), Some(1));
    }

    #[tokio::test]
    async fn tick_callback_is_called() {
        struct CountCallback {
            count: u64,
            last_total: u128,
        }
        impl TickCallback for CountCallback {
            fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState) {
                self.count = self.count.saturating_add(1);
                self.last_total = state.world.total_energy();
                assert_eq!(self.last_total, summary.total_energy);
            }
        }

        let mut state = make_simulation_state();
        let control = Arc::new(RunControl::new(0, 3));
        let mut cb = CountCallback {
            count: 0,
            last_total: 0,
        };

        let _ = run_simulation(&mut state, &control, &mut cb).await.unwrap();

        assert_eq!(cb.count, 3);
        assert_eq!(cb.last_total, state.world.total_energy());
    }
}
