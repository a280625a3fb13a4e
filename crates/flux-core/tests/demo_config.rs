//! Integration tests running the shipped `flux-config.yaml` end to end.
//!
//! The config is loaded from the workspace root, the grid is built, and the
//! run loop is driven with no inter-tick delay. The conservation audit is
//! on, so any anomaly fails the run.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::path::Path;
use std::sync::Arc;

use flux_core::{
    NoOpCallback, RunControl, SimulationConfig, SimulationEndReason, SimulationState,
    run_simulation, run_tick,
};
use flux_types::BlockPos;
use flux_world::SyncReport;

fn demo_config() -> SimulationConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../flux-config.yaml");
    SimulationConfig::from_file(&path).expect("demo config loads")
}

#[test]
fn demo_grid_builds() {
    let config = demo_config();
    assert!(config.distribution.audit_conservation);

    let state = SimulationState::from_config(&config).expect("demo grid builds");
    assert_eq!(state.world.block_count(), config.blocks.len());
    assert_eq!(state.world.total_energy(), 30);
}

#[test]
fn side_battery_is_reached_through_its_bottom_face() {
    let config = demo_config();
    let mut state = SimulationState::from_config(&config).expect("demo grid builds");

    let summary = run_tick(&mut state).expect("tick");
    assert!(summary.transferred > 0);

    // The conduit below fills it, then it spreads back down through the
    // same face in the same tick. Its owner is marked once by that spread
    // and once more by the sync phase.
    let side_battery = state.world.block(BlockPos::new(1, 1, 0)).expect("placed");
    assert_eq!(side_battery.owner().dirty_marks(), 2);
    assert_eq!(side_battery.owner().updates(), 0);
    assert!(!side_battery.store().is_dirty());

    // Every block was touched in tick one; only the (2,0,0) battery takes
    // lightweight updates.
    assert_eq!(
        summary.sync,
        SyncReport {
            synced: 5,
            lightweight: 1,
            generic: 4,
        }
    );
}

#[tokio::test]
async fn demo_runs_to_its_tick_limit_with_audit_on() {
    let config = demo_config();
    let mut state = SimulationState::from_config(&config).expect("demo grid builds");
    let control = Arc::new(RunControl::new(0, 50));
    let mut cb = NoOpCallback;

    let result = run_simulation(&mut state, &control, &mut cb)
        .await
        .expect("no anomaly");

    assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
    assert_eq!(result.total_ticks, 50);
    let last = result.final_summary.expect("ticks ran");
    assert!(last.audited);
    assert_eq!(last.total_energy, state.world.total_energy());
}
