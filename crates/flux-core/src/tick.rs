//! Tick cycle: the 5-phase engine loop that drives the Flux simulation.
//!
//! Each tick runs through these phases:
//!
//! 1. **Generate** -- every generator inserts its output into its own store,
//!    one committed transaction per block.
//!
//! 2. **Spread** -- every block whose kind spreads pushes its surplus into
//!    its neighbors, in position order, using its own spread mode.
//!
//! 3. **Consume** -- every consumer drains its draw from its own store.
//!
//! 4. **Sync** -- every dirty store notifies its owner.
//!
//! 5. **Audit** -- the grid total must equal the starting total plus what
//!    was generated minus what was consumed. Each spread is also checked on
//!    its own, as it happens.
//!
//! The tick cycle is deterministic given the same initial grid.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use flux_energy::Distributor;
use flux_ledger::conservation::{verify_tick, verify_transfers};
use flux_ledger::{ConservationAnomaly, ConservationResult, EnergyFlows};
use flux_types::Energy;
use flux_world::{GridWorld, SyncReport, WorldError};

use crate::clock::{ClockError, WorldClock};
use crate::config::{ConfigError, SimulationConfig};

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A world operation failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// Energy appeared or vanished.
    #[error("conservation audit failed: {anomaly}")]
    Conservation {
        /// What the audit found.
        anomaly: ConservationAnomaly,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Energy generated and consumed this tick.
    pub flows: EnergyFlows,
    /// Spread calls that moved energy.
    pub spreads: usize,
    /// Energy moved between stores by spreading.
    pub transferred: Energy,
    /// Surplus credited back to sources because no neighbor took it.
    pub returned: Energy,
    /// Owner notifications sent during the sync phase.
    pub sync: SyncReport,
    /// Grid total at the end of the tick.
    pub total_energy: u128,
    /// Whether the conservation audit ran.
    pub audited: bool,
    /// Wall-clock time the tick finished.
    pub completed_at: DateTime<Utc>,
}

/// Result of the Spread phase.
#[derive(Debug, Default)]
struct SpreadTotals {
    spreads: usize,
    transferred: Energy,
    returned: Energy,
}

/// The mutable simulation state passed through the tick cycle.
#[derive(Debug)]
pub struct SimulationState {
    /// The tick counter.
    pub clock: WorldClock,
    /// The block grid.
    pub world: GridWorld,
    /// The distributor used by every spreading block.
    pub distributor: Distributor,
    /// Whether to run the conservation audit.
    pub audit_conservation: bool,
}

impl SimulationState {
    /// Fresh state for `world` with auditing on.
    pub fn new(world: GridWorld) -> Self {
        Self {
            clock: WorldClock::new(),
            world,
            distributor: Distributor::new(),
            audit_conservation: true,
        }
    }

    /// Build the grid and audit setting from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Block`] if a configured block is invalid.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let mut state = Self::new(config.build_world()?);
        state.audit_conservation = config.distribution.audit_conservation;
        Ok(state)
    }
}

/// Execute one complete tick of the simulation.
///
/// # Errors
///
/// Returns [`TickError::Conservation`] if the audit finds energy created or
/// destroyed outside generation and consumption, [`TickError::World`] on a
/// transaction failure, and [`TickError::Clock`] on tick overflow.
pub fn run_tick(state: &mut SimulationState) -> Result<TickSummary, TickError> {
    let tick = state.clock.advance()?;
    let total_before = state.world.total_energy();
    debug!(tick, total = %total_before, "Tick started");

    // --- Phase 1: Generate ---
    let generated = phase_generate(&mut state.world)?;

    // --- Phase 2: Spread ---
    let spread = phase_spread(state, tick)?;

    // --- Phase 3: Consume ---
    let consumed = phase_consume(&mut state.world)?;

    // --- Phase 4: Sync ---
    let sync = state.world.sync_all();

    // --- Phase 5: Audit ---
    let total_after = state.world.total_energy();
    let flows = EnergyFlows {
        generated,
        consumed,
    };
    if state.audit_conservation {
        check(verify_tick(tick, total_before, total_after, flows))?;
    }

    info!(
        tick,
        generated,
        consumed,
        transferred = spread.transferred,
        synced = sync.synced,
        total = %total_after,
        "Tick completed"
    );

    Ok(TickSummary {
        tick,
        flows,
        spreads: spread.spreads,
        transferred: spread.transferred,
        returned: spread.returned,
        sync,
        total_energy: total_after,
        audited: state.audit_conservation,
        completed_at: Utc::now(),
    })
}

/// Phase 1: Generate.
fn phase_generate(world: &mut GridWorld) -> Result<Energy, TickError> {
    let mut generated: Energy = 0;
    for pos in world.positions() {
        let Some(block) = world.block_mut(pos) else {
            continue;
        };
        generated = generated.saturating_add(block.generate()?);
    }
    Ok(generated)
}

/// Phase 2: Spread.
///
/// Positions are snapshotted up front; a block's spread never adds or
/// removes blocks.
fn phase_spread(state: &mut SimulationState, tick: u64) -> Result<SpreadTotals, TickError> {
    let mut totals = SpreadTotals::default();
    for pos in state.world.positions() {
        let spreads = state
            .world
            .block(pos)
            .is_some_and(|block| block.kind().spreads());
        if !spreads {
            continue;
        }

        let outcome = state.world.spread_from(pos, &state.distributor, None)?;
        if state.audit_conservation {
            check(verify_transfers(tick, &outcome.deltas))?;
        }
        if outcome.moved() {
            totals.spreads = totals.spreads.saturating_add(1);
        }
        totals.transferred = totals.transferred.saturating_add(outcome.inserted);
        totals.returned = totals.returned.saturating_add(outcome.returned);
    }
    Ok(totals)
}

/// Phase 3: Consume.
fn phase_consume(world: &mut GridWorld) -> Result<Energy, TickError> {
    let mut consumed: Energy = 0;
    for pos in world.positions() {
        let Some(block) = world.block_mut(pos) else {
            continue;
        };
        consumed = consumed.saturating_add(block.consume()?);
    }
    Ok(consumed)
}

fn check(result: ConservationResult) -> Result<(), TickError> {
    match result {
        ConservationResult::Balanced => Ok(()),
        ConservationResult::Anomaly(anomaly) => {
            error!(
                tick = anomaly.tick,
                expected = %anomaly.expected,
                actual = %anomaly.actual,
                "{}",
                anomaly.message
            );
            Err(TickError::Conservation { anomaly })
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]
mod tests {
    use flux_energy::{EnergyStorage, EnergyStore};
    use flux_types::{BlockKind, BlockPos, WorldSide};
    use flux_world::BlockEntity;

    use super::*;

    fn block(kind: BlockKind, amount: Energy) -> BlockEntity {
        let store = EnergyStore::new(100, 100, 100)
            .and_then(|s| s.with_amount(amount))
            .expect("valid store");
        BlockEntity::new(kind, store)
    }

    fn pos(x: i32) -> BlockPos {
        BlockPos::new(x, 0, 0)
    }

    /// Generator -> battery -> consumer along the x axis.
    fn line(side: WorldSide) -> SimulationState {
        let mut world = GridWorld::new(side);
        world
            .add_block(pos(0), block(BlockKind::Generator { output_per_tick: 20 }, 0))
            .expect("free");
        world
            .add_block(pos(1), block(BlockKind::Battery, 0))
            .expect("free");
        world
            .add_block(pos(2), block(BlockKind::Consumer { draw_per_tick: 5 }, 0))
            .expect("free");
        SimulationState::new(world)
    }

    fn amount_at(state: &SimulationState, x: i32) -> Energy {
        state
            .world
            .block(pos(x))
            .expect("placed")
            .store()
            .amount()
    }

    #[test]
    fn one_tick_runs_every_phase() {
        let mut state = line(WorldSide::Server);
        let summary = run_tick(&mut state).expect("tick");

        assert_eq!(summary.tick, 1);
        assert_eq!(summary.flows.generated, 20);
        assert_eq!(summary.flows.consumed, 5);
        // Generator -> battery (20), then battery -> generator and consumer (10 each).
        assert_eq!(summary.spreads, 2);
        assert_eq!(summary.transferred, 40);
        assert_eq!(summary.returned, 0);
        assert_eq!(summary.sync.synced, 3);
        assert_eq!(summary.total_energy, 15);
        assert!(summary.audited);

        assert_eq!(amount_at(&state, 0), 10);
        assert_eq!(amount_at(&state, 1), 0);
        assert_eq!(amount_at(&state, 2), 5);
    }

    #[test]
    fn totals_track_generation_minus_consumption() {
        let mut state = line(WorldSide::Server);
        let mut expected: u128 = 0;
        for _ in 0..10 {
            let summary = run_tick(&mut state).expect("tick");
            expected = expected + u128::from(summary.flows.generated)
                - u128::from(summary.flows.consumed);
            assert_eq!(summary.total_energy, expected);
        }
        assert_eq!(state.clock.tick(), 10);
    }

    #[test]
    fn consumers_never_spread() {
        let mut world = GridWorld::new(WorldSide::Server);
        world
            .add_block(pos(0), block(BlockKind::Consumer { draw_per_tick: 0 }, 50))
            .expect("free");
        world
            .add_block(pos(1), block(BlockKind::Battery, 0))
            .expect("free");
        let mut state = SimulationState::new(world);

        let summary = run_tick(&mut state).expect("tick");
        assert_eq!(summary.spreads, 0);
        assert_eq!(amount_at(&state, 0), 50);
    }

    #[test]
    fn client_side_tick_moves_energy_but_never_syncs() {
        let mut state = line(WorldSide::Client);
        let summary = run_tick(&mut state).expect("tick");
        assert_eq!(summary.sync, SyncReport::default());
        assert_eq!(summary.total_energy, 15);
    }

    #[test]
    fn audit_can_be_disabled() {
        let mut state = line(WorldSide::Server);
        state.audit_conservation = false;
        let summary = run_tick(&mut state).expect("tick");
        assert!(!summary.audited);
    }

    #[test]
    fn anomaly_becomes_tick_error() {
        let anomaly = verify_tick(3, 10, 11, EnergyFlows::default());
        let err = check(anomaly).expect_err("unbalanced");
        assert!(matches!(err, TickError::Conservation { ref anomaly } if anomaly.tick == 3));
        assert!(err.to_string().contains("ENERGY_ANOMALY"));
    }

    #[test]
    fn summary_serializes_to_json() {
        let mut state = line(WorldSide::Server);
        let summary = run_tick(&mut state).expect("tick");
        let json = serde_json::to_value(&summary).expect("serializable");
        assert_eq!(json["tick"], 1);
        assert_eq!(json["flows"]["generated"], 20);
        assert_eq!(json["sync"]["synced"], 3);
        assert!(json["completed_at"].is_string());
    }
}
