//! Conservation law verification for energy movements.
//!
//! Two checks are provided:
//!
//! - [`verify_transfers`] -- a closed set of stores exchanged energy among
//!   themselves (one `spread` call). The sum of amounts must not change.
//! - [`verify_tick`] -- a whole tick, where generation is the only source
//!   flow and consumption the only sink flow.
//!
//! Both run on widened `u128` totals so summation cannot overflow.

use serde::{Deserialize, Serialize};

use flux_types::{Energy, StoreId};

use crate::{ConservationAnomaly, total_energy};

/// The result of a conservation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConservationResult {
    /// Totals balance.
    Balanced,
    /// Energy was created or destroyed.
    Anomaly(ConservationAnomaly),
}

impl ConservationResult {
    /// Returns `true` if the check balanced.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// One store's amount before and after a set of transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDelta {
    /// The store.
    pub id: StoreId,
    /// Amount before the transfers.
    pub before: Energy,
    /// Amount after the transfers.
    pub after: Energy,
}

/// Source and sink flows recorded during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyFlows {
    /// Energy produced by generators.
    pub generated: Energy,
    /// Energy drained by consumers.
    pub consumed: Energy,
}

impl EnergyFlows {
    /// Add another set of flows into this one, saturating.
    pub const fn absorb(&mut self, other: Self) {
        self.generated = self.generated.saturating_add(other.generated);
        self.consumed = self.consumed.saturating_add(other.consumed);
    }
}

/// Verify that a set of store deltas neither created nor destroyed energy.
pub fn verify_transfers(tick: u64, deltas: &[StoreDelta]) -> ConservationResult {
    let before = total_energy(deltas.iter().map(|d| d.before));
    let after = total_energy(deltas.iter().map(|d| d.after));

    if before == after {
        ConservationResult::Balanced
    } else {
        ConservationResult::Anomaly(ConservationAnomaly {
            tick,
            expected: before,
            actual: after,
            message: format!(
                "ENERGY_ANOMALY at tick {tick}: transfer across {} store(s) moved total from {before} to {after}",
                deltas.len(),
            ),
        })
    }
}

/// Verify the tick-level balance `after == before + generated - consumed`.
pub fn verify_tick(tick: u64, before: u128, after: u128, flows: EnergyFlows) -> ConservationResult {
    let expected = before
        .checked_add(u128::from(flows.generated))
        .and_then(|v| v.checked_sub(u128::from(flows.consumed)));

    match expected {
        Some(expected) if expected == after => ConservationResult::Balanced,
        Some(expected) => ConservationResult::Anomaly(ConservationAnomaly {
            tick,
            expected,
            actual: after,
            message: format!(
                "ENERGY_ANOMALY at tick {tick}: expected total {expected}, found {after} (generated {}, consumed {})",
                flows.generated, flows.consumed,
            ),
        }),
        None => ConservationResult::Anomaly(ConservationAnomaly {
            tick,
            expected: 0,
            actual: after,
            message: format!(
                "ENERGY_ANOMALY at tick {tick}: consumed {} exceeds starting total {before} plus generation",
                flows.consumed,
            ),
        }),
    }
}
