//! Nested transactions and conservation auditing for the Flux simulation.
//!
//! Every change to an energy store happens under a [`Transaction`]. Stores
//! mutate eagerly and enlist a snapshot of their previous amount in the
//! innermost open scope; aborting a scope restores those snapshots, and
//! committing the outermost scope finalizes every enlisted store exactly
//! once.
//!
//! # Modules
//!
//! - [`transaction`] -- The [`Transaction`] scope stack and the
//!   [`Participant`] / [`Participants`] seams stores plug into.
//! - [`conservation`] -- Energy conservation checks for transfers and ticks.
//!
//! # Conservation Law
//!
//! Transfers between stores never create or destroy energy:
//!
//! ```text
//! sum(amount_after) == sum(amount_before)
//! ```
//!
//! Over a whole tick, generation and consumption are the only source and
//! sink flows:
//!
//! ```text
//! total_after == total_before + generated - consumed
//! ```
//!
//! A violation produces a [`ConservationAnomaly`].
//!
//! # Usage
//!
//! ```
//! use flux_ledger::{Participant, Participants, Transaction};
//! use flux_types::{Energy, StoreId};
//!
//! struct Cell {
//!     id: StoreId,
//!     amount: Energy,
//! }
//!
//! impl Participant for Cell {
//!     fn restore_snapshot(&mut self, snapshot: Energy) {
//!         self.amount = snapshot;
//!     }
//!     fn on_final_commit(&mut self) {}
//! }
//!
//! impl Participants for Cell {
//!     fn participant_mut(&mut self, id: StoreId) -> Option<&mut dyn Participant> {
//!         (id == self.id).then_some(self as &mut dyn Participant)
//!     }
//! }
//!
//! let mut cell = Cell { id: StoreId::new(), amount: 10 };
//! let mut txn = Transaction::open_outer();
//! txn.enlist(cell.id, cell.amount);
//! cell.amount = 25;
//! txn.abort(&mut cell).ok();
//! assert_eq!(cell.amount, 10);
//! ```

pub mod conservation;
pub mod transaction;

// Re-export primary types at crate root.
pub use conservation::{ConservationResult, EnergyFlows, StoreDelta};
pub use transaction::{Participant, Participants, Transaction};

use serde::{Deserialize, Serialize};

use flux_types::{Energy, StoreId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Transaction misuse.
///
/// Every variant is a programmer error rather than a runtime condition.
/// Callers propagate it; nothing in the workspace swallows it.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// A nested scope was closed while only the outer scope was open.
    #[error("no nested transaction scope is open")]
    NoNestedScope,

    /// The outer scope was committed while nested scopes were still open.
    #[error("cannot commit outer transaction with {depth} nested scope(s) still open")]
    NestedScopeOpen {
        /// How many nested scopes were left open.
        depth: usize,
    },

    /// A store enlisted in the transaction could not be resolved when the
    /// scope closed.
    #[error("enlisted store {0} is not reachable from the supplied participants")]
    UnknownParticipant(StoreId),
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation law violation.
///
/// `expected` and `actual` are the totals the check compared. They are
/// widened to `u128` so the sums themselves can never overflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationAnomaly {
    /// The tick where the anomaly was detected.
    pub tick: u64,
    /// The total that should have been observed.
    pub expected: u128,
    /// The total that was observed.
    pub actual: u128,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for ConservationAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Sum a sequence of store amounts without overflow.
pub fn total_energy<I>(amounts: I) -> u128
where
    I: IntoIterator<Item = Energy>,
{
    amounts
        .into_iter()
        .fold(0_u128, |acc, amount| acc.saturating_add(u128::from(amount)))
}
