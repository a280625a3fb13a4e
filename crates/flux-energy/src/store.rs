//! Bounded energy stores.
//!
//! An [`EnergyStore`] holds an amount in `[0, capacity]` and limits how much
//! a single insert or extract may move. Every mutation goes through a
//! [`Transaction`]: the store enlists itself before changing, so an abort
//! puts the old amount back and the outermost commit calls
//! [`Participant::on_final_commit`] exactly once.
//!
//! A store enlists on every operation, including ones that move nothing.
//! A commit after a zero-quantity operation therefore still finalizes the
//! store (and marks a [`SyncedEnergyStore`] dirty).
//!
//! [`SyncedEnergyStore`]: crate::synced::SyncedEnergyStore

use serde::Serialize;
use tracing::warn;

use flux_ledger::{Participant, Transaction};
use flux_types::{Energy, StoreId};

use crate::error::EnergyError;

// ---------------------------------------------------------------------------
// Storage capability
// ---------------------------------------------------------------------------

/// A generic energy endpoint: what a neighbor probe hands back.
///
/// Requests are total. Oversized requests clamp to what the store can take
/// or give, and a zero request moves nothing.
pub trait EnergyStorage: Participant {
    /// The store's identity inside transactions.
    fn id(&self) -> StoreId;

    /// Current amount, including provisional changes of open transactions.
    fn amount(&self) -> Energy;

    /// Maximum amount the store can hold.
    fn capacity(&self) -> Energy;

    /// Whether `insert` can ever move anything.
    fn supports_insertion(&self) -> bool;

    /// Whether `extract` can ever move anything.
    fn supports_extraction(&self) -> bool;

    /// Insert up to `max`, returning the amount actually inserted.
    fn insert(&mut self, max: Energy, txn: &mut Transaction) -> Energy;

    /// Extract up to `max`, returning the amount actually extracted.
    fn extract(&mut self, max: Energy, txn: &mut Transaction) -> Energy;

    /// This store as a transaction participant.
    fn as_participant_mut(&mut self) -> &mut dyn Participant;

    /// Returns `true` when no more energy fits.
    fn is_full(&self) -> bool {
        self.amount() >= self.capacity()
    }
}

// ---------------------------------------------------------------------------
// Spread sources
// ---------------------------------------------------------------------------

pub(crate) mod sealed {
    use flux_ledger::Transaction;
    use flux_types::Energy;

    /// Internal-only operations the distributor needs on its source.
    pub trait Sealed {
        /// Put undistributed surplus straight back into the source.
        ///
        /// Skips the insert rate cap: the energy came out of this store in
        /// the same transaction, so it always fits.
        fn credit_remainder(&mut self, amount: Energy, txn: &mut Transaction);
    }
}

/// A store that [`Distributor::spread`] can draw from.
///
/// Sealed: only the store types in this crate implement it, because the
/// distributor returns leftovers through an operation that bypasses the
/// usual rate limits.
///
/// [`Distributor::spread`]: crate::distributor::Distributor::spread
pub trait SpreadSource: EnergyStorage + sealed::Sealed {}

// ---------------------------------------------------------------------------
// EnergyStore
// ---------------------------------------------------------------------------

/// A capacity-bounded integer energy buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnergyStore {
    id: StoreId,
    amount: Energy,
    capacity: Energy,
    max_insert: Energy,
    max_extract: Energy,
}

impl EnergyStore {
    /// Create an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyError::ZeroCapacity`] if `capacity` is zero.
    pub fn new(
        capacity: Energy,
        max_insert: Energy,
        max_extract: Energy,
    ) -> Result<Self, EnergyError> {
        if capacity == 0 {
            return Err(EnergyError::ZeroCapacity);
        }
        Ok(Self {
            id: StoreId::new(),
            amount: 0,
            capacity,
            max_insert,
            max_extract,
        })
    }

    /// Set the starting amount of a freshly built store.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyError::AmountExceedsCapacity`] if `amount` does not fit.
    pub fn with_amount(mut self, amount: Energy) -> Result<Self, EnergyError> {
        if amount > self.capacity {
            return Err(EnergyError::AmountExceedsCapacity {
                amount,
                capacity: self.capacity,
            });
        }
        self.amount = amount;
        Ok(self)
    }

    /// Per-operation insert cap.
    pub const fn max_insert(&self) -> Energy {
        self.max_insert
    }

    /// Per-operation extract cap.
    pub const fn max_extract(&self) -> Energy {
        self.max_extract
    }

    /// Space left before the store is full.
    pub const fn headroom(&self) -> Energy {
        self.capacity.saturating_sub(self.amount)
    }
}

impl Participant for EnergyStore {
    fn restore_snapshot(&mut self, snapshot: Energy) {
        self.amount = snapshot;
    }

    fn on_final_commit(&mut self) {
        self.amount = self.amount.min(self.capacity);
    }
}

impl EnergyStorage for EnergyStore {
    fn id(&self) -> StoreId {
        self.id
    }

    fn amount(&self) -> Energy {
        self.amount
    }

    fn capacity(&self) -> Energy {
        self.capacity
    }

    fn supports_insertion(&self) -> bool {
        self.max_insert > 0
    }

    fn supports_extraction(&self) -> bool {
        self.max_extract > 0
    }

    fn insert(&mut self, max: Energy, txn: &mut Transaction) -> Energy {
        let inserted = max.min(self.max_insert).min(self.headroom());
        txn.enlist(self.id, self.amount);
        self.amount = self.amount.saturating_add(inserted);
        inserted
    }

    fn extract(&mut self, max: Energy, txn: &mut Transaction) -> Energy {
        let extracted = max.min(self.max_extract).min(self.amount);
        txn.enlist(self.id, self.amount);
        self.amount = self.amount.saturating_sub(extracted);
        extracted
    }

    fn as_participant_mut(&mut self) -> &mut dyn Participant {
        self
    }
}

impl sealed::Sealed for EnergyStore {
    fn credit_remainder(&mut self, amount: Energy, txn: &mut Transaction) {
        txn.enlist(self.id, self.amount);
        let credited = self.amount.saturating_add(amount);
        if credited > self.capacity {
            warn!(
                store = %self.id,
                amount,
                capacity = self.capacity,
                "remainder credit overflowed capacity, clamping"
            );
        }
        self.amount = credited.min(self.capacity);
    }
}

impl SpreadSource for EnergyStore {}

impl flux_ledger::Participants for EnergyStore {
    fn participant_mut(&mut self, id: StoreId) -> Option<&mut dyn Participant> {
        if id == self.id {
            Some(self as &mut dyn Participant)
        } else {
            None
        }
    }
}
