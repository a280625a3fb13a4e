//! Energy stores that track when observers need a resync.
//!
//! A [`SyncedEnergyStore`] wraps an [`EnergyStore`] and raises a dirty flag
//! whenever a transaction that touched it is finally committed. The owning
//! entity calls [`SyncedEnergyStore::sync`] once per tick; the call clears
//! the flag and notifies the owner, but only on the authoritative side.
//!
//! The flag is raised on every final commit, even when the committed amount
//! equals the amount before the transaction.

use serde::Serialize;
use tracing::{trace, warn};

use flux_ledger::{Participant, Participants, Transaction};
use flux_types::{Energy, EntityId, StoreId};

use crate::error::EnergyError;
use crate::owner::{Notification, StorageOwner, notify_owner};
use crate::store::{EnergyStorage, EnergyStore, SpreadSource, sealed};

/// An [`EnergyStore`] with dirty tracking for its owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedEnergyStore {
    store: EnergyStore,
    owner: EntityId,
    dirty: bool,
}

impl SyncedEnergyStore {
    /// Create an empty synced store belonging to `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyError::ZeroCapacity`] if `capacity` is zero.
    pub fn new(
        owner: EntityId,
        capacity: Energy,
        max_insert: Energy,
        max_extract: Energy,
    ) -> Result<Self, EnergyError> {
        Ok(Self::from_store(
            owner,
            EnergyStore::new(capacity, max_insert, max_extract)?,
        ))
    }

    /// Wrap an existing store.
    pub const fn from_store(owner: EntityId, store: EnergyStore) -> Self {
        Self {
            store,
            owner,
            dirty: false,
        }
    }

    /// The entity this store reports to.
    pub const fn owner_id(&self) -> EntityId {
        self.owner
    }

    /// Whether a committed change has not been synced yet.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The wrapped store.
    pub const fn store(&self) -> &EnergyStore {
        &self.store
    }

    /// Push pending changes to the owner.
    ///
    /// Does nothing unless the store is dirty, `owner` is the entity this
    /// store belongs to, and that entity sits in an authoritative world.
    /// Otherwise clears the flag and notifies the owner once. Safe to call
    /// every tick.
    pub fn sync(&mut self, owner: &mut dyn StorageOwner) -> Option<Notification> {
        if !self.dirty {
            return None;
        }
        if owner.entity_id() != self.owner {
            warn!(
                store = %self.store.id(),
                expected = %self.owner,
                actual = %owner.entity_id(),
                "sync called with a foreign owner, skipping"
            );
            return None;
        }
        if !owner.is_authoritative() {
            trace!(store = %self.store.id(), "owner not on authoritative side, sync deferred");
            return None;
        }

        self.dirty = false;
        let notification = notify_owner(owner);
        trace!(store = %self.store.id(), ?notification, "store synced");
        Some(notification)
    }
}

impl Participant for SyncedEnergyStore {
    fn restore_snapshot(&mut self, snapshot: Energy) {
        self.store.restore_snapshot(snapshot);
    }

    fn on_final_commit(&mut self) {
        self.store.on_final_commit();
        self.dirty = true;
    }
}

impl EnergyStorage for SyncedEnergyStore {
    fn id(&self) -> StoreId {
        self.store.id()
    }

    fn amount(&self) -> Energy {
        self.store.amount()
    }

    fn capacity(&self) -> Energy {
        self.store.capacity()
    }

    fn supports_insertion(&self) -> bool {
        self.store.supports_insertion()
    }

    fn supports_extraction(&self) -> bool {
        self.store.supports_extraction()
    }

    fn insert(&mut self, max: Energy, txn: &mut Transaction) -> Energy {
        self.store.insert(max, txn)
    }

    fn extract(&mut self, max: Energy, txn: &mut Transaction) -> Energy {
        self.store.extract(max, txn)
    }

    fn as_participant_mut(&mut self) -> &mut dyn Participant {
        self
    }
}

impl sealed::Sealed for SyncedEnergyStore {
    fn credit_remainder(&mut self, amount: Energy, txn: &mut Transaction) {
        self.store.credit_remainder(amount, txn);
    }
}

impl SpreadSource for SyncedEnergyStore {}

impl Participants for SyncedEnergyStore {
    fn participant_mut(&mut self, id: StoreId) -> Option<&mut dyn Participant> {
        if id == self.store.id() {
            Some(self as &mut dyn Participant)
        } else {
            None
        }
    }
}
