//! Block entities: a position's behavior, its energy store, and the owner
//! state the store reports to.
//!
//! A [`BlockEntity`] keeps its [`SyncedEnergyStore`] and its [`BlockOwner`]
//! in separate fields, so the store can be handed the owner during `sync()`
//! and `spread()` without borrowing the entity twice.
//!
//! Generation and consumption are the only flows that create or destroy
//! energy. Both run as their own committed transaction:
//! - [`BlockEntity::generate`] inserts `output_per_tick` (bounded by the
//!   store's insert cap and headroom).
//! - [`BlockEntity::consume`] extracts `draw_per_tick` (bounded by the
//!   store's extract cap and amount).

use std::collections::BTreeSet;

use serde::Serialize;

use flux_energy::{
    EnergyStorage, EnergyStore, GenericUpdate, LightweightUpdate, Notification, StorageOwner,
    SyncedEnergyStore,
};
use flux_ledger::Transaction;
use flux_types::{
    BlockKind, Direction, Energy, EntityId, OwnerCapability, SpreadMode, WorldSide,
};

use crate::error::WorldError;

// ---------------------------------------------------------------------------
// Owner state
// ---------------------------------------------------------------------------

/// The owner side of a block entity.
///
/// Counts the notifications it receives; a networking layer would turn
/// these into packets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockOwner {
    id: EntityId,
    capability: OwnerCapability,
    side: Option<WorldSide>,
    updates: u64,
    dirty_marks: u64,
}

impl BlockOwner {
    /// A detached owner with the given capability.
    pub fn new(capability: OwnerCapability) -> Self {
        Self {
            id: EntityId::new(),
            capability,
            side: None,
            updates: 0,
            dirty_marks: 0,
        }
    }

    /// The declared notification capability.
    pub const fn capability(&self) -> OwnerCapability {
        self.capability
    }

    /// Lightweight updates received.
    pub const fn updates(&self) -> u64 {
        self.updates
    }

    /// Generic dirty marks received.
    pub const fn dirty_marks(&self) -> u64 {
        self.dirty_marks
    }

    pub(crate) const fn attach(&mut self, side: WorldSide) {
        self.side = Some(side);
    }

    pub(crate) const fn detach(&mut self) {
        self.side = None;
    }
}

impl LightweightUpdate for BlockOwner {
    fn update(&mut self) {
        self.updates = self.updates.saturating_add(1);
    }
}

impl GenericUpdate for BlockOwner {
    fn mark_dirty(&mut self) {
        self.dirty_marks = self.dirty_marks.saturating_add(1);
    }
}

impl StorageOwner for BlockOwner {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn world_side(&self) -> Option<WorldSide> {
        self.side
    }

    fn as_lightweight(&mut self) -> Option<&mut dyn LightweightUpdate> {
        match self.capability {
            OwnerCapability::Lightweight => Some(self as &mut dyn LightweightUpdate),
            OwnerCapability::Generic | OwnerCapability::None => None,
        }
    }

    fn as_generic(&mut self) -> Option<&mut dyn GenericUpdate> {
        match self.capability {
            OwnerCapability::Generic => Some(self as &mut dyn GenericUpdate),
            OwnerCapability::Lightweight | OwnerCapability::None => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Block entity
// ---------------------------------------------------------------------------

/// A block with an energy store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockEntity {
    kind: BlockKind,
    pub(crate) store: SyncedEnergyStore,
    pub(crate) owner: BlockOwner,
    faces: BTreeSet<Direction>,
    spread_mode: SpreadMode,
}

impl BlockEntity {
    /// A block exposing `store` on all six faces, owned by a generic owner,
    /// spreading in equal mode.
    pub fn new(kind: BlockKind, store: EnergyStore) -> Self {
        let owner = BlockOwner::new(OwnerCapability::default());
        Self {
            kind,
            store: SyncedEnergyStore::from_store(owner.entity_id(), store),
            owner,
            faces: Direction::ALL.into_iter().collect(),
            spread_mode: SpreadMode::default(),
        }
    }

    /// Replace the owner's notification capability.
    #[must_use]
    pub fn with_capability(mut self, capability: OwnerCapability) -> Self {
        self.owner.capability = capability;
        self
    }

    /// Expose the store only through `faces`.
    #[must_use]
    pub fn with_faces<I>(mut self, faces: I) -> Self
    where
        I: IntoIterator<Item = Direction>,
    {
        self.faces = faces.into_iter().collect();
        self
    }

    /// Use `mode` when this block spreads.
    #[must_use]
    pub fn with_spread_mode(mut self, mode: SpreadMode) -> Self {
        self.spread_mode = mode;
        self
    }

    /// The block's behavior.
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// The block's store.
    pub const fn store(&self) -> &SyncedEnergyStore {
        &self.store
    }

    /// The block's store, for transactional mutation.
    pub const fn store_mut(&mut self) -> &mut SyncedEnergyStore {
        &mut self.store
    }

    /// The owner state.
    pub const fn owner(&self) -> &BlockOwner {
        &self.owner
    }

    /// The owning entity's identifier.
    pub const fn entity_id(&self) -> EntityId {
        self.owner.id
    }

    /// Returns `true` if the store is reachable through `face`.
    pub fn exposes(&self, face: Direction) -> bool {
        self.faces.contains(&face)
    }

    /// How this block divides its surplus.
    pub const fn spread_mode(&self) -> SpreadMode {
        self.spread_mode
    }

    /// Run one tick of generation. Returns the energy produced.
    ///
    /// Non-generators produce nothing and open no transaction.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Transaction`] on transaction misuse.
    pub fn generate(&mut self) -> Result<Energy, WorldError> {
        let BlockKind::Generator { output_per_tick } = self.kind else {
            return Ok(0);
        };
        let mut txn = Transaction::open_outer();
        let produced = self.store.insert(output_per_tick, &mut txn);
        txn.commit(&mut self.store)?;
        Ok(produced)
    }

    /// Run one tick of consumption. Returns the energy drained.
    ///
    /// Non-consumers drain nothing and open no transaction.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Transaction`] on transaction misuse.
    pub fn consume(&mut self) -> Result<Energy, WorldError> {
        let BlockKind::Consumer { draw_per_tick } = self.kind else {
            return Ok(0);
        };
        let mut txn = Transaction::open_outer();
        let drained = self.store.extract(draw_per_tick, &mut txn);
        txn.commit(&mut self.store)?;
        Ok(drained)
    }

    /// Push pending store changes to the owner.
    pub fn sync(&mut self) -> Option<Notification> {
        self.store.sync(&mut self.owner)
    }
}
