//! The block grid: block entities indexed by position and by store.
//!
//! [`GridWorld`] is the [`WorldContext`] the distributor probes. A store is
//! found only through a face its block exposes, so a probe from the west
//! asks for the neighbor's `East` face.
//!
//! Spreading takes the source block out of the grid for the duration of
//! the call and puts it back afterwards. While it is out, the source store
//! cannot be reached through the world, which keeps the source and its
//! neighbors as separate borrows.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use flux_energy::{
    Distributor, EnergyStorage, Notification, PositionSet, SpreadOptions, SpreadOutcome,
    WorldContext,
};
use flux_ledger::total_energy;
use flux_types::{BlockKind, BlockPos, Direction, Energy, StoreId, WorldSide};

use crate::block::BlockEntity;
use crate::error::WorldError;

/// Counts of the notifications one [`GridWorld::sync_all`] pass produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Stores whose dirty flag was cleared.
    pub synced: usize,
    /// Owners notified through the lightweight path.
    pub lightweight: usize,
    /// Owners notified through the generic path.
    pub generic: usize,
}

/// A point-in-time view of one block, for reports and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSnapshot {
    /// Where the block is.
    pub pos: BlockPos,
    /// What the block does.
    pub kind: BlockKind,
    /// Stored energy.
    pub amount: Energy,
    /// Store capacity.
    pub capacity: Energy,
    /// Whether a change is waiting for sync.
    pub dirty: bool,
    /// Lightweight updates the owner has received.
    pub updates: u64,
    /// Generic dirty marks the owner has received.
    pub dirty_marks: u64,
}

/// The block grid.
#[derive(Debug, Clone, Default)]
pub struct GridWorld {
    side: WorldSide,
    blocks: BTreeMap<BlockPos, BlockEntity>,
    stores: BTreeMap<StoreId, BlockPos>,
}

impl GridWorld {
    /// An empty grid on the given side.
    pub const fn new(side: WorldSide) -> Self {
        Self {
            side,
            blocks: BTreeMap::new(),
            stores: BTreeMap::new(),
        }
    }

    /// Which side this grid simulates.
    pub const fn side(&self) -> WorldSide {
        self.side
    }

    // -------------------------------------------------------------------
    // Block operations
    // -------------------------------------------------------------------

    /// Place a block and attach its owner to this world.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PositionOccupied`] if a block is already at
    /// `pos`, or [`WorldError::DuplicateStore`] if the block's store is
    /// already placed.
    pub fn add_block(&mut self, pos: BlockPos, mut block: BlockEntity) -> Result<(), WorldError> {
        if self.blocks.contains_key(&pos) {
            return Err(WorldError::PositionOccupied(pos));
        }
        let id = block.store().id();
        if let Some(existing) = self.stores.get(&id) {
            return Err(WorldError::DuplicateStore(*existing));
        }
        block.owner.attach(self.side);
        self.stores.insert(id, pos);
        self.blocks.insert(pos, block);
        Ok(())
    }

    /// Remove a block, detaching its owner.
    pub fn remove_block(&mut self, pos: BlockPos) -> Option<BlockEntity> {
        let mut block = self.blocks.remove(&pos)?;
        self.stores.remove(&block.store().id());
        block.owner.detach();
        Some(block)
    }

    /// The block at `pos`.
    pub fn block(&self, pos: BlockPos) -> Option<&BlockEntity> {
        self.blocks.get(&pos)
    }

    /// The block at `pos`, mutably.
    pub fn block_mut(&mut self, pos: BlockPos) -> Option<&mut BlockEntity> {
        self.blocks.get_mut(&pos)
    }

    /// Iterate over all blocks in position order.
    pub fn blocks(&self) -> impl Iterator<Item = (&BlockPos, &BlockEntity)> {
        self.blocks.iter()
    }

    /// All occupied positions, in order.
    pub fn positions(&self) -> Vec<BlockPos> {
        self.blocks.keys().copied().collect()
    }

    /// Number of placed blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Sum of every store's amount.
    pub fn total_energy(&self) -> u128 {
        total_energy(self.blocks.values().map(|b| b.store().amount()))
    }

    /// Snapshot every block, in position order.
    pub fn snapshot(&self) -> Vec<BlockSnapshot> {
        self.blocks
            .iter()
            .map(|(pos, block)| BlockSnapshot {
                pos: *pos,
                kind: block.kind(),
                amount: block.store().amount(),
                capacity: block.store().capacity(),
                dirty: block.store().is_dirty(),
                updates: block.owner().updates(),
                dirty_marks: block.owner().dirty_marks(),
            })
            .collect()
    }

    // -------------------------------------------------------------------
    // Tick operations
    // -------------------------------------------------------------------

    /// Spread the surplus of the block at `pos` into its neighbors, using
    /// the block's own spread mode.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BlockNotFound`] if there is no block at `pos`,
    /// or [`WorldError::Energy`] if the distribution fails.
    pub fn spread_from(
        &mut self,
        pos: BlockPos,
        distributor: &Distributor,
        excluded: Option<&dyn PositionSet>,
    ) -> Result<SpreadOutcome, WorldError> {
        let mut block = self
            .blocks
            .remove(&pos)
            .ok_or(WorldError::BlockNotFound(pos))?;

        let options = SpreadOptions {
            excluded,
            mode: block.spread_mode(),
        };
        let result = distributor.spread(&mut block.owner, self, pos, &mut block.store, options);
        self.blocks.insert(pos, block);

        let outcome = result?;
        if outcome.moved() {
            debug!(%pos, inserted = outcome.inserted, "block spread energy");
        }
        Ok(outcome)
    }

    /// Call `sync()` on every block's store.
    pub fn sync_all(&mut self) -> SyncReport {
        let mut report = SyncReport::default();
        for block in self.blocks.values_mut() {
            let Some(notification) = block.sync() else {
                continue;
            };
            report.synced = report.synced.saturating_add(1);
            match notification {
                Notification::Lightweight => {
                    report.lightweight = report.lightweight.saturating_add(1);
                }
                Notification::Generic => {
                    report.generic = report.generic.saturating_add(1);
                }
                Notification::Unsupported => {}
            }
        }
        report
    }
}

impl WorldContext for GridWorld {
    fn find_storage(&self, pos: BlockPos, side: Direction) -> Option<StoreId> {
        let block = self.blocks.get(&pos)?;
        block.exposes(side).then(|| block.store().id())
    }

    fn storage(&self, id: StoreId) -> Option<&dyn EnergyStorage> {
        let pos = self.stores.get(&id)?;
        self.blocks
            .get(pos)
            .map(|block| block.store() as &dyn EnergyStorage)
    }

    fn storage_mut(&mut self, id: StoreId) -> Option<&mut dyn EnergyStorage> {
        let pos = self.stores.get(&id)?;
        self.blocks
            .get_mut(pos)
            .map(|block| block.store_mut() as &mut dyn EnergyStorage)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::collections::BTreeSet;

    use flux_energy::EnergyStore;
    use flux_types::{OwnerCapability, SpreadMode};

    use super::*;

    fn battery(amount: Energy) -> BlockEntity {
        let store = EnergyStore::new(100, 100, 100)
            .and_then(|s| s.with_amount(amount))
            .expect("valid store");
        BlockEntity::new(BlockKind::Battery, store)
    }

    fn grid_with_line(amounts: &[Energy]) -> GridWorld {
        let mut grid = GridWorld::new(WorldSide::Server);
        for (x, amount) in (0_i32..).zip(amounts) {
            grid.add_block(BlockPos::new(x, 0, 0), battery(*amount))
                .expect("free position");
        }
        grid
    }

    #[test]
    fn occupied_position_rejected() {
        let mut grid = grid_with_line(&[0]);
        let result = grid.add_block(BlockPos::new(0, 0, 0), battery(0));
        assert!(matches!(result, Err(WorldError::PositionOccupied(_))));
    }

    #[test]
    fn same_store_cannot_be_placed_twice() {
        let mut grid = GridWorld::new(WorldSide::Server);
        let block = battery(0);
        grid.add_block(BlockPos::new(0, 0, 0), block.clone())
            .expect("free position");
        let result = grid.add_block(BlockPos::new(5, 0, 0), block);
        assert!(matches!(result, Err(WorldError::DuplicateStore(_))));
    }

    #[test]
    fn probes_respect_exposed_faces() {
        let mut grid = GridWorld::new(WorldSide::Server);
        let pos = BlockPos::new(1, 0, 0);
        grid.add_block(pos, battery(0).with_faces([Direction::West]))
            .expect("free position");

        assert!(grid.find_storage(pos, Direction::West).is_some());
        assert!(grid.find_storage(pos, Direction::East).is_none());
        assert!(grid.find_storage(BlockPos::new(9, 9, 9), Direction::West).is_none());
    }

    #[test]
    fn spread_moves_energy_along_the_line() {
        let mut grid = grid_with_line(&[0, 90, 0]);
        let middle = BlockPos::new(1, 0, 0);

        let outcome = grid
            .spread_from(middle, &Distributor::new(), None)
            .expect("spread");

        assert_eq!(outcome.candidates, 2);
        let amounts: Vec<Energy> = grid.snapshot().iter().map(|s| s.amount).collect();
        assert_eq!(amounts, vec![45, 0, 45]);
        assert_eq!(grid.total_energy(), 90);
        assert_eq!(grid.block_count(), 3);
    }

    #[test]
    fn spread_uses_block_mode() {
        let mut grid = GridWorld::new(WorldSide::Server);
        let source = battery(90).with_spread_mode(SpreadMode::Max);
        grid.add_block(BlockPos::new(1, 0, 0), source)
            .expect("free position");
        grid.add_block(BlockPos::new(0, 0, 0), battery(50))
            .expect("free position");
        grid.add_block(BlockPos::new(2, 0, 0), battery(0))
            .expect("free position");

        grid.spread_from(BlockPos::new(1, 0, 0), &Distributor::new(), None)
            .expect("spread");

        // West is probed before east, so the west battery fills first.
        let amounts: Vec<Energy> = grid.snapshot().iter().map(|s| s.amount).collect();
        assert_eq!(amounts, vec![100, 0, 40]);
    }

    #[test]
    fn spread_honors_exclusions() {
        let mut grid = grid_with_line(&[0, 90, 0]);
        let excluded: BTreeSet<BlockPos> = [BlockPos::new(0, 0, 0)].into_iter().collect();

        grid.spread_from(BlockPos::new(1, 0, 0), &Distributor::new(), Some(&excluded))
            .expect("spread");

        let amounts: Vec<Energy> = grid.snapshot().iter().map(|s| s.amount).collect();
        assert_eq!(amounts, vec![0, 0, 90]);
    }

    #[test]
    fn spread_from_empty_position_fails() {
        let mut grid = grid_with_line(&[0]);
        let result = grid.spread_from(BlockPos::new(4, 4, 4), &Distributor::new(), None);
        assert!(matches!(result, Err(WorldError::BlockNotFound(_))));
    }

    #[test]
    fn sync_all_notifies_each_dirty_block_once() {
        let mut grid = GridWorld::new(WorldSide::Server);
        grid.add_block(
            BlockPos::new(1, 0, 0),
            battery(60).with_capability(OwnerCapability::Lightweight),
        )
        .expect("free position");
        grid.add_block(BlockPos::new(0, 0, 0), battery(0))
            .expect("free position");

        grid.spread_from(BlockPos::new(1, 0, 0), &Distributor::new(), None)
            .expect("spread");

        let report = grid.sync_all();
        assert_eq!(report.synced, 2);
        assert_eq!(report.generic, 1);
        // The source also got a direct lightweight update from the spread.
        assert_eq!(report.lightweight, 1);
        let source = grid.block(BlockPos::new(1, 0, 0)).expect("placed");
        assert_eq!(source.owner().updates(), 2);

        assert_eq!(grid.sync_all(), SyncReport::default());
    }

    #[test]
    fn client_grid_never_syncs() {
        let mut grid = GridWorld::new(WorldSide::Client);
        grid.add_block(BlockPos::new(1, 0, 0), battery(60))
            .expect("free position");
        grid.add_block(BlockPos::new(0, 0, 0), battery(0))
            .expect("free position");
        grid.spread_from(BlockPos::new(1, 0, 0), &Distributor::new(), None)
            .expect("spread");

        assert_eq!(grid.sync_all(), SyncReport::default());
        let source = grid.block(BlockPos::new(1, 0, 0)).expect("placed");
        assert!(source.store().is_dirty());
    }

    #[test]
    fn removed_block_is_detached() {
        let mut grid = grid_with_line(&[10]);
        let mut block = grid.remove_block(BlockPos::new(0, 0, 0)).expect("placed");
        assert_eq!(grid.block_count(), 0);
        assert_eq!(grid.total_energy(), 0);
        assert_eq!(block.sync(), None::<Notification>);
    }
}
