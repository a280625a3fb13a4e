//! The narrow view of the world the distributor needs.

use std::collections::{BTreeSet, HashSet};
use std::hash::BuildHasher;

use flux_types::{BlockPos, Direction, StoreId};

use crate::store::EnergyStorage;

/// Capability lookup over world positions.
///
/// Handles are [`StoreId`]s so a caller can hold several candidates at once
/// and resolve each one only while it is being touched.
pub trait WorldContext {
    /// The store at `pos` that accepts energy through its `side` face.
    ///
    /// `None` is the ordinary answer for empty positions, blocks without
    /// storage, and faces that do not expose it.
    fn find_storage(&self, pos: BlockPos, side: Direction) -> Option<StoreId>;

    /// Resolve a handle for reading.
    fn storage(&self, id: StoreId) -> Option<&dyn EnergyStorage>;

    /// Resolve a handle for mutation.
    fn storage_mut(&mut self, id: StoreId) -> Option<&mut dyn EnergyStorage>;
}

/// Set membership over block positions.
pub trait PositionSet {
    /// Returns `true` if `pos` is in the set.
    fn contains_pos(&self, pos: &BlockPos) -> bool;
}

impl<S: BuildHasher> PositionSet for HashSet<BlockPos, S> {
    fn contains_pos(&self, pos: &BlockPos) -> bool {
        self.contains(pos)
    }
}

impl PositionSet for BTreeSet<BlockPos> {
    fn contains_pos(&self, pos: &BlockPos) -> bool {
        self.contains(pos)
    }
}

impl PositionSet for [BlockPos] {
    fn contains_pos(&self, pos: &BlockPos) -> bool {
        self.contains(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_set_flavors_agree() {
        let inside = BlockPos::new(1, 2, 3);
        let outside = BlockPos::new(0, 0, 0);

        let hashed: HashSet<BlockPos> = [inside].into_iter().collect();
        let ordered: BTreeSet<BlockPos> = [inside].into_iter().collect();
        let slice: &[BlockPos] = &[inside];

        for set in [&hashed as &dyn PositionSet, &ordered] {
            assert!(set.contains_pos(&inside));
            assert!(!set.contains_pos(&outside));
        }
        assert!(slice.contains_pos(&inside));
        assert!(!slice.contains_pos(&outside));
    }
}
