//! Core value types for the Flux simulation.

use serde::{Deserialize, Serialize};

use crate::enums::Direction;

/// A quantity of energy.
///
/// Unsigned, so a store can never hold a negative amount and a negative
/// request is unrepresentable.
pub type Energy = u64;

/// An integer block position in the world grid.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockPos {
    /// East-west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North-south coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Create a position from its coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The adjacent position one step in `direction`.
    ///
    /// Returns `None` if the step would leave the `i32` coordinate space.
    pub fn offset(self, direction: Direction) -> Option<Self> {
        let (dx, dy, dz) = direction.offset();
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
            z: self.z.checked_add(dz)?,
        })
    }
}

impl core::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
