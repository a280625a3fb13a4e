//! Enumeration types for the Flux simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// One of the six axis-aligned faces of a block.
///
/// [`Direction::ALL`] fixes the probe order used by neighbor discovery, so
/// distribution results are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Negative Y.
    Down,
    /// Positive Y.
    Up,
    /// Negative Z.
    North,
    /// Positive Z.
    South,
    /// Negative X.
    West,
    /// Positive X.
    East,
}

impl Direction {
    /// Every direction, in discovery order.
    pub const ALL: [Self; 6] = [
        Self::Down,
        Self::Up,
        Self::North,
        Self::South,
        Self::West,
        Self::East,
    ];

    /// The direction pointing the other way.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Down => Self::Up,
            Self::Up => Self::Down,
            Self::North => Self::South,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::East => Self::West,
        }
    }

    /// Unit offset `(dx, dy, dz)` of this direction.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Self::Down => (0, -1, 0),
            Self::Up => (0, 1, 0),
            Self::North => (0, 0, -1),
            Self::South => (0, 0, 1),
            Self::West => (-1, 0, 0),
            Self::East => (1, 0, 0),
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::North => "north",
            Self::South => "south",
            Self::West => "west",
            Self::East => "east",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// World side
// ---------------------------------------------------------------------------

/// Which copy of the world a piece of state lives in.
///
/// Only the server side is authoritative; client mirrors never push sync
/// notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldSide {
    /// The authoritative simulation.
    #[default]
    Server,
    /// A remote mirror of the simulation.
    Client,
}

impl WorldSide {
    /// Returns `true` for the authoritative side.
    pub const fn is_authoritative(self) -> bool {
        matches!(self, Self::Server)
    }
}

// ---------------------------------------------------------------------------
// Distribution mode
// ---------------------------------------------------------------------------

/// How a source divides its surplus among eligible neighbors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadMode {
    /// Integer-divide the surplus evenly between candidates.
    #[default]
    Equal,
    /// Offer everything still unplaced to each candidate in turn.
    Max,
}

impl SpreadMode {
    /// Returns `true` for [`SpreadMode::Equal`].
    pub const fn is_equal(self) -> bool {
        matches!(self, Self::Equal)
    }
}

// ---------------------------------------------------------------------------
// Owner capability
// ---------------------------------------------------------------------------

/// The notification capability an owning entity declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerCapability {
    /// Supports a narrow update with no visible refresh.
    Lightweight,
    /// Only supports the generic "mark dirty" notification.
    #[default]
    Generic,
    /// Accepts no notifications.
    None,
}

// ---------------------------------------------------------------------------
// Block kinds
// ---------------------------------------------------------------------------

/// The behavior attached to a block entity in the grid world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    /// Produces energy into its own store every tick, then spreads it.
    Generator {
        /// Energy produced per tick (still bounded by the store's insert cap).
        output_per_tick: u64,
    },
    /// Buffers energy and spreads it onward.
    Battery,
    /// Passes energy along; usually a small store with high rates.
    Conduit,
    /// Drains energy every tick and never spreads.
    Consumer {
        /// Energy drawn per tick (bounded by the store's extract cap).
        draw_per_tick: u64,
    },
}

impl BlockKind {
    /// Returns `true` if this kind pushes energy to its neighbors each tick.
    pub const fn spreads(self) -> bool {
        !matches!(self, Self::Consumer { .. })
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_an_involution() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_ne!(dir.opposite(), dir);
        }
    }

    #[test]
    fn opposite_offsets_cancel() {
        for dir in Direction::ALL {
            let (x, y, z) = dir.offset();
            let (ox, oy, oz) = dir.opposite().offset();
            assert_eq!((x + ox, y + oy, z + oz), (0, 0, 0));
        }
    }

    #[test]
    fn discovery_order_is_fixed() {
        assert_eq!(Direction::ALL[0], Direction::Down);
        assert_eq!(Direction::ALL[5], Direction::East);
    }

    #[test]
    fn only_server_is_authoritative() {
        assert!(WorldSide::Server.is_authoritative());
        assert!(!WorldSide::Client.is_authoritative());
    }

    #[test]
    fn consumers_do_not_spread() {
        assert!(!BlockKind::Consumer { draw_per_tick: 5 }.spreads());
        assert!(BlockKind::Battery.spreads());
        assert!(BlockKind::Generator { output_per_tick: 5 }.spreads());
    }

    #[test]
    fn block_kind_serde_uses_tagged_form() {
        let json = serde_json::to_string(&BlockKind::Generator { output_per_tick: 20 });
        assert_eq!(
            json.ok().as_deref(),
            Some(r#"{"type":"generator","output_per_tick":20}"#)
        );
    }
}
