//! Shared type definitions for the Flux energy simulation.
//!
//! This crate is the single source of truth for the identifiers and value
//! types passed between the ledger, the energy stores, the grid world and
//! the tick engine.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for stores and entities
//! - [`enums`] -- Directions, world sides, spread modes, block kinds
//! - [`structs`] -- Block positions and the [`Energy`] quantity type

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{BlockKind, Direction, OwnerCapability, SpreadMode, WorldSide};
pub use ids::{EntityId, StoreId};
pub use structs::{BlockPos, Energy};
