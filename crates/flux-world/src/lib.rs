//! The block grid for the Flux simulation.
//!
//! This crate places energy stores in space: each occupied [`BlockPos`]
//! holds a [`BlockEntity`] with a synced store, an owner, and the faces the
//! store is reachable through.
//!
//! # Modules
//!
//! - [`block`] -- [`BlockEntity`] and [`BlockOwner`]: per-block generation,
//!   consumption, and owner notification.
//! - [`grid`] -- [`GridWorld`], the [`WorldContext`] the distributor probes,
//!   with spreading, batch sync, and snapshots.
//! - [`error`] -- Error types for grid operations.
//!
//! [`BlockPos`]: flux_types::BlockPos
//! [`WorldContext`]: flux_energy::WorldContext

pub mod block;
pub mod error;
pub mod grid;

// Re-export primary types at crate root.
pub use block::{BlockEntity, BlockOwner};
pub use error::WorldError;
pub use grid::{BlockSnapshot, GridWorld, SyncReport};
