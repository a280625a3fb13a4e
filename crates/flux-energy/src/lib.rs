//! Bounded energy stores, dirty-state sync, and surplus distribution.
//!
//! This crate is the energy core of the Flux simulation:
//!
//! - [`store`] -- [`EnergyStore`], the capacity- and rate-bounded buffer, and
//!   the [`EnergyStorage`] capability every probe hands back.
//! - [`synced`] -- [`SyncedEnergyStore`], which raises a dirty flag on every
//!   final commit and pushes it to its owner through `sync()`.
//! - [`owner`] -- Owner capabilities and the lightweight-first notification
//!   dispatch.
//! - [`world`] -- The [`WorldContext`] seam used to discover neighbors.
//! - [`distributor`] -- [`Distributor::spread`], the transactional surplus
//!   distribution algorithm.
//! - [`error`] -- Error types.
//!
//! All mutation happens under a [`flux_ledger::Transaction`].

pub mod distributor;
pub mod error;
pub mod owner;
pub mod store;
pub mod synced;
pub mod world;

// Re-export primary types at crate root.
pub use distributor::{Distributor, SpreadOptions, SpreadOutcome};
pub use error::EnergyError;
pub use owner::{GenericUpdate, LightweightUpdate, Notification, StorageOwner, notify_owner};
pub use store::{EnergyStorage, EnergyStore, SpreadSource};
pub use synced::SyncedEnergyStore;
pub use world::{PositionSet, WorldContext};
