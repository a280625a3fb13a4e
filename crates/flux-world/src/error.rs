//! Error types for the `flux-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`].

use flux_energy::EnergyError;
use flux_ledger::TransactionError;
use flux_types::BlockPos;

/// Errors that can occur during grid operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No block entity exists at the position.
    #[error("no block at {0}")]
    BlockNotFound(BlockPos),

    /// A block entity already occupies the position.
    #[error("position {0} is already occupied")]
    PositionOccupied(BlockPos),

    /// A store with the same identity is already placed elsewhere.
    #[error("store is already placed at {0}")]
    DuplicateStore(BlockPos),

    /// Building or moving energy failed.
    #[error("energy error: {source}")]
    Energy {
        /// The underlying energy error.
        #[from]
        source: EnergyError,
    },

    /// A transaction was misused.
    #[error("transaction error: {source}")]
    Transaction {
        /// The underlying transaction error.
        #[from]
        source: TransactionError,
    },
}
