//! Error types for the `flux-energy` crate.

use flux_ledger::TransactionError;
use flux_types::Energy;

/// Errors that can occur when building stores or distributing energy.
#[derive(Debug, thiserror::Error)]
pub enum EnergyError {
    /// Stores must be able to hold something.
    #[error("store capacity must be greater than zero")]
    ZeroCapacity,

    /// An initial amount did not fit in the store.
    #[error("initial amount {amount} exceeds capacity {capacity}")]
    AmountExceedsCapacity {
        /// The requested initial amount.
        amount: Energy,
        /// The store capacity.
        capacity: Energy,
    },

    /// A transaction was misused while distributing energy.
    #[error("transaction error: {source}")]
    Transaction {
        /// The underlying transaction error.
        #[from]
        source: TransactionError,
    },
}
