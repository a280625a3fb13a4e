//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Stores and the entities that own them carry distinct ID types so a store
//! handle can never be passed where an owner is expected. All IDs use UUID v7
//! (time-ordered), which keeps `BTreeMap` iteration in creation order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an energy store.
    ///
    /// Transactions journal participating stores by this ID.
    StoreId
}

define_id! {
    /// Unique identifier for a block entity that owns a store.
    EntityId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = StoreId::new();
        let b = StoreId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn uuid_conversion_is_lossless() {
        let id = StoreId::new();
        let raw: Uuid = id.into();
        assert_eq!(StoreId::from(raw), id);
        assert_eq!(id.into_inner(), raw);
    }
}
