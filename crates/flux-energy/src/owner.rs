//! Owner capabilities and the two-tier change notification.
//!
//! A store never owns the entity it belongs to; the entity is handed in as a
//! [`StorageOwner`] whenever a notification may be needed. Owners advertise
//! what kind of notification they accept through capability accessors:
//!
//! 1. [`LightweightUpdate`] -- a narrow update with no visible refresh.
//! 2. [`GenericUpdate`] -- the generic "mark dirty" path (persistence,
//!    visible refresh, network resync).
//!
//! [`notify_owner`] always prefers the lightweight path.

use serde::{Deserialize, Serialize};

use flux_types::{EntityId, WorldSide};

/// Narrow update capability.
pub trait LightweightUpdate {
    /// Push the changed state without a visible refresh.
    fn update(&mut self);
}

/// Generic dirty-marking capability.
pub trait GenericUpdate {
    /// Flag the entity for persistence, refresh and resync.
    fn mark_dirty(&mut self);
}

/// The entity that owns a store.
pub trait StorageOwner {
    /// The owning entity's identifier.
    fn entity_id(&self) -> EntityId;

    /// The world this entity is attached to, or `None` if it is detached.
    fn world_side(&self) -> Option<WorldSide>;

    /// Lightweight notification capability, if supported.
    fn as_lightweight(&mut self) -> Option<&mut dyn LightweightUpdate> {
        None
    }

    /// Generic notification capability, if supported.
    fn as_generic(&mut self) -> Option<&mut dyn GenericUpdate> {
        None
    }

    /// Attached to a live world that is the authoritative side.
    fn is_authoritative(&self) -> bool {
        self.world_side().is_some_and(WorldSide::is_authoritative)
    }
}

/// Which notification path an owner received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    /// [`LightweightUpdate::update`] was called.
    Lightweight,
    /// [`GenericUpdate::mark_dirty`] was called.
    Generic,
    /// The owner supports neither capability.
    Unsupported,
}

/// Notify `owner` through its best available capability.
pub fn notify_owner(owner: &mut dyn StorageOwner) -> Notification {
    if let Some(lightweight) = owner.as_lightweight() {
        lightweight.update();
        return Notification::Lightweight;
    }
    if let Some(generic) = owner.as_generic() {
        generic.mark_dirty();
        return Notification::Generic;
    }
    Notification::Unsupported
}
