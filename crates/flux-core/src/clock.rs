//! Tick counter for the Flux simulation.
//!
//! The clock is the single source of truth for the current tick. It starts
//! at zero and is advanced once at the start of every tick, so the first
//! tick that runs is tick 1.

use serde::Serialize;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// The simulation's tick counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorldClock {
    tick: u64,
}

impl WorldClock {
    /// A clock at tick 0.
    pub const fn new() -> Self {
        Self { tick: 0 }
    }

    /// A clock resumed at `tick`.
    pub const fn from_tick(tick: u64) -> Self {
        Self { tick }
    }

    /// The last tick started.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Move to the next tick and return it.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] at `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_and_counts_up() {
        let mut clock = WorldClock::new();
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.advance().ok(), Some(1));
        assert_eq!(clock.advance().ok(), Some(2));
        assert_eq!(clock.tick(), 2);
    }

    #[test]
    fn overflow_is_an_error_and_leaves_the_tick() {
        let mut clock = WorldClock::from_tick(u64::MAX);
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
        assert_eq!(clock.tick(), u64::MAX);
    }
}
