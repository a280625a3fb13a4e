//! Configuration, tick cycle, and run loop for the Flux simulation.
//!
//! This crate owns the 5-phase tick cycle that drives the simulation:
//! Generate, Spread, Consume, Sync, and Audit.
//!
//! # Modules
//!
//! - [`clock`] -- Tick counter with checked advancement.
//! - [`config`] -- Configuration loading from `flux-config.yaml` into
//!   strongly-typed structs, and grid construction from the `blocks` list.
//! - [`control`] -- [`RunControl`], shared stop and pacing state.
//! - [`runner`] -- The bounded async tick loop.
//! - [`tick`] -- The 5-phase tick cycle and its conservation audit.
//!
//! [`RunControl`]: control::RunControl

pub mod clock;
pub mod config;
pub mod control;
pub mod runner;
pub mod tick;

// Re-export primary types at crate root.
pub use config::{ConfigError, SimulationConfig};
pub use control::{RunControl, SimulationEndReason};
pub use runner::{NoOpCallback, RunnerError, SimulationResult, TickCallback, run_simulation};
pub use tick::{SimulationState, TickError, TickSummary, run_tick};
