//! Engine binary for the Flux simulation.
//!
//! Loads configuration, builds the block grid, and runs the tick loop until
//! the tick limit is reached or the process is interrupted. The final run
//! report is printed to stdout as JSON.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument, or
//!    `flux-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the grid from the `blocks` list
//! 4. Create run control and install the Ctrl-C handler
//! 5. Run the simulation loop
//! 6. Log the result and print the report

mod error;
mod report_callback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flux_core::config::{LogFormat, LoggingConfig};
use flux_core::{RunControl, SimulationConfig, SimulationState, runner};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::report_callback::ReportCallback;

/// Config file looked up in the working directory when no path is given.
const DEFAULT_CONFIG_PATH: &str = "flux-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, grid construction, or the simulation
/// itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        world_name = config.world.name,
        side = ?config.world.side,
        tick_interval_ms = config.world.tick_interval_ms,
        max_ticks = config.world.max_ticks,
        equal_distribution = config.distribution.equal_distribution,
        "Configuration loaded"
    );

    // 3. Build the grid.
    let mut sim_state = SimulationState::from_config(&config).map_err(EngineError::from)?;
    info!(
        blocks = sim_state.world.block_count(),
        total_energy = %sim_state.world.total_energy(),
        audit = sim_state.audit_conservation,
        "Grid built"
    );

    // 4. Create run control and stop on Ctrl-C.
    let control = Arc::new(RunControl::from_config(&config.world));
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping after the current tick");
                    control.request_stop();
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
            }
        });
    }

    let mut callback = ReportCallback::new(config.logging.snapshot_interval_ticks);
    callback.capture(&sim_state);

    // 5. Run the simulation.
    let result = runner::run_simulation(&mut sim_state, &control, &mut callback)
        .await
        .map_err(EngineError::from)?;

    // 6. Log results and print the report.
    runner::log_simulation_end(&result);
    callback.capture(&sim_state);

    let end_reason = result.end_reason;
    let total_ticks = result.total_ticks;
    let report = callback.into_report(config.world.name, result);
    let json = serde_json::to_string_pretty(&report).map_err(EngineError::from)?;
    println!("{json}");

    info!(
        end_reason = ?end_reason,
        total_ticks,
        "flux-engine shutdown complete"
    );

    Ok(())
}

/// Load the simulation configuration from `path`.
///
/// A missing file falls back to the defaults (an empty grid).
fn load_config(path: &Path) -> Result<SimulationConfig, EngineError> {
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        eprintln!(
            "config file {} not found, using defaults",
            path.display()
        );
        Ok(SimulationConfig::default())
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}
