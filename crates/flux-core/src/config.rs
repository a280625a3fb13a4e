//! Configuration loading and typed config structures for the Flux simulation.
//!
//! The canonical configuration lives in `flux-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, a loader that reads the file, and [`SimulationConfig::build_world`]
//! which turns the `blocks` list into a [`GridWorld`].

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use flux_energy::EnergyStore;
use flux_types::{BlockKind, BlockPos, Direction, Energy, OwnerCapability, SpreadMode, WorldSide};
use flux_world::{BlockEntity, GridWorld, WorldError};

/// Environment variable overriding `world.max_ticks`.
pub const MAX_TICKS_ENV: &str = "FLUX_MAX_TICKS";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A configured block could not be built or placed.
    #[error("invalid block at {pos}: {source}")]
    Block {
        /// Where the block was configured.
        pos: BlockPos,
        /// What went wrong.
        source: WorldError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `flux-config.yaml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (name, side, timing).
    #[serde(default)]
    pub world: WorldConfig,

    /// Distribution defaults and auditing.
    #[serde(default)]
    pub distribution: DistributionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Blocks placed in the grid at startup.
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `FLUX_MAX_TICKS` overrides `world.max_ticks` when set to a valid
    /// number.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.world.apply_env_overrides();
        Ok(config)
    }

    /// Build the grid described by `blocks`.
    ///
    /// Blocks without their own `spread_mode` use the distribution default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Block`] for a block with zero capacity, an
    /// initial amount above capacity, or a position already taken.
    pub fn build_world(&self) -> Result<GridWorld, ConfigError> {
        let mut world = GridWorld::new(self.world.side);
        let default_mode = self.distribution.default_mode();
        for block in &self.blocks {
            let entity = block
                .build(default_mode)
                .map_err(|source| ConfigError::Block {
                    pos: block.pos,
                    source,
                })?;
            world
                .add_block(block.pos, entity)
                .map_err(|source| ConfigError::Block {
                    pos: block.pos,
                    source,
                })?;
        }
        Ok(world)
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Which side this process simulates.
    #[serde(default)]
    pub side: WorldSide,

    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Ticks to run before stopping (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl WorldConfig {
    /// Apply `FLUX_MAX_TICKS` if it is set.
    pub fn apply_env_overrides(&mut self) {
        let Ok(val) = std::env::var(MAX_TICKS_ENV) else {
            return;
        };
        match val.trim().parse::<u64>() {
            Ok(max_ticks) => self.max_ticks = max_ticks,
            Err(e) => warn!(value = %val, error = %e, "Ignoring invalid FLUX_MAX_TICKS"),
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            side: WorldSide::default(),
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: default_max_ticks(),
        }
    }
}

/// Distribution defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DistributionConfig {
    /// Split surplus evenly (`true`) or fill neighbors greedily (`false`).
    #[serde(default = "default_true")]
    pub equal_distribution: bool,

    /// Check energy conservation after every spread and every tick.
    #[serde(default = "default_true")]
    pub audit_conservation: bool,
}

impl DistributionConfig {
    /// The spread mode used by blocks that do not set one.
    pub const fn default_mode(&self) -> SpreadMode {
        if self.equal_distribution {
            SpreadMode::Equal
        } else {
            SpreadMode::Max
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            equal_distribution: true,
            audit_conservation: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Log a full grid snapshot every N ticks (0 = never).
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            snapshot_interval_ticks: default_snapshot_interval_ticks(),
        }
    }
}

/// One block placed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockConfig {
    /// Where the block goes.
    pub pos: BlockPos,

    /// What the block does.
    pub kind: BlockKind,

    /// Store capacity.
    #[serde(default = "default_capacity")]
    pub capacity: Energy,

    /// Per-operation insert cap. Defaults to the capacity.
    #[serde(default)]
    pub max_insert: Option<Energy>,

    /// Per-operation extract cap. Defaults to the capacity.
    #[serde(default)]
    pub max_extract: Option<Energy>,

    /// Starting amount.
    #[serde(default)]
    pub initial_amount: Energy,

    /// Faces the store is reachable through. Defaults to all six.
    #[serde(default)]
    pub faces: Option<Vec<Direction>>,

    /// How the owner wants to be notified.
    #[serde(default)]
    pub owner_capability: OwnerCapability,

    /// Overrides the distribution default for this block.
    #[serde(default)]
    pub spread_mode: Option<SpreadMode>,
}

impl BlockConfig {
    /// Build the block entity this entry describes.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Energy`] if the store parameters are invalid.
    pub fn build(&self, default_mode: SpreadMode) -> Result<BlockEntity, WorldError> {
        let store = EnergyStore::new(
            self.capacity,
            self.max_insert.unwrap_or(self.capacity),
            self.max_extract.unwrap_or(self.capacity),
        )?
        .with_amount(self.initial_amount)?;

        let mut entity = BlockEntity::new(self.kind, store)
            .with_capability(self.owner_capability)
            .with_spread_mode(self.spread_mode.unwrap_or(default_mode));
        if let Some(faces) = &self.faces {
            entity = entity.with_faces(faces.iter().copied());
        }
        Ok(entity)
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Flux".to_owned()
}

const fn default_tick_interval_ms() -> u64 {
    50
}

const fn default_max_ticks() -> u64 {
    100
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_snapshot_interval_ticks() -> u64 {
    10
}

const fn default_capacity() -> Energy {
    1_000
}
