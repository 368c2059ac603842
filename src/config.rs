//! # Streaming Configuration
//!
//! Tunables for a world session. Every field has a default, so a config file only needs
//! to name what it changes:
//!
//! ```json
//! { "load_radius": 6, "unload_radius": 8, "save_directory": "worlds/survival" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine_state::voxels::chunk::NUM_SUB_CHUNKS;

/// Slots kept beyond the sub-chunks inside the unload radius. Covers meshes being
/// retesselated (old and new buffer alive at once) and regions whose unload is deferred
/// while the viewpoint moves.
pub const POOL_RETESSELATION_HEADROOM: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unload radius ({unload_radius}) must be greater than load radius ({load_radius})")]
    InvalidRadius { load_radius: i32, unload_radius: i32 },

    #[error("pool capacity {capacity} is smaller than the {required} buffers the unload radius can keep resident")]
    InvalidPoolCapacity { capacity: usize, required: usize },

    #[error("at least one worker thread is required")]
    InvalidWorkerCount,
}

/// Configuration of a streaming world session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Regions within this Chebyshev distance of the viewpoint's region are loaded.
    pub load_radius: i32,
    /// Regions beyond this Chebyshev distance are unloaded. Must exceed `load_radius`.
    pub unload_radius: i32,
    pub worker_threads: usize,
    /// Number of vertex buffers in the sub-chunk pool. Derived from `unload_radius` when
    /// unset; see `pool_capacity()`.
    pub pool_capacity: Option<usize>,
    /// Root of the world save: `world.bin` and `chunks/` live here.
    pub save_directory: PathBuf,
    /// Seed for new worlds. Ignored when the save already has one.
    pub seed: Option<u32>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        let load_radius = 4;
        let unload_radius = 6;
        StreamingConfig {
            load_radius,
            unload_radius,
            worker_threads: default_worker_threads(),
            pool_capacity: None,
            save_directory: PathBuf::from("worlds/default"),
            seed: None,
        }
    }
}

/// One worker per core, leaving a core for the main thread.
pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Enough buffers for every sub-chunk inside the unload radius plus retesselation headroom.
pub fn default_pool_capacity(unload_radius: i32) -> usize {
    resident_sub_chunks(unload_radius) + POOL_RETESSELATION_HEADROOM
}

/// Sub-chunks in the square of regions within `radius` of a centre region.
pub fn resident_sub_chunks(radius: i32) -> usize {
    let side = (2 * radius.max(0) + 1) as usize;
    side * side * NUM_SUB_CHUNKS
}

impl StreamingConfig {
    /// Loads a config from a JSON file and validates it.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: StreamingConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The configured pool size, or `default_pool_capacity(unload_radius)` when unset.
    pub fn pool_capacity(&self) -> usize {
        self.pool_capacity
            .unwrap_or_else(|| default_pool_capacity(self.unload_radius))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load_radius < 0 || self.unload_radius <= self.load_radius {
            return Err(ConfigError::InvalidRadius {
                load_radius: self.load_radius,
                unload_radius: self.unload_radius,
            });
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        // regions stay resident out to the unload radius, not the load radius
        let required = default_pool_capacity(self.unload_radius);
        let capacity = self.pool_capacity();
        if capacity < required {
            return Err(ConfigError::InvalidPoolCapacity {
                capacity,
                required,
            });
        }
        Ok(())
    }
}
