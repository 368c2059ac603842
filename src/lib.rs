#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Streaming
//!
//! A streaming and meshing pipeline for block worlds: the world is split into 16×256×16
//! regions that are loaded, generated, meshed and uploaded around a moving viewpoint, and
//! torn down again once the viewpoint leaves them behind.
//!
//! ## Key Modules
//!
//! * `config` - Session tunables, loadable from JSON
//! * `core` - Shared building blocks used throughout the pipeline
//! * `engine_state` - The session itself: regions, tasks, meshing and the upload gate
//! * `persistence` - Region files and world metadata on disk
//!
//! ## Architecture
//!
//! The pipeline is split between the main thread and a pool of workers:
//! * The main thread checks the load radius, unloads regions and uploads finished meshes
//! * Workers load or generate block data, recalculate lighting and build meshes
//! * Every sub-chunk carries an atomic state so each unit of work has exactly one owner
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     if let Err(error) = voxel_streaming::run() {
//!         eprintln!("{}", error);
//!     }
//! }
//! ```
//!
//! ## Performance Considerations
//!
//! * Regions nearest the viewpoint are loaded and meshed first
//! * Greedy meshing merges coplanar faces before they reach the vertex buffers
//! * Vertex buffers come from a fixed pool sized from the unload radius

use std::path::PathBuf;
use std::time::Duration;

use cgmath::Point3;
use log::info;
use web_time::Instant;

use config::StreamingConfig;
use engine_state::EngineState;
use error::EngineResult;

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;
pub mod persistence;

pub const DEMO_FRAMES: u32 = 600;
const DEMO_FRAME_TIME: Duration = Duration::from_millis(16);
/// Blocks the demo viewpoint travels along +x per frame.
const DEMO_SPEED: f32 = 0.5;

/// Runs a headless session: the viewpoint flies along +x for `DEMO_FRAMES` frames while
/// regions stream in and out around it, then the world is saved.
///
/// The first command line argument, if any, is the path to a JSON config file.
pub fn run() -> EngineResult<()> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!("Loading config from {:?}", path);
            StreamingConfig::from_json_file(&path)?
        }
        None => StreamingConfig::default(),
    };

    let mut engine_state = EngineState::with_defaults(&config)?;
    info!(
        "World seed {} with {} workers",
        engine_state.context.seed(),
        engine_state.task_manager.num_workers()
    );

    let start = Instant::now();
    let mut viewpoint = Point3::new(0.0, 96.0, 0.0);
    for frame in 0..DEMO_FRAMES {
        let frame_start = Instant::now();
        let stats = engine_state.update(viewpoint);

        if frame % 60 == 0 {
            let analytics = engine_state.analytics();
            info!(
                "Frame {}: {} chunks resident, {} drawable sub-chunks, {} queued tasks, {} free buffers, {} KiB resident ({:?})",
                frame,
                engine_state.world().chunk_count(),
                engine_state.drawable_sub_chunks().len(),
                engine_state.context.queue().len(),
                engine_state.pool().free_count(),
                analytics.resident_bytes / 1024,
                stats
            );
        }

        viewpoint.x += DEMO_SPEED;
        if let Some(remaining) = DEMO_FRAME_TIME.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    engine_state.shutdown()?;
    info!("Demo finished in {:?}", start.elapsed());
    Ok(())
}
