//! # Engine State Module
//!
//! The core engine module that owns a streaming world session.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container and the gameplay-facing API
//! * `world_context` - State shared between the main thread and the workers
//! * `buffer_state` - The upload gate between finished meshes and the GPU
//! * `rendering` - Vertex format, buffer pool and mesh generation
//! * `task_management` - Task queue and worker threads
//! * `voxels` - Blocks, regions, the region directory and the radius scheduler
//!
//! ## Architecture
//!
//! Work flows in one direction: the radius scheduler requests regions, workers load and
//! mesh them, and the upload gate publishes the meshes once per frame. `EngineState` is
//! the central coordinator: `update` runs the main-thread half of that pipeline and
//! everything else happens on the workers.
//!
//! ## Performance Considerations
//!
//! * Task-based parallelism for loading, generation and meshing
//! * Vertex buffers are pooled and reused instead of allocated per mesh
//! * The radius is only re-checked after the viewpoint moved a meaningful distance

use std::sync::Arc;

use cgmath::Point3;
use log::{info, warn};

use buffer_state::{BufferAnalytics, BufferState, GpuUploader, HeadlessUploader};
use rendering::sub_chunk_pool::SubChunkPool;
use task_management::TaskManager;
use voxels::{
    block::Block,
    chunk::{sub_chunk::DrawableSubChunk, ChunkCoords},
    generator::{PerlinTerrain, TerrainGenerator},
    lighting::{LightingCollaborator, NoLighting},
    scheduler::RadiusScheduler,
    world::World,
};
use world_context::WorldContext;

use crate::config::StreamingConfig;
use crate::error::EngineResult;

pub mod buffer_state;
pub mod rendering;
pub mod task_management;
pub mod voxels;
pub mod world_context;

/// What one call to `EngineState::update` did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Regions newly requested by a radius check
    pub requested: usize,
    /// Deferred unloads completed this frame
    pub unloaded: usize,
    /// Sub-chunks that reached `Uploaded` this frame
    pub uploaded: usize,
}

/// The main state container for a streaming world session
///
/// # Examples
///
/// ```no_run
/// use cgmath::Point3;
/// use voxel_streaming::config::StreamingConfig;
/// use voxel_streaming::engine_state::EngineState;
///
/// let mut engine_state = EngineState::with_defaults(&StreamingConfig::default())?;
///
/// // Main game loop
/// loop {
///     engine_state.update(Point3::new(0.0, 80.0, 0.0));
///     for drawable in engine_state.drawable_sub_chunks() {
///         // hand `drawable.draw_command` to the renderer
///     }
/// #   break;
/// }
/// engine_state.shutdown()?;
/// # Ok::<(), voxel_streaming::error::EngineError>(())
/// ```
pub struct EngineState {
    /// State shared with the worker threads
    pub context: Arc<WorldContext>,
    /// The upload gate
    pub buffer_state: BufferState,
    /// Worker threads for asynchronous operations
    pub task_manager: TaskManager,
    scheduler: RadiusScheduler,
    shut_down: bool,
}

impl EngineState {
    /// Opens a world session and starts its workers.
    ///
    /// # Errors
    /// Fails if the config is invalid, the world save cannot be opened or a worker
    /// thread cannot be spawned.
    pub fn new(
        config: &StreamingConfig,
        generator: Box<dyn TerrainGenerator>,
        lighting: Box<dyn LightingCollaborator>,
        uploader: Box<dyn GpuUploader>,
    ) -> EngineResult<Self> {
        let (context, upload_receiver) = WorldContext::open(config, generator, lighting)?;
        let buffer_state = BufferState::new(uploader, upload_receiver, context.pool.clone());
        let task_manager = TaskManager::new(config.worker_threads, context.clone())?;

        Ok(EngineState {
            context,
            buffer_state,
            task_manager,
            scheduler: RadiusScheduler::new(config.load_radius, config.unload_radius),
            shut_down: false,
        })
    }

    /// Opens a session with Perlin terrain, no lighting engine and a headless uploader.
    pub fn with_defaults(config: &StreamingConfig) -> EngineResult<Self> {
        Self::new(
            config,
            Box::new(PerlinTerrain::default()),
            Box::new(NoLighting),
            Box::new(HeadlessUploader::new()),
        )
    }

    /// Runs the main-thread half of the pipeline for one frame: the radius check (when
    /// the viewpoint moved far enough), deferred unloads and the upload gate.
    pub fn update(&mut self, viewpoint: Point3<f32>) -> FrameStats {
        let mut stats = FrameStats::default();

        if self.scheduler.should_check(viewpoint) {
            stats.requested =
                self.scheduler
                    .check_chunk_radius(&self.context, &mut self.buffer_state, viewpoint);
        }
        stats.unloaded = self
            .scheduler
            .process_pending_unloads(&self.context, &mut self.buffer_state);
        stats.uploaded = self.process_uploads();

        stats
    }

    /// Publishes every finished mesh. Already part of `update`.
    pub fn process_uploads(&mut self) -> usize {
        self.buffer_state.process_uploads(&self.context.world)
    }

    pub fn world(&self) -> &World {
        &self.context.world
    }

    pub fn pool(&self) -> &SubChunkPool {
        &self.context.pool
    }

    pub fn analytics(&self) -> BufferAnalytics {
        self.buffer_state.analytics()
    }

    pub fn get_block(&self, world_position: Point3<f32>) -> Block {
        self.context.world.get_block(world_position)
    }

    pub fn set_block(&self, world_position: Point3<f32>, block: Block) -> bool {
        self.context.world.set_block(world_position, block)
    }

    pub fn remove_block(&self, world_position: Point3<f32>) -> bool {
        self.context.world.remove_block(world_position)
    }

    pub fn queue_save_chunk(&self, coords: ChunkCoords) -> bool {
        self.context.world.queue_save_chunk(coords)
    }

    pub fn queue_retesselate_chunk(&self, coords: ChunkCoords) -> usize {
        self.context.world.queue_retesselate_chunk(coords)
    }

    pub fn drawable_sub_chunks(&self) -> Vec<DrawableSubChunk> {
        self.context.world.drawable_sub_chunks()
    }

    /// Writes every resident region and the world metadata to disk.
    ///
    /// Region failures are logged and skipped so one bad file does not lose the rest of
    /// the world.
    ///
    /// # Returns
    /// The number of regions written.
    pub fn serialize(&self) -> EngineResult<usize> {
        let mut saved = 0;
        for chunk in self.context.world.chunks() {
            let blocks = chunk.read_blocks();
            let Some(blocks) = blocks.as_ref() else {
                continue;
            };
            match self.context.store.save_chunk(chunk.coords, blocks) {
                Ok(()) => saved += 1,
                Err(error) => warn!("Failed to save chunk {:?}: {}", chunk.coords, error),
            }
        }

        self.context.save_metadata()?;
        info!(
            "Saved {} chunks to {:?}",
            saved,
            self.context.save_directory()
        );
        Ok(saved)
    }

    /// Stops the workers, then saves the world.
    pub fn shutdown(&mut self) -> EngineResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        self.task_manager.shutdown();
        self.serialize()?;
        Ok(())
    }
}

impl Drop for EngineState {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            warn!("Failed to save the world on shutdown: {}", error);
        }
    }
}
