//! # Chunk Generation Tasks
//!
//! This module defines the two tasks that bring a region's block data into memory:
//! `ChunkCreationTask` claims a freshly requested region and `ChunkLoadTask` fills its
//! block array from disk, falling back to the terrain generator. These tasks are
//! scheduled by the radius scheduler as the viewpoint moves through the world.

use log::{debug, trace, warn};
use web_time::Instant;

use crate::{
    core::fatal,
    engine_state::{
        task_management::task::{Task, TaskHandler},
        voxels::chunk::{sub_chunk::SubChunkState, ChunkCoords, CHUNK_SIZE},
        world_context::WorldContext,
    },
};

/// A task that moves a new region's sub-chunks into `LoadBlockData`.
///
/// This task is responsible for:
/// 1. Claiming every sub-chunk of the region
/// 2. Scheduling exactly one block data load for the region
pub struct ChunkCreationTask {
    /// The position of the region (in chunk coordinates)
    coords: ChunkCoords,
}

impl ChunkCreationTask {
    pub fn new(coords: ChunkCoords) -> Self {
        ChunkCreationTask { coords }
    }
}

impl TaskHandler for ChunkCreationTask {
    fn process(&self, context: &WorldContext) {
        let Some(chunk) = context.world.get_chunk(self.coords) else {
            debug!("Chunk {:?} was unloaded before creation", self.coords);
            return;
        };

        let mut claimed_first_level = false;
        for sub_chunk in chunk.sub_chunks() {
            let claimed = sub_chunk.try_advance(SubChunkState::Unloaded, SubChunkState::LoadBlockData);
            if claimed && sub_chunk.level == 0 {
                claimed_first_level = true;
            }
        }

        // the whole region loads at once, so only the claimant of level 0 schedules it
        if claimed_first_level {
            context.world.enqueue(Task::load_block_data(self.coords));
        }
    }
}

/// A task that fills a region's block array.
///
/// This task is responsible for:
/// 1. Claiming the region's load
/// 2. Reading the region from disk, or generating it when there is no usable save
/// 3. Scheduling mesh generation for every sub-chunk
pub struct ChunkLoadTask {
    /// The position of the region (in chunk coordinates)
    coords: ChunkCoords,
}

impl ChunkLoadTask {
    pub fn new(coords: ChunkCoords) -> Self {
        ChunkLoadTask { coords }
    }
}

impl TaskHandler for ChunkLoadTask {
    fn process(&self, context: &WorldContext) {
        let Some(chunk) = context.world.get_chunk(self.coords) else {
            debug!("Chunk {:?} was unloaded before its block data loaded", self.coords);
            return;
        };

        let first = chunk.sub_chunk(0);
        if !first.try_advance(SubChunkState::LoadBlockData, SubChunkState::LoadingBlockData) {
            trace!("Block data load of chunk {:?} already claimed", self.coords);
            return;
        }
        for sub_chunk in &chunk.sub_chunks()[1..] {
            sub_chunk.advance_owned(SubChunkState::LoadBlockData, SubChunkState::LoadingBlockData);
        }

        let start = Instant::now();
        let blocks = match context.store.load_chunk(self.coords) {
            Ok(Some(blocks)) => {
                trace!("Loaded chunk {:?} from disk", self.coords);
                blocks
            }
            Ok(None) => context.generator.fill_block_data(self.coords, context.seed()),
            Err(error) => {
                warn!(
                    "Failed to load chunk {:?}, regenerating it from the seed: {}",
                    self.coords, error
                );
                context.generator.fill_block_data(self.coords, context.seed())
            }
        };
        if blocks.len() != CHUNK_SIZE {
            fatal(&format!(
                "terrain generator returned {} blocks for chunk {:?}, expected {}",
                blocks.len(),
                self.coords,
                CHUNK_SIZE
            ));
        }
        chunk.install_blocks(blocks);
        debug!(
            "Block data of chunk {:?} ready in {:?}",
            self.coords,
            start.elapsed()
        );

        for sub_chunk in chunk.sub_chunks() {
            sub_chunk.advance_owned(SubChunkState::LoadingBlockData, SubChunkState::TesselateVertices);
            context.world.enqueue(Task::tesselate(self.coords, sub_chunk.level));
        }
    }
}
