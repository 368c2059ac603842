//! Task for generating mesh data for sub-chunks in a background thread.
//!
//! This module contains the `ChunkMeshGenerationTask` which is responsible for building
//! the vertex data of one sub-chunk on a worker thread. This keeps the main thread
//! responsive while meshing is performed; the main thread only uploads the result.

use log::trace;

use crate::{
    core::fatal,
    engine_state::{
        buffer_state::SubChunkKey,
        rendering::meshing::{tesselate, Neighbourhood},
        task_management::task::{Task, TaskHandler},
        voxels::chunk::{sub_chunk::SubChunkState, ChunkCoords},
        world_context::WorldContext,
    },
};

/// A task that generates the mesh of one sub-chunk in a background thread.
///
/// This task is responsible for:
/// 1. Claiming the sub-chunk's tesselation (first-time or retesselation)
/// 2. Snapshotting the blocks the mesh depends on and greedy meshing them into a pooled
///    vertex buffer
/// 3. Handing the finished mesh to the upload gate
pub struct ChunkMeshGenerationTask {
    /// The region that owns the sub-chunk
    coords: ChunkCoords,
    /// Which sub-chunk of the region to mesh
    level: u8,
}

impl ChunkMeshGenerationTask {
    pub fn new(coords: ChunkCoords, level: u8) -> Self {
        ChunkMeshGenerationTask { coords, level }
    }
}

impl TaskHandler for ChunkMeshGenerationTask {
    fn process(&self, context: &WorldContext) {
        let Some(chunk) = context.world.get_chunk(self.coords) else {
            trace!("Chunk {:?} was unloaded before meshing", self.coords);
            return;
        };

        // meshing must never run ahead of the block data load
        if !chunk.is_loaded() {
            context.world.enqueue(Task::tesselate(self.coords, self.level));
            return;
        }

        let sub_chunk = chunk.sub_chunk(self.level);
        match sub_chunk.state() {
            SubChunkState::RetesselateVertices => {
                if !sub_chunk.try_advance(
                    SubChunkState::RetesselateVertices,
                    SubChunkState::DoneRetesselating,
                ) {
                    return;
                }
                sub_chunk.advance_owned(SubChunkState::DoneRetesselating, SubChunkState::TesselateVertices);
            }
            SubChunkState::TesselateVertices => {}
            state => {
                trace!(
                    "Skipping mesh of sub-chunk {:?}/{} in state {:?}",
                    self.coords,
                    self.level,
                    state
                );
                return;
            }
        }
        if !sub_chunk.try_advance(SubChunkState::TesselateVertices, SubChunkState::TesselatingVertices) {
            return;
        }

        let Some(neighbourhood) = Neighbourhood::capture(&context.world, &chunk, self.level) else {
            fatal(&format!(
                "block data of chunk {:?} vanished while meshing level {}",
                self.coords, self.level
            ));
        };
        let mut buffer = context
            .pool
            .acquire()
            .unwrap_or_else(|error| fatal(&error.to_string()));

        let vertex_count = tesselate(&neighbourhood, &mut buffer);
        if vertex_count == 0 {
            context.pool.release(buffer);
            sub_chunk.stage_mesh(None, 0);
        } else {
            sub_chunk.stage_mesh(Some(buffer), vertex_count);
        }

        sub_chunk.advance_owned(SubChunkState::TesselatingVertices, SubChunkState::UploadVerticesToGpu);
        context.notify_ready_for_upload(SubChunkKey {
            chunk_coords: self.coords,
            level: self.level,
        });
    }
}
