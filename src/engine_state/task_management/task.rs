use cgmath::Point3;

use crate::engine_state::{
    rendering::tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask,
    voxels::{
        chunk::ChunkCoords,
        tasks::{
            chunk_generation_task::{ChunkCreationTask, ChunkLoadTask},
            chunk_save_task::ChunkSaveTask,
            lighting_task::LightingTask,
        },
    },
    world_context::WorldContext,
};

/// The kinds of streaming work a worker can execute.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Move a freshly requested region's sub-chunks into `LoadBlockData`.
    CreateRegion,
    /// Fill a region's block array from disk or the generator.
    LoadBlockData,
    /// Build the mesh of one sub-chunk.
    Tesselate,
    /// Write a region's block array to disk.
    SaveRegion,
    /// Hand edited positions to the lighting collaborator.
    RecalculateLighting,
}

/// A unit of queued work targeting one region (and, for tesselation, one sub-chunk).
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub kind: TaskKind,
    pub chunk_coords: ChunkCoords,
    /// Sub-chunk level for `Tesselate`, 0 otherwise.
    pub level: u8,
    /// The block edit that triggered this task, if any.
    pub block_position: Option<Point3<i32>>,
}

impl Task {
    fn new(kind: TaskKind, chunk_coords: ChunkCoords) -> Self {
        Task {
            kind,
            chunk_coords,
            level: 0,
            block_position: None,
        }
    }

    pub fn create_region(chunk_coords: ChunkCoords) -> Self {
        Self::new(TaskKind::CreateRegion, chunk_coords)
    }

    pub fn load_block_data(chunk_coords: ChunkCoords) -> Self {
        Self::new(TaskKind::LoadBlockData, chunk_coords)
    }

    pub fn tesselate(chunk_coords: ChunkCoords, level: u8) -> Self {
        Task {
            level,
            ..Self::new(TaskKind::Tesselate, chunk_coords)
        }
    }

    pub fn save_region(chunk_coords: ChunkCoords) -> Self {
        Self::new(TaskKind::SaveRegion, chunk_coords)
    }

    pub fn recalculate_lighting(chunk_coords: ChunkCoords, block_position: Point3<i32>) -> Self {
        Task {
            block_position: Some(block_position),
            ..Self::new(TaskKind::RecalculateLighting, chunk_coords)
        }
    }

    /// Runs the handler for this task's kind on the calling (worker) thread.
    pub fn process(self, context: &WorldContext) {
        match self.kind {
            TaskKind::CreateRegion => ChunkCreationTask::new(self.chunk_coords).process(context),
            TaskKind::LoadBlockData => ChunkLoadTask::new(self.chunk_coords).process(context),
            TaskKind::Tesselate => {
                ChunkMeshGenerationTask::new(self.chunk_coords, self.level).process(context)
            }
            TaskKind::SaveRegion => ChunkSaveTask::new(self.chunk_coords).process(context),
            TaskKind::RecalculateLighting => {
                LightingTask::new(self.chunk_coords, self.block_position).process(context)
            }
        }
    }
}

/// A handler that advances world state for one task.
///
/// Handlers never block on other tasks: when a prerequisite is missing they re-enqueue
/// work through the context instead of waiting.
pub trait TaskHandler {
    fn process(&self, context: &WorldContext);
}
