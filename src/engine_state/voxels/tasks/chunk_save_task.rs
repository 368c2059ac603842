use log::{trace, warn};

use crate::engine_state::{
    task_management::task::TaskHandler, voxels::chunk::ChunkCoords, world_context::WorldContext,
};

/// Writes a resident region to disk from a worker thread.
pub struct ChunkSaveTask {
    coords: ChunkCoords,
}

impl ChunkSaveTask {
    pub fn new(coords: ChunkCoords) -> Self {
        ChunkSaveTask { coords }
    }
}

impl TaskHandler for ChunkSaveTask {
    fn process(&self, context: &WorldContext) {
        let Some(chunk) = context.world.get_chunk(self.coords) else {
            return;
        };

        // cleared before the snapshot so an edit made during the write queues a new save
        chunk.clear_save_queued();
        let snapshot = chunk.read_blocks().as_ref().map(|blocks| blocks.to_vec());
        let Some(blocks) = snapshot else {
            return;
        };

        match context.store.save_chunk(self.coords, &blocks) {
            Ok(()) => trace!("Saved chunk {:?}", self.coords),
            Err(error) => warn!("Failed to save chunk {:?}: {}", self.coords, error),
        }
    }
}
