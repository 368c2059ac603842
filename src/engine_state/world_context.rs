//! Shared state handed to every task handler.
//!
//! A `WorldContext` bundles everything a worker may touch: the region directory (which
//! owns the task queue), the sub-chunk pool, the region store, the collaborators and the
//! sending half of the upload channel. It is built once per session and shared behind an
//! `Arc` between the main thread and the workers.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use log::{info, warn};

use super::buffer_state::SubChunkKey;
use super::rendering::sub_chunk_pool::SubChunkPool;
use super::task_management::queue::TaskQueue;
use super::voxels::generator::TerrainGenerator;
use super::voxels::lighting::LightingCollaborator;
use super::voxels::world::World;
use crate::config::StreamingConfig;
use crate::error::EngineResult;
use crate::persistence::world_metadata::WorldMetadata;
use crate::persistence::{ChunkStore, PersistenceResult};

pub struct WorldContext {
    pub world: World,
    pub pool: Arc<SubChunkPool>,
    pub store: ChunkStore,
    pub generator: Box<dyn TerrainGenerator>,
    pub lighting: Box<dyn LightingCollaborator>,
    metadata: WorldMetadata,
    save_directory: PathBuf,
    upload_sender: Sender<SubChunkKey>,
}

impl WorldContext {
    /// Opens (or creates) the world save described by `config`.
    ///
    /// # Returns
    /// The context and the receiving half of the upload channel, which belongs to the
    /// upload gate.
    ///
    /// # Errors
    /// Fails if the config is invalid, the save directory cannot be created or the world
    /// metadata is malformed.
    pub fn open(
        config: &StreamingConfig,
        generator: Box<dyn TerrainGenerator>,
        lighting: Box<dyn LightingCollaborator>,
    ) -> EngineResult<(Arc<WorldContext>, Receiver<SubChunkKey>)> {
        config.validate()?;

        let metadata = WorldMetadata::load_or_create(&config.save_directory, config.seed)?;
        let store = ChunkStore::open(&config.save_directory)?;
        let (upload_sender, upload_receiver) = channel();

        info!(
            "Opened world at {:?} with a pool of {} sub-chunk buffers",
            config.save_directory,
            config.pool_capacity()
        );

        let context = WorldContext {
            world: World::new(Arc::new(TaskQueue::new())),
            pool: Arc::new(SubChunkPool::new(config.pool_capacity())),
            store,
            generator,
            lighting,
            metadata,
            save_directory: config.save_directory.clone(),
            upload_sender,
        };

        Ok((Arc::new(context), upload_receiver))
    }

    pub fn queue(&self) -> &TaskQueue {
        self.world.queue()
    }

    pub fn seed(&self) -> u32 {
        self.metadata.seed
    }

    pub fn seed_as_float(&self) -> f32 {
        self.metadata.seed_as_float()
    }

    pub fn save_directory(&self) -> &Path {
        &self.save_directory
    }

    /// Tells the upload gate a sub-chunk reached `UploadVerticesToGpu`.
    pub fn notify_ready_for_upload(&self, key: SubChunkKey) {
        if self.upload_sender.send(key).is_err() {
            warn!(
                "Upload gate is gone, dropping mesh of sub-chunk {:?}/{}",
                key.chunk_coords, key.level
            );
        }
    }

    pub fn save_metadata(&self) -> PersistenceResult<()> {
        self.metadata.save(&self.save_directory)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::mpsc::Receiver;
    use std::sync::Arc;

    use super::WorldContext;
    use crate::config::StreamingConfig;
    use crate::engine_state::buffer_state::SubChunkKey;
    use crate::engine_state::voxels::block::{block_type::BlockType, Block};
    use crate::engine_state::voxels::chunk::sub_chunk::test_support::advance_to_uploaded;
    use crate::engine_state::voxels::chunk::{Chunk, ChunkCoords, CHUNK_SIZE};
    use crate::engine_state::voxels::generator::FlatTerrain;
    use crate::engine_state::voxels::lighting::LightingCollaborator;

    /// A session over flat stone terrain saved under `save_directory`, without workers.
    pub(crate) fn open_context(
        save_directory: &Path,
        lighting: Box<dyn LightingCollaborator>,
    ) -> (Arc<WorldContext>, Receiver<SubChunkKey>) {
        let config = StreamingConfig {
            load_radius: 1,
            unload_radius: 2,
            worker_threads: 1,
            pool_capacity: None,
            save_directory: save_directory.to_path_buf(),
            seed: Some(1),
        };
        let terrain = FlatTerrain {
            height: 64,
            block_type: BlockType::STONE,
        };
        WorldContext::open(&config, Box::new(terrain), lighting).unwrap()
    }

    /// Inserts a loaded region of air with every sub-chunk parked in `Uploaded`.
    pub(crate) fn add_uploaded_chunk(context: &WorldContext, coords: ChunkCoords) -> Arc<Chunk> {
        let chunk = context.world.insert_placeholder(coords).unwrap();
        chunk.install_blocks(vec![Block::AIR; CHUNK_SIZE].into_boxed_slice());
        for sub_chunk in chunk.sub_chunks() {
            advance_to_uploaded(sub_chunk);
        }
        chunk
    }
}
