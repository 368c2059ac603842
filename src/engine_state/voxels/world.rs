//! # World Module
//!
//! This module provides the `World` struct, the region directory: the mapping from region
//! coordinates to resident regions, and the gameplay-facing block access API.
//!
//! ## Architecture
//!
//! The world uses a sparse storage approach where only regions inside the streaming
//! radius are kept in memory. A region enters the directory as a placeholder when it is
//! requested and stays until the radius scheduler unloads it.
//!
//! ## Block Edits
//!
//! Writes go straight into the region's block array, then schedule the follow-up work:
//! one relight per region (deduplicated) and a retesselation of every sub-chunk whose
//! visible faces depend on the edited cell, including sub-chunks of neighbouring regions
//! when the cell lies on a region edge.
//!
//! ## Performance Considerations
//!
//! - Region lookup is O(1) using a hash map behind a read-write lock
//! - Reads of non-resident regions return air instead of blocking on I/O

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::{Point3, Vector2};
use log::{debug, warn};

use super::block::Block;
use super::chunk::sub_chunk::{DrawableSubChunk, SubChunk, SubChunkState};
use super::chunk::{
    split_block_position, Chunk, ChunkCoords, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH,
    NUM_SUB_CHUNKS, SUB_CHUNK_HEIGHT,
};
use crate::core::MtResource;
use crate::engine_state::task_management::{queue::TaskQueue, task::Task};

/// Converts a world-space position to the block containing it.
///
/// # Panics
/// Panics if a coordinate is not finite or does not fit an `i32` block coordinate.
/// Callers are expected to clamp positions before they reach the world.
pub fn to_block_position(world_position: Point3<f32>) -> Point3<i32> {
    let to_block = |value: f32| -> i32 {
        assert!(
            value.is_finite() && value >= i32::MIN as f32 && value < i32::MAX as f32,
            "world coordinate {} is outside the representable block range",
            value
        );
        value.floor() as i32
    };
    Point3::new(
        to_block(world_position.x),
        to_block(world_position.y),
        to_block(world_position.z),
    )
}

/// Region coordinates containing a world-space position.
pub fn to_chunk_coords(world_position: Point3<f32>) -> ChunkCoords {
    split_block_position(to_block_position(world_position)).0
}

/// The region directory.
pub struct World {
    chunks: MtResource<HashMap<ChunkCoords, Arc<Chunk>>>,
    queue: Arc<TaskQueue>,
}

impl World {
    pub fn new(queue: Arc<TaskQueue>) -> Self {
        World {
            chunks: MtResource::new(HashMap::new()),
            queue,
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn get_chunk(&self, coords: ChunkCoords) -> Option<Arc<Chunk>> {
        self.chunks.get().get(&coords).cloned()
    }

    pub fn contains_chunk(&self, coords: ChunkCoords) -> bool {
        self.chunks.get().contains_key(&coords)
    }

    /// Inserts a placeholder for `coords`.
    ///
    /// # Returns
    /// The new region, or `None` if the directory already had one.
    pub fn insert_placeholder(&self, coords: ChunkCoords) -> Option<Arc<Chunk>> {
        let mut chunks = self.chunks.get_mut();
        if chunks.contains_key(&coords) {
            return None;
        }
        let chunk = Arc::new(Chunk::new(coords));
        chunks.insert(coords, chunk.clone());
        Some(chunk)
    }

    pub fn remove_chunk(&self, coords: ChunkCoords) -> Option<Arc<Chunk>> {
        self.chunks.get_mut().remove(&coords)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.get().len()
    }

    pub fn loaded_chunk_coords(&self) -> Vec<ChunkCoords> {
        self.chunks.get().keys().copied().collect()
    }

    /// Snapshot of every region in the directory.
    pub fn chunks(&self) -> Vec<Arc<Chunk>> {
        self.chunks.get().values().cloned().collect()
    }

    /// Queues a task against a region in the directory, tracking it as pending.
    ///
    /// # Returns
    /// `false` if the region is not in the directory or the queue is closed.
    pub fn enqueue(&self, task: Task) -> bool {
        let Some(chunk) = self.get_chunk(task.chunk_coords) else {
            debug!("Dropping {:?} task for unknown chunk {:?}", task.kind, task.chunk_coords);
            return false;
        };

        chunk.task_enqueued();
        if self.queue.enqueue(task) {
            true
        } else {
            chunk.task_finished();
            false
        }
    }

    /// Marks one task against `coords` as done. Called by workers after each handler.
    pub fn task_finished(&self, coords: ChunkCoords) {
        if let Some(chunk) = self.get_chunk(coords) {
            chunk.task_finished();
        }
    }

    /// Requests a region: inserts a placeholder and queues `CreateRegion`.
    ///
    /// A region that is already in the directory is left alone, apart from cancelling
    /// a pending unload since the viewpoint came back for it.
    pub fn queue_create_chunk(&self, coords: ChunkCoords) -> bool {
        match self.insert_placeholder(coords) {
            Some(_) => self.enqueue(Task::create_region(coords)),
            None => {
                if let Some(chunk) = self.get_chunk(coords) {
                    chunk.cancel_unload();
                }
                false
            }
        }
    }

    /// Queues an asynchronous save of a resident region, unless one is already queued.
    pub fn queue_save_chunk(&self, coords: ChunkCoords) -> bool {
        match self.get_chunk(coords) {
            Some(chunk) if chunk.is_loaded() && chunk.try_queue_save() => {
                self.enqueue(Task::save_region(coords))
            }
            _ => false,
        }
    }

    /// Queues a relight of a region, unless one is already queued.
    pub fn queue_recalculate_lighting(&self, coords: ChunkCoords, block_position: Point3<i32>) -> bool {
        match self.get_chunk(coords) {
            Some(chunk) if chunk.try_queue_lighting() => {
                self.enqueue(Task::recalculate_lighting(coords, block_position))
            }
            _ => false,
        }
    }

    /// Requests retesselation of every sub-chunk of a region.
    ///
    /// # Returns
    /// The number of tesselation tasks queued.
    pub fn queue_retesselate_chunk(&self, coords: ChunkCoords) -> usize {
        (0..NUM_SUB_CHUNKS as u8)
            .filter(|level| self.request_retesselation(coords, *level))
            .count()
    }

    /// Requests a new mesh for one sub-chunk after a block it depends on changed. Safe to
    /// call from any thread.
    ///
    /// - `Uploaded`: moves to `RetesselateVertices` and queues a `Tesselate` task
    /// - a mesh is being built or awaits upload: flags the sub-chunk so the upload gate
    ///   requests another pass once the current mesh lands
    /// - anything earlier: nothing to do, the pending mesh will read the new block
    ///
    /// # Returns
    /// `true` if a task was queued.
    pub fn request_retesselation(&self, coords: ChunkCoords, level: u8) -> bool {
        let Some(chunk) = self.get_chunk(coords) else {
            return false;
        };
        let sub_chunk = chunk.sub_chunk(level);
        let state = sub_chunk.state();

        if state == SubChunkState::Uploaded {
            return self.start_retesselation(coords, level, sub_chunk);
        }
        if state.will_observe_edits() {
            return false;
        }

        sub_chunk.mark_needs_retesselation();
        // the gate may have published the mesh between the state read and the mark
        if sub_chunk.state() == SubChunkState::Uploaded && sub_chunk.take_needs_retesselation() {
            return self.start_retesselation(coords, level, sub_chunk);
        }
        false
    }

    fn start_retesselation(&self, coords: ChunkCoords, level: u8, sub_chunk: &SubChunk) -> bool {
        sub_chunk.try_advance(SubChunkState::Uploaded, SubChunkState::RetesselateVertices)
            && self.enqueue(Task::tesselate(coords, level))
    }

    /// Reads the block at a world position.
    ///
    /// Returns `Block::AIR` when the owning region is not resident or the position is
    /// above or below the world, so gameplay never waits on streaming.
    pub fn get_block(&self, world_position: Point3<f32>) -> Block {
        let (coords, local) = split_block_position(to_block_position(world_position));
        self.get_chunk(coords)
            .map(|chunk| chunk.get_block(local))
            .unwrap_or(Block::AIR)
    }

    /// Writes the block at a world position and schedules relighting and retesselation.
    ///
    /// # Returns
    /// `false` if the write was rejected because the owning region is not resident or
    /// the position is above or below the world.
    pub fn set_block(&self, world_position: Point3<f32>, block: Block) -> bool {
        let position = to_block_position(world_position);
        let (coords, local) = split_block_position(position);

        if !(0..CHUNK_HEIGHT).contains(&local.y) {
            warn!(
                "Ignoring block write at {:?}: y is outside the world column 0..{}",
                position, CHUNK_HEIGHT
            );
            return false;
        }
        let Some(chunk) = self.get_chunk(coords) else {
            warn!("Ignoring block write at {:?}: chunk {:?} is not loaded", position, coords);
            return false;
        };
        let Some(previous) = chunk.set_block(local, block) else {
            warn!("Ignoring block write at {:?}: chunk {:?} has no block data", position, coords);
            return false;
        };
        if previous == block {
            return true;
        }

        chunk.push_dirty_light_position(position);
        self.queue_recalculate_lighting(coords, position);
        for (dependent_coords, level) in Self::dependent_sub_chunks(coords, local) {
            self.request_retesselation(dependent_coords, level);
        }
        true
    }

    /// Removes the block at a world position (writes air).
    pub fn remove_block(&self, world_position: Point3<f32>) -> bool {
        self.set_block(world_position, Block::AIR)
    }

    /// Sub-chunks whose visible faces depend on the cell at `local` in region `coords`.
    pub fn dependent_sub_chunks(coords: ChunkCoords, local: Point3<i32>) -> Vec<(ChunkCoords, u8)> {
        debug_assert!((0..CHUNK_HEIGHT).contains(&local.y));
        let level = (local.y / SUB_CHUNK_HEIGHT) as u8;
        let height_in_level = local.y % SUB_CHUNK_HEIGHT;
        let mut dependents = vec![(coords, level)];

        if height_in_level == 0 && level > 0 {
            dependents.push((coords, level - 1));
        }
        if height_in_level == SUB_CHUNK_HEIGHT - 1 && (level as usize) < NUM_SUB_CHUNKS - 1 {
            dependents.push((coords, level + 1));
        }
        if local.x == 0 {
            dependents.push((coords + Vector2::new(-1, 0), level));
        }
        if local.x == CHUNK_WIDTH - 1 {
            dependents.push((coords + Vector2::new(1, 0), level));
        }
        if local.z == 0 {
            dependents.push((coords + Vector2::new(0, -1), level));
        }
        if local.z == CHUNK_DEPTH - 1 {
            dependents.push((coords + Vector2::new(0, 1), level));
        }

        dependents
    }

    /// Every sub-chunk with a mesh the render side may draw.
    ///
    /// Includes sub-chunks being retesselated (they keep their previous mesh until the
    /// new one is uploaded) and empty meshes with a vertex count of 0.
    pub fn drawable_sub_chunks(&self) -> Vec<DrawableSubChunk> {
        self.chunks()
            .iter()
            .flat_map(|chunk| {
                chunk
                    .sub_chunks()
                    .iter()
                    .filter_map(|sub_chunk| sub_chunk.drawable())
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::task_management::task::TaskKind;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::chunk::sub_chunk::test_support::advance_to_uploaded;
    use crate::engine_state::voxels::chunk::CHUNK_SIZE;

    fn world() -> World {
        World::new(Arc::new(TaskQueue::new()))
    }

    fn add_uploaded_chunk(world: &World, coords: ChunkCoords) -> Arc<Chunk> {
        let chunk = world.insert_placeholder(coords).unwrap();
        chunk.install_blocks(vec![Block::AIR; CHUNK_SIZE].into_boxed_slice());
        for sub_chunk in chunk.sub_chunks() {
            advance_to_uploaded(sub_chunk);
        }
        chunk
    }

    fn queued_tesselations(world: &World) -> Vec<(ChunkCoords, u8)> {
        let mut tasks: Vec<_> = world
            .queue()
            .snapshot()
            .into_iter()
            .filter(|task| task.kind == TaskKind::Tesselate)
            .map(|task| (task.chunk_coords, task.level))
            .collect();
        tasks.sort_by_key(|(coords, level)| (coords.x, coords.y, *level));
        tasks
    }

    #[test]
    fn test_world_position_to_chunk_coords() {
        assert_eq!(to_chunk_coords(Point3::new(0.5, 10.0, 15.9)), Vector2::new(0, 0));
        assert_eq!(to_chunk_coords(Point3::new(-0.1, 10.0, 16.0)), Vector2::new(-1, 1));
    }

    #[test]
    #[should_panic(expected = "outside the representable block range")]
    fn test_non_finite_position_is_fatal() {
        to_block_position(Point3::new(f32::NAN, 0.0, 0.0));
    }

    #[test]
    fn test_get_block_of_missing_chunk_is_air() {
        let world = world();
        assert_eq!(world.get_block(Point3::new(100.0, 5.0, 100.0)), Block::AIR);
        world.insert_placeholder(Vector2::new(6, 6));
        assert_eq!(world.get_block(Point3::new(100.0, 5.0, 100.0)), Block::AIR);
    }

    #[test]
    fn test_set_block_then_get_block() {
        let world = world();
        add_uploaded_chunk(&world, Vector2::new(0, 0));
        let position = Point3::new(3.2, 40.7, 9.9);
        let stone = Block::new(BlockType::STONE);

        assert!(world.set_block(position, stone));
        assert_eq!(world.get_block(position), stone);
        assert_eq!(world.get_block(Point3::new(3.0, 40.0, 9.0)), stone);

        assert!(world.remove_block(position));
        assert_eq!(world.get_block(position), Block::AIR);
    }

    #[test]
    fn test_set_block_on_missing_chunk_is_rejected() {
        let world = world();
        assert!(!world.set_block(Point3::new(1.0, 1.0, 1.0), Block::new(BlockType::DIRT)));
        assert!(world.queue().is_empty());
    }

    #[test]
    fn test_set_block_outside_column_is_rejected() {
        let world = world();
        let chunk = add_uploaded_chunk(&world, Vector2::new(0, 0));

        assert!(!world.set_block(Point3::new(1.0, 256.0, 1.0), Block::new(BlockType::DIRT)));
        assert!(!world.set_block(Point3::new(1.0, -1.0, 1.0), Block::new(BlockType::DIRT)));
        assert!(world.queue().is_empty());
        assert!(chunk.take_dirty_light_positions().is_empty());
        assert_eq!(world.get_block(Point3::new(1.0, 256.0, 1.0)), Block::AIR);
    }

    #[test]
    fn test_save_requests_are_deduplicated() {
        let world = world();
        world.insert_placeholder(Vector2::new(0, 0));
        // no block data yet, nothing to save
        assert!(!world.queue_save_chunk(Vector2::new(0, 0)));

        let chunk = add_uploaded_chunk(&world, Vector2::new(1, 0));
        assert!(world.queue_save_chunk(Vector2::new(1, 0)));
        assert!(!world.queue_save_chunk(Vector2::new(1, 0)));
        assert_eq!(world.queue().len(), 1);
        assert_eq!(chunk.pending_tasks(), 1);

        chunk.clear_save_queued();
        assert!(world.queue_save_chunk(Vector2::new(1, 0)));
        assert!(!world.queue_save_chunk(Vector2::new(9, 9)));
    }

    #[test]
    fn test_retesselate_chunk_queues_every_uploaded_level_once() {
        let world = world();
        let chunk = add_uploaded_chunk(&world, Vector2::new(3, -2));

        assert_eq!(world.queue_retesselate_chunk(Vector2::new(3, -2)), NUM_SUB_CHUNKS);
        assert_eq!(world.queue_retesselate_chunk(Vector2::new(3, -2)), 0);
        assert_eq!(queued_tesselations(&world).len(), NUM_SUB_CHUNKS);
        assert!(chunk
            .sub_chunks()
            .iter()
            .all(|sub_chunk| sub_chunk.state() == SubChunkState::RetesselateVertices));

        assert_eq!(world.queue_retesselate_chunk(Vector2::new(7, 7)), 0);
    }

    #[test]
    fn test_interior_edit_retesselates_only_owner() {
        let world = world();
        add_uploaded_chunk(&world, Vector2::new(0, 0));
        add_uploaded_chunk(&world, Vector2::new(-1, 0));

        world.set_block(Point3::new(5.0, 20.0, 5.0), Block::new(BlockType::STONE));
        assert_eq!(queued_tesselations(&world), vec![(Vector2::new(0, 0), 1)]);
    }

    #[test]
    fn test_region_edge_edit_retesselates_both_regions() {
        let world = world();
        add_uploaded_chunk(&world, Vector2::new(0, 0));
        add_uploaded_chunk(&world, Vector2::new(-1, 0));

        world.set_block(Point3::new(0.0, 5.0, 3.0), Block::new(BlockType::STONE));

        assert_eq!(
            queued_tesselations(&world),
            vec![(Vector2::new(-1, 0), 0), (Vector2::new(0, 0), 0)]
        );
        let lighting: Vec<_> = world
            .queue()
            .snapshot()
            .into_iter()
            .filter(|task| task.kind == TaskKind::RecalculateLighting)
            .collect();
        assert_eq!(lighting.len(), 1);
        assert_eq!(lighting[0].block_position, Some(Point3::new(0, 5, 3)));
    }

    #[test]
    fn test_sub_chunk_boundary_edit_retesselates_level_below() {
        let world = world();
        add_uploaded_chunk(&world, Vector2::new(0, 0));

        world.set_block(Point3::new(5.0, 32.0, 5.0), Block::new(BlockType::STONE));
        assert_eq!(
            queued_tesselations(&world),
            vec![(Vector2::new(0, 0), 1), (Vector2::new(0, 0), 2)]
        );
    }

    #[test]
    fn test_repeated_requests_do_not_grow_queue() {
        let world = world();
        let chunk = add_uploaded_chunk(&world, Vector2::new(2, 2));

        assert!(world.request_retesselation(Vector2::new(2, 2), 4));
        assert!(!world.request_retesselation(Vector2::new(2, 2), 4));
        assert!(!world.request_retesselation(Vector2::new(2, 2), 4));
        assert_eq!(world.queue().len(), 1);
        assert_eq!(chunk.sub_chunk(4).state(), SubChunkState::RetesselateVertices);
        assert_eq!(chunk.pending_tasks(), 1);

        for _ in 0..5 {
            world.set_block(Point3::new(34.0, 70.0, 40.0), Block::new(BlockType::DIRT));
            world.set_block(Point3::new(34.0, 70.0, 40.0), Block::new(BlockType::SAND));
        }
        // one relight plus one tesselation for level 4
        assert_eq!(world.queue().len(), 2);
    }

    #[test]
    fn test_edit_during_tesselation_sets_flag_instead_of_queueing() {
        let world = world();
        let chunk = world.insert_placeholder(Vector2::new(0, 0)).unwrap();
        chunk.install_blocks(vec![Block::AIR; CHUNK_SIZE].into_boxed_slice());
        let sub_chunk = chunk.sub_chunk(0);
        for (from, to) in [
            (SubChunkState::Unloaded, SubChunkState::LoadBlockData),
            (SubChunkState::LoadBlockData, SubChunkState::LoadingBlockData),
            (SubChunkState::LoadingBlockData, SubChunkState::TesselateVertices),
            (SubChunkState::TesselateVertices, SubChunkState::TesselatingVertices),
        ] {
            sub_chunk.advance_owned(from, to);
        }

        assert!(!world.request_retesselation(Vector2::new(0, 0), 0));
        assert!(world.queue().is_empty());
        assert!(sub_chunk.take_needs_retesselation());
    }

    #[test]
    fn test_create_is_deduplicated_and_cancels_unload() {
        let world = world();
        assert!(world.queue_create_chunk(Vector2::new(1, 1)));
        assert!(!world.queue_create_chunk(Vector2::new(1, 1)));
        assert_eq!(world.queue().len(), 1);

        let chunk = world.get_chunk(Vector2::new(1, 1)).unwrap();
        chunk.request_unload();
        world.queue_create_chunk(Vector2::new(1, 1));
        assert!(!chunk.unload_requested());
    }

    #[test]
    fn test_dependent_sub_chunks_at_corner() {
        let dependents = World::dependent_sub_chunks(Vector2::new(0, 0), Point3::new(15, 255, 0));
        assert_eq!(
            dependents,
            vec![
                (Vector2::new(0, 0), 15),
                (Vector2::new(1, 0), 15),
                (Vector2::new(0, -1), 15),
            ]
        );
    }
}
