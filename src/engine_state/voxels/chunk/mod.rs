//! # Chunk Module
//!
//! This module provides the `Chunk` struct: a 16x256x16 column of blocks (a region), the
//! unit of loading, saving and unloading. Its block array is partitioned vertically into
//! 16 `SubChunk`s, the unit of meshing and upload.
//!
//! ## Block Store
//!
//! Blocks are stored densely, one `Block` per cell, indexed `x + z * 16 + y * 256`. The
//! array is `None` until the region's load task installs it, which is how a directory
//! entry represents "known but not resident".
//!
//! ## Concurrency
//!
//! - The block array sits behind a `RwLock`: workers snapshot it under read locks, the
//!   load task and the gameplay `set_block` path take short write locks.
//! - Region-level task bookkeeping (pending task count, duplicate suppression flags) is
//!   atomic so it can be checked from the main thread without locking.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use cgmath::{Point3, Vector2};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use super::block::Block;
use sub_chunk::{SubChunk, SubChunkState};

pub mod sub_chunk;

/// Region width along X, in blocks.
pub const CHUNK_WIDTH: i32 = 16;
/// Region depth along Z, in blocks.
pub const CHUNK_DEPTH: i32 = 16;
/// Region height along Y, in blocks.
pub const CHUNK_HEIGHT: i32 = 256;
/// Height of one sub-chunk, in blocks.
pub const SUB_CHUNK_HEIGHT: i32 = 16;
/// Number of sub-chunks stacked in a region.
pub const NUM_SUB_CHUNKS: usize = (CHUNK_HEIGHT / SUB_CHUNK_HEIGHT) as usize;
/// The number of blocks in one horizontal layer of a region.
pub const CHUNK_PLANE_SIZE: usize = (CHUNK_WIDTH * CHUNK_DEPTH) as usize;
/// The total number of blocks in a region.
pub const CHUNK_SIZE: usize = CHUNK_PLANE_SIZE * CHUNK_HEIGHT as usize;

/// Integer (x, z) coordinates of a region.
pub type ChunkCoords = Vector2<i32>;

/// Index of a local block position into a region's block array.
///
/// Callers guarantee `0 <= x < 16`, `0 <= y < 256`, `0 <= z < 16`.
#[inline]
pub fn block_index(x: usize, y: usize, z: usize) -> usize {
    x + z * CHUNK_WIDTH as usize + y * CHUNK_PLANE_SIZE
}

/// Splits a world block position into the owning region and the local position inside it.
pub fn split_block_position(position: Point3<i32>) -> (ChunkCoords, Point3<i32>) {
    let coords = Vector2::new(
        position.x.div_euclid(CHUNK_WIDTH),
        position.z.div_euclid(CHUNK_DEPTH),
    );
    let local = Point3::new(
        position.x.rem_euclid(CHUNK_WIDTH),
        position.y,
        position.z.rem_euclid(CHUNK_DEPTH),
    );
    (coords, local)
}

/// Squared distance between two regions, in region units.
pub fn chunk_distance_squared(a: ChunkCoords, b: ChunkCoords) -> i64 {
    let dx = a.x as i64 - b.x as i64;
    let dz = a.y as i64 - b.y as i64;
    dx * dx + dz * dz
}

/// Chebyshev distance between two regions, in region units.
pub fn chunk_distance_chebyshev(a: ChunkCoords, b: ChunkCoords) -> i64 {
    let dx = (a.x as i64 - b.x as i64).abs();
    let dz = (a.y as i64 - b.y as i64).abs();
    dx.max(dz)
}

/// A 16x256x16 column of blocks and its 16 sub-chunks.
#[derive(Debug)]
pub struct Chunk {
    /// The position of this chunk in chunk coordinates (not block coordinates).
    pub coords: ChunkCoords,
    blocks: RwLock<Option<Box<[Block]>>>,
    sub_chunks: Vec<SubChunk>,
    /// Tasks queued or running that target this region.
    pending_tasks: AtomicU32,
    lighting_queued: AtomicBool,
    save_queued: AtomicBool,
    unload_requested: AtomicBool,
    dirty_light_positions: Mutex<Vec<Point3<i32>>>,
}

impl Chunk {
    /// Creates a placeholder region with no block data and every sub-chunk `Unloaded`.
    pub fn new(coords: ChunkCoords) -> Self {
        Chunk {
            coords,
            blocks: RwLock::new(None),
            sub_chunks: (0..NUM_SUB_CHUNKS)
                .map(|level| SubChunk::new(coords, level as u8))
                .collect(),
            pending_tasks: AtomicU32::new(0),
            lighting_queued: AtomicBool::new(false),
            save_queued: AtomicBool::new(false),
            unload_requested: AtomicBool::new(false),
            dirty_light_positions: Mutex::new(Vec::new()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.blocks.read().is_some()
    }

    /// Installs the region's block array.
    ///
    /// # Panics
    /// Panics if `blocks` does not hold exactly `CHUNK_SIZE` cells.
    pub fn install_blocks(&self, blocks: Box<[Block]>) {
        assert_eq!(
            blocks.len(),
            CHUNK_SIZE,
            "block array for chunk {:?} has the wrong size",
            self.coords
        );
        *self.blocks.write() = Some(blocks);
    }

    /// Drops the block array, returning the region to placeholder form.
    pub fn release_blocks(&self) -> Option<Box<[Block]>> {
        self.blocks.write().take()
    }

    /// Read access to the whole block array, `None` while the region is not resident.
    pub fn read_blocks(&self) -> RwLockReadGuard<'_, Option<Box<[Block]>>> {
        self.blocks.read()
    }

    /// Reads one block by local position; air if the region is not resident or `y` is
    /// outside the column.
    pub fn get_block(&self, local: Point3<i32>) -> Block {
        if !Self::contains_local(local) {
            return Block::AIR;
        }
        let index = block_index(local.x as usize, local.y as usize, local.z as usize);
        self.blocks
            .read()
            .as_ref()
            .map(|blocks| blocks[index])
            .unwrap_or(Block::AIR)
    }

    /// Writes one block by local position.
    ///
    /// # Returns
    /// The block that was replaced, or `None` if the region is not resident or the
    /// position is outside the column.
    pub fn set_block(&self, local: Point3<i32>, block: Block) -> Option<Block> {
        if !Self::contains_local(local) {
            return None;
        }
        let index = block_index(local.x as usize, local.y as usize, local.z as usize);
        self.blocks
            .write()
            .as_mut()
            .map(|blocks| std::mem::replace(&mut blocks[index], block))
    }

    fn contains_local(local: Point3<i32>) -> bool {
        (0..CHUNK_WIDTH).contains(&local.x)
            && (0..CHUNK_HEIGHT).contains(&local.y)
            && (0..CHUNK_DEPTH).contains(&local.z)
    }

    pub fn sub_chunk(&self, level: u8) -> &SubChunk {
        &self.sub_chunks[level as usize]
    }

    pub fn sub_chunks(&self) -> &[SubChunk] {
        &self.sub_chunks
    }

    pub fn task_enqueued(&self) {
        self.pending_tasks.fetch_add(1, Ordering::AcqRel);
    }

    pub fn task_finished(&self) {
        self.pending_tasks.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn pending_tasks(&self) -> u32 {
        self.pending_tasks.load(Ordering::Acquire)
    }

    /// A region can be torn down once nothing is queued or running for it and every
    /// sub-chunk is parked in `Unloaded` or `Uploaded`.
    pub fn is_safe_to_unload(&self) -> bool {
        self.pending_tasks() == 0
            && self
                .sub_chunks
                .iter()
                .all(|sub_chunk| sub_chunk.state().is_stable())
    }

    /// Whether every sub-chunk has reached at least `state`.
    pub fn all_sub_chunks_at_least(&self, state: SubChunkState) -> bool {
        self.sub_chunks
            .iter()
            .all(|sub_chunk| sub_chunk.state() >= state)
    }

    /// Claims the single lighting slot. `false` if a relight is already queued.
    pub fn try_queue_lighting(&self) -> bool {
        !self.lighting_queued.swap(true, Ordering::AcqRel)
    }

    pub fn clear_lighting_queued(&self) {
        self.lighting_queued.store(false, Ordering::Release);
    }

    /// Claims the single save slot. `false` if a save is already queued.
    pub fn try_queue_save(&self) -> bool {
        !self.save_queued.swap(true, Ordering::AcqRel)
    }

    pub fn clear_save_queued(&self) {
        self.save_queued.store(false, Ordering::Release);
    }

    pub fn request_unload(&self) {
        self.unload_requested.store(true, Ordering::Release);
    }

    pub fn cancel_unload(&self) {
        self.unload_requested.store(false, Ordering::Release);
    }

    pub fn unload_requested(&self) -> bool {
        self.unload_requested.load(Ordering::Acquire)
    }

    pub fn push_dirty_light_position(&self, position: Point3<i32>) {
        self.dirty_light_positions.lock().push(position);
    }

    pub fn take_dirty_light_positions(&self) -> Vec<Point3<i32>> {
        std::mem::take(&mut *self.dirty_light_positions.lock())
    }
}
