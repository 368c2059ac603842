//! Mesh generation for sub-chunks.
//!
//! Meshing a sub-chunk happens in two steps:
//! 1. `Neighbourhood::capture` copies the sub-chunk's blocks plus a one-block border out of
//!    the world, so face culling can look across sub-chunk and region boundaries without
//!    holding any lock during the merge
//! 2. `tesselate` runs greedy meshing over the snapshot and writes the packed vertices
//!    into a pooled buffer
//!
//! Border cells of regions that are not resident read as air, so a sub-chunk next to an
//! unloaded region shows its boundary faces until that region loads.

mod mesh;

pub use mesh::*;

use web_time::Instant;

use crate::engine_state::{
    rendering::sub_chunk_pool::VertexBuffer,
    voxels::{
        block::Block,
        chunk::{block_index, Chunk, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, SUB_CHUNK_HEIGHT},
        world::World,
    },
};

/// Cells per axis of a padded snapshot: the 16 cells of a sub-chunk plus one on each side.
pub const PADDED_SIZE: usize = SUB_CHUNK_HEIGHT as usize + 2;
const PADDED_VOLUME: usize = PADDED_SIZE * PADDED_SIZE * PADDED_SIZE;

/// A sub-chunk's blocks with a one-block border, indexed by sub-chunk local coordinates in
/// `-1..=16` on every axis.
pub struct Neighbourhood {
    level: u8,
    blocks: Box<[Block]>,
}

impl Neighbourhood {
    fn index(x: i32, y: i32, z: i32) -> usize {
        debug_assert!([x, y, z].iter().all(|value| (-1..=16).contains(value)));
        (x + 1) as usize + (z + 1) as usize * PADDED_SIZE + (y + 1) as usize * PADDED_SIZE * PADDED_SIZE
    }

    /// Copies the blocks the mesh of `chunk`'s sub-chunk `level` depends on.
    ///
    /// # Returns
    /// `None` if `chunk` has no block data yet.
    pub fn capture(world: &World, chunk: &Chunk, level: u8) -> Option<Self> {
        let mut blocks = vec![Block::AIR; PADDED_VOLUME].into_boxed_slice();
        let base_y = level as i32 * SUB_CHUNK_HEIGHT;
        let heights = (-1..=SUB_CHUNK_HEIGHT).filter(|y| (0..CHUNK_HEIGHT).contains(&(base_y + y)));

        {
            let guard = chunk.read_blocks();
            let own = guard.as_ref()?;
            for y in heights.clone() {
                for z in 0..CHUNK_DEPTH {
                    for x in 0..CHUNK_WIDTH {
                        blocks[Self::index(x, y, z)] =
                            own[block_index(x as usize, (base_y + y) as usize, z as usize)];
                    }
                }
            }
        }

        // (region offset, border cell in this snapshot, source cell in the neighbour) per
        // position `t` along the shared edge
        let borders: [(i32, i32, fn(i32) -> (i32, i32), fn(i32) -> (i32, i32)); 4] = [
            (-1, 0, |t| (-1, t), |t| (CHUNK_WIDTH - 1, t)),
            (1, 0, |t| (CHUNK_WIDTH, t), |t| (0, t)),
            (0, -1, |t| (t, -1), |t| (t, CHUNK_DEPTH - 1)),
            (0, 1, |t| (t, CHUNK_DEPTH), |t| (t, 0)),
        ];
        for (dx, dz, border_cell, source_cell) in borders {
            let Some(neighbour) = world.get_chunk(chunk.coords + cgmath::Vector2::new(dx, dz)) else {
                continue;
            };
            let guard = neighbour.read_blocks();
            let Some(neighbour_blocks) = guard.as_ref() else {
                continue;
            };
            for y in heights.clone() {
                for t in 0..CHUNK_WIDTH {
                    let (x, z) = border_cell(t);
                    let (source_x, source_z) = source_cell(t);
                    blocks[Self::index(x, y, z)] = neighbour_blocks
                        [block_index(source_x as usize, (base_y + y) as usize, source_z as usize)];
                }
            }
        }

        Some(Neighbourhood { level, blocks })
    }

    /// Builds a snapshot from a function of local coordinates.
    #[cfg(test)]
    pub(crate) fn from_fn(level: u8, block_at: impl Fn(i32, i32, i32) -> Block) -> Self {
        let mut blocks = vec![Block::AIR; PADDED_VOLUME].into_boxed_slice();
        for y in -1..=16 {
            for z in -1..=16 {
                for x in -1..=16 {
                    blocks[Self::index(x, y, z)] = block_at(x, y, z);
                }
            }
        }
        Neighbourhood { level, blocks }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn get(&self, x: i32, y: i32, z: i32) -> Block {
        self.blocks[Self::index(x, y, z)]
    }
}

/// Meshes a sub-chunk snapshot into `buffer`.
///
/// # Returns
/// The number of vertices written.
pub fn tesselate(neighbourhood: &Neighbourhood, buffer: &mut VertexBuffer) -> u32 {
    let start = Instant::now();
    buffer.clear();

    let faces = greedy_faces(neighbourhood);
    for face in &faces {
        face.push_vertices(buffer);
    }

    log::trace!(
        "Meshed sub-chunk level {} into {} quads in {:?}",
        neighbourhood.level(),
        faces.len(),
        start.elapsed()
    );
    buffer.len() as u32
}
