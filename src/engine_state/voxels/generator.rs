//! # Terrain Generation
//!
//! The streaming pipeline treats terrain generation as a black box: given a region's
//! coordinates and the world seed it returns a full block array. Generation runs on a
//! worker thread inside the region's load task, so implementations must be `Send + Sync`
//! and must not touch the world directory.
//!
//! Two generators ship with the crate:
//! - `PerlinTerrain`: a heightmap with carved caves, used by the demo binary
//! - `FlatTerrain`: a fixed-height slab, useful for tests and benchmarks

use noise::{NoiseFn, Perlin};

use super::block::{block_type::BlockType, Block};
use super::chunk::{
    block_index, ChunkCoords, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_SIZE, CHUNK_WIDTH,
};

/// Fills the block data of one region.
pub trait TerrainGenerator: Send + Sync {
    /// Returns exactly `CHUNK_SIZE` blocks laid out as `chunk::block_index` describes.
    fn fill_block_data(&self, coords: ChunkCoords, seed: u32) -> Box<[Block]>;
}

/// Scaling factor applied to world coordinates when sampling the height noise.
pub const HEIGHT_SCALE_FACTOR: f64 = 0.01;
/// Scaling factor applied to world coordinates when sampling the cave noise.
pub const CAVE_SCALE_FACTOR: f64 = 0.05;
/// Cave noise above this threshold is carved out.
pub const CAVE_THRESHOLD: f64 = 0.55;
/// Caves are never carved this close to bedrock.
pub const CAVE_FLOOR: i32 = 4;

/// Heightmap terrain from 2D Perlin noise, with 3D Perlin caves.
pub struct PerlinTerrain {
    /// Average surface height in blocks.
    pub base_height: i32,
    /// Maximum deviation from `base_height` in blocks.
    pub amplitude: f64,
}

impl Default for PerlinTerrain {
    fn default() -> Self {
        PerlinTerrain {
            base_height: 64,
            amplitude: 24.0,
        }
    }
}

impl PerlinTerrain {
    fn surface_height(&self, perlin: &Perlin, world_x: i32, world_z: i32) -> i32 {
        let sample = perlin.get([
            world_x as f64 * HEIGHT_SCALE_FACTOR,
            world_z as f64 * HEIGHT_SCALE_FACTOR,
        ]);
        let height = self.base_height as f64 + sample * self.amplitude;
        (height as i32).clamp(1, CHUNK_HEIGHT - 1)
    }

    fn is_cave(perlin: &Perlin, world_x: i32, y: i32, world_z: i32) -> bool {
        y > CAVE_FLOOR
            && perlin.get([
                world_x as f64 * CAVE_SCALE_FACTOR,
                y as f64 * CAVE_SCALE_FACTOR,
                world_z as f64 * CAVE_SCALE_FACTOR,
            ]) > CAVE_THRESHOLD
    }
}

impl TerrainGenerator for PerlinTerrain {
    fn fill_block_data(&self, coords: ChunkCoords, seed: u32) -> Box<[Block]> {
        let height_noise = Perlin::new(seed);
        let cave_noise = Perlin::new(seed.wrapping_add(1));
        let mut blocks = vec![Block::AIR; CHUNK_SIZE];

        for z in 0..CHUNK_DEPTH {
            for x in 0..CHUNK_WIDTH {
                let world_x = coords.x * CHUNK_WIDTH + x;
                let world_z = coords.y * CHUNK_DEPTH + z;
                let surface = self.surface_height(&height_noise, world_x, world_z);

                for y in 0..surface {
                    if Self::is_cave(&cave_noise, world_x, y, world_z) {
                        continue;
                    }
                    let block_type = if y == surface - 1 {
                        BlockType::GRASS
                    } else if y >= surface - 4 {
                        BlockType::DIRT
                    } else {
                        BlockType::STONE
                    };
                    blocks[block_index(x as usize, y as usize, z as usize)] =
                        Block::new(block_type);
                }
            }
        }

        blocks.into_boxed_slice()
    }
}

/// Every column filled with `block_type` up to (not including) `height`.
pub struct FlatTerrain {
    pub height: i32,
    pub block_type: BlockType,
}

impl TerrainGenerator for FlatTerrain {
    fn fill_block_data(&self, _coords: ChunkCoords, _seed: u32) -> Box<[Block]> {
        let mut blocks = vec![Block::AIR; CHUNK_SIZE];
        let filled = self.height.clamp(0, CHUNK_HEIGHT) as usize * CHUNK_WIDTH as usize * CHUNK_DEPTH as usize;
        blocks[..filled].fill(Block::new(self.block_type));
        blocks.into_boxed_slice()
    }
}
