//! # Block Module
//!
//! This module provides the block data structure stored in every region's block array,
//! together with block type definitions and block face handling.

use block_type::{BlockType, NUM_BLOCK_TYPES};

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block ids in memory and on disk.
pub type BlockId = u16;

/// Maps each block type to its texture index for each face.
///
/// The outer array is indexed by `BlockType` as a `usize`.
/// The inner array contains 6 texture indices, one for each face in the order:
/// [Front, Back, Bottom, Top, Left, Right]
pub static BLOCK_TYPE_TO_TEXTURE_INDICES: [[u16; 6]; NUM_BLOCK_TYPES] = [
    [0, 0, 0, 0, 0, 0],       // AIR (never meshed)
    [1, 1, 1, 1, 1, 1],       // STONE
    [2, 2, 2, 2, 2, 2],       // DIRT
    [3, 3, 2, 4, 3, 3],       // GRASS (top: 4, bottom: 2, sides: 3)
    [5, 5, 6, 6, 5, 5],       // WOOD (rings on top and bottom)
    [7, 7, 7, 7, 7, 7],       // LEAVES
    [8, 8, 8, 8, 8, 8],       // SAND
    [9, 9, 9, 9, 9, 9],       // GLASS
    [10, 10, 10, 10, 10, 10], // WATER
    [11, 11, 11, 11, 11, 11], // GLOWSTONE
];

/// Block flag: faces of neighbouring blocks stay visible through this block.
pub const TRANSPARENT: u8 = 0b0000_0001;
/// Block flag: this block emits light and edits to it must trigger a relight.
pub const LIGHT_SOURCE: u8 = 0b0000_0010;

/// Represents a single voxel block in the world.
///
/// # Memory Layout
/// The `#[repr(C)]` attribute together with `Pod` lets a whole block array be viewed
/// as bytes, which is what the region save format stores. The all-zero block is air.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq, Eq, Default)]
pub struct Block {
    /// The type of this block, a `BlockType` discriminant.
    pub id: BlockId,
    /// Bit set of `TRANSPARENT` and `LIGHT_SOURCE`.
    pub flags: u8,
    /// Light level `0..=15`, written by the lighting collaborator.
    pub light: u8,
}

impl Block {
    /// The air block, also returned as a sentinel for cells of non-resident regions.
    pub const AIR: Block = Block {
        id: BlockType::AIR as BlockId,
        flags: 0,
        light: 0,
    };

    /// Creates a new block of the specified type with its default flags.
    pub fn new(block_type: BlockType) -> Self {
        let mut flags = 0;
        if block_type.is_transparent() {
            flags |= TRANSPARENT;
        }
        let emission = block_type.light_emission();
        if emission > 0 {
            flags |= LIGHT_SOURCE;
        }

        Block {
            id: block_type as BlockId,
            flags,
            light: emission,
        }
    }

    pub fn is_air(&self) -> bool {
        self.id == BlockType::AIR as BlockId
    }

    pub fn is_transparent(&self) -> bool {
        self.is_air() || self.flags & TRANSPARENT != 0
    }

    pub fn is_light_source(&self) -> bool {
        self.flags & LIGHT_SOURCE != 0
    }

    /// Whether the face of `self` that looks at `neighbour` has to be drawn.
    ///
    /// Air is never drawn. A face is visible when the neighbour is air, or when the
    /// neighbour is transparent and of a different type (so a body of water or a wall
    /// of glass only shows its outer hull).
    pub fn face_visible_against(&self, neighbour: &Block) -> bool {
        if self.is_air() {
            return false;
        }
        neighbour.is_air() || (neighbour.is_transparent() && neighbour.id != self.id)
    }

    /// Gets the texture index of one face of this block.
    ///
    /// Unknown ids fall back to texture 0 rather than failing the whole mesh.
    pub fn texture_index(&self, side: block_side::BlockSide) -> u16 {
        BLOCK_TYPE_TO_TEXTURE_INDICES
            .get(self.id as usize)
            .map(|indices| indices[side as usize])
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::block_side::BlockSide;
    use super::*;

    #[test]
    fn test_zeroed_block_is_air() {
        let zeroed: Block = bytemuck::Zeroable::zeroed();
        assert_eq!(zeroed, Block::AIR);
        assert!(zeroed.is_air());
        assert!(zeroed.is_transparent());
    }

    #[test]
    fn test_flags_follow_type() {
        let glass = Block::new(BlockType::GLASS);
        assert!(glass.is_transparent());
        assert!(!glass.is_light_source());

        let glowstone = Block::new(BlockType::GLOWSTONE);
        assert!(glowstone.is_light_source());
        assert_eq!(glowstone.light, 15);
        assert!(!glowstone.is_transparent());
    }

    #[test]
    fn test_face_visibility() {
        let stone = Block::new(BlockType::STONE);
        let glass = Block::new(BlockType::GLASS);

        assert!(stone.face_visible_against(&Block::AIR));
        assert!(stone.face_visible_against(&glass));
        assert!(!stone.face_visible_against(&stone));
        assert!(!glass.face_visible_against(&glass));
        assert!(!Block::AIR.face_visible_against(&Block::AIR));
    }

    #[test]
    fn test_grass_texture_per_side() {
        let grass = Block::new(BlockType::GRASS);
        assert_eq!(grass.texture_index(BlockSide::TOP), 4);
        assert_eq!(grass.texture_index(BlockSide::BOTTOM), 2);
        assert_eq!(grass.texture_index(BlockSide::FRONT), 3);
        let unknown = Block { id: 999, flags: 0, light: 0 };
        assert_eq!(unknown.texture_index(BlockSide::TOP), 0);
    }
}
