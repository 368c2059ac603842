//! # Block Type Module
//!
//! This module defines the different types of blocks in the voxel world and the
//! static properties the streaming pipeline needs from them: transparency (for face
//! culling) and light emission (for flagging relight work).

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::BlockId;

/// Enumerates all block types known to the engine.
///
/// The discriminant is the on-disk and in-memory block id, so variants must only ever
/// be appended to keep existing saves readable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u16)]
pub enum BlockType {
    /// Empty space. Never meshed.
    AIR = 0,
    STONE,
    DIRT,
    /// Grass on top, dirt on the bottom, grass-on-dirt on the sides.
    GRASS,
    WOOD,
    /// See-through foliage.
    LEAVES,
    SAND,
    GLASS,
    WATER,
    /// Fully lit emissive block.
    GLOWSTONE,
}

/// Number of `BlockType` variants, used to size lookup tables.
pub const NUM_BLOCK_TYPES: usize = 10;

impl BlockType {
    /// Converts a raw block id back to its type.
    ///
    /// # Returns
    /// `None` for ids that do not correspond to a known block type, which can only happen
    /// with data written by a newer version of the engine.
    pub fn from_id(id: BlockId) -> Option<Self> {
        FromPrimitive::from_u16(id)
    }

    /// Whether neighbouring faces stay visible through this block.
    pub fn is_transparent(self) -> bool {
        matches!(
            self,
            BlockType::AIR | BlockType::LEAVES | BlockType::GLASS | BlockType::WATER
        )
    }

    /// Light level emitted by this block, in the range `0..=15`.
    pub fn light_emission(self) -> u8 {
        match self {
            BlockType::GLOWSTONE => 15,
            _ => 0,
        }
    }

    /// Picks a random solid, opaque block type.
    pub fn get_random_solid_type() -> Self {
        match fastrand::u8(0..4) {
            0 => BlockType::STONE,
            1 => BlockType::DIRT,
            2 => BlockType::SAND,
            _ => BlockType::WOOD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip_through_from_id() {
        for id in 0..NUM_BLOCK_TYPES as BlockId {
            let block_type = BlockType::from_id(id).expect("every id below the count is valid");
            assert_eq!(block_type as BlockId, id);
        }
        assert_eq!(BlockType::from_id(NUM_BLOCK_TYPES as BlockId), None);
    }

    #[test]
    fn test_transparency() {
        assert!(BlockType::AIR.is_transparent());
        assert!(BlockType::GLASS.is_transparent());
        assert!(!BlockType::STONE.is_transparent());
        assert!(!BlockType::get_random_solid_type().is_transparent());
    }
}
