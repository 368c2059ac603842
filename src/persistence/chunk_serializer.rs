//! Region blob format.
//!
//! A region file is a fixed-size bincode header followed by the block payload:
//!
//! | Field         | Type      | Notes                              |
//! |---------------|-----------|------------------------------------|
//! | `magic`       | `[u8; 4]` | `b"VXCK"`                          |
//! | `version`     | `u32`     | `CHUNK_FORMAT_VERSION`             |
//! | `x`, `z`      | `i32`     | region coordinates                 |
//! | `block_count` | `u32`     | always `CHUNK_SIZE`                |
//! | `checksum`    | `u32`     | CRC32 of the payload               |
//!
//! The payload is the block array's raw memory, viewed as bytes through `bytemuck`.
//! Each block is 4 bytes: id (`u16`), flags, light, in the host's byte order, which is
//! little-endian on every supported target.

use serde::{Deserialize, Serialize};

use super::{PersistenceError, PersistenceResult};
use crate::engine_state::voxels::{
    block::Block,
    chunk::{ChunkCoords, CHUNK_SIZE},
};

/// Magic bytes at the start of every region file.
pub const CHUNK_MAGIC: [u8; 4] = *b"VXCK";
/// Current region file format version.
pub const CHUNK_FORMAT_VERSION: u32 = 1;
/// Bytes per serialized block.
pub const BYTES_PER_BLOCK: usize = std::mem::size_of::<Block>();

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct ChunkHeader {
    magic: [u8; 4],
    version: u32,
    x: i32,
    z: i32,
    block_count: u32,
    checksum: u32,
}

fn encode_blocks(blocks: &[Block]) -> Vec<u8> {
    bytemuck::cast_slice(blocks).to_vec()
}

// a byte buffer read from disk carries no alignment guarantee for `Block`
fn decode_blocks(payload: &[u8]) -> Box<[Block]> {
    payload
        .chunks_exact(BYTES_PER_BLOCK)
        .map(bytemuck::pod_read_unaligned::<Block>)
        .collect()
}

/// Serializes a region's block array into a self-validating blob.
pub fn serialize_chunk(coords: ChunkCoords, blocks: &[Block]) -> PersistenceResult<Vec<u8>> {
    let payload = encode_blocks(blocks);
    let header = ChunkHeader {
        magic: CHUNK_MAGIC,
        version: CHUNK_FORMAT_VERSION,
        x: coords.x,
        z: coords.y,
        block_count: blocks.len() as u32,
        checksum: crc32fast::hash(&payload),
    };

    let mut bytes = bincode::serialize(&header)?;
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Parses and validates a region blob written by `serialize_chunk`.
///
/// Every way the data can be wrong (foreign file, other version, other region, wrong
/// size, flipped bits) is reported as an error so the caller can fall back to
/// regeneration.
pub fn deserialize_chunk(coords: ChunkCoords, bytes: &[u8]) -> PersistenceResult<Box<[Block]>> {
    let header: ChunkHeader = bincode::deserialize(bytes)?;
    let header_len = bincode::serialized_size(&header)? as usize;

    if header.magic != CHUNK_MAGIC {
        return Err(PersistenceError::InvalidMagic {
            found: header.magic,
        });
    }
    if header.version != CHUNK_FORMAT_VERSION {
        return Err(PersistenceError::VersionMismatch {
            expected: CHUNK_FORMAT_VERSION,
            found: header.version,
        });
    }
    if header.x != coords.x || header.z != coords.y {
        return Err(PersistenceError::CoordinateMismatch {
            expected_x: coords.x,
            expected_z: coords.y,
            found_x: header.x,
            found_z: header.z,
        });
    }

    let payload = bytes.get(header_len..).unwrap_or_default();
    let expected_len = CHUNK_SIZE * BYTES_PER_BLOCK;
    if header.block_count as usize != CHUNK_SIZE || payload.len() != expected_len {
        return Err(PersistenceError::SizeMismatch {
            expected: expected_len,
            found: payload.len(),
        });
    }

    let checksum = crc32fast::hash(payload);
    if checksum != header.checksum {
        return Err(PersistenceError::ChecksumMismatch {
            expected: header.checksum,
            found: checksum,
        });
    }

    Ok(decode_blocks(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use cgmath::Vector2;

    fn blocks() -> Vec<Block> {
        let mut blocks = vec![Block::AIR; CHUNK_SIZE];
        blocks[0] = Block::new(BlockType::GRASS);
        blocks[CHUNK_SIZE - 1] = Block::new(BlockType::GLOWSTONE);
        blocks[4242] = Block {
            id: 0x1234,
            flags: 0xAB,
            light: 7,
        };
        blocks
    }

    #[test]
    fn test_round_trip() {
        let coords = Vector2::new(5, -9);
        let blocks = blocks();
        let bytes = serialize_chunk(coords, &blocks).unwrap();
        let decoded = deserialize_chunk(coords, &bytes).unwrap();
        assert_eq!(&decoded[..], &blocks[..]);
    }

    #[test]
    fn test_flipped_payload_bit_fails_checksum() {
        let coords = Vector2::new(0, 0);
        let mut bytes = serialize_chunk(coords, &blocks()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(
            deserialize_chunk(coords, &bytes),
            Err(PersistenceError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_coordinates_rejected() {
        let bytes = serialize_chunk(Vector2::new(1, 2), &blocks()).unwrap();
        assert!(matches!(
            deserialize_chunk(Vector2::new(2, 1), &bytes),
            Err(PersistenceError::CoordinateMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_magic_and_version_rejected() {
        let coords = Vector2::new(0, 0);
        let mut bytes = serialize_chunk(coords, &blocks()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            deserialize_chunk(coords, &bytes),
            Err(PersistenceError::InvalidMagic { .. })
        ));

        let mut bytes = serialize_chunk(coords, &blocks()).unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            deserialize_chunk(coords, &bytes),
            Err(PersistenceError::VersionMismatch { expected: 1, found: 99 })
        ));
    }

    #[test]
    fn test_short_block_array_rejected() {
        let coords = Vector2::new(0, 0);
        let bytes = serialize_chunk(coords, &[Block::AIR; 16]).unwrap();
        assert!(matches!(
            deserialize_chunk(coords, &bytes),
            Err(PersistenceError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_payload_is_the_block_array_memory() {
        assert_eq!(BYTES_PER_BLOCK, 4);

        let coords = Vector2::new(-3, 8);
        let blocks = blocks();
        let bytes = serialize_chunk(coords, &blocks).unwrap();
        let payload = &bytes[bytes.len() - CHUNK_SIZE * BYTES_PER_BLOCK..];
        assert_eq!(payload, bytemuck::cast_slice::<Block, u8>(&blocks));

        let odd = &payload[4242 * BYTES_PER_BLOCK..4243 * BYTES_PER_BLOCK];
        assert_eq!(u16::from_ne_bytes([odd[0], odd[1]]), 0x1234);
        assert_eq!(&odd[2..], &[0xAB, 7]);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(deserialize_chunk(Vector2::new(0, 0), &[1, 2, 3]).is_err());
    }
}
