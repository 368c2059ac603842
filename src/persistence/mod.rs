//! # Persistence
//!
//! Saving and loading of region block data and world-level metadata.
//!
//! ## Layout on Disk
//!
//! ```text
//! <save directory>/
//!     world.bin          seed, 4 bytes little-endian
//!     chunks/
//!         <x>_<z>.chunk  one blob per region
//! ```
//!
//! Region files are written to a temporary sibling first and renamed into place, so a
//! crash mid-write leaves either the old file or the new one.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine_state::voxels::{block::Block, chunk::ChunkCoords};

pub mod chunk_serializer;
pub mod world_metadata;

pub use world_metadata::WorldMetadata;

/// Name of the region directory inside a world save.
pub const CHUNK_DIRECTORY_NAME: &str = "chunks";
/// Extension of region files.
pub const CHUNK_FILE_EXTENSION: &str = "chunk";

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors that can occur during persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("invalid magic bytes {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("file belongs to chunk ({found_x}, {found_z}), expected ({expected_x}, {expected_z})")]
    CoordinateMismatch {
        expected_x: i32,
        expected_z: i32,
        found_x: i32,
        found_z: i32,
    },

    #[error("size mismatch: expected {expected} bytes of block data, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("checksum mismatch: header says {expected:#010x}, data hashes to {found:#010x}")]
    ChecksumMismatch { expected: u32, found: u32 },

    #[error("invalid world metadata: {0}")]
    InvalidMetadata(String),
}

/// Writes `bytes` to `path` through a temporary file and a rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> PersistenceResult<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Reads and writes region files under a world's `chunks/` directory.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    chunk_directory: PathBuf,
}

impl ChunkStore {
    /// Opens the region directory of a world save, creating it if needed.
    pub fn open(save_directory: &Path) -> PersistenceResult<Self> {
        let chunk_directory = save_directory.join(CHUNK_DIRECTORY_NAME);
        fs::create_dir_all(&chunk_directory)?;
        Ok(ChunkStore { chunk_directory })
    }

    /// The file a region is stored in. Derived only from its coordinates.
    pub fn chunk_path(&self, coords: ChunkCoords) -> PathBuf {
        self.chunk_directory
            .join(format!("{}_{}.{}", coords.x, coords.y, CHUNK_FILE_EXTENSION))
    }

    pub fn save_chunk(&self, coords: ChunkCoords, blocks: &[Block]) -> PersistenceResult<()> {
        let bytes = chunk_serializer::serialize_chunk(coords, blocks)?;
        atomic_write(&self.chunk_path(coords), &bytes)
    }

    /// Loads a region's blocks.
    ///
    /// # Returns
    /// - `Ok(None)` if the region was never saved
    /// - `Err(_)` if the file exists but cannot be read or fails validation
    pub fn load_chunk(&self, coords: ChunkCoords) -> PersistenceResult<Option<Box<[Block]>>> {
        let path = self.chunk_path(coords);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        chunk_serializer::deserialize_chunk(coords, &bytes).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::{block::block_type::BlockType, chunk::CHUNK_SIZE};
    use cgmath::Vector2;
    use tempfile::TempDir;

    fn patterned_blocks() -> Box<[Block]> {
        (0..CHUNK_SIZE)
            .map(|index| match index % 7 {
                0 => Block::new(BlockType::STONE),
                1 => Block::new(BlockType::GLASS),
                2 => Block::new(BlockType::GLOWSTONE),
                _ => Block::AIR,
            })
            .collect()
    }

    #[test]
    fn test_save_then_load_reproduces_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::open(temp_dir.path()).unwrap();
        let coords = Vector2::new(-3, 12);
        let blocks = patterned_blocks();

        store.save_chunk(coords, &blocks).unwrap();
        let loaded = store.load_chunk(coords).unwrap().unwrap();
        assert_eq!(loaded, blocks);
    }

    #[test]
    fn test_missing_chunk_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::open(temp_dir.path()).unwrap();
        assert!(store.load_chunk(Vector2::new(0, 0)).unwrap().is_none());
    }

    #[test]
    fn test_chunk_path_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::open(temp_dir.path()).unwrap();
        let path = store.chunk_path(Vector2::new(-1, 2));
        assert_eq!(
            path,
            temp_dir.path().join("chunks").join("-1_2.chunk")
        );
        assert_eq!(path, store.chunk_path(Vector2::new(-1, 2)));
    }

    #[test]
    fn test_truncated_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::open(temp_dir.path()).unwrap();
        let coords = Vector2::new(1, 1);
        store.save_chunk(coords, &patterned_blocks()).unwrap();

        let path = store.chunk_path(coords);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(store.load_chunk(coords).is_err());
    }
}
