use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::{atomic_write, PersistenceError, PersistenceResult};

/// Name of the world metadata file inside a world save.
pub const WORLD_METADATA_FILE_NAME: &str = "world.bin";
/// Seed value meaning "not chosen yet".
pub const SEED_UNSET: u32 = u32::MAX;

/// World-level data that outlives a session: currently only the generation seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldMetadata {
    pub seed: u32,
}

impl WorldMetadata {
    pub fn path(save_directory: &Path) -> PathBuf {
        save_directory.join(WORLD_METADATA_FILE_NAME)
    }

    /// Loads the world metadata, creating and persisting it for new worlds.
    ///
    /// The seed comes from, in order: the existing `world.bin`, `configured_seed`, or a
    /// fresh random value.
    ///
    /// # Errors
    /// A `world.bin` that exists but is malformed is an error rather than a silent
    /// reseed, which would regenerate every unsaved region differently.
    pub fn load_or_create(
        save_directory: &Path,
        configured_seed: Option<u32>,
    ) -> PersistenceResult<Self> {
        fs::create_dir_all(save_directory)?;

        let stored_seed = Self::load(save_directory)?.map(|metadata| metadata.seed);
        let seed = match stored_seed.filter(|seed| *seed != SEED_UNSET) {
            Some(seed) => seed,
            None => {
                let seed = configured_seed
                    .filter(|seed| *seed != SEED_UNSET)
                    .unwrap_or_else(|| fastrand::u32(..SEED_UNSET));
                let metadata = WorldMetadata { seed };
                metadata.save(save_directory)?;
                info!("Created world metadata at {:?}", Self::path(save_directory));
                seed
            }
        };

        let metadata = WorldMetadata { seed };
        info!("World seed: {}", metadata.seed);
        info!("World seed (as float): {:2.8}", metadata.seed_as_float());
        Ok(metadata)
    }

    /// Reads `world.bin`, returning `Ok(None)` if it does not exist.
    pub fn load(save_directory: &Path) -> PersistenceResult<Option<Self>> {
        let bytes = match fs::read(Self::path(save_directory)) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let seed_bytes: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
            PersistenceError::InvalidMetadata(format!(
                "expected 4 bytes of seed, found {}",
                bytes.len()
            ))
        })?;

        Ok(Some(WorldMetadata {
            seed: u32::from_le_bytes(seed_bytes),
        }))
    }

    pub fn save(&self, save_directory: &Path) -> PersistenceResult<()> {
        atomic_write(&Self::path(save_directory), &self.seed.to_le_bytes())
    }

    /// The seed mapped onto `[-1, 1]`, for generators that want a float offset.
    pub fn seed_as_float(&self) -> f32 {
        ((self.seed as f64 / SEED_UNSET as f64) * 2.0 - 1.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_world_uses_configured_seed_and_persists_it() {
        let temp_dir = TempDir::new().unwrap();
        let metadata = WorldMetadata::load_or_create(temp_dir.path(), Some(1234)).unwrap();
        assert_eq!(metadata.seed, 1234);

        let bytes = fs::read(WorldMetadata::path(temp_dir.path())).unwrap();
        assert_eq!(bytes, 1234u32.to_le_bytes());
    }

    #[test]
    fn test_existing_seed_wins_over_config() {
        let temp_dir = TempDir::new().unwrap();
        WorldMetadata { seed: 77 }.save(temp_dir.path()).unwrap();
        let metadata = WorldMetadata::load_or_create(temp_dir.path(), Some(1234)).unwrap();
        assert_eq!(metadata.seed, 77);
    }

    #[test]
    fn test_random_seed_is_never_the_sentinel() {
        let temp_dir = TempDir::new().unwrap();
        let metadata = WorldMetadata::load_or_create(temp_dir.path(), None).unwrap();
        assert_ne!(metadata.seed, SEED_UNSET);

        let reloaded = WorldMetadata::load_or_create(temp_dir.path(), None).unwrap();
        assert_eq!(reloaded, metadata);
    }

    #[test]
    fn test_malformed_metadata_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(WorldMetadata::path(temp_dir.path()), [1, 2, 3]).unwrap();
        assert!(matches!(
            WorldMetadata::load_or_create(temp_dir.path(), None),
            Err(PersistenceError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_seed_as_float_range() {
        assert_eq!(WorldMetadata { seed: 0 }.seed_as_float(), -1.0);
        assert_eq!(WorldMetadata { seed: SEED_UNSET }.seed_as_float(), 1.0);
    }
}
