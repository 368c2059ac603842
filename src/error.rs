use thiserror::Error;

use crate::config::ConfigError;
use crate::engine_state::rendering::sub_chunk_pool::PoolError;
use crate::persistence::PersistenceError;

/// Errors surfaced by session setup and teardown.
///
/// Per-region failures during streaming never reach this type: they are logged and the
/// region is regenerated.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
