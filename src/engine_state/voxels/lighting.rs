//! Interface to the lighting engine.
//!
//! The streaming core only decides *when* light must be recomputed: after a block edit,
//! through a deduplicated `RecalculateLighting` task per region. How light propagates is
//! up to the collaborator.

use cgmath::Point3;
use log::trace;

use super::chunk::Chunk;

/// Recomputes light around edited blocks. Called on worker threads.
pub trait LightingCollaborator: Send + Sync {
    /// `block_position` is the world position of an edited block inside `chunk`.
    /// Implementations may write `Block::light` through the chunk's block access methods.
    ///
    /// # Returns
    /// Whether any light value changed, in which case the affected meshes are rebuilt.
    fn recalculate_lighting(&self, chunk: &Chunk, block_position: Point3<i32>) -> bool;
}

/// Lighting collaborator for sessions without a lighting engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLighting;

impl LightingCollaborator for NoLighting {
    fn recalculate_lighting(&self, chunk: &Chunk, block_position: Point3<i32>) -> bool {
        trace!(
            "Skipping relight of {:?} in chunk {:?}",
            block_position,
            chunk.coords
        );
        false
    }
}
