//! Rendering-side data for the voxel engine.
//!
//! This module contains everything the streaming pipeline produces for the renderer: the
//! packed vertex format, the pool of reusable vertex buffers, the greedy mesher and the
//! background task that runs it. Drawing itself belongs to the render collaborator behind
//! `buffer_state::GpuUploader`.

pub mod meshing;
pub mod sub_chunk_pool;
pub mod tasks;
pub mod vertex;

// Re-export commonly used types
pub use sub_chunk_pool::{SubChunkPool, VertexBuffer};
pub use vertex::Vertex;
