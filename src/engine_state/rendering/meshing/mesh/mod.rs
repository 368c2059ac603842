//! Mesh generation for voxel rendering.
//!
//! This module converts a sub-chunk's block data into GPU-friendly quads. It implements
//! greedy meshing to reduce the number of vertices by combining coplanar faces that share
//! a texture and light bucket.
//!
//! # Architecture
//! - [`Face`]: A single (possibly merged) quad with its corners and packed attributes
//! - [`greedy_faces`]: The greedy mask-merging pass over one sub-chunk
//!
//! # Performance Considerations
//! - Merging is done per slice on a stack-allocated 16×16 mask
//! - Faces are written straight into the worker's pooled vertex buffer

mod face;
mod greedy;

pub use face::Face;
pub use greedy::greedy_faces;
