//! # Rendering Task System
//!
//! This module contains tasks related to mesh generation. Meshing is processed on worker
//! threads; only the final upload happens on the main thread.

pub mod chunk_mesh_generation_task;
