//! # Voxel World
//!
//! This module contains the voxel side of the streaming engine: the data that describes
//! the world and the machinery that keeps the part around the viewpoint in memory.
//!
//! ## Architecture
//!
//! The voxel system is organized into several key components:
//!
//! * **Block**: Individual voxel types and their static properties
//! * **Chunk**: 16×256×16 regions of blocks, split into 16 sub-chunks for meshing
//! * **World**: The region directory and the gameplay-facing block access API
//! * **Scheduler**: Decides which regions to load and unload as the viewpoint moves
//! * **Generator** and **Lighting**: Collaborators the pipeline calls into
//! * **Tasks**: Region-level work executed on worker threads
//!
//! ## Data Flow
//!
//! 1. The scheduler requests regions around the viewpoint
//! 2. Workers load or generate their block data, then mesh every sub-chunk
//! 3. Block edits write through the world and request new meshes for affected sub-chunks
//! 4. Regions that fall out of range are saved and released
//!
//! ## Thread Safety
//!
//! * Block arrays are read by any thread and written under a per-region lock
//! * Sub-chunk state transitions are compare-and-swap, so only one thread owns each step
//! * Unloading happens on the main thread and only for regions no task refers to

pub mod block;
pub mod chunk;
pub mod generator;
pub mod lighting;
pub mod scheduler;
pub mod tasks;
pub mod world;
