//! # Voxel Task System
//!
//! Handlers for the region-level tasks: creating a region, loading or generating its
//! block data, saving it, and relighting it after edits. Every handler runs on a worker
//! thread and only advances state it has claimed through a compare-and-swap.

pub mod chunk_generation_task;
pub mod chunk_save_task;
pub mod lighting_task;
