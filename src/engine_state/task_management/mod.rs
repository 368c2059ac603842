//! # Task Management System
//!
//! This module provides the worker pool that executes streaming work in the background.
//!
//! ## Architecture Overview
//!
//! The task management system consists of several key components:
//! - `TaskQueue`: Distance-ordered queue shared by every thread that produces work
//! - `Task`: A unit of work targeting one region or sub-chunk
//! - `TaskHandler`: The per-kind handlers that advance the world state
//! - `TaskManager`: Owns the worker threads and their shutdown
//!
//! ## Task Lifecycle
//! 1. Tasks are queued through `World::enqueue`, which also counts them against their
//!    region so the region cannot be unloaded underneath them
//! 2. An idle worker dequeues the nearest task and runs its handler
//! 3. Handlers queue follow-up work themselves (load, then mesh) instead of waiting on it
//! 4. The worker marks the task finished on its region and dequeues the next one
//!
//! ## Performance Considerations
//! - Workers block only while the queue is empty
//! - Nearer regions are served first, so the area around the viewpoint fills in first
//! - Meshes are finished on the workers; the main thread only uploads them

pub mod queue;
pub mod task;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

use super::world_context::WorldContext;

/// Manages a pool of worker threads draining the shared task queue.
///
/// Dropping the manager shuts the workers down.
pub struct TaskManager {
    context: Arc<WorldContext>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskManager {
    /// Spawns `num_workers` worker threads, named `chunk-worker-{i}`.
    ///
    /// # Errors
    /// Returns `EngineError::WorkerSpawn` if a thread cannot be created. Workers spawned
    /// before the failure are shut down again.
    pub fn new(num_workers: usize, context: Arc<WorldContext>) -> EngineResult<Self> {
        info!(
            "Starting {} chunk workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        let mut manager = TaskManager {
            context,
            workers: Vec::with_capacity(num_workers),
        };

        for index in 0..num_workers {
            let context = manager.context.clone();
            let worker = thread::Builder::new()
                .name(format!("chunk-worker-{}", index))
                .spawn(move || {
                    while let Some(task) = context.queue().dequeue() {
                        let coords = task.chunk_coords;
                        task.process(&context);
                        context.world.task_finished(coords);
                    }
                    debug!("Chunk worker {} exiting", index);
                })
                .map_err(EngineError::WorkerSpawn)?;
            manager.workers.push(worker);
        }

        Ok(manager)
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Closes the queue and joins every worker.
    ///
    /// Tasks already running finish; tasks still queued are discarded and released from
    /// their regions' pending counts.
    ///
    /// # Returns
    /// The number of discarded tasks.
    pub fn shutdown(&mut self) -> usize {
        let dropped = self.context.queue().close();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("A chunk worker panicked before shutdown");
            }
        }

        for task in &dropped {
            self.context.world.task_finished(task.chunk_coords);
        }
        if !dropped.is_empty() {
            info!("Discarded {} queued tasks at shutdown", dropped.len());
        }
        dropped.len()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}
