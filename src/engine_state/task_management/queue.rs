//! Priority task queue shared between the main thread and the workers.
//!
//! Tasks are ordered by the squared planar distance from the last recorded viewpoint to
//! the centre of their target region, nearest first. The distance is computed once when
//! a task is enqueued; moving the viewpoint later does not reorder queued tasks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use cgmath::{Point2, Point3};
use parking_lot::{Condvar, Mutex};

use super::task::Task;
use crate::engine_state::voxels::chunk::{ChunkCoords, CHUNK_DEPTH, CHUNK_WIDTH};

struct QueuedTask {
    distance_squared: f32,
    sequence: u64,
    task: Task,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    // `BinaryHeap` pops the greatest element, so nearer and older compares greater.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance_squared
            .total_cmp(&self.distance_squared)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct QueueInner {
    heap: BinaryHeap<QueuedTask>,
    viewpoint: Point2<f32>,
    next_sequence: u64,
    closed: bool,
}

/// Thread-safe, distance-ordered queue of streaming tasks.
pub struct TaskQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                viewpoint: Point2::new(0.0, 0.0),
                next_sequence: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Records the viewpoint used to prioritise tasks enqueued from now on.
    pub fn set_viewpoint(&self, viewpoint: Point3<f32>) {
        self.inner.lock().viewpoint = Point2::new(viewpoint.x, viewpoint.z);
    }

    /// Adds a task. Safe from any thread.
    ///
    /// # Returns
    /// `false` if the queue has been closed and the task was dropped.
    pub fn enqueue(&self, task: Task) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }

        let distance_squared = Self::distance_squared(inner.viewpoint, task.chunk_coords);
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.heap.push(QueuedTask {
            distance_squared,
            sequence,
            task,
        });
        drop(inner);

        self.available.notify_one();
        true
    }

    /// Blocks until a task is available.
    ///
    /// # Returns
    /// `None` once the queue is closed. Tasks still queued at that point are discarded.
    pub fn dequeue(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(queued) = inner.heap.pop() {
                return Some(queued.task);
            }
            self.available.wait(&mut inner);
        }
    }

    /// Non-blocking variant of `dequeue`.
    pub fn try_dequeue(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }
        inner.heap.pop().map(|queued| queued.task)
    }

    /// Closes the queue and wakes every blocked worker.
    ///
    /// # Returns
    /// The tasks that were still queued.
    pub fn close(&self) -> Vec<Task> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        let remaining = inner
            .heap
            .drain()
            .map(|queued| queued.task)
            .collect::<Vec<_>>();
        drop(inner);

        self.available.notify_all();
        remaining
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns clones of every queued task, in no particular order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.inner
            .lock()
            .heap
            .iter()
            .map(|queued| queued.task.clone())
            .collect()
    }

    fn distance_squared(viewpoint: Point2<f32>, coords: ChunkCoords) -> f32 {
        let centre_x = (coords.x as f32 + 0.5) * CHUNK_WIDTH as f32;
        let centre_z = (coords.y as f32 + 0.5) * CHUNK_DEPTH as f32;
        let dx = centre_x - viewpoint.x;
        let dz = centre_z - viewpoint.y;
        dx * dx + dz * dz
    }
}
