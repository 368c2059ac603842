//! # Sub-Chunk Pool
//!
//! A fixed-capacity arena of reusable vertex buffers. Every sub-chunk that has geometry
//! owns exactly one buffer from this pool, handed out when tesselation starts and given
//! back when the region is unloaded or its mesh is replaced.
//!
//! ## Ownership
//!
//! `VertexBuffer` is a move-only handle: it cannot be cloned or constructed outside this
//! module, so whoever holds the value is the only code that can write the vertices. The
//! buffer travels from the pool to a worker, from the worker to the sub-chunk's staging
//! slot, from there to the upload gate, and finally back to the pool.
//!
//! ## Capacity
//!
//! The pool never grows. Running out of slots means the pool was provisioned for fewer
//! resident sub-chunks than the configured radii require, which `acquire` reports as
//! `PoolError::Exhausted`.

use bitvec::prelude::BitVec;
use parking_lot::Mutex;
use thiserror::Error;

use super::vertex::Vertex;
use crate::engine_state::voxels::chunk::{CHUNK_DEPTH, CHUNK_WIDTH, SUB_CHUNK_HEIGHT};

/// Vertices emitted per quad (two triangles).
pub const VERTICES_PER_FACE: usize = 6;

/// Upper bound on the vertices of one sub-chunk: every block showing all six faces.
pub const MAX_VERTICES_PER_SUB_CHUNK: usize =
    (CHUNK_WIDTH * CHUNK_DEPTH * SUB_CHUNK_HEIGHT) as usize * 6 * VERTICES_PER_FACE;

/// Errors reported by the sub-chunk pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("sub-chunk pool exhausted: all {capacity} vertex buffers are in use")]
    Exhausted { capacity: usize },
}

/// A vertex buffer checked out of the `SubChunkPool`.
#[derive(Debug)]
pub struct VertexBuffer {
    slot: usize,
    vertices: Vec<Vertex>,
}

impl VertexBuffer {
    /// Index of the pool slot backing this buffer. Stable for the buffer's lifetime and
    /// usable by the render side as the buffer handle.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    /// Appends a vertex.
    ///
    /// # Panics
    /// Panics if the buffer would exceed `MAX_VERTICES_PER_SUB_CHUNK`, which no valid
    /// sub-chunk mesh can reach.
    pub fn push(&mut self, vertex: Vertex) {
        assert!(
            self.vertices.len() < MAX_VERTICES_PER_SUB_CHUNK,
            "vertex buffer in slot {} overflowed the worst-case sub-chunk size",
            self.slot
        );
        self.vertices.push(vertex);
    }
}

struct PoolInner {
    free: Vec<VertexBuffer>,
    in_use: BitVec,
}

/// Fixed-capacity arena of vertex buffers shared by all workers and the main thread.
pub struct SubChunkPool {
    capacity: usize,
    inner: Mutex<PoolInner>,
}

impl SubChunkPool {
    /// Creates a pool with `capacity` slots, all free.
    ///
    /// Slot storage is allocated lazily: a slot's vector grows the first time a mesh is
    /// written into it and keeps that allocation for every later reuse.
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity)
            .rev()
            .map(|slot| VertexBuffer {
                slot,
                vertices: Vec::new(),
            })
            .collect();

        SubChunkPool {
            capacity,
            inner: Mutex::new(PoolInner {
                free,
                in_use: BitVec::repeat(false, capacity),
            }),
        }
    }

    /// Checks out an unused buffer, emptied and ready to be written.
    ///
    /// # Returns
    /// `Err(PoolError::Exhausted)` when every slot is in use.
    pub fn acquire(&self) -> Result<VertexBuffer, PoolError> {
        let mut inner = self.inner.lock();
        let buffer = inner.free.pop().ok_or(PoolError::Exhausted {
            capacity: self.capacity,
        })?;
        inner.in_use.set(buffer.slot, true);
        Ok(buffer)
    }

    /// Returns a buffer to the free list.
    ///
    /// # Panics
    /// Panics if the slot is not currently checked out. That is a double release and
    /// means two owners believed they held the same GPU-visible memory.
    pub fn release(&self, mut buffer: VertexBuffer) {
        let mut inner = self.inner.lock();
        assert!(
            buffer.slot < self.capacity && inner.in_use[buffer.slot],
            "double release of sub-chunk pool slot {}",
            buffer.slot
        );
        inner.in_use.set(buffer.slot, false);
        buffer.clear();
        inner.free.push(buffer);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.inner.lock().in_use.count_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::vertex::QuadCorner;
    use crate::engine_state::voxels::block::block_side::BlockSide;
    use cgmath::Point3;

    fn some_vertex() -> Vertex {
        Vertex::new(
            Point3::new(1, 2, 3),
            BlockSide::TOP,
            QuadCorner::LowerLeft,
            4,
            0,
            1,
            1,
        )
    }

    #[test]
    fn test_acquire_until_exhausted() {
        let pool = SubChunkPool::new(2);
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_ne!(first.slot(), second.slot());
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.acquire().unwrap_err(), PoolError::Exhausted { capacity: 2 });

        pool.release(first);
        assert_eq!(pool.free_count(), 1);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_released_buffer_comes_back_empty() {
        let pool = SubChunkPool::new(1);
        let mut buffer = pool.acquire().unwrap();
        buffer.push(some_vertex());
        buffer.push(some_vertex());
        assert_eq!(buffer.len(), 2);
        pool.release(buffer);

        let buffer = pool.acquire().unwrap();
        assert!(buffer.is_empty());
        assert_eq!(pool.in_use_count(), 1);
    }

    #[test]
    #[should_panic(expected = "double release")]
    fn test_double_release_is_fatal() {
        let pool = SubChunkPool::new(1);
        let buffer = pool.acquire().unwrap();
        let forged = VertexBuffer {
            slot: buffer.slot(),
            vertices: Vec::new(),
        };
        pool.release(buffer);
        pool.release(forged);
    }
}
