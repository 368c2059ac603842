//! # Sub-Chunk Module
//!
//! A sub-chunk is one 16-block-tall slice of a region and the unit of meshing and upload.
//! Its `state` is the single source of truth for who may touch its buffers: workers only
//! act on a sub-chunk after winning a compare-and-swap from a queued state into the
//! matching in-progress state, and the upload gate only acts on sub-chunks in
//! `UploadVerticesToGpu`.
//!
//! ## State Graph
//!
//! ```text
//! Unloaded -> LoadBlockData -> LoadingBlockData -> TesselateVertices
//!          -> TesselatingVertices -> UploadVerticesToGpu -> Uploaded
//!
//! Uploaded -> RetesselateVertices -> DoneRetesselating -> TesselateVertices -> ...
//! ```
//!
//! Every edge moves forward in declaration order except `Uploaded -> RetesselateVertices`.
//! Unloading a region resets its sub-chunks to `Unloaded` from a stable state, which only
//! happens once the region has left the directory's working set.

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU8, Ordering};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use parking_lot::Mutex;

use super::ChunkCoords;
use crate::core::fatal;
use crate::engine_state::buffer_state::DrawCommandHandle;
use crate::engine_state::rendering::sub_chunk_pool::VertexBuffer;

/// States of the per-sub-chunk streaming state machine, in traversal order.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum SubChunkState {
    /// Not requested; no buffer assigned.
    Unloaded = 0,
    /// Region block data load queued.
    LoadBlockData,
    /// Region block data load in progress.
    LoadingBlockData,
    /// Retesselation queued because a relevant block changed. The old mesh stays drawable.
    RetesselateVertices,
    /// A worker claimed the retesselation request.
    DoneRetesselating,
    /// Mesh generation queued.
    TesselateVertices,
    /// Mesh generation in progress.
    TesselatingVertices,
    /// Mesh complete on the CPU side, waiting for the upload gate.
    UploadVerticesToGpu,
    /// Render-eligible steady state.
    Uploaded,
}

impl SubChunkState {
    /// Whether `from -> to` is an edge of the state graph.
    pub fn is_valid_transition(from: SubChunkState, to: SubChunkState) -> bool {
        use SubChunkState::*;
        matches!(
            (from, to),
            (Unloaded, LoadBlockData)
                | (LoadBlockData, LoadingBlockData)
                | (LoadingBlockData, TesselateVertices)
                | (TesselateVertices, TesselatingVertices)
                | (TesselatingVertices, UploadVerticesToGpu)
                | (UploadVerticesToGpu, Uploaded)
                | (Uploaded, RetesselateVertices)
                | (RetesselateVertices, DoneRetesselating)
                | (DoneRetesselating, TesselateVertices)
        )
    }

    /// Stable states have no task queued or running and nothing waiting on the gate.
    pub fn is_stable(self) -> bool {
        matches!(self, SubChunkState::Unloaded | SubChunkState::Uploaded)
    }

    /// Whether a mesh computed from now on is guaranteed to see a block edit made now.
    ///
    /// True for everything up to and including a queued first-time tesselation, because
    /// the mesher reads block data when it starts.
    pub fn will_observe_edits(self) -> bool {
        self <= SubChunkState::RetesselateVertices || self == SubChunkState::TesselateVertices
    }
}

/// Lock-free holder for a `SubChunkState`.
#[derive(Debug)]
pub struct AtomicSubChunkState(AtomicU8);

impl AtomicSubChunkState {
    pub fn new(state: SubChunkState) -> Self {
        AtomicSubChunkState(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> SubChunkState {
        Self::decode(self.0.load(Ordering::Acquire))
    }

    /// Claims the `from -> to` edge.
    ///
    /// # Returns
    /// `Ok(())` if this caller moved the state, `Err(actual)` if another thread got there
    /// first or the state was never `from`.
    ///
    /// # Panics
    /// Aborts the process if `from -> to` is not an edge of the state graph. That is a
    /// programming error that would let two owners write the same buffer.
    pub fn try_advance(&self, from: SubChunkState, to: SubChunkState) -> Result<(), SubChunkState> {
        if !SubChunkState::is_valid_transition(from, to) {
            fatal(&format!("illegal sub-chunk transition {:?} -> {:?}", from, to));
        }

        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(Self::decode)
    }

    fn store_unloaded(&self) {
        self.0.store(SubChunkState::Unloaded as u8, Ordering::Release);
    }

    fn decode(raw: u8) -> SubChunkState {
        SubChunkState::from_u8(raw)
            .unwrap_or_else(|| fatal(&format!("corrupt sub-chunk state value {}", raw)))
    }
}

/// The mesh currently handed to the render side for a sub-chunk.
#[derive(Debug)]
pub struct UploadedMesh {
    /// Pool buffer holding the vertices, `None` for empty meshes.
    pub buffer: Option<VertexBuffer>,
    pub vertex_count: u32,
    /// Handle returned by the GPU uploader, `None` for empty meshes.
    pub draw_command: Option<DrawCommandHandle>,
}

/// What the render collaborator sees of one drawable sub-chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawableSubChunk {
    pub chunk_coords: ChunkCoords,
    pub level: u8,
    pub buffer_slot: Option<usize>,
    pub vertex_count: u32,
    pub draw_command: Option<DrawCommandHandle>,
}

/// One vertical slice of a region.
#[derive(Debug)]
pub struct SubChunk {
    pub chunk_coords: ChunkCoords,
    pub level: u8,
    state: AtomicSubChunkState,
    /// Vertices written into the staged buffer. Stored before the state leaves
    /// `TesselatingVertices` and read only after observing `UploadVerticesToGpu`.
    num_verts_used: AtomicU32,
    needs_retesselation: AtomicBool,
    staged: Mutex<Option<VertexBuffer>>,
    uploaded: Mutex<Option<UploadedMesh>>,
}

impl SubChunk {
    pub fn new(chunk_coords: ChunkCoords, level: u8) -> Self {
        SubChunk {
            chunk_coords,
            level,
            state: AtomicSubChunkState::new(SubChunkState::Unloaded),
            num_verts_used: AtomicU32::new(0),
            needs_retesselation: AtomicBool::new(false),
            staged: Mutex::new(None),
            uploaded: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SubChunkState {
        self.state.load()
    }

    /// See `AtomicSubChunkState::try_advance`.
    pub fn try_advance(&self, from: SubChunkState, to: SubChunkState) -> bool {
        self.state.try_advance(from, to).is_ok()
    }

    /// Advances along an edge this caller already owns.
    ///
    /// Losing the race here means some other thread changed a state it had no claim on,
    /// which is fatal.
    pub fn advance_owned(&self, from: SubChunkState, to: SubChunkState) {
        if let Err(actual) = self.state.try_advance(from, to) {
            fatal(&format!(
                "sub-chunk {:?}/{} expected {:?} while advancing to {:?}, found {:?}",
                self.chunk_coords, self.level, from, to, actual
            ));
        }
    }

    pub fn num_verts_used(&self) -> u32 {
        self.num_verts_used.load(Ordering::Acquire)
    }

    /// Stores a finished mesh. Must be called by the worker that owns
    /// `TesselatingVertices`, before advancing to `UploadVerticesToGpu`.
    pub fn stage_mesh(&self, buffer: Option<VertexBuffer>, vertex_count: u32) {
        *self.staged.lock() = buffer;
        self.num_verts_used.store(vertex_count, Ordering::Release);
    }

    pub fn take_staged(&self) -> Option<VertexBuffer> {
        self.staged.lock().take()
    }

    /// Installs a freshly uploaded mesh and hands back the one it replaces.
    pub fn swap_uploaded(&self, mesh: UploadedMesh) -> Option<UploadedMesh> {
        self.uploaded.lock().replace(mesh)
    }

    pub fn take_uploaded(&self) -> Option<UploadedMesh> {
        self.uploaded.lock().take()
    }

    pub fn drawable(&self) -> Option<DrawableSubChunk> {
        self.uploaded.lock().as_ref().map(|mesh| DrawableSubChunk {
            chunk_coords: self.chunk_coords,
            level: self.level,
            buffer_slot: mesh.buffer.as_ref().map(VertexBuffer::slot),
            vertex_count: mesh.vertex_count,
            draw_command: mesh.draw_command,
        })
    }

    /// Flags an edit the in-flight mesh may have missed.
    ///
    /// Pairs with `take_needs_retesselation`: a requester marks then re-reads the state,
    /// the upload gate advances the state then takes the flag, and the fences guarantee
    /// at least one side sees the other's write.
    pub fn mark_needs_retesselation(&self) {
        self.needs_retesselation.store(true, Ordering::Release);
        fence(Ordering::SeqCst);
    }

    pub fn take_needs_retesselation(&self) -> bool {
        fence(Ordering::SeqCst);
        self.needs_retesselation.swap(false, Ordering::AcqRel)
    }

    /// Returns the sub-chunk to `Unloaded` as part of unloading its region.
    ///
    /// Aborts if the sub-chunk is not in a stable state; callers check stability first.
    pub fn reset_to_unloaded(&self) {
        let state = self.state();
        if !state.is_stable() {
            fatal(&format!(
                "cannot unload sub-chunk {:?}/{} in state {:?}",
                self.chunk_coords, self.level, state
            ));
        }
        self.needs_retesselation.store(false, Ordering::Release);
        self.num_verts_used.store(0, Ordering::Release);
        self.state.store_unloaded();
    }
}
