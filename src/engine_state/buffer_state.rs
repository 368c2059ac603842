//! # Buffer State Module
//!
//! This module provides the upload gate: the single place where finished sub-chunk meshes
//! are handed to the GPU and old meshes are retired.
//!
//! ## Key Features
//!
//! * Upload notifications arrive over a channel from the worker threads
//! * The GPU itself sits behind the `GpuUploader` trait, so the gate runs headless
//! * Upload analytics and resident memory tracking
//!
//! ## Architecture
//!
//! Workers never touch the GPU. A worker that finishes a mesh stages its pool buffer on
//! the sub-chunk, moves the sub-chunk to `UploadVerticesToGpu` and sends a `SubChunkKey`.
//! The gate runs on the main thread once per frame: for each key it uploads the staged
//! vertices, swaps the new mesh in, retires the mesh it replaced (freeing its draw command
//! and returning its buffer to the pool) and moves the sub-chunk to `Uploaded`. Edits that
//! arrived while the mesh was being built are picked up here by requesting another pass.
//!
//! ## Performance Considerations
//!
//! * The old mesh stays drawable until the new one is uploaded, so retesselation never
//!   makes a sub-chunk disappear for a frame
//! * Empty meshes skip the upload entirely

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::engine_state::rendering::sub_chunk_pool::SubChunkPool;
use crate::engine_state::rendering::vertex::Vertex;
use crate::engine_state::voxels::chunk::sub_chunk::{SubChunkState, UploadedMesh};
use crate::engine_state::voxels::chunk::{Chunk, ChunkCoords};
use crate::engine_state::voxels::world::World;

/// Opaque handle to an uploaded mesh, issued by a `GpuUploader`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DrawCommandHandle(pub u64);

/// Identifies one sub-chunk across threads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubChunkKey {
    pub chunk_coords: ChunkCoords,
    pub level: u8,
}

/// The render collaborator's side of the upload gate.
///
/// Only ever called from the thread that runs `BufferState::process_uploads`.
pub trait GpuUploader {
    /// Uploads a finished mesh and returns a handle the render side can draw with.
    fn upload_vertices(&mut self, key: SubChunkKey, vertices: &[Vertex]) -> DrawCommandHandle;

    /// Releases a handle previously returned by `upload_vertices`.
    fn free_vertices(&mut self, handle: DrawCommandHandle);
}

/// Uploader that keeps no GPU resources. Used by the demo binary and tests.
#[derive(Debug, Default)]
pub struct HeadlessUploader {
    next_handle: u64,
    resident: HashMap<DrawCommandHandle, usize>,
}

impl HeadlessUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resident_handles(&self) -> usize {
        self.resident.len()
    }
}

impl GpuUploader for HeadlessUploader {
    fn upload_vertices(&mut self, key: SubChunkKey, vertices: &[Vertex]) -> DrawCommandHandle {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let handle = DrawCommandHandle(self.next_handle);
        self.next_handle += 1;
        self.resident.insert(handle, bytes.len());
        trace!(
            "Uploaded {} vertices for sub-chunk {:?}/{} as {:?}",
            vertices.len(),
            key.chunk_coords,
            key.level,
            handle
        );
        handle
    }

    fn free_vertices(&mut self, handle: DrawCommandHandle) {
        if self.resident.remove(&handle).is_none() {
            warn!("Freeing unknown draw command {:?}", handle);
        }
    }
}

/// Analytics data for the upload gate
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferAnalytics {
    /// Number of non-empty meshes uploaded
    pub uploads: u64,
    /// Number of meshes that finished with no faces
    pub empty_meshes: u64,
    /// Total bytes handed to the uploader
    pub bytes_uploaded: u64,
    /// Number of draw commands freed
    pub frees: u64,
    /// Bytes currently held by live draw commands
    pub resident_bytes: u64,
}

/// The upload gate.
pub struct BufferState {
    uploader: Box<dyn GpuUploader>,
    receiver: Receiver<SubChunkKey>,
    pool: Arc<SubChunkPool>,
    resident_sizes: HashMap<DrawCommandHandle, u64>,
    analytics: BufferAnalytics,
}

impl BufferState {
    pub fn new(
        uploader: Box<dyn GpuUploader>,
        receiver: Receiver<SubChunkKey>,
        pool: Arc<SubChunkPool>,
    ) -> Self {
        BufferState {
            uploader,
            receiver,
            pool,
            resident_sizes: HashMap::new(),
            analytics: BufferAnalytics::default(),
        }
    }

    pub fn analytics(&self) -> BufferAnalytics {
        self.analytics
    }

    pub fn pool(&self) -> &SubChunkPool {
        &self.pool
    }

    /// Drains every pending upload notification.
    ///
    /// # Returns
    /// The number of sub-chunks that reached `Uploaded`.
    pub fn process_uploads(&mut self, world: &World) -> usize {
        let keys: Vec<SubChunkKey> = self.receiver.try_iter().collect();
        let mut uploaded = 0;

        for key in keys {
            if self.upload_sub_chunk(world, key) {
                uploaded += 1;
            }
        }

        if uploaded > 0 {
            debug!(
                "Uploaded {} sub-chunks ({} bytes resident)",
                uploaded, self.analytics.resident_bytes
            );
        }
        uploaded
    }

    fn upload_sub_chunk(&mut self, world: &World, key: SubChunkKey) -> bool {
        let Some(chunk) = world.get_chunk(key.chunk_coords) else {
            warn!("Upload notification for unknown chunk {:?}", key.chunk_coords);
            return false;
        };
        let sub_chunk = chunk.sub_chunk(key.level);
        let state = sub_chunk.state();
        if state != SubChunkState::UploadVerticesToGpu {
            warn!(
                "Upload notification for sub-chunk {:?}/{} in state {:?}",
                key.chunk_coords, key.level, state
            );
            return false;
        }

        let vertex_count = sub_chunk.num_verts_used();
        let buffer = sub_chunk.take_staged();
        let draw_command = match &buffer {
            Some(buffer) if vertex_count > 0 => {
                let vertices = &buffer.vertices()[..vertex_count as usize];
                let size = std::mem::size_of_val(vertices) as u64;
                let handle = self.uploader.upload_vertices(key, vertices);
                self.analytics.uploads += 1;
                self.analytics.bytes_uploaded += size;
                self.analytics.resident_bytes += size;
                self.resident_sizes.insert(handle, size);
                Some(handle)
            }
            _ => {
                self.analytics.empty_meshes += 1;
                None
            }
        };

        let previous = sub_chunk.swap_uploaded(UploadedMesh {
            buffer,
            vertex_count,
            draw_command,
        });
        if let Some(previous) = previous {
            self.retire_mesh(previous);
        }

        sub_chunk.advance_owned(SubChunkState::UploadVerticesToGpu, SubChunkState::Uploaded);

        if sub_chunk.take_needs_retesselation() {
            world.request_retesselation(key.chunk_coords, key.level);
        }
        true
    }

    /// Frees a mesh's draw command and returns its buffer to the pool.
    pub fn retire_mesh(&mut self, mesh: UploadedMesh) {
        if let Some(handle) = mesh.draw_command {
            self.uploader.free_vertices(handle);
            self.analytics.frees += 1;
            if let Some(size) = self.resident_sizes.remove(&handle) {
                self.analytics.resident_bytes -= size;
            }
        }
        if let Some(buffer) = mesh.buffer {
            self.pool.release(buffer);
        }
    }

    /// Retires every uploaded mesh of a region that is being unloaded.
    pub fn retire_chunk(&mut self, chunk: &Chunk) {
        for sub_chunk in chunk.sub_chunks() {
            if let Some(mesh) = sub_chunk.take_uploaded() {
                self.retire_mesh(mesh);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{channel, Sender};

    use cgmath::{Point3, Vector2};

    use crate::engine_state::rendering::sub_chunk_pool::VertexBuffer;
    use crate::engine_state::rendering::vertex::QuadCorner;
    use crate::engine_state::task_management::queue::TaskQueue;
    use crate::engine_state::voxels::block::block_side::BlockSide;
    use crate::engine_state::voxels::block::Block;
    use crate::engine_state::voxels::chunk::sub_chunk::SubChunk;
    use crate::engine_state::voxels::chunk::CHUNK_SIZE;

    struct Fixture {
        world: World,
        buffer_state: BufferState,
        sender: Sender<SubChunkKey>,
        pool: Arc<SubChunkPool>,
    }

    fn fixture() -> Fixture {
        let (sender, receiver) = channel();
        let pool = Arc::new(SubChunkPool::new(4));
        let world = World::new(Arc::new(TaskQueue::new()));
        let chunk = world.insert_placeholder(Vector2::new(0, 0)).unwrap();
        chunk.install_blocks(vec![Block::AIR; CHUNK_SIZE].into_boxed_slice());
        Fixture {
            world,
            buffer_state: BufferState::new(Box::new(HeadlessUploader::new()), receiver, pool.clone()),
            sender,
            pool,
        }
    }

    fn quad_buffer(pool: &SubChunkPool) -> VertexBuffer {
        let mut buffer = pool.acquire().unwrap();
        for corner in [
            QuadCorner::LowerLeft,
            QuadCorner::LowerRight,
            QuadCorner::UpperRight,
            QuadCorner::LowerLeft,
            QuadCorner::UpperRight,
            QuadCorner::UpperLeft,
        ] {
            buffer.push(Vertex::new(Point3::new(0, 0, 0), BlockSide::TOP, corner, 1, 15, 1, 1));
        }
        buffer
    }

    /// Plays the worker's part: claim, stage, hand over.
    fn finish_mesh(fixture: &Fixture, sub_chunk: &SubChunk, buffer: Option<VertexBuffer>) {
        let vertex_count = buffer.as_ref().map_or(0, |buffer| buffer.len() as u32);
        sub_chunk.advance_owned(SubChunkState::TesselateVertices, SubChunkState::TesselatingVertices);
        sub_chunk.stage_mesh(buffer, vertex_count);
        sub_chunk.advance_owned(SubChunkState::TesselatingVertices, SubChunkState::UploadVerticesToGpu);
        fixture
            .sender
            .send(SubChunkKey {
                chunk_coords: sub_chunk.chunk_coords,
                level: sub_chunk.level,
            })
            .unwrap();
    }

    fn ready_for_tesselation(sub_chunk: &SubChunk) {
        sub_chunk.advance_owned(SubChunkState::Unloaded, SubChunkState::LoadBlockData);
        sub_chunk.advance_owned(SubChunkState::LoadBlockData, SubChunkState::LoadingBlockData);
        sub_chunk.advance_owned(SubChunkState::LoadingBlockData, SubChunkState::TesselateVertices);
    }

    #[test]
    fn test_upload_moves_sub_chunk_to_uploaded() {
        let mut fixture = fixture();
        let chunk = fixture.world.get_chunk(Vector2::new(0, 0)).unwrap();
        let sub_chunk = chunk.sub_chunk(3);
        ready_for_tesselation(sub_chunk);
        finish_mesh(&fixture, sub_chunk, Some(quad_buffer(&fixture.pool)));

        assert_eq!(fixture.buffer_state.process_uploads(&fixture.world), 1);
        assert_eq!(sub_chunk.state(), SubChunkState::Uploaded);

        let drawable = sub_chunk.drawable().unwrap();
        assert_eq!(drawable.vertex_count, 6);
        assert!(drawable.draw_command.is_some());

        let analytics = fixture.buffer_state.analytics();
        assert_eq!(analytics.uploads, 1);
        assert_eq!(analytics.bytes_uploaded, 6 * std::mem::size_of::<Vertex>() as u64);
        assert_eq!(analytics.resident_bytes, analytics.bytes_uploaded);
    }

    #[test]
    fn test_empty_mesh_is_uploaded_without_draw_command() {
        let mut fixture = fixture();
        let chunk = fixture.world.get_chunk(Vector2::new(0, 0)).unwrap();
        let sub_chunk = chunk.sub_chunk(15);
        ready_for_tesselation(sub_chunk);
        finish_mesh(&fixture, sub_chunk, None);

        fixture.buffer_state.process_uploads(&fixture.world);

        assert_eq!(sub_chunk.state(), SubChunkState::Uploaded);
        let drawable = sub_chunk.drawable().unwrap();
        assert_eq!(drawable.vertex_count, 0);
        assert_eq!(drawable.buffer_slot, None);
        assert_eq!(drawable.draw_command, None);
        assert_eq!(fixture.buffer_state.analytics().uploads, 0);
        assert_eq!(fixture.buffer_state.analytics().empty_meshes, 1);
        assert_eq!(fixture.pool.free_count(), 4);
    }

    #[test]
    fn test_retesselation_retires_previous_mesh() {
        let mut fixture = fixture();
        let chunk = fixture.world.get_chunk(Vector2::new(0, 0)).unwrap();
        let sub_chunk = chunk.sub_chunk(0);
        ready_for_tesselation(sub_chunk);
        finish_mesh(&fixture, sub_chunk, Some(quad_buffer(&fixture.pool)));
        fixture.buffer_state.process_uploads(&fixture.world);
        assert_eq!(fixture.pool.free_count(), 3);

        sub_chunk.advance_owned(SubChunkState::Uploaded, SubChunkState::RetesselateVertices);
        sub_chunk.advance_owned(SubChunkState::RetesselateVertices, SubChunkState::DoneRetesselating);
        sub_chunk.advance_owned(SubChunkState::DoneRetesselating, SubChunkState::TesselateVertices);
        // the previous mesh is still drawable mid-retesselation
        assert!(sub_chunk.drawable().unwrap().draw_command.is_some());

        finish_mesh(&fixture, sub_chunk, Some(quad_buffer(&fixture.pool)));
        assert_eq!(fixture.pool.free_count(), 2);
        fixture.buffer_state.process_uploads(&fixture.world);

        assert_eq!(fixture.pool.free_count(), 3);
        let analytics = fixture.buffer_state.analytics();
        assert_eq!(analytics.uploads, 2);
        assert_eq!(analytics.frees, 1);
        assert_eq!(analytics.resident_bytes, 6 * std::mem::size_of::<Vertex>() as u64);
    }

    #[test]
    fn test_pending_edit_requests_another_pass_after_upload() {
        let mut fixture = fixture();
        let chunk = fixture.world.get_chunk(Vector2::new(0, 0)).unwrap();
        let sub_chunk = chunk.sub_chunk(1);
        ready_for_tesselation(sub_chunk);
        finish_mesh(&fixture, sub_chunk, None);
        sub_chunk.mark_needs_retesselation();

        fixture.buffer_state.process_uploads(&fixture.world);

        assert_eq!(sub_chunk.state(), SubChunkState::RetesselateVertices);
        assert_eq!(fixture.world.queue().len(), 1);
    }

    #[test]
    fn test_retire_chunk_returns_buffers() {
        let mut fixture = fixture();
        let chunk = fixture.world.get_chunk(Vector2::new(0, 0)).unwrap();
        for level in 0..2 {
            let sub_chunk = chunk.sub_chunk(level);
            ready_for_tesselation(sub_chunk);
            finish_mesh(&fixture, sub_chunk, Some(quad_buffer(&fixture.pool)));
        }
        fixture.buffer_state.process_uploads(&fixture.world);
        assert_eq!(fixture.pool.free_count(), 2);

        fixture.buffer_state.retire_chunk(&chunk);

        assert_eq!(fixture.pool.free_count(), 4);
        assert_eq!(fixture.buffer_state.analytics().resident_bytes, 0);
        assert!(chunk.sub_chunk(0).drawable().is_none());
    }

    #[test]
    fn test_stale_notification_is_ignored() {
        let mut fixture = fixture();
        fixture
            .sender
            .send(SubChunkKey {
                chunk_coords: Vector2::new(0, 0),
                level: 2,
            })
            .unwrap();
        fixture
            .sender
            .send(SubChunkKey {
                chunk_coords: Vector2::new(9, 9),
                level: 0,
            })
            .unwrap();
        assert_eq!(fixture.buffer_state.process_uploads(&fixture.world), 0);
    }
}
