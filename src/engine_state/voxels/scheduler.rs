//! # Radius Scheduler
//!
//! Keeps the set of resident regions centred on the viewpoint. Regions inside the load
//! radius are requested nearest-first; regions beyond the larger unload radius are saved
//! and torn down. The gap between the two radii keeps a viewpoint that hovers near a
//! region boundary from loading and unloading the same regions every frame.
//!
//! Unloading only happens on the main thread and only for a region that nothing else is
//! working on: no queued or running task and every sub-chunk parked in a stable state.
//! Anything else is deferred and retried every frame by `process_pending_unloads`.

use cgmath::{Point3, Vector2};
use log::{debug, info, warn};

use super::chunk::{chunk_distance_chebyshev, chunk_distance_squared, Chunk, ChunkCoords};
use super::world::to_chunk_coords;
use crate::engine_state::buffer_state::BufferState;
use crate::engine_state::world_context::WorldContext;

/// The viewpoint must move further than this (squared, in blocks) before the radius is
/// checked again.
pub const RECHECK_DISTANCE_SQUARED: f32 = 16.0 * 16.0;

pub struct RadiusScheduler {
    load_radius: i32,
    unload_radius: i32,
    last_check_position: Option<Point3<f32>>,
}

impl RadiusScheduler {
    pub fn new(load_radius: i32, unload_radius: i32) -> Self {
        RadiusScheduler {
            load_radius,
            unload_radius,
            last_check_position: None,
        }
    }

    /// Whether the viewpoint moved far enough since the last check to warrant another.
    /// Always true before the first check.
    pub fn should_check(&self, viewpoint: Point3<f32>) -> bool {
        match self.last_check_position {
            None => true,
            Some(last) => {
                let dx = viewpoint.x - last.x;
                let dz = viewpoint.z - last.z;
                dx * dx + dz * dz > RECHECK_DISTANCE_SQUARED
            }
        }
    }

    /// Requests every region in the load radius and unloads every region beyond the
    /// unload radius.
    ///
    /// # Returns
    /// The number of newly requested regions.
    pub fn check_chunk_radius(
        &mut self,
        context: &WorldContext,
        buffer_state: &mut BufferState,
        viewpoint: Point3<f32>,
    ) -> usize {
        context.queue().set_viewpoint(viewpoint);
        self.last_check_position = Some(viewpoint);
        let centre = to_chunk_coords(viewpoint);

        let mut in_range: Vec<ChunkCoords> = (-self.load_radius..=self.load_radius)
            .flat_map(|dz| {
                (-self.load_radius..=self.load_radius).map(move |dx| centre + Vector2::new(dx, dz))
            })
            .collect();
        in_range.sort_by_key(|coords| chunk_distance_squared(centre, *coords));

        // requesting a resident region cancels its deferred unload instead
        let requested = in_range
            .into_iter()
            .filter(|coords| context.world.queue_create_chunk(*coords))
            .count();

        let mut unloaded = 0;
        for coords in context.world.loaded_chunk_coords() {
            if chunk_distance_chebyshev(centre, coords) > self.unload_radius as i64
                && self.unload_chunk(context, buffer_state, coords)
            {
                unloaded += 1;
            }
        }

        if requested > 0 || unloaded > 0 {
            info!(
                "Radius check around {:?}: requested {} chunks, unloaded {}",
                centre, requested, unloaded
            );
        }
        requested
    }

    /// Unloads a region now if nothing is working on it, otherwise marks it for a
    /// deferred unload.
    ///
    /// # Returns
    /// `true` if the region was removed.
    pub fn unload_chunk(
        &self,
        context: &WorldContext,
        buffer_state: &mut BufferState,
        coords: ChunkCoords,
    ) -> bool {
        let Some(chunk) = context.world.get_chunk(coords) else {
            return false;
        };

        if !chunk.is_safe_to_unload() {
            if !chunk.unload_requested() {
                debug!(
                    "Deferring unload of chunk {:?}: {} tasks pending",
                    coords,
                    chunk.pending_tasks()
                );
            }
            chunk.request_unload();
            return false;
        }

        Self::unload_now(context, buffer_state, &chunk);
        true
    }

    /// Retries every deferred unload.
    ///
    /// # Returns
    /// The number of regions removed.
    pub fn process_pending_unloads(
        &self,
        context: &WorldContext,
        buffer_state: &mut BufferState,
    ) -> usize {
        let mut unloaded = 0;
        for chunk in context.world.chunks() {
            if chunk.unload_requested() && chunk.is_safe_to_unload() {
                Self::unload_now(context, buffer_state, &chunk);
                unloaded += 1;
            }
        }
        unloaded
    }

    fn unload_now(context: &WorldContext, buffer_state: &mut BufferState, chunk: &Chunk) {
        let coords = chunk.coords;

        if let Some(blocks) = chunk.read_blocks().as_ref() {
            if let Err(error) = context.store.save_chunk(coords, blocks) {
                warn!("Failed to save chunk {:?} before unloading it: {}", coords, error);
            }
        }

        for sub_chunk in chunk.sub_chunks() {
            sub_chunk.reset_to_unloaded();
        }
        buffer_state.retire_chunk(chunk);
        chunk.release_blocks();
        context.world.remove_chunk(coords);

        debug!("Unloaded chunk {:?}", coords);
    }
}
