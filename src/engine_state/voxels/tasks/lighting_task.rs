//! Relighting after block edits.

use cgmath::Point3;

use crate::engine_state::{
    task_management::task::TaskHandler,
    voxels::{
        chunk::{split_block_position, ChunkCoords},
        world::World,
    },
    world_context::WorldContext,
};

/// Hands every edited position of a region to the lighting collaborator, then asks for
/// new meshes of the region's sub-chunks whose light changed.
pub struct LightingTask {
    coords: ChunkCoords,
    /// The edit that queued this task. Later edits to the same region are picked up from
    /// the region's dirty list.
    block_position: Option<Point3<i32>>,
}

impl LightingTask {
    pub fn new(coords: ChunkCoords, block_position: Option<Point3<i32>>) -> Self {
        LightingTask {
            coords,
            block_position,
        }
    }
}

impl TaskHandler for LightingTask {
    fn process(&self, context: &WorldContext) {
        let Some(chunk) = context.world.get_chunk(self.coords) else {
            return;
        };

        chunk.clear_lighting_queued();
        let mut positions = chunk.take_dirty_light_positions();
        if positions.is_empty() {
            positions.extend(self.block_position);
        }

        for position in positions {
            if !context.lighting.recalculate_lighting(&chunk, position) {
                continue;
            }

            // only this region is pinned by the task; a neighbour may be mid-unload
            let (coords, local) = split_block_position(position);
            for (dependent_coords, level) in World::dependent_sub_chunks(coords, local) {
                if dependent_coords == self.coords {
                    context.world.request_retesselation(dependent_coords, level);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cgmath::Vector2;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    use crate::engine_state::task_management::task::TaskKind;
    use crate::engine_state::voxels::chunk::sub_chunk::SubChunkState;
    use crate::engine_state::voxels::chunk::Chunk;
    use crate::engine_state::voxels::lighting::LightingCollaborator;
    use crate::engine_state::world_context::test_support::{add_uploaded_chunk, open_context};

    /// Records every relit position and reports whether light changed.
    struct RecordingLighting {
        changed: bool,
        relit: Arc<Mutex<Vec<Point3<i32>>>>,
    }

    impl LightingCollaborator for RecordingLighting {
        fn recalculate_lighting(&self, _chunk: &Chunk, block_position: Point3<i32>) -> bool {
            self.relit.lock().push(block_position);
            self.changed
        }
    }

    fn context_with_lighting(
        save_directory: &TempDir,
        changed: bool,
    ) -> (Arc<WorldContext>, Arc<Mutex<Vec<Point3<i32>>>>) {
        let relit = Arc::new(Mutex::new(Vec::new()));
        let lighting = RecordingLighting {
            changed,
            relit: relit.clone(),
        };
        let (context, _upload_receiver) = open_context(save_directory.path(), Box::new(lighting));
        (context, relit)
    }

    fn queued_tesselations(context: &WorldContext) -> Vec<(ChunkCoords, u8)> {
        let mut tasks: Vec<_> = context
            .queue()
            .snapshot()
            .into_iter()
            .filter(|task| task.kind == TaskKind::Tesselate)
            .map(|task| (task.chunk_coords, task.level))
            .collect();
        tasks.sort_by_key(|(coords, level)| (coords.x, coords.y, *level));
        tasks
    }

    #[test]
    fn test_changed_light_requeues_only_own_region() {
        let save_directory = TempDir::new().unwrap();
        let (context, relit) = context_with_lighting(&save_directory, true);
        let origin = Vector2::new(0, 0);
        let west = Vector2::new(-1, 0);
        let chunk = add_uploaded_chunk(&context, origin);
        let neighbour = add_uploaded_chunk(&context, west);

        // on the west face and the bottom row of level 1
        let edited = Point3::new(0, 16, 3);
        chunk.push_dirty_light_position(edited);
        assert!(chunk.try_queue_lighting());

        LightingTask::new(origin, Some(edited)).process(&context);

        assert_eq!(*relit.lock(), vec![edited]);
        assert_eq!(queued_tesselations(&context), vec![(origin, 0), (origin, 1)]);
        assert_eq!(chunk.sub_chunk(1).state(), SubChunkState::RetesselateVertices);
        assert!(neighbour
            .sub_chunks()
            .iter()
            .all(|sub_chunk| sub_chunk.state() == SubChunkState::Uploaded));

        // the dedup flag was cleared, so the next edit can queue another relight
        assert!(chunk.try_queue_lighting());
    }

    #[test]
    fn test_unchanged_light_queues_nothing() {
        let save_directory = TempDir::new().unwrap();
        let (context, relit) = context_with_lighting(&save_directory, false);
        let origin = Vector2::new(0, 0);
        let chunk = add_uploaded_chunk(&context, origin);

        LightingTask::new(origin, Some(Point3::new(4, 40, 4))).process(&context);

        assert_eq!(relit.lock().len(), 1);
        assert!(queued_tesselations(&context).is_empty());
        assert!(chunk
            .sub_chunks()
            .iter()
            .all(|sub_chunk| sub_chunk.state() == SubChunkState::Uploaded));
    }

    #[test]
    fn test_dirty_positions_are_relit_instead_of_the_task_position() {
        let save_directory = TempDir::new().unwrap();
        let (context, relit) = context_with_lighting(&save_directory, false);
        let origin = Vector2::new(0, 0);
        let chunk = add_uploaded_chunk(&context, origin);

        let first = Point3::new(2, 70, 2);
        let second = Point3::new(9, 12, 9);
        chunk.push_dirty_light_position(first);
        chunk.push_dirty_light_position(second);

        LightingTask::new(origin, Some(first)).process(&context);

        assert_eq!(*relit.lock(), vec![first, second]);
        assert!(chunk.take_dirty_light_positions().is_empty());
    }

    #[test]
    fn test_missing_region_is_skipped() {
        let save_directory = TempDir::new().unwrap();
        let (context, relit) = context_with_lighting(&save_directory, true);

        LightingTask::new(Vector2::new(3, 3), Some(Point3::new(50, 10, 50))).process(&context);

        assert!(relit.lock().is_empty());
        assert!(context.queue().is_empty());
    }
}
