//! Greedy meshing implementation for voxel rendering.
//!
//! This module implements the greedy meshing algorithm which combines adjacent coplanar
//! faces with the same texture and light into larger quads, significantly reducing the
//! number of vertices each sub-chunk has to upload.
//!
//! For every side and every slice along that side's normal, the visible faces of the slice
//! are collected into a 16×16 mask keyed by (texture, light). The mask is then swept row by
//! row: each unvisited cell grows as far as it can along the row, then as many rows up as
//! the whole run allows, and the covered cells are cleared.

use crate::engine_state::voxels::{
    block::block_side::BlockSide,
    chunk::{CHUNK_WIDTH, SUB_CHUNK_HEIGHT},
};

use super::super::Neighbourhood;
use super::face::Face;

/// Cells per mask row. Every slice of a sub-chunk is 16×16 whichever side is meshed.
const MASK_SIZE: usize = CHUNK_WIDTH as usize;

type MaskCell = Option<(u16, u8)>;

/// Maps a slice position to sub-chunk local block coordinates.
///
/// `depth` runs along the side's normal, `u` along the quad's width axis and `v` along
/// its height axis, matching the extents `Face::new` expects.
fn slice_to_local(side: BlockSide, depth: i32, u: i32, v: i32) -> (i32, i32, i32) {
    match side {
        BlockSide::FRONT | BlockSide::BACK => (depth, v, u),
        BlockSide::BOTTOM | BlockSide::TOP => (v, depth, u),
        BlockSide::LEFT | BlockSide::RIGHT => (u, v, depth),
    }
}

fn fill_mask(
    neighbourhood: &Neighbourhood,
    side: BlockSide,
    depth: i32,
    mask: &mut [MaskCell; MASK_SIZE * MASK_SIZE],
) {
    let normal = side.normal();
    for v in 0..MASK_SIZE as i32 {
        for u in 0..MASK_SIZE as i32 {
            let (x, y, z) = slice_to_local(side, depth, u, v);
            let block = neighbourhood.get(x, y, z);
            let neighbour = neighbourhood.get(x + normal.x, y + normal.y, z + normal.z);

            mask[u as usize + v as usize * MASK_SIZE] = block
                .face_visible_against(&neighbour)
                .then(|| (block.texture_index(side), neighbour.light));
        }
    }
}

fn merge_mask(
    side: BlockSide,
    depth: i32,
    base_y: u32,
    mask: &mut [MaskCell; MASK_SIZE * MASK_SIZE],
    faces: &mut Vec<Face>,
) {
    for v in 0..MASK_SIZE {
        let mut u = 0;
        while u < MASK_SIZE {
            let Some(key) = mask[u + v * MASK_SIZE] else {
                u += 1;
                continue;
            };

            let mut width = 1;
            while u + width < MASK_SIZE && mask[u + width + v * MASK_SIZE] == Some(key) {
                width += 1;
            }

            let mut height = 1;
            'grow: while v + height < MASK_SIZE {
                for du in 0..width {
                    if mask[u + du + (v + height) * MASK_SIZE] != Some(key) {
                        break 'grow;
                    }
                }
                height += 1;
            }

            for dv in 0..height {
                for du in 0..width {
                    mask[u + du + (v + dv) * MASK_SIZE] = None;
                }
            }

            let (x, y, z) = slice_to_local(side, depth, u as i32, v as i32);
            faces.push(Face::new(
                x as u32,
                y as u32 + base_y,
                z as u32,
                width as u32,
                height as u32,
                key.0,
                key.1,
                side,
            ));

            u += width;
        }
    }
}

/// Generates the merged faces of one sub-chunk.
///
/// # Returns
/// Faces in region coordinates (the sub-chunk's level is folded into `y`).
pub fn greedy_faces(neighbourhood: &Neighbourhood) -> Vec<Face> {
    let base_y = neighbourhood.level() as u32 * SUB_CHUNK_HEIGHT as u32;
    let mut faces = Vec::new();
    let mut mask = [None; MASK_SIZE * MASK_SIZE];

    for side in BlockSide::all() {
        for depth in 0..MASK_SIZE as i32 {
            fill_mask(neighbourhood, side, depth, &mut mask);
            merge_mask(side, depth, base_y, &mut mask, &mut faces);
        }
    }

    faces
}
