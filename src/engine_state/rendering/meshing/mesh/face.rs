use cgmath::Point3;

use crate::engine_state::{
    rendering::{
        sub_chunk_pool::VertexBuffer,
        vertex::{QuadCorner, Vertex},
    },
    voxels::block::block_side::BlockSide,
};

/// Represents a single quad of the mesh, possibly covering many block faces.
///
/// A face is defined by four corner points (lower-left, lower-right, upper-right, upper-left)
/// in region-relative coordinates, and carries everything the packed vertex needs: the
/// texture, the light bucket and the quad's extent in blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Lower-left corner of the face in region coordinates
    pub ll: Point3<u32>,
    /// Lower-right corner of the face in region coordinates
    pub lr: Point3<u32>,
    /// Upper-right corner of the face in region coordinates
    pub ur: Point3<u32>,
    /// Upper-left corner of the face in region coordinates
    pub ul: Point3<u32>,
    /// Extent along the face's horizontal axis, in blocks
    pub width: u32,
    /// Extent along the face's vertical axis, in blocks
    pub height: u32,
    pub texture_index: u16,
    pub light: u8,
    /// Which side of the block this face represents
    pub block_side: BlockSide,
}

impl Face {
    /// Creates a face whose lowest corner block sits at `(i, j, k)`.
    ///
    /// # Arguments
    /// * `i`, `j`, `k` - Region coordinates of the block the face starts on
    /// * `width`, `height` - Extent of the merged quad along the side's horizontal and
    ///   vertical axes (z and y for FRONT/BACK, z and x for TOP/BOTTOM, x and y for
    ///   LEFT/RIGHT)
    /// * `texture_index`, `light` - Shared by every merged block face
    /// * `block_side` - Which side of the block this face represents
    ///
    /// # Returns
    /// A new `Face` with its corners wound so the face is seen from outside the block.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        i: u32,
        j: u32,
        k: u32,
        width: u32,
        height: u32,
        texture_index: u16,
        light: u8,
        block_side: BlockSide,
    ) -> Self {
        let (w, h) = (width, height);
        let (ll, lr, ul, ur) = match block_side {
            BlockSide::FRONT => (
                Point3::new(i, j, k),
                Point3::new(i, j, k + w),
                Point3::new(i, j + h, k),
                Point3::new(i, j + h, k + w),
            ),

            BlockSide::BACK => (
                Point3::new(i + 1, j, k + w),
                Point3::new(i + 1, j, k),
                Point3::new(i + 1, j + h, k + w),
                Point3::new(i + 1, j + h, k),
            ),

            BlockSide::BOTTOM => (
                Point3::new(i, j, k + w),
                Point3::new(i, j, k),
                Point3::new(i + h, j, k + w),
                Point3::new(i + h, j, k),
            ),

            BlockSide::TOP => (
                Point3::new(i, j + 1, k),
                Point3::new(i, j + 1, k + w),
                Point3::new(i + h, j + 1, k),
                Point3::new(i + h, j + 1, k + w),
            ),

            BlockSide::LEFT => (
                Point3::new(i + w, j, k),
                Point3::new(i, j, k),
                Point3::new(i + w, j + h, k),
                Point3::new(i, j + h, k),
            ),

            BlockSide::RIGHT => (
                Point3::new(i, j, k + 1),
                Point3::new(i + w, j, k + 1),
                Point3::new(i, j + h, k + 1),
                Point3::new(i + w, j + h, k + 1),
            ),
        };

        Face {
            ll,
            lr,
            ur,
            ul,
            width,
            height,
            texture_index,
            light,
            block_side,
        }
    }

    /// Appends the face as two triangles: `ll, lr, ur` and `ll, ur, ul`.
    pub fn push_vertices(&self, buffer: &mut VertexBuffer) {
        for (position, corner) in [
            (self.ll, QuadCorner::LowerLeft),
            (self.lr, QuadCorner::LowerRight),
            (self.ur, QuadCorner::UpperRight),
            (self.ll, QuadCorner::LowerLeft),
            (self.ur, QuadCorner::UpperRight),
            (self.ul, QuadCorner::UpperLeft),
        ] {
            buffer.push(Vertex::new(
                position,
                self.block_side,
                corner,
                self.texture_index,
                self.light,
                self.width,
                self.height,
            ));
        }
    }
}
