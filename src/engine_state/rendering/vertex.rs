//! Packed vertex format for sub-chunk meshes.
//!
//! Every vertex is two 32-bit words so a worst-case sub-chunk mesh stays small enough to
//! stream every frame. Positions are relative to the owning region's origin, which keeps
//! them inside a handful of bits.

use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;

const X_BITS: u32 = 5;
const Y_BITS: u32 = 9;
const Z_BITS: u32 = 5;
const SIDE_BITS: u32 = 3;
const CORNER_BITS: u32 = 2;

const Y_SHIFT: u32 = X_BITS;
const Z_SHIFT: u32 = Y_SHIFT + Y_BITS;
const SIDE_SHIFT: u32 = Z_SHIFT + Z_BITS;
const CORNER_SHIFT: u32 = SIDE_SHIFT + SIDE_BITS;

const TEXTURE_BITS: u32 = 16;
const LIGHT_BITS: u32 = 4;
const EXTENT_BITS: u32 = 5;

const LIGHT_SHIFT: u32 = TEXTURE_BITS;
const WIDTH_SHIFT: u32 = LIGHT_SHIFT + LIGHT_BITS;
const HEIGHT_SHIFT: u32 = WIDTH_SHIFT + EXTENT_BITS;

const fn mask(bits: u32) -> u32 {
    (1 << bits) - 1
}

/// Which corner of its quad a vertex sits on, used by the shader to derive UVs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QuadCorner {
    LowerLeft = 0,
    LowerRight = 1,
    UpperLeft = 2,
    UpperRight = 3,
}

/// A vertex in the voxel rendering pipeline.
///
/// # Memory Layout
/// - `data1`: x (5 bits), y (9 bits), z (5 bits), face side (3 bits), quad corner (2 bits)
/// - `data2`: texture index (16 bits), light bucket (4 bits), quad width - 1 (5 bits),
///   quad height - 1 (5 bits)
///
/// Total size: 8 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub data1: u32,
    pub data2: u32,
}

/// Everything a packed vertex carries, decoded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnpackedVertex {
    pub position: Point3<u32>,
    pub side: BlockSide,
    pub corner: QuadCorner,
    pub texture_index: u16,
    pub light: u8,
    pub width: u32,
    pub height: u32,
}

impl Vertex {
    /// Packs one quad corner.
    ///
    /// # Arguments
    /// * `position` - Corner position relative to the region origin; x and z in `0..=16`,
    ///   y in `0..=256`
    /// * `side` - The block face the quad belongs to
    /// * `corner` - Which corner of the quad this is
    /// * `texture_index` - Index of the texture in the texture array
    /// * `light` - Light bucket, clamped to `0..=15`
    /// * `width`, `height` - Quad extent in blocks, `1..=32`
    ///
    /// # Panics
    /// Panics if a field does not fit its bit range. The mesher only produces positions
    /// inside a single region, so this indicates a meshing bug.
    pub fn new(
        position: Point3<u32>,
        side: BlockSide,
        corner: QuadCorner,
        texture_index: u16,
        light: u8,
        width: u32,
        height: u32,
    ) -> Self {
        assert!(
            position.x <= mask(X_BITS) && position.y <= mask(Y_BITS) && position.z <= mask(Z_BITS),
            "vertex position {:?} does not fit the packed format",
            position
        );
        assert!(
            (1..=mask(EXTENT_BITS) + 1).contains(&width)
                && (1..=mask(EXTENT_BITS) + 1).contains(&height),
            "quad extent {}x{} does not fit the packed format",
            width,
            height
        );

        let data1 = position.x
            | position.y << Y_SHIFT
            | position.z << Z_SHIFT
            | (side as u32) << SIDE_SHIFT
            | (corner as u32) << CORNER_SHIFT;
        let data2 = texture_index as u32
            | (light.min(15) as u32) << LIGHT_SHIFT
            | (width - 1) << WIDTH_SHIFT
            | (height - 1) << HEIGHT_SHIFT;

        Vertex { data1, data2 }
    }

    /// Decodes the packed words. Used by tests and debugging tools; the GPU does the
    /// same unpacking in the vertex shader.
    pub fn unpack(&self) -> UnpackedVertex {
        let side_index = (self.data1 >> SIDE_SHIFT) & mask(SIDE_BITS);
        let corner = match (self.data1 >> CORNER_SHIFT) & mask(CORNER_BITS) {
            0 => QuadCorner::LowerLeft,
            1 => QuadCorner::LowerRight,
            2 => QuadCorner::UpperLeft,
            _ => QuadCorner::UpperRight,
        };

        UnpackedVertex {
            position: Point3::new(
                self.data1 & mask(X_BITS),
                (self.data1 >> Y_SHIFT) & mask(Y_BITS),
                (self.data1 >> Z_SHIFT) & mask(Z_BITS),
            ),
            side: BlockSide::from_index(side_index).unwrap_or(BlockSide::FRONT),
            corner,
            texture_index: (self.data2 & mask(TEXTURE_BITS)) as u16,
            light: ((self.data2 >> LIGHT_SHIFT) & mask(LIGHT_BITS)) as u8,
            width: ((self.data2 >> WIDTH_SHIFT) & mask(EXTENT_BITS)) + 1,
            height: ((self.data2 >> HEIGHT_SHIFT) & mask(EXTENT_BITS)) + 1,
        }
    }
}
