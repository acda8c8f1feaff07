use glam::{Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub kind: u8,
    pub vertex_count: u8,
    pub material: u8,
    pub texture_scale_shift: u8,
    pub vertex_index: i32,
    pub plane_index: u16,
    pub plane_front: bool,
    pub apply_ambient: bool,
    pub texture_offset: [u16; 2],
    pub texture_size: [u16; 2],
}

/// Non-negative children are nodes, negative ones leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BspNode {
    pub plane_index: i16,
    pub front: i16,
    pub back: i16,
    pub fill: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolidLeaf {
    pub surface_index: i32,
    pub plane_index: i32,
    pub surface_count: u16,
    pub plane_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmptyLeaf {
    pub flags: u16,
    /// Bytes of visibility bits starting at `pvs_index`.
    pub pvs_count: i16,
    pub pvs_index: i32,
    pub surface_index: i32,
    pub plane_index: i32,
    pub bounds: BoundingBox,
    pub surface_count: u16,
    pub plane_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    pub point_index: u16,
    pub texture_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Signed distance, positive on the front side.
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Leaf reached by a BSP descent. Empty leaves are numbered before solid ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafRef {
    Empty(usize),
    Solid(usize),
}

/// Compiled interior geometry: a BSP tree over the interior's planes with
/// a potentially visible set per empty leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct InteriorGeom {
    pub version: u32,
    pub build_id: u32,
    pub texture_scale: f32,
    pub bounds: BoundingBox,
    pub highest_mip_level: u32,
    pub surfaces: Vec<Surface>,
    pub nodes: Vec<BspNode>,
    pub solid_leaves: Vec<SolidLeaf>,
    pub empty_leaves: Vec<EmptyLeaf>,
    pub pvs: Vec<u8>,
    pub vertices: Vec<Vertex>,
    pub points: Vec<Vec3>,
    pub texture_points: Vec<Vec2>,
    pub planes: Vec<Plane>,
}
