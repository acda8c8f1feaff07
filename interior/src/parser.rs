use iff::{
    ByteStream, DecodeError,
    nom_helpers::{IResult, vec2, vec3},
};
use log::debug;
use nom::{
    Parser,
    combinator::map,
    number::complete::{le_f32, le_i16, le_i32, le_u8, le_u16, le_u32},
};

use crate::types::{
    BoundingBox, BspNode, EmptyLeaf, InteriorGeom, Plane, SolidLeaf, Surface, Vertex,
};

pub const INTERIOR_CLASS: &str = "ITRGeometry";
pub const LATEST_INTERIOR_VERSION: u32 = 2;

fn bounding_box(i: &[u8]) -> IResult<'_, BoundingBox> {
    map((vec3, vec3), |(min, max)| BoundingBox { min, max }).parse(i)
}

fn surface(i: &[u8]) -> IResult<'_, Surface> {
    map(
        (
            (le_u8, le_u8, le_u8, le_u8),
            le_i32,
            le_u16,
            le_u8,
            le_u8,
            (le_u16, le_u16),
            (le_u16, le_u16),
        ),
        |(
            (kind, vertex_count, material, texture_scale_shift),
            vertex_index,
            plane_index,
            plane_front,
            apply_ambient,
            (offset_x, offset_y),
            (size_x, size_y),
        )| Surface {
            kind,
            vertex_count,
            material,
            texture_scale_shift,
            vertex_index,
            plane_index,
            plane_front: plane_front != 0,
            apply_ambient: apply_ambient != 0,
            texture_offset: [offset_x, offset_y],
            texture_size: [size_x, size_y],
        },
    )
    .parse(i)
}

fn bsp_node(i: &[u8]) -> IResult<'_, BspNode> {
    map(
        (le_i16, le_i16, le_i16, le_i16),
        |(plane_index, front, back, fill)| BspNode {
            plane_index,
            front,
            back,
            fill,
        },
    )
    .parse(i)
}

fn solid_leaf(i: &[u8]) -> IResult<'_, SolidLeaf> {
    map(
        (le_i32, le_i32, le_u16, le_u16),
        |(surface_index, plane_index, surface_count, plane_count)| SolidLeaf {
            surface_index,
            plane_index,
            surface_count,
            plane_count,
        },
    )
    .parse(i)
}

fn empty_leaf(i: &[u8]) -> IResult<'_, EmptyLeaf> {
    map(
        (
            le_u16,
            le_i16,
            le_i32,
            le_i32,
            le_i32,
            bounding_box,
            le_u16,
            le_u16,
        ),
        |(
            flags,
            pvs_count,
            pvs_index,
            surface_index,
            plane_index,
            bounds,
            surface_count,
            plane_count,
        )| EmptyLeaf {
            flags,
            pvs_count,
            pvs_index,
            surface_index,
            plane_index,
            bounds,
            surface_count,
            plane_count,
        },
    )
    .parse(i)
}

fn vertex(i: &[u8]) -> IResult<'_, Vertex> {
    map((le_u16, le_u16), |(point_index, texture_index)| Vertex {
        point_index,
        texture_index,
    })
    .parse(i)
}

fn plane(i: &[u8]) -> IResult<'_, Plane> {
    map((vec3, le_f32), |(normal, d)| Plane { normal, d }).parse(i)
}

struct Counts {
    surfaces: usize,
    nodes: usize,
    solid_leaves: usize,
    empty_leaves: usize,
    pvs: usize,
    vertices: usize,
    points: usize,
    texture_points: usize,
    planes: usize,
}

impl Counts {
    fn read(stream: &mut ByteStream) -> Result<Self, DecodeError> {
        let mut next = || stream.read_u32().map(|n| n as usize);

        Ok(Self {
            surfaces: next()?,
            nodes: next()?,
            solid_leaves: next()?,
            empty_leaves: next()?,
            pvs: next()?,
            vertices: next()?,
            points: next()?,
            texture_points: next()?,
            planes: next()?,
        })
    }
}

fn check_index(what: &'static str, index: i64, count: usize) -> Result<(), DecodeError> {
    if index < 0 || index as u64 >= count as u64 {
        return Err(DecodeError::InvalidReference { what, index, count });
    }

    Ok(())
}

impl InteriorGeom {
    pub fn read(stream: &mut ByteStream, version: u32) -> Result<Self, DecodeError> {
        if version > LATEST_INTERIOR_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                format: INTERIOR_CLASS,
                version,
            });
        }

        let (build_id, texture_scale) = stream.parse((le_u32, le_f32))?;
        let bounds = stream.parse(bounding_box)?;
        let highest_mip_level = stream.read_u32()?;

        let counts = Counts::read(stream)?;

        debug!(
            "interior v{version}: {} surfaces, {} nodes, {} empty and {} solid leaves",
            counts.surfaces, counts.nodes, counts.empty_leaves, counts.solid_leaves
        );

        let res = Self {
            version,
            build_id,
            texture_scale,
            bounds,
            highest_mip_level,
            surfaces: stream.read_count(surface, counts.surfaces)?,
            nodes: stream.read_count(bsp_node, counts.nodes)?,
            solid_leaves: stream.read_count(solid_leaf, counts.solid_leaves)?,
            empty_leaves: stream.read_count(empty_leaf, counts.empty_leaves)?,
            pvs: stream.read_bytes(counts.pvs)?.to_vec(),
            vertices: stream.read_count(vertex, counts.vertices)?,
            points: stream.read_count(vec3, counts.points)?,
            texture_points: stream.read_count(vec2, counts.texture_points)?,
            planes: stream.read_count(plane, counts.planes)?,
        };

        res.validate()?;

        Ok(res)
    }

    /// Checks every index the BSP descent and PVS lookups follow.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let leaf_count = self.empty_leaves.len() + self.solid_leaves.len();

        for node in &self.nodes {
            check_index("bsp node plane", node.plane_index as i64, self.planes.len())?;

            for child in [node.front, node.back] {
                if child >= 0 {
                    check_index("bsp node child", child as i64, self.nodes.len())?;
                } else {
                    check_index("bsp leaf", -(child as i64 + 1), leaf_count)?;
                }
            }
        }

        for leaf in &self.empty_leaves {
            if leaf.pvs_count <= 0 {
                continue;
            }

            let end = leaf.pvs_index as i64 + leaf.pvs_count as i64;
            check_index("pvs offset", leaf.pvs_index as i64, self.pvs.len())?;
            check_index("pvs end", end - 1, self.pvs.len())?;
        }

        for surface in &self.surfaces {
            check_index("surface plane", surface.plane_index as i64, self.planes.len())?;

            if surface.vertex_count > 0 {
                let last = surface.vertex_index as i64 + surface.vertex_count as i64 - 1;
                check_index("surface vertex", surface.vertex_index as i64, self.vertices.len())?;
                check_index("surface vertex", last, self.vertices.len())?;
            }
        }

        for vertex in &self.vertices {
            check_index("vertex point", vertex.point_index as i64, self.points.len())?;
        }

        Ok(())
    }

    pub fn open_from_bytes(bytes: &[u8], version: u32) -> Result<Self, DecodeError> {
        Self::read(&mut ByteStream::new(bytes), version)
    }
}
