use std::collections::HashMap;

use glam::{Vec2, Vec3};
use iff::{
    ByteStream, DecodeError,
    nom_helpers::{IResult, vec2, vec3},
};
use log::debug;
use nom::{
    Parser,
    combinator::map,
    number::complete::{le_f32, le_i32, le_u8},
};

pub const MESH_CLASS: &str = "TS::CelAnimMesh";
pub const LATEST_MESH_VERSION: u32 = 3;

/// Vertex quantised to a byte per axis against its frame's scale and origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedVertex {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    /// Index into the shared encoded normal table.
    pub normal: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexIndexPair {
    pub vertex: i32,
    pub tex_vertex: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub verts: [VertexIndexPair; 3],
    pub material: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub first_vert: i32,
    pub scale: Vec3,
    pub origin: Vec3,
}

/// Vertex animated mesh. Each frame is a block of packed vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct CelAnimMesh {
    pub verts_per_frame: i32,
    pub tex_verts_per_frame: i32,
    pub radius: f32,
    pub verts: Vec<PackedVertex>,
    pub tex_verts: Vec<Vec2>,
    pub faces: Vec<Face>,
    pub frames: Vec<Frame>,
}

/// Contiguous run of triangles sharing one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prim {
    pub start_index: usize,
    pub index_count: usize,
    pub vertex_count: usize,
    pub material: i32,
}

/// Derived buffers for drawing a [`CelAnimMesh`], built once by [`CelAnimMesh::prepare`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshLayout {
    /// Source vertex, relative to a frame's first vertex, for every emitted vertex.
    pub vertex_map: Vec<u32>,
    /// Source texture vertex for every emitted vertex.
    pub tex_vertex_map: Vec<u32>,
    pub triangles: Vec<[u16; 3]>,
    pub prims: Vec<Prim>,
    /// Offset of each frame inside the emitted vertex buffer. Frames sharing a
    /// first vertex share an offset.
    pub frame_offsets: Vec<u32>,
    pub tex_frame_count: u32,
}

impl MeshLayout {
    pub fn real_verts_per_frame(&self) -> usize {
        self.vertex_map.len()
    }

    pub fn real_tex_verts_per_frame(&self) -> usize {
        self.tex_vertex_map.len()
    }

    pub fn frame_offset(&self, frame: usize) -> Option<u32> {
        self.frame_offsets.get(frame).copied()
    }

    pub fn tex_frame_offset(&self, tex_frame: usize) -> usize {
        self.real_tex_verts_per_frame() * tex_frame
    }
}

fn packed_vertex(i: &[u8]) -> IResult<'_, PackedVertex> {
    map((le_u8, le_u8, le_u8, le_u8), |(x, y, z, normal)| PackedVertex {
        x,
        y,
        z,
        normal,
    })
    .parse(i)
}

fn vertex_index_pair(i: &[u8]) -> IResult<'_, VertexIndexPair> {
    map((le_i32, le_i32), |(vertex, tex_vertex)| VertexIndexPair {
        vertex,
        tex_vertex,
    })
    .parse(i)
}

fn face(i: &[u8]) -> IResult<'_, Face> {
    map(
        (vertex_index_pair, vertex_index_pair, vertex_index_pair, le_i32),
        |(a, b, c, material)| Face {
            verts: [a, b, c],
            material,
        },
    )
    .parse(i)
}

fn frame(i: &[u8]) -> IResult<'_, Frame> {
    map((le_i32, vec3, vec3), |(first_vert, scale, origin)| Frame {
        first_vert,
        scale,
        origin,
    })
    .parse(i)
}

fn count_field(value: i32, what: &'static str) -> Result<usize, DecodeError> {
    usize::try_from(value).map_err(|_| DecodeError::InvalidReference {
        what,
        index: value as i64,
        count: 0,
    })
}

impl CelAnimMesh {
    pub fn read(stream: &mut ByteStream, version: u32) -> Result<Self, DecodeError> {
        if version > LATEST_MESH_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                format: MESH_CLASS,
                version,
            });
        }

        let (num_verts, verts_per_frame, num_tex_verts, num_faces, num_frames) =
            stream.parse((le_i32, le_i32, le_i32, le_i32, le_i32))?;

        let tex_verts_per_frame = if version >= 2 {
            stream.read_i32()?
        } else {
            num_tex_verts
        };

        // before v3 every frame shares one scale and origin
        let shared = if version < 3 {
            Some((stream.read_vec3()?, stream.read_vec3()?))
        } else {
            None
        };

        let radius = stream.parse(le_f32)?;

        let verts = stream.read_count(packed_vertex, count_field(num_verts, "vertex count")?)?;
        let tex_verts = stream.read_count(
            vec2,
            count_field(num_tex_verts, "texture vertex count")?,
        )?;
        let faces = stream.read_count(face, count_field(num_faces, "face count")?)?;

        let num_frames = count_field(num_frames, "frame count")?;
        let frames = match shared {
            Some((scale, origin)) if num_frames == 0 => vec![Frame {
                first_vert: 0,
                scale,
                origin,
            }],
            Some((scale, origin)) => stream
                .read_count(le_i32, num_frames)?
                .into_iter()
                .map(|first_vert| Frame {
                    first_vert,
                    scale,
                    origin,
                })
                .collect(),
            None => stream.read_count(frame, num_frames)?,
        };

        debug!(
            "mesh v{version}: {} verts, {} faces, {} frames",
            verts.len(),
            faces.len(),
            frames.len()
        );

        Ok(Self {
            verts_per_frame,
            tex_verts_per_frame,
            radius,
            verts,
            tex_verts,
            faces,
            frames,
        })
    }

    /// Unpacked position of vertex `vert` in `frame`.
    pub fn vertex_position(&self, frame: usize, vert: usize) -> Option<Vec3> {
        let frame = self.frames.get(frame)?;
        let first = usize::try_from(frame.first_vert).ok()?;
        let v = self.verts.get(first + vert)?;

        Some(Vec3::new(v.x as f32, v.y as f32, v.z as f32) * frame.scale + frame.origin)
    }

    /// Splits the faces into per material primitives over de-duplicated
    /// (vertex, texture vertex) pairs and resolves where every frame lands in
    /// the emitted vertex buffer.
    pub fn prepare(&self) -> Result<MeshLayout, DecodeError> {
        let mut layout = MeshLayout::default();
        let mut current: Option<Prim> = None;
        let mut seen: HashMap<VertexIndexPair, u16> = HashMap::new();

        for face in &self.faces {
            if let Some(prim) = current.take_if(|prim| prim.material != face.material) {
                layout.prims.push(prim);
            }

            let prim = current.get_or_insert_with(|| {
                seen.clear();

                Prim {
                    start_index: layout.triangles.len() * 3,
                    index_count: 0,
                    vertex_count: 0,
                    material: face.material,
                }
            });

            let mut triangle = [0u16; 3];

            for (slot, pair) in triangle.iter_mut().zip(face.verts) {
                if let Some(&idx) = seen.get(&pair) {
                    *slot = idx;
                    continue;
                }

                let vertex = check_index(pair.vertex, self.verts.len(), "face vertex")?;
                let tex_vertex =
                    check_index(pair.tex_vertex, self.tex_verts.len(), "face texture vertex")?;

                let idx = u16::try_from(layout.vertex_map.len())
                    .ok()
                    .filter(|&idx| idx < u16::MAX)
                    .ok_or(DecodeError::InvalidReference {
                        what: "mesh vertex",
                        index: layout.vertex_map.len() as i64,
                        count: u16::MAX as usize,
                    })?;

                seen.insert(pair, idx);
                layout.vertex_map.push(vertex);
                layout.tex_vertex_map.push(tex_vertex);
                prim.vertex_count += 1;
                *slot = idx;
            }

            layout.triangles.push(triangle);
            prim.index_count += 3;
        }

        layout.prims.extend(current);

        let mut previous = None;
        let mut next_offset = 0u32;

        for frame in &self.frames {
            let offset = match previous {
                Some((first, offset)) if first == frame.first_vert => offset,
                _ => {
                    let offset = next_offset;
                    next_offset += layout.vertex_map.len() as u32;
                    offset
                }
            };

            previous = Some((frame.first_vert, offset));
            layout.frame_offsets.push(offset);
        }

        layout.tex_frame_count = if self.tex_verts_per_frame > 0 {
            (self.tex_verts.len() / self.tex_verts_per_frame as usize) as u32
        } else {
            1
        };

        Ok(layout)
    }
}

fn check_index(index: i32, count: usize, what: &'static str) -> Result<u32, DecodeError> {
    if index < 0 || index as usize >= count {
        return Err(DecodeError::InvalidReference {
            what,
            index: index as i64,
            count,
        });
    }

    Ok(index as u32)
}
