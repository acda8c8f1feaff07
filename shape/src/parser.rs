use glam::{Quat, Vec3};
use iff::{
    ByteStream, DecodeError, Registry,
    nom_helpers::{IResult, fixed_string, vec3},
};
use log::{debug, warn};
use nom::{
    Parser,
    bytes::complete::take,
    combinator::map,
    number::complete::{le_f32, le_i16, le_i32, le_u16, le_u32},
};

use crate::{
    ShapeParts,
    hierarchy::NodeHierarchy,
    material::MATERIAL_LIST_CLASS,
    mesh::MESH_CLASS,
    types::{
        Detail, FrameTrigger, Keyframe, KeyframeFlags, LATEST_SHAPE_VERSION, NAME_SIZE, Node,
        Object, ObjectFlags, Quat16, Sequence, Shape, SubSequence, Transform, Transition,
    },
};

pub const SHAPE_CLASS: &str = "TS::Shape";

// Keyframe bit packing before v3.
const KEYFRAME_VIS_V2: u32 = 1 << 31;
const KEYFRAME_VALID_V2: u32 = 1 << 30;
const KEYFRAME_KEY_MASK_V2: u32 = 0x3FFF_FFFF;

// Keyframe bit packing from v3 to v7.
const KEYFRAME_VIS_MATTERS_V7: u32 = 1 << 30;
const KEYFRAME_MAT_MATTERS_V7: u32 = 1 << 29;
const KEYFRAME_FRAME_MATTERS_V7: u32 = 1 << 28;
const KEYFRAME_MAT_MASK_V7: u32 = 0x0FFF_FFFF;

/// Object flags and a 3x3 rotation nobody reads, stored before v8.
const OBJECT_SKIP_V7: usize = 4 + 4 * 3 * 3;

fn node_v7(i: &[u8]) -> IResult<'_, Node> {
    map(
        (le_i32, le_i32, le_i32, le_i32, le_i32),
        |(name, parent, num_subsequences, first_subsequence, default_transform)| Node {
            name: name as i16,
            parent: parent as i16,
            num_subsequences: num_subsequences as i16,
            first_subsequence: first_subsequence as i16,
            default_transform: default_transform as i16,
        },
    )
    .parse(i)
}

fn node_v8(i: &[u8]) -> IResult<'_, Node> {
    map(
        (le_i16, le_i16, le_i16, le_i16, le_i16),
        |(name, parent, num_subsequences, first_subsequence, default_transform)| Node {
            name,
            parent,
            num_subsequences,
            first_subsequence,
            default_transform,
        },
    )
    .parse(i)
}

fn sequence_v3(i: &[u8]) -> IResult<'_, Sequence> {
    map(
        (le_i32, le_i32, le_f32, le_i32),
        |(name, cyclic, duration, priority)| Sequence {
            name,
            cyclic: cyclic != 0,
            duration,
            priority,
            first_trigger_frame: 0,
            num_trigger_frames: 0,
            num_ifl_subsequences: 0,
            first_ifl_subsequence: 0,
        },
    )
    .parse(i)
}

fn sequence_v4(i: &[u8]) -> IResult<'_, Sequence> {
    map(
        (sequence_v3, le_i32, le_i32),
        |(sequence, first_trigger_frame, num_trigger_frames)| Sequence {
            first_trigger_frame,
            num_trigger_frames,
            ..sequence
        },
    )
    .parse(i)
}

fn sequence_v5(i: &[u8]) -> IResult<'_, Sequence> {
    map(
        (sequence_v4, le_i32, le_i32),
        |(sequence, num_ifl_subsequences, first_ifl_subsequence)| Sequence {
            num_ifl_subsequences,
            first_ifl_subsequence,
            ..sequence
        },
    )
    .parse(i)
}

fn subsequence_v7(i: &[u8]) -> IResult<'_, SubSequence> {
    map(
        (le_i32, le_i32, le_i32),
        |(sequence_idx, num_keyframes, first_keyframe)| SubSequence {
            sequence_idx: sequence_idx as i16,
            num_keyframes: num_keyframes as i16,
            first_keyframe: first_keyframe as i16,
        },
    )
    .parse(i)
}

fn subsequence_v8(i: &[u8]) -> IResult<'_, SubSequence> {
    map(
        (le_i16, le_i16, le_i16),
        |(sequence_idx, num_keyframes, first_keyframe)| SubSequence {
            sequence_idx,
            num_keyframes,
            first_keyframe,
        },
    )
    .parse(i)
}

/// One word holds the key, a visibility bit and an inverted "valid" bit.
/// Every keyframe drives the mesh frame.
fn keyframe_v2(i: &[u8]) -> IResult<'_, Keyframe> {
    map((le_f32, le_u32), |(pos, packed)| {
        let mut flags = KeyframeFlags::FRAME_MATTERS;

        if packed & KEYFRAME_VALID_V2 == 0 {
            flags |= KeyframeFlags::VIS_MATTERS;
        }

        if packed & KEYFRAME_VIS_V2 != 0 {
            flags |= KeyframeFlags::VIS;
        }

        Keyframe {
            pos,
            key: (packed & KEYFRAME_KEY_MASK_V2) as u16,
            mat_index: flags.bits(),
        }
    })
    .parse(i)
}

fn keyframe_v7(i: &[u8]) -> IResult<'_, Keyframe> {
    map((le_f32, le_u32, le_u32), |(pos, key, packed)| {
        let mut flags = KeyframeFlags::empty();

        if packed & KEYFRAME_VIS_V2 != 0 {
            flags |= KeyframeFlags::VIS;
        }

        if packed & KEYFRAME_VIS_MATTERS_V7 != 0 {
            flags |= KeyframeFlags::VIS_MATTERS;
        }

        if packed & KEYFRAME_FRAME_MATTERS_V7 != 0 {
            flags |= KeyframeFlags::FRAME_MATTERS;
        }

        if packed & KEYFRAME_MAT_MATTERS_V7 != 0 {
            flags |= KeyframeFlags::MAT_MATTERS;
        }

        Keyframe {
            pos,
            key: key as u16,
            // the material index keeps whatever low bits survive the narrowing
            mat_index: (packed & KEYFRAME_MAT_MASK_V7) as u16 | flags.bits(),
        }
    })
    .parse(i)
}

fn keyframe_v8(i: &[u8]) -> IResult<'_, Keyframe> {
    map((le_f32, le_u16, le_u16), |(pos, key, mat_index)| Keyframe {
        pos,
        key,
        mat_index,
    })
    .parse(i)
}

fn quat16(i: &[u8]) -> IResult<'_, Quat16> {
    map((le_i16, le_i16, le_i16, le_i16), |(x, y, z, w)| Quat16 {
        x,
        y,
        z,
        w,
    })
    .parse(i)
}

/// Float quaternion, translation and an unused scale.
fn transform_v6(i: &[u8]) -> IResult<'_, Transform> {
    map(
        ((le_f32, le_f32, le_f32, le_f32), vec3, vec3),
        |((x, y, z, w), translation, _scale)| Transform {
            rotation: Quat16::from_quat(Quat::from_xyzw(x, y, z, w)),
            translation,
        },
    )
    .parse(i)
}

fn transform_v7(i: &[u8]) -> IResult<'_, Transform> {
    map((quat16, vec3, vec3), |(rotation, translation, _scale)| {
        Transform {
            rotation,
            translation,
        }
    })
    .parse(i)
}

fn transform_v8(i: &[u8]) -> IResult<'_, Transform> {
    map((quat16, vec3), |(rotation, translation)| Transform {
        rotation,
        translation,
    })
    .parse(i)
}

fn transform_parser(version: u32) -> fn(&[u8]) -> IResult<'_, Transform> {
    match version {
        0..=6 => transform_v6,
        7 => transform_v7,
        _ => transform_v8,
    }
}

fn object_v7(i: &[u8]) -> IResult<'_, Object> {
    map(
        (
            le_i16,
            le_u16,
            le_i32,
            le_i32,
            take(OBJECT_SKIP_V7),
            vec3,
            le_i32,
            le_i32,
        ),
        |(name, flags, mesh_index, node_index, _, offset, num_subsequences, first_subsequence)| {
            Object {
                name,
                flags: ObjectFlags::from_bits_retain(flags),
                mesh_index,
                node_index: node_index as i16,
                offset,
                num_subsequences: num_subsequences as i16,
                first_subsequence: first_subsequence as i16,
            }
        },
    )
    .parse(i)
}

fn object_v8(i: &[u8]) -> IResult<'_, Object> {
    map(
        (
            le_i16,
            le_u16,
            le_i32,
            le_i16,
            take(2usize),
            vec3,
            le_i16,
            le_i16,
        ),
        |(name, flags, mesh_index, node_index, _, offset, num_subsequences, first_subsequence)| {
            Object {
                name,
                flags: ObjectFlags::from_bits_retain(flags),
                mesh_index,
                node_index,
                offset,
                num_subsequences,
                first_subsequence,
            }
        },
    )
    .parse(i)
}

fn detail(i: &[u8]) -> IResult<'_, Detail> {
    map((le_i32, le_f32), |(root_node, size)| Detail { root_node, size }).parse(i)
}

fn transition(version: u32) -> impl Fn(&[u8]) -> IResult<'_, Transition> {
    move |i| {
        map(
            (
                le_i32,
                le_i32,
                le_f32,
                le_f32,
                le_f32,
                transform_parser(version),
            ),
            |(start_sequence, end_sequence, start_position, end_position, duration, transform)| {
                Transition {
                    start_sequence,
                    end_sequence,
                    start_position,
                    end_position,
                    duration,
                    transform,
                }
            },
        )
        .parse(i)
    }
}

fn frame_trigger(i: &[u8]) -> IResult<'_, FrameTrigger> {
    map((le_f32, le_i32), |(pos, value)| FrameTrigger { pos, value }).parse(i)
}

struct Counts {
    nodes: usize,
    sequences: usize,
    subsequences: usize,
    keyframes: usize,
    transforms: usize,
    names: usize,
    objects: usize,
    details: usize,
    meshes: usize,
    transitions: usize,
    frame_triggers: usize,
}

impl Counts {
    fn read(stream: &mut ByteStream, version: u32) -> Result<Self, DecodeError> {
        let mut next = || stream.read_u32().map(|n| n as usize);

        let nodes = next()?;
        let sequences = next()?;
        let subsequences = next()?;
        let keyframes = next()?;
        let transforms = next()?;
        let names = next()?;
        let objects = next()?;
        let details = next()?;
        let meshes = next()?;
        let transitions = if version >= 2 { next()? } else { 0 };
        let frame_triggers = if version >= 4 { next()? } else { 0 };

        Ok(Self {
            nodes,
            sequences,
            subsequences,
            keyframes,
            transforms,
            names,
            objects,
            details,
            meshes,
            transitions,
            frame_triggers,
        })
    }
}

impl Shape {
    /// Decodes a shape body. Nested meshes and the material list are decoded
    /// through `registry` and must come back as the matching kind.
    pub fn read<T: ShapeParts>(
        stream: &mut ByteStream,
        version: u32,
        registry: &Registry<T>,
    ) -> Result<Self, DecodeError> {
        if version > LATEST_SHAPE_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                format: SHAPE_CLASS,
                version,
            });
        }

        let counts = Counts::read(stream, version)?;

        let radius = stream.read_f32()?;
        let center = stream.read_vec3()?;

        let (bounds_min, bounds_max) = if version > 7 {
            (stream.read_vec3()?, stream.read_vec3()?)
        } else {
            (center - Vec3::splat(radius), center + Vec3::splat(radius))
        };

        debug!(
            "shape v{version}: {} nodes, {} sequences, {} objects, {} meshes",
            counts.nodes, counts.sequences, counts.objects, counts.meshes
        );

        let nodes = if version <= 7 {
            stream.read_count(node_v7, counts.nodes)?
        } else {
            stream.read_count(node_v8, counts.nodes)?
        };

        let sequences = match version {
            0..=3 => stream.read_count(sequence_v3, counts.sequences)?,
            4 => stream.read_count(sequence_v4, counts.sequences)?,
            _ => stream.read_count(sequence_v5, counts.sequences)?,
        };

        let subsequences = if version <= 7 {
            stream.read_count(subsequence_v7, counts.subsequences)?
        } else {
            stream.read_count(subsequence_v8, counts.subsequences)?
        };

        let keyframes = match version {
            0..=2 => stream.read_count(keyframe_v2, counts.keyframes)?,
            3..=7 => stream.read_count(keyframe_v7, counts.keyframes)?,
            _ => stream.read_count(keyframe_v8, counts.keyframes)?,
        };

        let transforms = stream.read_count(transform_parser(version), counts.transforms)?;
        let names = stream.read_count(fixed_string(NAME_SIZE), counts.names)?;

        let objects = if version <= 7 {
            stream.read_count(object_v7, counts.objects)?
        } else {
            stream.read_count(object_v8, counts.objects)?
        };

        let details = stream.read_count(detail, counts.details)?;
        let transitions = stream.read_count(transition(version), counts.transitions)?;
        let frame_triggers = stream.read_count(frame_trigger, counts.frame_triggers)?;

        let default_materials = if version >= 5 { stream.read_i32()? } else { 0 };
        let always_node = if version >= 6 { stream.read_i32()? } else { -1 };

        let mut meshes = vec![];
        for _ in 0..counts.meshes {
            let mesh = registry
                .create_from_stream(stream)?
                .into_mesh()
                .ok_or(DecodeError::UnexpectedObject {
                    expected: MESH_CLASS,
                })?;

            meshes.push(mesh);
        }

        let materials = if stream.read_u32()? != 0 {
            let materials = registry
                .create_from_stream(stream)?
                .into_material_list()
                .ok_or(DecodeError::UnexpectedObject {
                    expected: MATERIAL_LIST_CLASS,
                })?;

            Some(materials)
        } else {
            None
        };

        let hierarchy = NodeHierarchy::build(&nodes)?;

        let shape = Self {
            version,
            radius,
            center,
            bounds_min,
            bounds_max,
            nodes,
            sequences,
            subsequences,
            keyframes,
            transforms,
            names,
            objects,
            details,
            transitions,
            frame_triggers,
            default_materials,
            always_node,
            meshes,
            materials,
            hierarchy,
        };

        shape.validate()?;

        Ok(shape)
    }

    /// Checks every index the animation code follows.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.hierarchy != NodeHierarchy::build(&self.nodes)? {
            return Err(DecodeError::InvalidReference {
                what: "node hierarchy",
                index: self.hierarchy.len() as i64,
                count: self.nodes.len(),
            });
        }

        for node in &self.nodes {
            check_index(
                node.default_transform as i64,
                self.transforms.len(),
                "default transform",
            )?;

            check_slice(
                node.first_subsequence,
                node.num_subsequences,
                self.subsequences.len(),
                "node subsequence",
            )?;

            // node keys are transform indices
            for subsequence in &self.subsequences[node.subsequences()] {
                for keyframe in &self.keyframes[self.keyframe_range(subsequence)?] {
                    check_index(keyframe.key as i64, self.transforms.len(), "keyframe transform")?;
                }
            }
        }

        for object in &self.objects {
            if object.node_index != -1 {
                check_index(object.node_index as i64, self.nodes.len(), "object node")?;
            }

            if object.mesh_index != -1 {
                check_index(object.mesh_index as i64, self.meshes.len(), "object mesh")?;
            }

            check_slice(
                object.first_subsequence,
                object.num_subsequences,
                self.subsequences.len(),
                "object subsequence",
            )?;

            for subsequence in &self.subsequences[object.subsequences()] {
                self.keyframe_range(subsequence)?;
            }
        }

        for detail in &self.details {
            if detail.root_node != -1 {
                check_index(detail.root_node as i64, self.nodes.len(), "detail root")?;
            }
        }

        if self.always_node >= self.nodes.len() as i32 {
            warn!(
                "always node {} is outside the {} nodes, ignoring",
                self.always_node,
                self.nodes.len()
            );
        }

        Ok(())
    }

    fn keyframe_range(
        &self,
        subsequence: &SubSequence,
    ) -> Result<std::ops::Range<usize>, DecodeError> {
        check_slice(
            subsequence.first_keyframe,
            subsequence.num_keyframes,
            self.keyframes.len(),
            "subsequence keyframe",
        )?;

        Ok(subsequence.keyframes())
    }

    /// Case-insensitive name lookup.
    pub fn find_name(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|other| other.eq_ignore_ascii_case(name))
    }

    pub fn name(&self, idx: i32) -> Option<&str> {
        usize::try_from(idx)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .map(String::as_str)
    }

    pub fn find_sequence(&self, name: &str) -> Option<usize> {
        let name = self.find_name(name)? as i32;

        self.sequences.iter().position(|seq| seq.name == name)
    }

    pub fn find_node(&self, name: &str) -> Option<usize> {
        let name = self.find_name(name)? as i16;

        self.nodes.iter().position(|node| node.name == name)
    }

    /// Node the always-drawn set hangs off, if it points at a real node.
    pub fn always_node(&self) -> Option<usize> {
        usize::try_from(self.always_node)
            .ok()
            .filter(|&node| node < self.nodes.len())
    }
}

fn check_index(index: i64, count: usize, what: &'static str) -> Result<(), DecodeError> {
    if index < 0 || index >= count as i64 {
        return Err(DecodeError::InvalidReference { what, index, count });
    }

    Ok(())
}

/// Slices with no entries may point anywhere.
fn check_slice(first: i16, num: i16, count: usize, what: &'static str) -> Result<(), DecodeError> {
    if num <= 0 {
        return Ok(());
    }

    check_index(first as i64, count, what)?;
    check_index(first as i64 + num as i64 - 1, count, what)
}
