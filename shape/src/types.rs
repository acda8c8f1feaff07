use std::ops::Range;

use bitflags::bitflags;
use glam::{Quat, Vec3};

use crate::{hierarchy::NodeHierarchy, material::MaterialList, mesh::CelAnimMesh};

pub const NAME_SIZE: usize = 24;
/// Newest shape layout this crate reads.
pub const LATEST_SHAPE_VERSION: u32 = 8;

/// Low bits of [`Keyframe::mat_index`] carrying the material frame.
pub const KEYFRAME_MAT_MASK: u16 = 0x0FFF;

bitflags! {
    /// High bits of [`Keyframe::mat_index`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyframeFlags: u16 {
        const FRAME_MATTERS = 1 << 12;
        const MAT_MATTERS = 1 << 13;
        const VIS_MATTERS = 1 << 14;
        const VIS = 1 << 15;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u16 {
        const INVISIBLE_DEFAULT = 0x1;
    }
}

/// Quaternion with every component stored as `value * 0x7fff`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quat16 {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub w: i16,
}

impl Quat16 {
    pub const MAX_VAL: f32 = 32767.;

    pub fn from_quat(q: Quat) -> Self {
        Self {
            x: (q.x * Self::MAX_VAL) as i16,
            y: (q.y * Self::MAX_VAL) as i16,
            z: (q.z * Self::MAX_VAL) as i16,
            w: (q.w * Self::MAX_VAL) as i16,
        }
    }

    /// Not renormalised.
    pub fn to_quat(self) -> Quat {
        Quat::from_xyzw(
            self.x as f32 / Self::MAX_VAL,
            self.y as f32 / Self::MAX_VAL,
            self.z as f32 / Self::MAX_VAL,
            self.w as f32 / Self::MAX_VAL,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rotation: Quat16,
    pub translation: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Normalised position inside the sequence, `0..=1`.
    pub pos: f32,
    /// Transform index for node tracks, mesh frame for object tracks.
    pub key: u16,
    pub mat_index: u16,
}

impl Keyframe {
    pub fn flags(&self) -> KeyframeFlags {
        KeyframeFlags::from_bits_truncate(self.mat_index)
    }

    pub fn material_frame(&self) -> u16 {
        self.mat_index & KEYFRAME_MAT_MASK
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sequence {
    pub name: i32,
    pub cyclic: bool,
    /// Seconds.
    pub duration: f32,
    pub priority: i32,
    pub first_trigger_frame: i32,
    pub num_trigger_frames: i32,
    pub num_ifl_subsequences: i32,
    pub first_ifl_subsequence: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubSequence {
    pub sequence_idx: i16,
    pub num_keyframes: i16,
    pub first_keyframe: i16,
}

impl SubSequence {
    pub fn keyframes(&self) -> Range<usize> {
        slice_range(self.first_keyframe as i32, self.num_keyframes as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub name: i16,
    /// `-1` for roots.
    pub parent: i16,
    pub num_subsequences: i16,
    pub first_subsequence: i16,
    pub default_transform: i16,
}

impl Node {
    pub fn subsequences(&self) -> Range<usize> {
        slice_range(self.first_subsequence as i32, self.num_subsequences as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Object {
    pub name: i16,
    pub flags: ObjectFlags,
    /// `-1` when the object draws nothing.
    pub mesh_index: i32,
    pub node_index: i16,
    /// Relative to the attached node.
    pub offset: Vec3,
    pub num_subsequences: i16,
    pub first_subsequence: i16,
}

impl Object {
    pub fn subsequences(&self) -> Range<usize> {
        slice_range(self.first_subsequence as i32, self.num_subsequences as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detail {
    pub root_node: i32,
    /// Smallest projected size this detail is meant for.
    pub size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub start_sequence: i32,
    pub end_sequence: i32,
    pub start_position: f32,
    pub end_position: f32,
    pub duration: f32,
    pub transform: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTrigger {
    pub pos: f32,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub version: u32,
    pub radius: f32,
    pub center: Vec3,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub nodes: Vec<Node>,
    pub sequences: Vec<Sequence>,
    pub subsequences: Vec<SubSequence>,
    pub keyframes: Vec<Keyframe>,
    pub transforms: Vec<Transform>,
    pub names: Vec<String>,
    pub objects: Vec<Object>,
    pub details: Vec<Detail>,
    pub transitions: Vec<Transition>,
    pub frame_triggers: Vec<FrameTrigger>,
    pub default_materials: i32,
    /// Node animated and drawn regardless of the selected detail, `-1` for none.
    pub always_node: i32,
    pub meshes: Vec<CelAnimMesh>,
    pub materials: Option<MaterialList>,
    pub hierarchy: NodeHierarchy,
}

/// Empty when the stored count is not positive.
fn slice_range(first: i32, num: i32) -> Range<usize> {
    if num <= 0 || first < 0 {
        return 0..0;
    }

    first as usize..first as usize + num as usize
}
