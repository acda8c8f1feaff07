use std::f32::consts::FRAC_PI_2;

use bitflags::bitflags;
use cgmath::{Matrix4, One, SquareMatrix, Vector3, Zero};
use log::debug;
use shape::{KeyframeFlags, ObjectFlags, Shape};

use crate::{
    error::AnimationError,
    math::{build_transform, compose, lerp_posrot, to_posrot, to_vector},
    sample::{bracket, latch},
    thread::{Advance, Thread, ThreadId},
};

/// Projected size used when the camera sits on the shape.
const CLOSEST_SIZE: f32 = 1000.;

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct NodeVisibility: u8 {
        const VISIBLE = 0x1;
        /// Hidden by a visibility keyframe, along with everything below it.
        const FORCE_HIDDEN = 0x2;
    }
}

/// Latched draw state of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectState {
    pub visible: bool,
    pub mesh_frame: u32,
    pub material_frame: u32,
    /// Keyframe the last track scan stopped at, `None` until the object is next animated.
    last_keyframe: Option<usize>,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            visible: true,
            mesh_frame: 0,
            material_frame: 0,
            last_keyframe: None,
        }
    }
}

impl ObjectState {
    pub fn last_keyframe(&self) -> Option<usize> {
        self.last_keyframe
    }
}

/// What a renderer needs to draw one object this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectDraw {
    pub object: usize,
    pub mesh_frame: u32,
    pub material_frame: u32,
    pub visible: bool,
}

/// Apparent size of a shape in pixels for a viewport.
pub fn projected_size(radius: f32, distance: f32, width: u32, height: u32) -> f32 {
    if distance <= 0. {
        return CLOSEST_SIZE;
    }

    (radius / distance).atan() * width.max(height) as f32 / FRAC_PI_2
}

/// Runtime state for playing back one [`Shape`].
#[derive(Debug, Clone)]
pub struct ShapeInstance<'a> {
    shape: &'a Shape,
    threads: Vec<Thread>,
    node_transforms: Vec<Matrix4<f32>>,
    node_visibility: Vec<NodeVisibility>,
    objects: Vec<ObjectState>,
    /// Objects hanging off the always node.
    always_objects: Vec<usize>,
    /// Objects hanging off each detail's root node.
    detail_objects: Vec<Vec<usize>>,
    current_detail: Option<usize>,
    cache_resets: u64,
}

impl<'a> ShapeInstance<'a> {
    /// Checks the shape and poses it with its default transforms.
    pub fn new(shape: &'a Shape) -> Result<Self, AnimationError> {
        shape.validate()?;

        let always_objects = shape
            .always_node()
            .map(|node| objects_under(shape, node))
            .unwrap_or_default();

        let detail_objects = shape
            .details
            .iter()
            .map(|detail| {
                node_index(shape, detail.root_node)
                    .map(|root| objects_under(shape, root))
                    .unwrap_or_default()
            })
            .collect();

        let mut res = Self {
            shape,
            threads: vec![],
            node_transforms: vec![Matrix4::identity(); shape.nodes.len()],
            node_visibility: vec![NodeVisibility::empty(); shape.nodes.len()],
            objects: vec![ObjectState::default(); shape.objects.len()],
            always_objects,
            detail_objects,
            current_detail: (!shape.details.is_empty()).then_some(0),
            cache_resets: 0,
        };

        res.animate();

        Ok(res)
    }

    pub fn shape(&self) -> &'a Shape {
        self.shape
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id)
    }

    fn thread_mut(&mut self, id: ThreadId) -> Result<&mut Thread, AnimationError> {
        self.threads
            .get_mut(id)
            .ok_or(AnimationError::UnknownThread(id))
    }

    /// New stopped thread with no sequence.
    pub fn add_thread(&mut self) -> ThreadId {
        self.threads.push(Thread::new(self.shape));
        self.threads.len() - 1
    }

    /// Starts `sequence` from the beginning, or stops the thread with `None`.
    pub fn set_thread_sequence(
        &mut self,
        id: ThreadId,
        sequence: Option<usize>,
    ) -> Result<(), AnimationError> {
        let shape = self.shape;

        if let Some(index) = sequence.filter(|&index| index >= shape.sequences.len()) {
            return Err(AnimationError::UnknownSequence {
                index,
                count: shape.sequences.len(),
            });
        }

        self.thread_mut(id)?.set_sequence(shape, sequence);
        self.reset_object_caches(1);

        debug!("thread {id} now plays {sequence:?}");

        Ok(())
    }

    /// Threads after `id` move down by one.
    pub fn remove_thread(&mut self, id: ThreadId) -> Result<Thread, AnimationError> {
        if id >= self.threads.len() {
            return Err(AnimationError::UnknownThread(id));
        }

        Ok(self.threads.remove(id))
    }

    /// Disabled threads keep their position but stop affecting nodes and objects.
    pub fn set_thread_enabled(&mut self, id: ThreadId, enabled: bool) -> Result<(), AnimationError> {
        self.thread_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Moves every playing thread forward by `dt` seconds.
    pub fn advance_threads(&mut self, dt: f32) {
        let shape = self.shape;

        let wraps = self
            .threads
            .iter_mut()
            .map(|thread| match thread.advance(shape, dt) {
                Advance::Wrapped(count) => count,
                _ => 0,
            })
            .fold(0u64, u64::saturating_add);

        // objects latch again from the start of their tracks after a wrap
        if wraps > 0 {
            self.reset_object_caches(wraps);
        }
    }

    /// Drops every object keyframe cache, counting it as `times` resets.
    fn reset_object_caches(&mut self, times: u64) {
        self.objects
            .iter_mut()
            .for_each(|state| state.last_keyframe = None);

        self.cache_resets = self.cache_resets.saturating_add(times);
    }

    /// How many times object keyframe caches were dropped.
    pub fn cache_resets(&self) -> u64 {
        self.cache_resets
    }

    /// Picks the last detail whose size threshold the projected size reaches,
    /// falling back to the first one. Applies on the next [`Self::animate`].
    pub fn select_detail(&mut self, distance: f32, width: u32, height: u32) -> Option<usize> {
        let size = projected_size(self.shape.radius, distance, width, height);

        self.current_detail = if self.shape.details.is_empty() {
            None
        } else {
            Some(
                self.shape
                    .details
                    .iter()
                    .rposition(|detail| detail.size <= size)
                    .unwrap_or(0),
            )
        };

        self.current_detail
    }

    pub fn current_detail(&self) -> Option<usize> {
        self.current_detail
    }

    fn current_detail_root(&self) -> Option<usize> {
        let detail = self.shape.details.get(self.current_detail?)?;
        node_index(self.shape, detail.root_node)
    }

    /// Evaluates node transforms, object tracks and visibility for the
    /// always node and the current detail at the threads' positions.
    pub fn animate(&mut self) {
        let shape = self.shape;

        if let Some(always) = shape.always_node() {
            self.animate_node_tree(always);
            animate_objects(shape, &self.threads, &mut self.objects, &self.always_objects);
        }

        if let Some(root) = self.current_detail_root() {
            self.animate_node_tree(root);
        }

        if let Some(set) = self
            .current_detail
            .and_then(|detail| self.detail_objects.get(detail))
        {
            animate_objects(shape, &self.threads, &mut self.objects, set);
        }

        self.update_visibility();
    }

    // parents come before their children in the traversal
    fn animate_node_tree(&mut self, root: usize) {
        let shape = self.shape;

        for node in shape.hierarchy.descendants(root) {
            let local = self.local_transform(node);

            let parent = usize::try_from(shape.nodes[node].parent)
                .ok()
                .and_then(|parent| self.node_transforms.get(parent).copied());

            self.node_transforms[node] = match parent {
                Some(parent) => compose(&parent, &local),
                None => local,
            };
        }
    }

    /// Default transform, overridden by every thread with a track on the node
    /// in thread order.
    fn local_transform(&mut self, node: usize) -> Matrix4<f32> {
        let shape = self.shape;
        let visibility = &mut self.node_visibility[node];

        visibility.remove(NodeVisibility::FORCE_HIDDEN);

        let default = usize::try_from(shape.nodes[node].default_transform)
            .ok()
            .and_then(|idx| shape.transforms.get(idx))
            .map(to_posrot)
            .unwrap_or((Vector3::zero(), cgmath::Quaternion::one()));

        let mut res = build_transform(default);

        for thread in &self.threads {
            let Some(sequence) = thread
                .active_sequence()
                .and_then(|idx| shape.sequences.get(idx))
            else {
                continue;
            };

            let Some(track) = thread
                .node_track(node)
                .and_then(|idx| shape.subsequences.get(idx))
                .and_then(|sub| shape.keyframes.get(sub.keyframes()))
            else {
                continue;
            };

            let Some(span) = bracket(track, sequence.cyclic, thread.pos) else {
                continue;
            };

            let (a, b) = (track[span.prev], track[span.next]);
            let flags = a.flags();

            if flags.contains(KeyframeFlags::VIS_MATTERS) {
                visibility.set(
                    NodeVisibility::FORCE_HIDDEN,
                    !flags.contains(KeyframeFlags::VIS),
                );
            }

            let (Some(from), Some(to)) = (
                shape.transforms.get(a.key as usize),
                shape.transforms.get(b.key as usize),
            ) else {
                continue;
            };

            res = if a.key == b.key {
                build_transform(to_posrot(from))
            } else {
                build_transform(lerp_posrot(to_posrot(from), to_posrot(to), span.t))
            };
        }

        res
    }

    fn update_visibility(&mut self) {
        self.node_visibility
            .iter_mut()
            .for_each(|visibility| *visibility &= NodeVisibility::FORCE_HIDDEN);

        if let Some(always) = self.shape.always_node() {
            self.node_visibility[always] = NodeVisibility::VISIBLE;
            self.propagate_visibility(always);
        }

        if let Some(root) = self.current_detail_root() {
            self.propagate_visibility(root);
        }
    }

    // a force hidden node hides its whole subtree
    fn propagate_visibility(&mut self, root: usize) {
        let mut stack = vec![(root, true)];

        while let Some((node, parent_visible)) = stack.pop() {
            let visibility = &mut self.node_visibility[node];
            let visible = parent_visible && !visibility.contains(NodeVisibility::FORCE_HIDDEN);

            if visible {
                visibility.insert(NodeVisibility::VISIBLE);
            }

            stack.extend(
                self.shape
                    .hierarchy
                    .children(node)
                    .iter()
                    .rev()
                    .map(|&child| (child, visible)),
            );
        }
    }

    pub fn node_transform(&self, node: usize) -> Option<Matrix4<f32>> {
        self.node_transforms.get(node).copied()
    }

    pub fn node_visible(&self, node: usize) -> bool {
        self.node_visibility
            .get(node)
            .is_some_and(|visibility| visibility.contains(NodeVisibility::VISIBLE))
    }

    /// World transform of every visible node.
    pub fn visible_nodes(&self) -> impl Iterator<Item = (usize, Matrix4<f32>)> + '_ {
        self.node_transforms
            .iter()
            .enumerate()
            .filter(|&(node, _)| self.node_visible(node))
            .map(|(node, transform)| (node, *transform))
    }

    pub fn object_state(&self, object: usize) -> Option<&ObjectState> {
        self.objects.get(object)
    }

    /// Objects of the always node followed by those of the current detail.
    pub fn active_objects(&self) -> impl Iterator<Item = usize> + '_ {
        let always = self
            .shape
            .always_node()
            .map(|_| self.always_objects.as_slice())
            .unwrap_or_default();

        let detail = self
            .current_detail
            .and_then(|detail| self.detail_objects.get(detail))
            .map(Vec::as_slice)
            .unwrap_or_default();

        always.iter().chain(detail).copied()
    }

    /// Draw state of every active object. Mesh frames past the end of the
    /// mesh fall back to frame 0.
    pub fn object_draws(&self) -> Vec<ObjectDraw> {
        self.active_objects()
            .filter_map(|object| {
                let info = self.shape.objects.get(object)?;
                let state = self.objects.get(object)?;

                let mesh = usize::try_from(info.mesh_index)
                    .ok()
                    .and_then(|mesh| self.shape.meshes.get(mesh));

                let mut mesh_frame = state.mesh_frame;

                if mesh.is_some_and(|mesh| mesh_frame as usize >= mesh.frames.len()) {
                    debug!("object {object} mesh frame {mesh_frame} is invalid");
                    mesh_frame = 0;
                }

                let node_visible = usize::try_from(info.node_index)
                    .is_ok_and(|node| self.node_visible(node));

                Some(ObjectDraw {
                    object,
                    mesh_frame,
                    material_frame: state.material_frame,
                    visible: state.visible && node_visible && mesh.is_some(),
                })
            })
            .collect()
    }

    /// Node transform followed by the object's offset.
    pub fn object_transform(&self, object: usize) -> Option<Matrix4<f32>> {
        let info = self.shape.objects.get(object)?;
        let node = self.node_transform(usize::try_from(info.node_index).ok()?)?;

        Some(node * Matrix4::from_translation(to_vector(info.offset)))
    }
}

fn node_index(shape: &Shape, node: i32) -> Option<usize> {
    usize::try_from(node)
        .ok()
        .filter(|&node| node < shape.nodes.len())
}

/// Objects attached anywhere in the subtree of `root`, in object order.
fn objects_under(shape: &Shape, root: usize) -> Vec<usize> {
    let mut in_tree = vec![false; shape.nodes.len()];

    for node in shape.hierarchy.descendants(root) {
        in_tree[node] = true;
    }

    shape
        .objects
        .iter()
        .enumerate()
        .filter(|(_, object)| {
            usize::try_from(object.node_index)
                .ok()
                .is_some_and(|node| in_tree.get(node) == Some(&true))
        })
        .map(|(idx, _)| idx)
        .collect()
}

fn animate_objects(
    shape: &Shape,
    threads: &[Thread],
    states: &mut [ObjectState],
    set: &[usize],
) {
    for &object in set {
        let (Some(info), Some(state)) = (shape.objects.get(object), states.get_mut(object)) else {
            continue;
        };

        let mut cursor = match state.last_keyframe {
            Some(cursor) => cursor,
            None => {
                state.visible = !info.flags.contains(ObjectFlags::INVISIBLE_DEFAULT);
                state.mesh_frame = 0;
                state.material_frame = 0;
                0
            }
        };

        for thread in threads {
            if thread
                .active_sequence()
                .and_then(|idx| shape.sequences.get(idx))
                .is_none()
            {
                continue;
            }

            let Some(sub) = thread
                .object_track(shape.nodes.len(), object)
                .and_then(|idx| shape.subsequences.get(idx))
            else {
                continue;
            };

            let latched = latch(&shape.keyframes, sub.keyframes(), &mut cursor, thread.pos);

            if let Some(visible) = latched.visible {
                state.visible = visible;
            }

            if let Some(frame) = latched.mesh_frame {
                state.mesh_frame = frame;
            }

            if let Some(frame) = latched.material_frame {
                state.material_frame = frame;
            }
        }

        state.last_keyframe = Some(cursor);
    }
}
