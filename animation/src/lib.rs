//! Playback of shape sequences: threads stepping through sequences, node
//! transforms sampled from keyframes and composed down the hierarchy, latched
//! object tracks and detail selection.
mod error;
mod instance;
pub mod math;
mod sample;
mod thread;

pub use error::AnimationError;
pub use instance::{projected_size, NodeVisibility, ObjectDraw, ObjectState, ShapeInstance};
pub use thread::{Thread, ThreadId, ThreadState};

#[cfg(test)]
mod test {
    use std::f32::consts::FRAC_PI_2;

    use cgmath::{InnerSpace, Quaternion, Vector3};
    use glam::{Quat, Vec3};
    use iff::DecodeError;
    use shape::{
        CelAnimMesh, Detail, Frame, Keyframe, KeyframeFlags, Node, NodeHierarchy, Object,
        ObjectFlags, Quat16, Sequence, Shape, SubSequence, Transform,
    };

    use super::*;
    use crate::{
        math::{interpolate_rotation, rotation_matrix},
        sample::{bracket, latch},
    };

    fn transform(rotation: Quat, translation: Vec3) -> Transform {
        Transform {
            rotation: Quat16::from_quat(rotation),
            translation,
        }
    }

    fn keyframe(pos: f32, key: u16, flags: KeyframeFlags, material: u16) -> Keyframe {
        Keyframe {
            pos,
            key,
            mat_index: flags.bits() | material,
        }
    }

    fn subsequence(first_keyframe: i16, num_keyframes: i16) -> SubSequence {
        SubSequence {
            sequence_idx: 0,
            num_keyframes,
            first_keyframe,
        }
    }

    fn node(parent: i16, default_transform: i16, first: i16, num: i16) -> Node {
        Node {
            name: -1,
            parent,
            num_subsequences: num,
            first_subsequence: first,
            default_transform,
        }
    }

    // Node 0 is the root of nodes 1 and 2. Object 0 sits on node 1 and
    // object 1 on node 2. Node 2 gets hidden by its track.
    fn test_shape(cyclic: bool) -> Shape {
        let nodes = vec![node(-1, 0, 0, 1), node(0, 1, 0, 0), node(0, 1, 2, 1)];
        let hierarchy = NodeHierarchy::build(&nodes).unwrap();

        let all = KeyframeFlags::FRAME_MATTERS
            | KeyframeFlags::MAT_MATTERS
            | KeyframeFlags::VIS_MATTERS
            | KeyframeFlags::VIS;

        Shape {
            version: 8,
            radius: 10.,
            center: Vec3::ZERO,
            bounds_min: Vec3::splat(-10.),
            bounds_max: Vec3::splat(10.),
            nodes,
            sequences: vec![Sequence {
                name: 0,
                cyclic,
                duration: 2.,
                priority: 0,
                first_trigger_frame: 0,
                num_trigger_frames: 0,
                num_ifl_subsequences: 0,
                first_ifl_subsequence: 0,
            }],
            subsequences: vec![subsequence(0, 2), subsequence(2, 3), subsequence(5, 1)],
            keyframes: vec![
                keyframe(0., 2, KeyframeFlags::empty(), 0),
                keyframe(0.5, 3, KeyframeFlags::empty(), 0),
                keyframe(0., 1, all, 2),
                keyframe(0.5, 3, KeyframeFlags::FRAME_MATTERS, 0),
                keyframe(0.75, 0, KeyframeFlags::VIS_MATTERS, 0),
                keyframe(0., 1, KeyframeFlags::VIS_MATTERS, 0),
            ],
            transforms: vec![
                transform(Quat::from_rotation_z(FRAC_PI_2), Vec3::Z),
                transform(Quat::IDENTITY, Vec3::X),
                transform(Quat::IDENTITY, Vec3::ZERO),
                transform(Quat::IDENTITY, Vec3::new(2., 0., 0.)),
            ],
            names: vec!["walk".to_string()],
            objects: vec![
                Object {
                    name: -1,
                    flags: ObjectFlags::INVISIBLE_DEFAULT,
                    mesh_index: 0,
                    node_index: 1,
                    offset: Vec3::new(0., 0., 2.),
                    num_subsequences: 1,
                    first_subsequence: 1,
                },
                Object {
                    name: -1,
                    flags: ObjectFlags::empty(),
                    mesh_index: -1,
                    node_index: 2,
                    offset: Vec3::ZERO,
                    num_subsequences: 0,
                    first_subsequence: 0,
                },
            ],
            details: vec![
                Detail {
                    root_node: 0,
                    size: 5.,
                },
                Detail {
                    root_node: 1,
                    size: 50.,
                },
            ],
            transitions: vec![],
            frame_triggers: vec![],
            default_materials: 0,
            always_node: -1,
            meshes: vec![CelAnimMesh {
                verts_per_frame: 0,
                tex_verts_per_frame: 0,
                radius: 1.,
                verts: vec![],
                tex_verts: vec![],
                faces: vec![],
                frames: vec![
                    Frame {
                        first_vert: 0,
                        scale: Vec3::ONE,
                        origin: Vec3::ZERO,
                    };
                    2
                ],
            }],
            materials: None,
            hierarchy,
        }
    }

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-3
    }

    fn translation(instance: &ShapeInstance, node: usize) -> Vector3<f32> {
        instance.node_transform(node).unwrap().w.truncate()
    }

    fn playing(shape: &Shape) -> (ShapeInstance<'_>, ThreadId) {
        let mut instance = ShapeInstance::new(shape).unwrap();
        let thread = instance.add_thread();
        instance.set_thread_sequence(thread, Some(0)).unwrap();

        (instance, thread)
    }

    #[test]
    fn cyclic_thread_wraps() {
        let shape = test_shape(true);
        let (mut instance, thread) = playing(&shape);
        let resets = instance.cache_resets();

        for _ in 0..4 {
            instance.advance_threads(1.);
        }

        let state = instance.thread(thread).unwrap();
        assert_eq!(state.pos, 0.);
        assert_eq!(state.state, ThreadState::Playing);
        assert_eq!(instance.cache_resets() - resets, 2);

        instance.advance_threads(4.);
        assert_eq!(instance.thread(thread).unwrap().pos, 0.);
        assert_eq!(instance.cache_resets() - resets, 4);
    }

    #[test]
    fn huge_steps_wrap_without_overflow() {
        let mut shape = test_shape(true);
        shape.sequences[0].duration = 1e-6;

        let (mut instance, first) = playing(&shape);
        let second = instance.add_thread();
        instance.set_thread_sequence(second, Some(0)).unwrap();
        let resets = instance.cache_resets();

        instance.advance_threads(1e6);

        for thread in [first, second] {
            let state = instance.thread(thread).unwrap();
            assert_eq!(state.state, ThreadState::Playing);
            assert!((0. ..1.).contains(&state.pos));
        }

        assert!(instance.cache_resets() - resets > u32::MAX as u64);

        // the caches are dropped once, so objects latch again from the first keyframe
        instance.animate();
        assert_eq!(instance.object_state(0).unwrap().last_keyframe(), Some(2));
    }

    #[test]
    fn non_cyclic_thread_stops() {
        let shape = test_shape(false);
        let (mut instance, thread) = playing(&shape);

        instance.advance_threads(3.);

        let state = instance.thread(thread).unwrap();
        assert_eq!(state.state, ThreadState::Stopped);
        assert_eq!(state.pos, 1.);

        instance.advance_threads(1.);
        assert_eq!(instance.thread(thread).unwrap().pos, 1.);
    }

    #[test]
    fn stopped_threads_stay_put() {
        let shape = test_shape(true);
        let mut instance = ShapeInstance::new(&shape).unwrap();
        let thread = instance.add_thread();

        instance.advance_threads(1.);

        let state = instance.thread(thread).unwrap();
        assert_eq!(state.state, ThreadState::Stopped);
        assert_eq!(state.pos, 0.);
    }

    #[test]
    fn detail_selection() {
        let shape = test_shape(true);
        let mut instance = ShapeInstance::new(&shape).unwrap();

        assert_eq!(instance.current_detail(), Some(0));
        assert_eq!(projected_size(10., 0., 800, 600), 1000.);

        assert_eq!(instance.select_detail(0., 800, 600), Some(1));
        assert_eq!(instance.select_detail(100., 800, 600), Some(1));
        assert_eq!(instance.select_detail(1000., 800, 600), Some(0));
        // nothing qualifies
        assert_eq!(instance.select_detail(10000., 800, 600), Some(0));
    }

    #[test]
    fn detail_selects_object_set() {
        let shape = test_shape(true);
        let mut instance = ShapeInstance::new(&shape).unwrap();

        assert_eq!(instance.active_objects().collect::<Vec<_>>(), vec![0, 1]);

        instance.select_detail(0., 800, 600);
        instance.animate();

        assert_eq!(instance.active_objects().collect::<Vec<_>>(), vec![0]);
        assert!(instance.node_visible(1));
        assert!(!instance.node_visible(0));
    }

    #[test]
    fn default_pose_composes_down_the_hierarchy() {
        let shape = test_shape(true);
        let instance = ShapeInstance::new(&shape).unwrap();

        assert!(close(translation(&instance, 0), Vector3::unit_z()));
        // the stored root rotation maps x onto -y
        assert!(close(translation(&instance, 1), Vector3::new(0., -1., 1.)));

        let child = instance.node_transform(1).unwrap();
        assert!(close(child.x.truncate(), Vector3::new(0., -1., 0.)));
        assert!(close(child.z.truncate(), Vector3::unit_z()));

        let object = instance.object_transform(0).unwrap();
        assert!(close(object.w.truncate(), Vector3::new(0., -1., 3.)));
    }

    #[test]
    fn node_tracks_interpolate() {
        let shape = test_shape(true);
        let (mut instance, _) = playing(&shape);

        instance.advance_threads(0.5);
        instance.animate();

        assert!(close(translation(&instance, 0), Vector3::unit_x()));
        assert!(close(translation(&instance, 1), Vector3::new(2., 0., 0.)));

        // last keyframe back around to the first
        instance.advance_threads(1.);
        instance.animate();

        assert!(close(translation(&instance, 0), Vector3::unit_x()));
    }

    #[test]
    fn non_cyclic_track_holds_last_keyframe() {
        let shape = test_shape(false);
        let (mut instance, _) = playing(&shape);

        instance.advance_threads(1.5);
        instance.animate();

        assert!(close(translation(&instance, 0), Vector3::new(2., 0., 0.)));
    }

    #[test]
    fn later_threads_override_earlier() {
        let shape = test_shape(true);
        let (mut instance, first) = playing(&shape);

        instance.advance_threads(0.5);

        let second = instance.add_thread();
        instance.set_thread_sequence(second, Some(0)).unwrap();
        instance.animate();

        assert!(close(translation(&instance, 0), Vector3::new(0., 0., 0.)));

        instance.set_thread_enabled(second, false).unwrap();
        instance.animate();
        assert!(close(translation(&instance, 0), Vector3::unit_x()));

        instance.set_thread_enabled(first, false).unwrap();
        instance.animate();
        assert!(close(translation(&instance, 0), Vector3::unit_z()));
    }

    #[test]
    fn objects_latch_track_values() {
        let shape = test_shape(true);
        let mut instance = ShapeInstance::new(&shape).unwrap();

        let state = instance.object_state(0).unwrap();
        assert!(!state.visible);
        assert_eq!(state.mesh_frame, 0);

        let thread = instance.add_thread();
        instance.set_thread_sequence(thread, Some(0)).unwrap();
        instance.animate();

        let state = instance.object_state(0).unwrap();
        assert!(state.visible);
        assert_eq!(state.mesh_frame, 1);
        assert_eq!(state.material_frame, 2);

        instance.advance_threads(1.);
        instance.animate();

        let state = instance.object_state(0).unwrap();
        assert!(state.visible);
        assert_eq!(state.mesh_frame, 3);
        assert_eq!(state.material_frame, 2);

        // the mesh only has two frames
        assert_eq!(
            instance.object_draws()[0],
            ObjectDraw {
                object: 0,
                mesh_frame: 0,
                material_frame: 2,
                visible: true,
            }
        );

        instance.advance_threads(0.5);
        instance.animate();

        let state = instance.object_state(0).unwrap();
        assert!(!state.visible);
        assert_eq!(state.mesh_frame, 3);
    }

    #[test]
    fn visibility_keyframes_hide_subtrees() {
        let shape = test_shape(true);
        let (mut instance, thread) = playing(&shape);

        instance.animate();

        assert!(instance.node_visible(0));
        assert!(instance.node_visible(1));
        assert!(!instance.node_visible(2));
        assert_eq!(instance.visible_nodes().count(), 2);

        let hidden = instance.object_draws()[1];
        assert_eq!(hidden.object, 1);
        assert!(!hidden.visible);

        instance.set_thread_enabled(thread, false).unwrap();
        instance.animate();

        assert!(instance.node_visible(2));
    }

    #[test]
    fn thread_bookkeeping() {
        let shape = test_shape(true);
        let mut instance = ShapeInstance::new(&shape).unwrap();

        let first = instance.add_thread();
        let second = instance.add_thread();
        instance.set_thread_sequence(second, Some(0)).unwrap();

        assert_eq!(
            instance.set_thread_sequence(first, Some(9)),
            Err(AnimationError::UnknownSequence { index: 9, count: 1 })
        );

        instance.remove_thread(first).unwrap();

        assert_eq!(instance.threads().len(), 1);
        assert_eq!(instance.thread(0).unwrap().sequence, Some(0));
        assert_eq!(instance.thread(0).unwrap().node_track(0), Some(0));
        assert_eq!(instance.thread(0).unwrap().node_track(1), None);
        assert_eq!(instance.thread(0).unwrap().object_track(3, 0), Some(1));

        assert_eq!(
            instance.remove_thread(5).map(|_| ()),
            Err(AnimationError::UnknownThread(5))
        );

        instance.set_thread_sequence(0, None).unwrap();
        assert_eq!(instance.thread(0).unwrap().state, ThreadState::Stopped);
    }

    #[test]
    fn rejects_broken_shape() {
        let mut shape = test_shape(true);
        shape.objects[1].node_index = 7;

        assert!(matches!(
            ShapeInstance::new(&shape),
            Err(AnimationError::InvalidShape {
                source: DecodeError::InvalidReference { index: 7, .. }
            })
        ));
    }

    #[test]
    fn bracket_moves_forward() {
        let track: Vec<_> = [0., 0.25, 0.5]
            .into_iter()
            .map(|pos| keyframe(pos, 0, KeyframeFlags::empty(), 0))
            .collect();

        let mut last = 0;

        for step in 0..=20 {
            let pos = step as f32 / 20.;
            let span = bracket(&track, false, pos).unwrap();

            assert!(span.prev >= last);
            assert!((0. ..=1.).contains(&span.t));

            last = span.prev;
        }

        let wrap = bracket(&track, true, 0.75).unwrap();
        assert_eq!((wrap.prev, wrap.next), (2, 0));
        assert!((wrap.t - 0.5).abs() < 1e-5);

        assert_eq!(bracket(&[], true, 0.5), None);
    }

    #[test]
    fn latch_restarts_when_going_backwards() {
        let keyframes = vec![
            keyframe(0., 1, KeyframeFlags::FRAME_MATTERS, 0),
            keyframe(0.5, 2, KeyframeFlags::FRAME_MATTERS, 0),
        ];

        let mut cursor = 0;

        let latched = latch(&keyframes, 0..2, &mut cursor, 0.6);
        assert_eq!(latched.mesh_frame, Some(2));
        assert_eq!(cursor, 1);

        let latched = latch(&keyframes, 0..2, &mut cursor, 0.1);
        assert_eq!(latched.mesh_frame, Some(1));
        assert_eq!(cursor, 0);
    }

    #[test]
    fn object_cursor_only_moves_forward_until_wrap() {
        let shape = test_shape(true);
        let (mut instance, _) = playing(&shape);
        instance.animate();

        let mut last = instance.object_state(0).unwrap().last_keyframe().unwrap();
        assert_eq!(last, 2);

        let resets = instance.cache_resets();
        let mut steps = 0;

        while instance.cache_resets() == resets {
            assert!(steps < 40, "thread never wrapped");
            steps += 1;

            instance.animate();
            let cursor = instance.object_state(0).unwrap().last_keyframe().unwrap();
            assert!(cursor >= last, "cursor went back from {last} to {cursor}");
            assert!((2..5).contains(&cursor));
            last = cursor;

            instance.advance_threads(0.1);
        }

        // the last keyframe sits at 0.75
        assert_eq!(last, 4);
        assert_eq!(instance.object_state(0).unwrap().last_keyframe(), None);

        instance.animate();
        assert_eq!(instance.object_state(0).unwrap().last_keyframe(), Some(2));
    }

    #[test]
    fn rotation_helpers() {
        let identity = Quaternion::new(1., 0., 0., 0.);
        let flipped = Quaternion::new(-1., 0., 0., 0.);

        // shortest path goes through the flipped sign
        let mid = interpolate_rotation(identity, flipped, 0.5);
        assert!((mid.s - 1.).abs() < 1e-5);

        let tiny = Quaternion::new(1., 1e-12, 0., 0.);
        assert_eq!(rotation_matrix(tiny), rotation_matrix(identity));
    }
}
