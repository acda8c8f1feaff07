use std::ops::Range;

use shape::{Keyframe, KeyframeFlags};

/// Slack when comparing a thread position against keyframe positions.
const POS_EPSILON: f32 = 0.001;

/// Two keyframes of a node track surrounding a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub prev: usize,
    pub next: usize,
    /// `0` sits on `prev`, `1` on `next`.
    pub t: f32,
}

fn wrapped(offset: f32, span: f32) -> f32 {
    if span > 0. { offset / span } else { 0. }
}

/// Finds the keyframes around `pos` on one track. Indices are relative to `track`.
///
/// Cyclic tracks interpolate from the last keyframe back around to the first.
/// Other tracks hold their first and last keyframes outside the keyed range.
pub fn bracket(track: &[Keyframe], cyclic: bool, pos: f32) -> Option<Bracket> {
    let last = track.len().checked_sub(1)?;

    let mut prev = None;
    let mut next = None;

    for (idx, keyframe) in track.iter().enumerate() {
        if keyframe.pos <= pos + POS_EPSILON {
            prev = Some(idx);
        } else {
            next = Some(idx);
            break;
        }
    }

    let (prev, next, t) = match (prev, next, cyclic) {
        (None, _, true) if last == 0 => (0, 0, 0.),
        (None, _, true) => (
            last,
            0,
            wrapped(
                pos + 1. - track[last].pos,
                track[0].pos + 1. - track[last].pos,
            ),
        ),
        (Some(prev), None, true) if prev == 0 => (0, 0, 0.),
        (Some(prev), None, true) => (
            prev,
            0,
            wrapped(pos - track[prev].pos, track[0].pos + 1. - track[prev].pos),
        ),
        (None, _, false) => (0, 0, 0.),
        (Some(prev), None, false) => (prev, last, 1.),
        (Some(prev), Some(next), _) => {
            let diff = track[next].pos - track[prev].pos;
            let offset = pos - track[prev].pos;

            let t = if diff != 0. {
                offset / diff
            } else if cyclic && offset != 0. {
                1.
            } else {
                0.
            };

            (prev, next, t)
        }
    };

    Some(Bracket {
        prev,
        next,
        t: t.clamp(0., 1.),
    })
}

/// Values an object track switched to, `None` where no keyframe touched the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latch {
    pub visible: Option<bool>,
    pub mesh_frame: Option<u32>,
    pub material_frame: Option<u32>,
}

/// Steps an object track forward to `pos`.
///
/// `cursor` is an index into `keyframes` where the previous scan stopped. The
/// scan restarts from the beginning of `range` when the cursor lies outside
/// it or the position moved backwards.
pub fn latch(keyframes: &[Keyframe], range: Range<usize>, cursor: &mut usize, pos: f32) -> Latch {
    let mut res = Latch::default();

    let Some(track) = keyframes.get(range.clone()).filter(|track| !track.is_empty()) else {
        return res;
    };

    let resume = range.contains(&*cursor) && pos >= keyframes[*cursor].pos;
    let start = if resume { *cursor - range.start } else { 0 };

    let mut prev = None;

    for (idx, keyframe) in track.iter().enumerate().skip(start) {
        if keyframe.pos > pos + POS_EPSILON {
            break;
        }

        prev = Some(idx);

        let flags = keyframe.flags();

        if flags.contains(KeyframeFlags::VIS_MATTERS) {
            res.visible = Some(flags.contains(KeyframeFlags::VIS));
        }

        if flags.contains(KeyframeFlags::FRAME_MATTERS) {
            res.mesh_frame = Some(keyframe.key as u32);
        }

        if flags.contains(KeyframeFlags::MAT_MATTERS) {
            res.material_frame = Some(keyframe.material_frame() as u32);
        }
    }

    *cursor = range.start + prev.unwrap_or(0);

    res
}
