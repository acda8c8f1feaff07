use std::ops::Range;

use shape::Shape;

pub type ThreadId = usize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThreadState {
    #[default]
    Stopped,
    Playing,
    /// Reserved, never entered.
    PlayingTransitionWait,
    /// Reserved, never entered.
    Transitioning,
}

/// What advancing a thread did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Idle,
    Moved,
    /// The thread wrapped this many times.
    Wrapped(u64),
    Finished,
}

/// A playback cursor over one sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub sequence: Option<usize>,
    /// Normalised position in the sequence, `0..=1`.
    pub pos: f32,
    pub state: ThreadState,
    pub enabled: bool,
    /// Subsequence driving each node, then each object.
    tracks: Vec<Option<usize>>,
}

impl Thread {
    pub(crate) fn new(shape: &Shape) -> Self {
        Self {
            sequence: None,
            pos: 0.,
            state: ThreadState::Stopped,
            enabled: true,
            tracks: vec![None; shape.nodes.len() + shape.objects.len()],
        }
    }

    /// Rewinds onto `sequence` and finds the subsequence each node and object plays for it.
    pub(crate) fn set_sequence(&mut self, shape: &Shape, sequence: Option<usize>) {
        self.sequence = sequence;
        self.pos = 0.;
        self.state = if sequence.is_some() {
            ThreadState::Playing
        } else {
            ThreadState::Stopped
        };

        let find = |mut subsequences: Range<usize>| {
            let sequence = sequence?;

            subsequences.find(|&idx| {
                shape
                    .subsequences
                    .get(idx)
                    .is_some_and(|sub| sub.sequence_idx as i32 == sequence as i32)
            })
        };

        self.tracks = shape
            .nodes
            .iter()
            .map(|node| find(node.subsequences()))
            .chain(shape.objects.iter().map(|object| find(object.subsequences())))
            .collect();
    }

    pub fn node_track(&self, node: usize) -> Option<usize> {
        self.tracks.get(node).copied().flatten()
    }

    pub fn object_track(&self, node_count: usize, object: usize) -> Option<usize> {
        self.tracks.get(node_count + object).copied().flatten()
    }

    /// Sequence this thread is playing when it takes part in evaluation.
    pub fn active_sequence(&self) -> Option<usize> {
        self.sequence.filter(|_| self.enabled)
    }

    pub(crate) fn advance(&mut self, shape: &Shape, dt: f32) -> Advance {
        let Some(sequence) = self.sequence.and_then(|idx| shape.sequences.get(idx)) else {
            return Advance::Idle;
        };

        if self.state != ThreadState::Playing {
            return Advance::Idle;
        }

        if !(sequence.duration > 0.) || !sequence.duration.is_finite() || !dt.is_finite() {
            return Advance::Idle;
        }

        self.pos += dt / sequence.duration;

        if self.pos < 1. {
            return Advance::Moved;
        }

        if !sequence.cyclic {
            self.pos = 1.;
            self.state = ThreadState::Stopped;

            return Advance::Finished;
        }

        let wraps = self.pos.floor();
        self.pos -= wraps;

        Advance::Wrapped(wraps as u64)
    }
}
