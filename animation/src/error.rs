use iff::DecodeError;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AnimationError {
    #[error("No thread with id {0}")]
    UnknownThread(usize),
    #[error("Sequence {index} is out of range (count {count})")]
    UnknownSequence { index: usize, count: usize },
    #[error("Shape cannot be animated: {source}")]
    InvalidShape {
        #[from]
        source: DecodeError,
    },
}
