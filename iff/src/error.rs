use crate::chunk::tag_name;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Expected chunk `{}`, found `{}`", tag_name(*expected), tag_name(*found))]
    MalformedChunk { expected: u32, found: u32 },
    #[error("Unsupported {format} version {version}")]
    UnsupportedVersion { format: &'static str, version: u32 },
    #[error("Stream truncated at offset {position}")]
    TruncatedStream { position: usize },
    #[error("No constructor registered for {class}")]
    UnknownClass { class: String },
    #[error("Decompressed size {actual} does not match expected size {expected}")]
    CompressedSizeMismatch { expected: usize, actual: usize },
    #[error("Nested object is not a {expected}")]
    UnexpectedObject { expected: &'static str },
    #[error("{what} index {index} is out of range (count {count})")]
    InvalidReference {
        what: &'static str,
        index: i64,
        count: usize,
    },
}
