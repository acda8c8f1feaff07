//! Chunked little endian object streams.
//!
//! Every asset is a sequence of `tag, size, payload` chunks. Generic objects
//! use a `PERS` chunk that carries a class name and a version, the rest are
//! recognized by their own tag.
mod chunk;
pub mod error;
pub mod nom_helpers;
mod registry;
mod stream;
mod writer;

pub use chunk::*;
pub use error::DecodeError;
pub use registry::{Constructor, Registry};
pub use stream::ByteStream;
pub use writer::ByteWriter;
