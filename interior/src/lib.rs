//! Compiled interior geometry (`ITRGeometry`): surfaces, a BSP tree and the
//! visibility sets of its empty leaves.
mod bsp;
mod parser;
mod types;

pub use parser::{INTERIOR_CLASS, LATEST_INTERIOR_VERSION};
pub use types::*;
