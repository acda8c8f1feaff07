//! Bitmaps, either plain Microsoft BMP files or the chunked `PBMP` layout
//! with mip levels and an optional embedded palette.
mod parser;
mod types;
mod utils;

pub use parser::{BM, DETL, PBMP, PIDX};
pub use types::*;
