use std::ops::Range;

use bitflags::bitflags;
use palette::Palette;

pub const MAX_MIPS: usize = 9;
/// `bfReserved1` value marking a BMP that names its palette in `bfReserved2`.
pub const PALETTE_INDEX_MARKER: u16 = 0xf5f7;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BitmapFlags: u32 {
        const TRANSPARENT = 0x1;
        const FUZZY = 0x2;
        const TRANSLUCENT = 0x4;
        const OWN_MEM = 0x8;
        const ADDITIVE = 0x10;
        const SUBTRACTIVE = 0x20;
        const ALPHA8 = 0x40;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
    pub flags: BitmapFlags,
    pub stride: u32,
    pub mip_levels: u32,
    /// Palette entry the pixels index into, `-1` when unspecified.
    pub palette_index: i32,
    /// Every mip level back to back.
    pub data: Vec<u8>,
    pub mips: Vec<Range<usize>>,
    /// Palette shipped inside the bitmap itself.
    pub palette: Option<Palette>,
    /// Microsoft bitmaps store 24 bit pixels as BGR.
    pub bgr: bool,
}

impl Bitmap {
    /// Row length padded to 4 bytes, `None` when it does not fit a `u32`.
    pub fn stride_for(width: u32, bit_depth: u32) -> Option<u32> {
        u32::try_from(4 * ((width as u64 * bit_depth as u64 + 31) / 32)).ok()
    }

    pub fn mip(&self, level: usize) -> Option<&[u8]> {
        self.data.get(self.mips.get(level)?.clone())
    }

    /// Offset of pixel (x, y) of the top mip inside [`Self::data`].
    pub fn address(&self, x: u32, y: u32) -> usize {
        self.stride as usize * y as usize + (self.bit_depth as usize * x as usize) / 8
    }
}
