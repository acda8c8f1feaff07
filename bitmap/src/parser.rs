use iff::{ByteStream, ChunkHeader, DecodeError, RIFF, fourcc};
use log::{debug, warn};
use nom::{
    Parser,
    combinator::map,
    number::complete::{le_i32, le_u16, le_u32},
};
use palette::{COLOR_COUNT, DATA, HEAD, Palette, PaletteEntry, read_ms_palette};

use crate::types::{Bitmap, BitmapFlags, MAX_MIPS, PALETTE_INDEX_MARKER};

/// `BM`, compared against the low half of the first word.
pub const BM: u32 = 0x4D42;
pub const PBMP: u32 = fourcc(b"PBMP");
pub const PIDX: u32 = fourcc(b"piDX");
pub const DETL: u32 = fourcc(b"DETL");

struct FileHeader {
    kind: u16,
    reserved1: u16,
    reserved2: u16,
}

struct InfoHeader {
    width: i32,
    height: i32,
    bit_count: u16,
    colors_used: u32,
}

fn file_header(i: &[u8]) -> iff::nom_helpers::IResult<'_, FileHeader> {
    map(
        (le_u16, le_u32, le_u16, le_u16, le_u32),
        |(kind, _size, reserved1, reserved2, _offset)| FileHeader {
            kind,
            reserved1,
            reserved2,
        },
    )
    .parse(i)
}

fn info_header(i: &[u8]) -> iff::nom_helpers::IResult<'_, InfoHeader> {
    map(
        (
            (le_u32, le_i32, le_i32, le_u16, le_u16),
            (le_u32, le_u32, le_i32, le_i32, le_u32, le_u32),
        ),
        |((_size, width, height, _planes, bit_count), (_, _, _, _, colors_used, _))| {
            InfoHeader {
                width,
                height,
                bit_count,
                colors_used,
            }
        },
    )
    .parse(i)
}

impl Bitmap {
    /// Decodes a Microsoft BMP or a chunked `PBMP` starting at the cursor.
    pub fn read(stream: &mut ByteStream) -> Result<Self, DecodeError> {
        let header = ChunkHeader::peek(stream)?;

        if header.tag & 0xFFFF == BM {
            return read_ms_bitmap(stream);
        }

        if header.tag != PBMP {
            return Err(DecodeError::MalformedChunk {
                expected: PBMP,
                found: header.tag,
            });
        }

        read_pbmp(stream)
    }

    pub fn open_from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut ByteStream::new(bytes))
    }
}

fn read_ms_bitmap(stream: &mut ByteStream) -> Result<Bitmap, DecodeError> {
    let header = stream.parse(file_header)?;
    let info = stream.parse(info_header)?;

    if header.kind as u32 != BM {
        return Err(DecodeError::MalformedChunk {
            expected: BM,
            found: header.kind as u32,
        });
    }

    let palette_index =
        if header.reserved1 == PALETTE_INDEX_MARKER && header.reserved2 != 0xffff {
            header.reserved2 as i32
        } else {
            -1
        };

    let width = info.width.unsigned_abs();
    let height = info.height.unsigned_abs();
    let bit_depth = info.bit_count as u32;
    let stride = checked_stride(width, bit_depth)?;

    let palette = if bit_depth == 8 {
        let to_read = (info.colors_used as usize).min(COLOR_COUNT);
        let mut colors = [0u32; COLOR_COUNT];

        for color in colors.iter_mut().take(to_read) {
            *color = stream.read_u32()?;
        }
        stream.skip((info.colors_used as usize - to_read) * 4)?;

        Some(Palette::from_entry(PaletteEntry::opaque(colors)))
    } else {
        None
    };

    let row_len = stride as usize;
    let size = top_mip_size(stride, height)?;

    if stream.remaining().len() < size {
        return Err(DecodeError::TruncatedStream {
            position: stream.position(),
        });
    }

    let mut data = vec![0u8; size];

    // bottom-up unless the height is negative
    for i in 0..height as usize {
        let row = if info.height > 0 {
            height as usize - i - 1
        } else {
            i
        };

        let src = stream.read_bytes(row_len)?;
        data[row * row_len..(row + 1) * row_len].copy_from_slice(src);
    }

    let mips = vec![0..data.len()];

    Ok(Bitmap {
        width,
        height,
        bit_depth,
        flags: BitmapFlags::empty(),
        stride,
        mip_levels: 1,
        palette_index,
        data,
        mips,
        palette,
        bgr: true,
    })
}

fn read_pbmp(stream: &mut ByteStream) -> Result<Bitmap, DecodeError> {
    ChunkHeader::expect(stream, PBMP)?;

    let mut bitmap = Bitmap {
        width: 0,
        height: 0,
        bit_depth: 0,
        flags: BitmapFlags::empty(),
        stride: 0,
        mip_levels: 1,
        palette_index: -1,
        data: vec![],
        mips: vec![],
        palette: None,
        bgr: false,
    };

    // replaced by the count stored in `head`
    let mut expected_chunks = u32::MAX - 1;

    while !stream.is_eof() && expected_chunks != 0 {
        let start = stream.position();
        let chunk = ChunkHeader::read(stream)?;
        expected_chunks -= 1;

        match chunk.tag {
            HEAD => {
                let version = stream.read_u32()?;
                bitmap.width = stream.read_u32()?;
                bitmap.height = stream.read_u32()?;
                bitmap.bit_depth = stream.read_u32()?;
                bitmap.flags = BitmapFlags::from_bits_retain(stream.read_u32()?);

                if version >> 24 != 0 {
                    return Err(DecodeError::UnsupportedVersion {
                        format: "PBMP",
                        version: version >> 24,
                    });
                }

                expected_chunks = version & 0xFFFFFF;
            }
            DETL => bitmap.mip_levels = stream.read_u32()?,
            PIDX => bitmap.palette_index = stream.read_i32()?,
            DATA => {
                let len = (chunk.raw_size & !iff::ALIGN_DWORD) as usize;
                bitmap.data = stream.read_bytes(len)?.to_vec();
            }
            RIFF => {
                stream.set_position(start)?;
                bitmap.palette = Some(read_ms_palette(stream)?);
            }
            tag => debug!("skipping bitmap chunk `{}`", iff::tag_name(tag)),
        }

        chunk.seek_to_end(start, stream);
    }

    if bitmap.mip_levels as usize > MAX_MIPS {
        warn!("bitmap claims {} mip levels", bitmap.mip_levels);
        bitmap.mip_levels = MAX_MIPS as u32;
    }

    bitmap.stride = checked_stride(bitmap.width, bitmap.bit_depth)?;
    bitmap.mips = mip_ranges(
        top_mip_size(bitmap.stride, bitmap.height)?,
        bitmap.mip_levels,
        bitmap.data.len(),
    )?;
    bitmap.mip_levels = bitmap.mips.len() as u32;

    Ok(bitmap)
}

fn checked_stride(width: u32, bit_depth: u32) -> Result<u32, DecodeError> {
    Bitmap::stride_for(width, bit_depth).ok_or(DecodeError::InvalidReference {
        what: "bitmap row size",
        index: width as i64,
        count: u32::MAX as usize,
    })
}

fn top_mip_size(stride: u32, height: u32) -> Result<usize, DecodeError> {
    (stride as usize)
        .checked_mul(height as usize)
        .ok_or(DecodeError::InvalidReference {
            what: "bitmap size",
            index: height as i64,
            count: usize::MAX / (stride as usize).max(1),
        })
}

/// Each level is a quarter of the one before it. Levels running past
/// `available` bytes of pixel data are dropped.
pub(crate) fn mip_ranges(
    top_size: usize,
    levels: u32,
    available: usize,
) -> Result<Vec<std::ops::Range<usize>>, DecodeError> {
    let mut ranges = vec![];
    let mut offset = 0usize;
    let mut size = top_size;

    for level in 0..levels {
        let end = offset
            .checked_add(size)
            .ok_or(DecodeError::InvalidReference {
                what: "mip level",
                index: level as i64,
                count: ranges.len(),
            })?;

        if end > available {
            warn!("mip level {level} ends at byte {end}, past the {available} bytes of pixel data");
            break;
        }

        ranges.push(offset..end);
        offset = end;
        size /= 4;
    }

    Ok(ranges)
}
