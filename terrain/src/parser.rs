use glam::IVec2;
use iff::{ByteStream, ChunkHeader, DecodeError, fourcc, nom_helpers::IResult};
use log::debug;
use nom::{
    Parser,
    combinator::map,
    number::complete::{le_f32, le_i32, le_u8, le_u16, le_u32},
};

use crate::types::{
    BlockEntry, MaterialCell, TerrainBlock, TerrainBlockList, TilePattern, light_map_size,
};

pub const GBLK: u32 = fourcc(b"GBLK");
pub const GFIL: u32 = fourcc(b"GFIL");

pub const LATEST_BLOCK_VERSION: u32 = 5;
pub const LATEST_BLOCK_LIST_VERSION: u32 = 1;

const BLOCK_NAME_SIZE: usize = 16;
const MAX_BLOCK_SIZE: i32 = 1024;
const MAX_LIGHT_SCALE: u32 = 8;
/// Upper bound on bytes one compressed bit can expand to.
const MAX_EXPANSION: usize = 8 * 60;

fn material_cell(i: &[u8]) -> IResult<'_, MaterialCell> {
    map((le_u8, le_u8), |(flags, index)| MaterialCell { flags, index }).parse(i)
}

fn grid_size(value: i32, what: &'static str) -> Result<u32, DecodeError> {
    if !(0..=MAX_BLOCK_SIZE).contains(&value) {
        return Err(DecodeError::InvalidReference {
            what,
            index: value as i64,
            count: MAX_BLOCK_SIZE as usize + 1,
        });
    }

    Ok(value as u32)
}

fn checked_area(a: usize, b: usize) -> Result<usize, DecodeError> {
    a.checked_mul(b).ok_or(DecodeError::InvalidReference {
        what: "terrain table size",
        index: a as i64,
        count: b,
    })
}

/// `u32` uncompressed size, `u32` compressed size, then the compressed bytes.
/// The declared size has to match the table it fills.
fn read_lzh_block(stream: &mut ByteStream, expected: usize) -> Result<Vec<u8>, DecodeError> {
    let uncompressed = stream.read_u32()? as usize;
    let compressed = stream.read_u32()? as usize;

    if uncompressed != expected {
        return Err(DecodeError::CompressedSizeMismatch {
            expected,
            actual: uncompressed,
        });
    }

    let input = stream.read_bytes(compressed)?;

    if uncompressed > compressed.saturating_mul(MAX_EXPANSION) {
        return Err(DecodeError::CompressedSizeMismatch {
            expected,
            actual: compressed.saturating_mul(MAX_EXPANSION),
        });
    }

    debug!("unpacking {compressed} bytes into {uncompressed}");

    Ok(lzh::unpack(input, uncompressed))
}

/// Each row stores a scale, its first and last sample and a signed byte step
/// for every sample in between.
fn read_row_delta_heights(
    stream: &mut ByteStream,
    width: usize,
    rows: usize,
) -> Result<Vec<f32>, DecodeError> {
    let mut heights = Vec::with_capacity(checked_area(width, rows)?.min(1 << 20));

    for _ in 0..rows {
        let (scale, first, last) = stream.parse((le_f32, le_f32, le_f32))?;
        let deltas = stream.read_bytes(width.saturating_sub(2))?;

        let mut current = first;
        heights.push(current);

        for &delta in deltas {
            current += delta as i8 as f32 * scale;
            heights.push(current);
        }

        if width > 1 {
            heights.push(last);
        }
    }

    Ok(heights)
}

impl TerrainBlock {
    pub fn read(stream: &mut ByteStream) -> Result<Self, DecodeError> {
        let start = stream.position();
        let header = ChunkHeader::expect(stream, GBLK)?;

        let version = stream.read_u32()?;
        if !(1..=LATEST_BLOCK_VERSION).contains(&version) {
            return Err(DecodeError::UnsupportedVersion {
                format: "GBLK",
                version,
            });
        }

        let name = stream.read_fixed_string(BLOCK_NAME_SIZE)?;
        let (detail_count, light_scale) = stream.parse((le_u32, le_u32))?;
        let (size_x, size_y) = stream.parse((le_i32, le_i32))?;
        let size_x = grid_size(size_x, "block width")?;
        let size_y = grid_size(size_y, "block height")?;

        if light_scale > MAX_LIGHT_SCALE {
            return Err(DecodeError::InvalidReference {
                what: "light scale",
                index: light_scale as i64,
                count: MAX_LIGHT_SCALE as usize + 1,
            });
        }

        debug!("GBLK v{version} `{name}` {size_x}x{size_y}, light scale {light_scale}");

        let width = size_x as usize + 1;
        let rows = size_y as usize + 1;
        let samples = checked_area(width, rows)?;

        let heights = match version {
            1 => stream.read_count(le_f32, samples)?,
            2 | 3 => read_row_delta_heights(stream, width, rows)?,
            _ => read_lzh_block(stream, checked_area(samples, 4)?)?
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        };

        let cells = checked_area(size_x as usize, size_y as usize)?;
        let light_size = light_map_size(size_x, light_scale);
        let texels = checked_area(light_size, light_size)?;

        let (materials, light_map) = if version <= 4 {
            (
                stream.read_count(material_cell, cells)?,
                stream.read_count(le_u16, texels)?,
            )
        } else {
            let materials = read_lzh_block(stream, checked_area(cells, 2)?)?
                .chunks_exact(2)
                .map(|b| MaterialCell {
                    flags: b[0],
                    index: b[1],
                })
                .collect();

            let light_map = read_lzh_block(stream, checked_area(texels, 2)?)?
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect();

            (materials, light_map)
        };

        header.seek_to_end(start, stream);

        Ok(Self {
            version,
            name,
            detail_count,
            light_scale,
            size_x,
            size_y,
            heights,
            materials,
            light_map,
        })
    }

    pub fn open_from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut ByteStream::new(bytes))
    }
}

impl TerrainBlockList {
    pub fn read(stream: &mut ByteStream) -> Result<Self, DecodeError> {
        let start = stream.position();
        let header = ChunkHeader::expect(stream, GFIL)?;

        let version = stream.read_u32()?;
        if version != LATEST_BLOCK_LIST_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                format: "GFIL",
                version,
            });
        }

        let (size_x, size_y, origin_x, origin_y) =
            stream.parse((le_i32, le_i32, le_i32, le_i32))?;
        let size_x = grid_size(size_x, "block list width")?;
        let size_y = grid_size(size_y, "block list height")?;

        let (detail_count, scale_shift, pattern, num_blocks) =
            stream.parse((le_u32, le_u32, le_u32, le_u32))?;

        let mut blocks = vec![];
        for _ in 0..num_blocks {
            let id = stream.read_i32()?;
            let name = stream.read_sstring()?;

            blocks.push(BlockEntry { id, name });
        }

        let block_map = stream.read_count(le_i32, checked_area(size_x as usize, size_y as usize)?)?;

        if let Some(&bad) = block_map
            .iter()
            .find(|&&entry| entry < -1 || entry >= blocks.len() as i32)
        {
            return Err(DecodeError::InvalidReference {
                what: "block map entry",
                index: bad as i64,
                count: blocks.len(),
            });
        }

        debug!("GFIL {size_x}x{size_y} with {} blocks", blocks.len());

        header.seek_to_end(start, stream);

        Ok(Self {
            version,
            size_x,
            size_y,
            origin: IVec2::new(origin_x, origin_y),
            detail_count,
            scale_shift,
            pattern: TilePattern::from(pattern),
            blocks,
            block_map,
        })
    }

    pub fn open_from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut ByteStream::new(bytes))
    }
}
