use iff::{
    ByteStream, ChunkHeader, DecodeError, RIFF, fourcc,
    nom_helpers::color_table,
};
use log::debug;
use nom::{Parser, combinator::map, multi::count, number::complete::{le_f32, le_i32, le_u32}};

use crate::types::{
    COLOR_COUNT, ColorWeights, Palette, PaletteEntry, PaletteKind, RemapView, RemapViews,
    TRANSLUCENCY_MAP_SIZE,
};

pub const PL98: u32 = fourcc(b"PL98");
pub const PPAL: u32 = fourcc(b"PPAL");
pub const PAL: u32 = fourcc(b"PAL ");
pub const HEAD: u32 = fourcc(b"head");
pub const INFO: u32 = fourcc(b"info");
pub const DATA: u32 = fourcc(b"data");

/// Largest shade shift whose tables still fit any sane palette file.
const MAX_SHADE_SHIFT: i32 = 16;

impl Palette {
    /// Decodes whichever of the three palette layouts starts at the cursor.
    pub fn read(stream: &mut ByteStream) -> Result<Self, DecodeError> {
        let header = ChunkHeader::peek(stream)?;

        match header.tag {
            RIFF => read_ms_palette(stream),
            PPAL => read_ppal(stream),
            PL98 => read_pl98(stream),
            found => Err(DecodeError::MalformedChunk {
                expected: PL98,
                found,
            }),
        }
    }

    pub fn open_from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut ByteStream::new(bytes))
    }
}

/// Microsoft `RIFF` / `PAL ` palette.
pub fn read_ms_palette(stream: &mut ByteStream) -> Result<Palette, DecodeError> {
    ChunkHeader::expect(stream, RIFF)?;

    let form = stream.read_u32()?;
    if form != PAL {
        return Err(DecodeError::MalformedChunk {
            expected: PAL,
            found: form,
        });
    }

    loop {
        let start = stream.position();
        let chunk = ChunkHeader::read(stream)?;

        if chunk.tag == DATA {
            break;
        }

        chunk.seek_to_end(start, stream);
    }

    let _version = stream.read_u16()?;
    let num_colors = stream.read_u16()? as usize;
    let to_read = num_colors.min(COLOR_COUNT);

    let mut colors = [0u32; COLOR_COUNT];
    for color in colors.iter_mut().take(to_read) {
        *color = stream.read_u32()?;
    }
    stream.skip((num_colors - to_read) * 4)?;

    Ok(Palette::from_entry(PaletteEntry::opaque(colors)))
}

fn read_ppal(stream: &mut ByteStream) -> Result<Palette, DecodeError> {
    ChunkHeader::expect(stream, PPAL)?;
    ChunkHeader::expect(stream, HEAD)?;

    let version = stream.read_u8()?;
    if version != 3 && version != 7 {
        return Err(DecodeError::UnsupportedVersion {
            format: "PPAL",
            version: version as u32,
        });
    }

    let _ = stream.read_u16()?;
    let shade_shift = stream.read_u8()? as u32;
    if shade_shift as i32 > MAX_SHADE_SHIFT {
        return Err(DecodeError::InvalidReference {
            what: "shade shift",
            index: shade_shift as i64,
            count: MAX_SHADE_SHIFT as usize + 1,
        });
    }

    let start = stream.position();
    let mut chunk = ChunkHeader::read(stream)?;

    if chunk.tag == INFO {
        chunk.seek_to_end(start, stream);
        chunk = ChunkHeader::read(stream)?;
    }

    if chunk.tag != DATA {
        return Err(DecodeError::MalformedChunk {
            expected: DATA,
            found: chunk.tag,
        });
    }

    let colors = stream.parse(color_table)?;

    let mut palette = Palette::from_entry(PaletteEntry::opaque(colors));
    palette.shade_shift = shade_shift;
    palette.shade_levels = 1 << shade_shift;

    Ok(palette)
}

fn read_pl98(stream: &mut ByteStream) -> Result<Palette, DecodeError> {
    // the size field of this chunk is the entry count
    let header = ChunkHeader::expect(stream, PL98)?;
    let entry_count = header.raw_size as usize;

    let shade_shift = stream.read_i32()?;
    if !(0..=MAX_SHADE_SHIFT).contains(&shade_shift) {
        return Err(DecodeError::InvalidReference {
            what: "shade shift",
            index: shade_shift as i64,
            count: MAX_SHADE_SHIFT as usize + 1,
        });
    }

    let haze_levels = stream.read_i32()?;
    if haze_levels < 0 {
        return Err(DecodeError::InvalidReference {
            what: "haze level",
            index: haze_levels as i64,
            count: 0,
        });
    }

    let haze_color = stream.read_i32()?;
    let allowed_matches = stream.read_array::<32>()?;

    let mut palette = Palette {
        shade_shift: shade_shift as u32,
        shade_levels: 1 << shade_shift,
        haze_levels: haze_levels as u32,
        haze_color,
        allowed_matches,
        color_weights: None,
        remap: vec![],
        entries: vec![],
    };

    let entries = stream.read_count(
        map((color_table, le_i32, le_u32), |(colors, index, kind)| PaletteEntry {
            index,
            kind: kind.into(),
            colors,
            views: RemapViews::default(),
        }),
        entry_count,
    )?;

    let lookup_size = entries
        .iter()
        .map(|entry| palette.calc_lookup_size(entry.kind))
        .fold(0usize, usize::saturating_add);

    debug!("PL98 with {entry_count} entries, {lookup_size} bytes of remap tables");

    palette.remap = stream.read_bytes(lookup_size)?.to_vec();
    palette.entries = entries;
    assign_views(&mut palette);

    let weights_present = stream.read_u8()?;
    if weights_present != 0 {
        palette.color_weights = Some(stream.parse(map(
            (count(le_f32, COLOR_COUNT), le_u32, le_u32),
            |(weights, start, end)| ColorWeights {
                weights,
                start,
                end,
            },
        ))?);
    }

    let _ = stream.read_u32()?;

    Ok(palette)
}

/// Lays the remap blob out as shade/haze and blend tables first, then the
/// color tables of remapping entries, then those of plain entries.
fn assign_views(palette: &mut Palette) {
    let shade_size = 256 * palette.shade_levels as usize * palette.haze_levels as usize;
    let haze_size = 256 * palette.shade_levels as usize;
    let mut offset = 0;

    let mut take = |len: usize| {
        let view = RemapView { offset, len };
        offset += len;
        view
    };

    for entry in palette.entries.iter_mut() {
        if entry.kind == PaletteKind::ShadeHaze {
            entry.views.shade_map = Some(take(shade_size));
            entry.views.haze_map = Some(take(haze_size));
        } else if entry.kind.is_translucency() {
            entry.views.trans_map = Some(take(TRANSLUCENCY_MAP_SIZE));
        }
    }

    let mut color_tables = |entry: &mut PaletteEntry| {
        entry.views.color_index = Some(take(256));
        entry.views.channels = Some([take(1024), take(1024), take(1024), take(1024)]);
    };

    palette
        .entries
        .iter_mut()
        .filter(|entry| {
            !matches!(entry.kind, PaletteKind::NoRemap | PaletteKind::Unknown(_))
                && !entry.kind.is_quantized()
        })
        .for_each(&mut color_tables);

    palette
        .entries
        .iter_mut()
        .filter(|entry| entry.kind == PaletteKind::NoRemap)
        .for_each(&mut color_tables);
}
