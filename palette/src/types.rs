use std::ops::Range;

pub const COLOR_COUNT: usize = 256;
/// Color index table plus four float channels.
pub const BASE_LOOKUP_SIZE: usize = 256 + 4 * (256 * 4);
pub const TRANSLUCENCY_MAP_SIZE: usize = 256 * 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteKind {
    NoRemap,
    ShadeHaze,
    Translucent,
    ColorQuant,
    AlphaQuant,
    AdditiveQuant,
    Additive,
    SubtractiveQuant,
    Subtractive,
    Unknown(u32),
}

impl From<u32> for PaletteKind {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::NoRemap,
            1 => Self::ShadeHaze,
            2 => Self::Translucent,
            3 => Self::ColorQuant,
            4 => Self::AlphaQuant,
            5 => Self::AdditiveQuant,
            6 => Self::Additive,
            7 => Self::SubtractiveQuant,
            8 => Self::Subtractive,
            x => Self::Unknown(x),
        }
    }
}

impl PaletteKind {
    /// Kinds that carry a full 256x256 blend table.
    pub fn is_translucency(&self) -> bool {
        matches!(self, Self::Translucent | Self::Additive | Self::Subtractive)
    }

    pub fn is_quantized(&self) -> bool {
        matches!(
            self,
            Self::ColorQuant | Self::AlphaQuant | Self::AdditiveQuant | Self::SubtractiveQuant
        )
    }
}

/// Byte range inside [`Palette::remap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapView {
    pub offset: usize,
    pub len: usize,
}

impl RemapView {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    R,
    G,
    B,
    A,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemapViews {
    pub shade_map: Option<RemapView>,
    pub haze_map: Option<RemapView>,
    pub trans_map: Option<RemapView>,
    pub color_index: Option<RemapView>,
    /// Float channels in R, G, B, A order.
    pub channels: Option<[RemapView; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaletteEntry {
    pub index: i32,
    pub kind: PaletteKind,
    /// `0xAABBGGRR`
    pub colors: [u32; COLOR_COUNT],
    pub views: RemapViews,
}

impl PaletteEntry {
    pub fn opaque(colors: [u32; COLOR_COUNT]) -> Self {
        Self {
            index: -1,
            kind: PaletteKind::NoRemap,
            colors,
            views: RemapViews::default(),
        }
    }

    pub fn lookup_rgb(&self, idx: u8) -> [u8; 3] {
        let [r, g, b, _] = self.lookup_rgba(idx);
        [r, g, b]
    }

    pub fn lookup_rgba(&self, idx: u8) -> [u8; 4] {
        self.colors[idx as usize].to_le_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorWeights {
    pub weights: Vec<f32>,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub shade_shift: u32,
    pub shade_levels: u32,
    pub haze_levels: u32,
    pub haze_color: i32,
    pub allowed_matches: [u8; 32],
    pub color_weights: Option<ColorWeights>,
    /// Every lookup table of every entry, addressed through [`RemapViews`].
    pub remap: Vec<u8>,
    pub entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Palette holding a single entry and no lookup tables.
    pub fn from_entry(entry: PaletteEntry) -> Self {
        Self {
            shade_shift: 0,
            shade_levels: 1,
            haze_levels: 0,
            haze_color: 0,
            allowed_matches: [0; 32],
            color_weights: None,
            remap: vec![],
            entries: vec![entry],
        }
    }

    /// Remap blob bytes an entry of `kind` occupies.
    pub fn calc_lookup_size(&self, kind: PaletteKind) -> usize {
        lookup_size(kind, self.shade_levels, self.haze_levels)
    }

    /// Entry with the given index, or the first entry when none matches.
    pub fn entry_by_index(&self, index: i32) -> Option<&PaletteEntry> {
        self.entries
            .iter()
            .find(|entry| entry.index == index)
            .or(self.entries.first())
    }

    pub fn view(&self, view: Option<RemapView>) -> Option<&[u8]> {
        self.remap.get(view?.range())
    }

    pub fn shade_map(&self, entry: &PaletteEntry) -> Option<&[u8]> {
        self.view(entry.views.shade_map)
    }

    pub fn haze_map(&self, entry: &PaletteEntry) -> Option<&[u8]> {
        self.view(entry.views.haze_map)
    }

    pub fn trans_map(&self, entry: &PaletteEntry) -> Option<&[u8]> {
        self.view(entry.views.trans_map)
    }

    pub fn color_index(&self, entry: &PaletteEntry) -> Option<&[u8]> {
        self.view(entry.views.color_index)
    }

    /// One float channel of the per-color tables.
    pub fn channel(&self, entry: &PaletteEntry, channel: Channel) -> Option<Vec<f32>> {
        let views = entry.views.channels?;
        let view = views[channel as usize];

        self.view(Some(view)).map(|bytes| {
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        })
    }
}

pub fn lookup_size(kind: PaletteKind, shade_levels: u32, haze_levels: u32) -> usize {
    match kind {
        PaletteKind::ShadeHaze => (256 * shade_levels as usize)
            .saturating_mul(haze_levels as usize + 1)
            .saturating_add(BASE_LOOKUP_SIZE),
        PaletteKind::Translucent | PaletteKind::Additive | PaletteKind::Subtractive => {
            TRANSLUCENCY_MAP_SIZE + BASE_LOOKUP_SIZE
        }
        PaletteKind::NoRemap => 256 + BASE_LOOKUP_SIZE,
        _ => 0,
    }
}
