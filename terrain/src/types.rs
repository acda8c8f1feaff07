use glam::IVec2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialCell {
    pub flags: u8,
    pub index: u8,
}

/// One square block of terrain: a height grid with one more sample than
/// squares on each side, per square materials and a light map.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainBlock {
    pub version: u32,
    pub name: String,
    pub detail_count: u32,
    /// Light map texels per square, as a shift.
    pub light_scale: u32,
    pub size_x: u32,
    pub size_y: u32,
    pub heights: Vec<f32>,
    pub materials: Vec<MaterialCell>,
    pub light_map: Vec<u16>,
}

impl TerrainBlock {
    pub fn light_map_size(&self) -> usize {
        light_map_size(self.size_x, self.light_scale)
    }

    pub fn height(&self, x: u32, y: u32) -> Option<f32> {
        if x > self.size_x || y > self.size_y {
            return None;
        }

        self.heights
            .get((y as usize) * (self.size_x as usize + 1) + x as usize)
            .copied()
    }

    pub fn material(&self, x: u32, y: u32) -> Option<MaterialCell> {
        if x >= self.size_x || y >= self.size_y {
            return None;
        }

        self.materials
            .get((y as usize) * (self.size_x as usize) + x as usize)
            .copied()
    }

    pub fn light(&self, x: usize, y: usize) -> Option<u16> {
        let size = self.light_map_size();

        if x >= size || y >= size {
            return None;
        }

        self.light_map.get(y * size + x).copied()
    }

    /// Lowest and highest sample.
    pub fn height_range(&self) -> Option<(f32, f32)> {
        self.heights.iter().fold(None, |range, &h| match range {
            None => Some((h, h)),
            Some((low, high)) => Some((low.min(h), high.max(h))),
        })
    }
}

pub(crate) fn light_map_size(size_x: u32, light_scale: u32) -> usize {
    ((size_x as usize) << light_scale) + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilePattern {
    /// Blocks outside the map are empty.
    Mosaic,
    /// The map tiles infinitely.
    Repeat,
    Unknown(u32),
}

impl From<u32> for TilePattern {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Mosaic,
            1 => Self::Repeat,
            rest => Self::Unknown(rest),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub id: i32,
    /// File the block is loaded from.
    pub name: String,
}

/// Grid of [`TerrainBlock`] references making up a whole terrain.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainBlockList {
    pub version: u32,
    pub size_x: u32,
    pub size_y: u32,
    pub origin: IVec2,
    pub detail_count: u32,
    pub scale_shift: u32,
    pub pattern: TilePattern,
    pub blocks: Vec<BlockEntry>,
    /// Index into [`Self::blocks`] per grid cell, `-1` for empty.
    pub block_map: Vec<i32>,
}

impl TerrainBlockList {
    /// Width of one terrain square in world units.
    pub fn square_size(&self) -> u32 {
        1u32.checked_shl(self.scale_shift).unwrap_or(0)
    }

    /// Block at grid cell (x, y). Cells outside the grid wrap for repeating terrain.
    pub fn block_at(&self, x: i32, y: i32) -> Option<&BlockEntry> {
        if self.size_x == 0 || self.size_y == 0 {
            return None;
        }

        let (x, y) = match self.pattern {
            TilePattern::Repeat => (
                x.rem_euclid(self.size_x as i32),
                y.rem_euclid(self.size_y as i32),
            ),
            _ => (x, y),
        };

        if x < 0 || y < 0 || x >= self.size_x as i32 || y >= self.size_y as i32 {
            return None;
        }

        let entry = *self
            .block_map
            .get(y as usize * self.size_x as usize + x as usize)?;

        self.blocks.get(usize::try_from(entry).ok()?)
    }
}
