use iff::{ByteStream, DecodeError};
use log::debug;
use nom::{
    Parser,
    combinator::map,
    number::complete::{le_f32, le_u32},
};

pub const MATERIAL_LIST_CLASS: &str = "TS::MaterialList";
pub const LATEST_MATERIAL_VERSION: u32 = 4;

const NAME_SIZE_V1: usize = 16;
const NAME_SIZE_V2: usize = 32;

pub const FLAG_MASK: u32 = 0xF;
pub const SHADING_MASK: u32 = 0xF00;
pub const TEXTURE_MASK: u32 = 0xF000;
pub const TEXTURE_TRANSPARENT: u32 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Null,
    Palette,
    Rgb,
    Texture,
    Unknown(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    None,
    Flat,
    Smooth,
    Unknown(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub flags: u32,
    pub alpha: f32,
    pub index: u32,
    /// Last byte is padding.
    pub rgb: [u8; 4],
    pub file_name: String,
    /// Surface property type, used by the game's collision scripts.
    pub property_type: u32,
    pub elasticity: f32,
    pub friction: f32,
    pub use_default_props: u32,
}

impl Material {
    pub fn kind(&self) -> MaterialKind {
        match self.flags & FLAG_MASK {
            0 => MaterialKind::Null,
            1 => MaterialKind::Palette,
            2 => MaterialKind::Rgb,
            3 => MaterialKind::Texture,
            rest => MaterialKind::Unknown(rest),
        }
    }

    pub fn shading(&self) -> Shading {
        match self.flags & SHADING_MASK {
            0x100 => Shading::None,
            0x200 => Shading::Flat,
            0x300 => Shading::Smooth,
            rest => Shading::Unknown(rest),
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.flags & TEXTURE_MASK & TEXTURE_TRANSPARENT != 0
    }

    fn read(stream: &mut ByteStream, version: u32) -> Result<Self, DecodeError> {
        let (flags, alpha, index) = stream.parse((le_u32, le_f32, le_u32))?;
        let rgb = stream.read_array::<4>()?;
        let file_name = stream.read_fixed_string(if version < 2 {
            NAME_SIZE_V1
        } else {
            NAME_SIZE_V2
        })?;

        let (property_type, elasticity, friction) = if version == 1 || version > 2 {
            stream.parse((le_u32, le_f32, le_f32))?
        } else {
            (0, 0., 0.)
        };

        let use_default_props = if version != 2 && version != 3 {
            stream.read_u32()?
        } else {
            1
        };

        Ok(Self {
            flags,
            alpha,
            index,
            rgb,
            file_name,
            property_type,
            elasticity,
            friction,
            use_default_props,
        })
    }
}

/// Materials for every detail level, `detail_count` runs of `per_detail` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialList {
    pub detail_count: u32,
    pub materials: Vec<Material>,
}

impl MaterialList {
    pub fn read(stream: &mut ByteStream, version: u32) -> Result<Self, DecodeError> {
        if version > LATEST_MATERIAL_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                format: MATERIAL_LIST_CLASS,
                version,
            });
        }

        let (detail_count, per_detail) =
            stream.parse(map((le_u32, le_u32), |(a, b)| (a, b as usize)))?;
        let total = per_detail.saturating_mul(detail_count as usize);

        debug!("material list v{version}: {detail_count} details of {per_detail}");

        let mut materials = Vec::new();
        for _ in 0..total {
            materials.push(Material::read(stream, version)?);
        }

        Ok(Self {
            detail_count,
            materials,
        })
    }

    pub fn per_detail(&self) -> usize {
        if self.detail_count == 0 {
            return 0;
        }

        self.materials.len() / self.detail_count as usize
    }

    pub fn get(&self, detail: usize, index: usize) -> Option<&Material> {
        if index >= self.per_detail() {
            return None;
        }

        self.materials.get(detail * self.per_detail() + index)
    }
}
