//! Decoders for Darkstar engine assets and playback of their animations.
//!
//! [`decode`] turns a buffer holding one chunk into a [`PersistentObject`]. The
//! per-format crates are re-exported for direct use.
pub mod config;

use iff::{ByteStream, DecodeError, Registry, RIFF};
use log::debug;

pub use animation;
pub use bitmap;
pub use iff;
pub use interior;
pub use lzh;
pub use palette;
pub use shape;
pub use terrain;

use bitmap::{Bitmap, BM, PBMP};
use interior::{InteriorGeom, INTERIOR_CLASS};
use palette::{Palette, PL98, PPAL};
use shape::{
    CelAnimMesh, MaterialList, Shape, ShapeParts, MATERIAL_LIST_CLASS, MESH_CLASS, SHAPE_CLASS,
};
use terrain::{TerrainBlock, TerrainBlockList, GBLK, GFIL};

/// Every object kind the default registry can decode.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistentObject {
    Palette(Palette),
    Bitmap(Bitmap),
    MaterialList(MaterialList),
    CelAnimMesh(CelAnimMesh),
    Shape(Box<Shape>),
    InteriorGeom(InteriorGeom),
    TerrainBlock(TerrainBlock),
    TerrainBlockList(TerrainBlockList),
}

impl PersistentObject {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Palette(_) => "palette",
            Self::Bitmap(_) => "bitmap",
            Self::MaterialList(_) => "material list",
            Self::CelAnimMesh(_) => "mesh",
            Self::Shape(_) => "shape",
            Self::InteriorGeom(_) => "interior",
            Self::TerrainBlock(_) => "terrain block",
            Self::TerrainBlockList(_) => "terrain block list",
        }
    }

    pub fn into_shape(self) -> Option<Shape> {
        match self {
            Self::Shape(shape) => Some(*shape),
            _ => None,
        }
    }
}

impl ShapeParts for PersistentObject {
    fn into_mesh(self) -> Option<CelAnimMesh> {
        match self {
            Self::CelAnimMesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    fn into_material_list(self) -> Option<MaterialList> {
        match self {
            Self::MaterialList(list) => Some(list),
            _ => None,
        }
    }
}

/// Registry knowing every class name and chunk tag of the engine's asset formats.
pub fn default_registry() -> Registry<PersistentObject> {
    Registry::new()
        .with_class(SHAPE_CLASS, |stream, version, registry| {
            Shape::read(stream, version, registry)
                .map(|shape| PersistentObject::Shape(Box::new(shape)))
        })
        .with_class(MESH_CLASS, |stream, version, _| {
            CelAnimMesh::read(stream, version).map(PersistentObject::CelAnimMesh)
        })
        .with_class(MATERIAL_LIST_CLASS, |stream, version, _| {
            MaterialList::read(stream, version).map(PersistentObject::MaterialList)
        })
        .with_class(INTERIOR_CLASS, |stream, version, _| {
            InteriorGeom::read(stream, version).map(PersistentObject::InteriorGeom)
        })
        .with_tag(RIFF, read_palette)
        .with_tag(PPAL, read_palette)
        .with_tag(PL98, read_palette)
        .with_tag(PBMP, read_bitmap)
        .with_tag(BM, read_bitmap)
        .with_tag(GBLK, |stream, _, _| {
            TerrainBlock::read(stream).map(PersistentObject::TerrainBlock)
        })
        .with_tag(GFIL, |stream, _, _| {
            TerrainBlockList::read(stream).map(PersistentObject::TerrainBlockList)
        })
}

fn read_palette(
    stream: &mut ByteStream,
    _: u32,
    _: &Registry<PersistentObject>,
) -> Result<PersistentObject, DecodeError> {
    Palette::read(stream).map(PersistentObject::Palette)
}

fn read_bitmap(
    stream: &mut ByteStream,
    _: u32,
    _: &Registry<PersistentObject>,
) -> Result<PersistentObject, DecodeError> {
    Bitmap::read(stream).map(PersistentObject::Bitmap)
}

/// Decodes the object at the start of `bytes` with the default registry.
pub fn decode(bytes: &[u8]) -> Result<PersistentObject, DecodeError> {
    decode_with(&default_registry(), bytes)
}

pub fn decode_with<T>(registry: &Registry<T>, bytes: &[u8]) -> Result<T, DecodeError> {
    registry.create_from_stream(&mut ByteStream::new(bytes))
}

/// Decodes consecutive objects until the buffer runs out. Stops at the first failure.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<PersistentObject>, DecodeError> {
    let registry = default_registry();
    let mut stream = ByteStream::new(bytes);
    let mut res = vec![];

    while !stream.is_eof() {
        res.push(registry.create_from_stream(&mut stream)?);
    }

    debug!("decoded {} objects", res.len());

    Ok(res)
}
