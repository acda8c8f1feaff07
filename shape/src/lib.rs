//! Darkstar shapes: the node/sequence/keyframe tables of `TS::Shape`, its
//! `TS::CelAnimMesh` vertex-animated meshes and `TS::MaterialList`.
mod hierarchy;
mod material;
mod mesh;
mod parser;
mod types;

use iff::Registry;

pub use hierarchy::NodeHierarchy;
pub use material::*;
pub use mesh::*;
pub use parser::SHAPE_CLASS;
pub use types::*;

/// Object kinds a shape can find nested inside itself.
pub trait ShapeParts {
    fn into_mesh(self) -> Option<CelAnimMesh>;
    fn into_material_list(self) -> Option<MaterialList>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapePart {
    Shape(Box<Shape>),
    Mesh(CelAnimMesh),
    MaterialList(MaterialList),
}

impl ShapeParts for ShapePart {
    fn into_mesh(self) -> Option<CelAnimMesh> {
        match self {
            Self::Mesh(mesh) => Some(mesh),
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

/// Registry covering only the shape family of classes.
pub fn registry() -> Registry<ShapePart> {
    Registry::new()
        .with_class(SHAPE_CLASS, |stream, version, registry| {
            Shape::read(stream, version, registry).map(|shape| ShapePart::Shape(Box::new(shape)))
        })
        .with_class(MESH_CLASS, |stream, version, _| {
            CelAnimMesh::read(stream, version).map(ShapePart::Mesh)
        })
        .with_class(MATERIAL_LIST_CLASS, |stream, version, _| {
            MaterialList::read(stream, version).map(ShapePart::MaterialList)
        })
}
