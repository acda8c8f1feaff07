use glam::Vec3;

use crate::types::{InteriorGeom, LeafRef, Surface};

impl InteriorGeom {
    /// Walks the BSP tree from the root node down to the leaf containing `point`.
    ///
    /// Points on a plane go to the front side. Returns `None` for a tree without
    /// nodes or one that does not terminate in a leaf.
    pub fn find_leaf(&self, point: Vec3) -> Option<LeafRef> {
        let mut current = 0usize;

        // a valid tree reaches a leaf before visiting every node
        for _ in 0..self.nodes.len() {
            let node = self.nodes.get(current)?;
            let plane = self.planes.get(usize::try_from(node.plane_index).ok()?)?;

            let child = if plane.distance(point) >= 0. {
                node.front
            } else {
                node.back
            };

            if child >= 0 {
                current = child as usize;
                continue;
            }

            return self.leaf_ref(-(child as i32 + 1) as usize);
        }

        None
    }

    fn leaf_ref(&self, leaf: usize) -> Option<LeafRef> {
        if leaf < self.empty_leaves.len() {
            return Some(LeafRef::Empty(leaf));
        }

        let solid = leaf - self.empty_leaves.len();
        (solid < self.solid_leaves.len()).then_some(LeafRef::Solid(solid))
    }

    /// Whether empty leaf `to` is in the potentially visible set of empty leaf `from`.
    ///
    /// Bits are stored least significant first, one per empty leaf.
    pub fn leaf_visible(&self, from: usize, to: usize) -> bool {
        if from >= self.empty_leaves.len() || to >= self.empty_leaves.len() {
            return false;
        }

        if from == to {
            return true;
        }

        let leaf = &self.empty_leaves[from];
        let byte = to / 8;

        if leaf.pvs_count <= 0 || byte >= leaf.pvs_count as usize {
            return false;
        }

        usize::try_from(leaf.pvs_index)
            .ok()
            .and_then(|start| self.pvs.get(start + byte))
            .is_some_and(|bits| bits & (1 << (to % 8)) != 0)
    }

    /// Points of a surface polygon in winding order.
    pub fn surface_polygon(&self, surface: &Surface) -> Option<Vec<Vec3>> {
        let start = usize::try_from(surface.vertex_index).ok()?;
        let vertices = self
            .vertices
            .get(start..start + surface.vertex_count as usize)?;

        vertices
            .iter()
            .map(|v| self.points.get(v.point_index as usize).copied())
            .collect()
    }
}
