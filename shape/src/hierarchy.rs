use std::ops::Range;

use iff::DecodeError;

use crate::types::Node;

/// Child lists of a node forest, flattened in `(parent, node)` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeHierarchy {
    /// Indexed by `parent + 1`, so slot 0 holds the roots.
    children: Vec<Range<usize>>,
    child_ids: Vec<usize>,
}

impl NodeHierarchy {
    pub fn build(nodes: &[Node]) -> Result<Self, DecodeError> {
        let count = nodes.len();
        let mut sorted = Vec::with_capacity(count);

        for (idx, node) in nodes.iter().enumerate() {
            let parent = node.parent as i32;

            if parent < -1 || parent >= count as i32 {
                return Err(DecodeError::InvalidReference {
                    what: "node parent",
                    index: parent as i64,
                    count,
                });
            }

            sorted.push(((parent + 1) as usize, idx));
        }

        sorted.sort_unstable();

        let mut children = vec![0..0; count + 1];
        let child_ids: Vec<usize> = sorted.iter().map(|&(_, idx)| idx).collect();

        let mut first = 0;
        for group in sorted.chunk_by(|a, b| a.0 == b.0) {
            children[group[0].0] = first..first + group.len();
            first += group.len();
        }

        let res = Self {
            children,
            child_ids,
        };

        res.check_acyclic()?;

        Ok(res)
    }

    pub fn len(&self) -> usize {
        self.child_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.child_ids.is_empty()
    }

    pub fn roots(&self) -> &[usize] {
        self.slot(0)
    }

    pub fn children(&self, node: usize) -> &[usize] {
        self.slot(node + 1)
    }

    /// `node` followed by all of its descendants, depth first in child order.
    pub fn descendants(&self, node: usize) -> Vec<usize> {
        let mut res = vec![];
        let mut stack = vec![node];

        while let Some(current) = stack.pop() {
            res.push(current);
            stack.extend(self.children(current).iter().rev());
        }

        res
    }

    fn slot(&self, slot: usize) -> &[usize] {
        self.children
            .get(slot)
            .and_then(|range| self.child_ids.get(range.clone()))
            .unwrap_or(&[])
    }

    // every node reachable from a root means no parent cycle
    fn check_acyclic(&self) -> Result<(), DecodeError> {
        let mut reached = vec![false; self.len()];

        for &root in self.roots() {
            for node in self.descendants(root) {
                reached[node] = true;
            }
        }

        match reached.iter().position(|&r| !r) {
            Some(node) => Err(DecodeError::InvalidReference {
                what: "node parent cycle at node",
                index: node as i64,
                count: self.len(),
            }),
            None => Ok(()),
        }
    }
}
