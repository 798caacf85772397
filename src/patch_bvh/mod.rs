mod building;
mod linearize;
mod printing;

use std::{num::NonZeroUsize, ops::Index};

use bon::Builder;
use index_vec::IndexVec;

use crate::geometry::WorldBox;

pub use linearize::{FloatLinearNode, LayoutError, LinearBvh, LinearNode};
pub use printing::{LeafSpread, TreeStatistics};

/// Leaf size used for quad patch meshes unless configured otherwise.
pub const DEFAULT_LEAF_THRESHOLD: NonZeroUsize = NonZeroUsize::new(3).unwrap();

#[derive(Copy, Clone, Debug, Builder)]
pub struct BvhSettings {
    /// Maximum number of patches referenced directly by a leaf.
    #[builder(default = DEFAULT_LEAF_THRESHOLD)]
    pub leaf_threshold: NonZeroUsize,

    /// Subtrees with at least this many patches build their halves on separate
    /// rayon tasks. Only used with the `parallel` feature.
    #[builder(default = 4096)]
    pub parallel_threshold: usize,
}

impl Default for BvhSettings {
    fn default() -> Self {
        BvhSettings::builder().build()
    }
}

/// Intermediate binary tree over a patch sequence.
///
/// Nodes live in a single arena and refer to their children by index.
/// The builder appends nodes in pre-order, so the root is always the first node.
#[derive(Clone, Debug, Default)]
pub struct BuildTree {
    nodes: IndexVec<NodeIdx, BuildNode>,
    root: Option<NodeIdx>,
}

#[derive(Clone, Debug)]
pub struct BuildNode {
    /// Encloses every control point of every patch in the subtree.
    pub bounds: WorldBox,
    pub left: Option<NodeIdx>,
    pub right: Option<NodeIdx>,
    /// Patches owned by a leaf, empty for inner nodes.
    pub patches: PatchRange,
    /// Number of nodes in the subtree, including this one.
    pub subtree_size: u32,
}

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
}

/// Contiguous range of the (reordered) patch sequence.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchRange {
    pub start: usize,
    pub count: usize,
}

impl PatchRange {
    pub fn new(start: usize, count: usize) -> PatchRange {
        PatchRange { start, count }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn into_range(self) -> std::ops::Range<usize> {
        self.start..(self.start + self.count)
    }
}

impl BuildNode {
    pub fn is_leaf(&self) -> bool {
        !self.patches.is_empty()
    }

    pub fn children(&self) -> impl Iterator<Item = NodeIdx> {
        self.left.into_iter().chain(self.right)
    }
}

impl BuildTree {
    pub fn root(&self) -> Option<NodeIdx> {
        self.root
    }

    pub fn root_node(&self) -> Option<&BuildNode> {
        self.root.map(|root| &self.nodes[root])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIdx, &BuildNode)> {
        self.nodes.iter_enumerated()
    }
}

impl Index<NodeIdx> for BuildTree {
    type Output = BuildNode;

    fn index(&self, index: NodeIdx) -> &BuildNode {
        &self.nodes[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert2::assert;

    #[test]
    fn default_settings() {
        let settings = BvhSettings::default();
        assert!(settings.leaf_threshold.get() == 3);
        assert!(settings.parallel_threshold == 4096);
    }

    #[test]
    fn settings_builder() {
        let settings = BvhSettings::builder()
            .leaf_threshold(NonZeroUsize::new(8).unwrap())
            .build();
        assert!(settings.leaf_threshold.get() == 8);
    }

    #[test]
    fn patch_range() {
        let range = PatchRange::new(5, 3);
        assert!(range.into_range() == (5..8));
        assert!(!range.is_empty());
        assert!(PatchRange::default().is_empty());
    }

    #[test]
    fn empty_tree() {
        let tree = BuildTree::default();
        assert!(tree.root().is_none());
        assert!(tree.root_node().is_none());
        assert!(tree.is_empty());
    }
}
