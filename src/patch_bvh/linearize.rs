use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::geometry::{Patch, WorldBox, WorldPoint};

use super::{BuildNode, BuildTree, BvhSettings, NodeIdx};

/// Pointer-free BVH node, four 3-wide vectors per record.
///
/// Nodes are stored in pre-order: the left child of a node directly follows it and the
/// right child follows the whole left subtree. A stackless traversal can therefore skip
/// a subtree by jumping straight to `right`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LinearNode {
    pub bound_min: [f32; 3],
    pub bound_max: [f32; 3],
    /// Left child index, right child index, unused.
    /// Missing children are `NO_CHILD`.
    pub children: [i32; 3],
    /// Patch count and first patch index of a leaf, unused. Zero for inner nodes.
    pub leaf: [u32; 3],
}

/// `LinearNode` with every field stored as float, for consumers that read the whole
/// buffer as a float texture.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FloatLinearNode {
    pub bound_min: [f32; 3],
    pub bound_max: [f32; 3],
    pub children: [f32; 3],
    pub leaf: [f32; 3],
}

/// Flattened BVH, immutable once built.
#[derive(Clone, Debug, Default)]
pub struct LinearBvh {
    nodes: Vec<LinearNode>,
}

impl LinearNode {
    pub const NO_CHILD: i32 = -1;

    fn new(node: &BuildNode, left: Option<usize>, right: Option<usize>) -> LinearNode {
        let encode_child = |index: Option<usize>| index.map_or(Self::NO_CHILD, |i| i as i32);
        LinearNode {
            bound_min: node.bounds.min.coords.into(),
            bound_max: node.bounds.max.coords.into(),
            children: [encode_child(left), encode_child(right), 0],
            leaf: [node.patches.count as u32, node.patches.start as u32, 0],
        }
    }

    pub fn left(&self) -> Option<usize> {
        decode_child(self.children[0])
    }

    pub fn right(&self) -> Option<usize> {
        decode_child(self.children[1])
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf[0] > 0
    }

    pub fn patch_range(&self) -> Range<usize> {
        let start = self.leaf[1] as usize;
        start..(start + self.leaf[0] as usize)
    }

    pub fn bounds(&self) -> WorldBox {
        WorldBox::new(
            WorldPoint::from(self.bound_min),
            WorldPoint::from(self.bound_max),
        )
    }
}

fn decode_child(value: i32) -> Option<usize> {
    usize::try_from(value).ok()
}

impl From<&LinearNode> for FloatLinearNode {
    fn from(node: &LinearNode) -> Self {
        FloatLinearNode {
            bound_min: node.bound_min,
            bound_max: node.bound_max,
            children: node.children.map(|x| x as f32),
            leaf: node.leaf.map(|x| x as f32),
        }
    }
}

impl LinearBvh {
    /// Builds the tree over the patches (reordering them) and flattens it.
    pub fn build(patches: &mut [Patch], settings: &BvhSettings) -> LinearBvh {
        let tree = BuildTree::build(patches, settings);
        let bvh = LinearBvh::from_tree(&tree);

        tracing::debug!(
            node_count = bvh.len(),
            leaf_count = bvh.nodes.iter().filter(|node| node.is_leaf()).count(),
            byte_len = bvh.byte_len(),
            "linear BVH built"
        );

        bvh
    }

    /// Writes the tree into a flat array in pre-order.
    /// Empty tree gives an empty array.
    #[tracing::instrument(skip_all, fields(node_count = tree.len()))]
    pub fn from_tree(tree: &BuildTree) -> LinearBvh {
        let Some(root) = tree.root() else {
            return LinearBvh::default();
        };

        let node_count = tree[root].subtree_size as usize;
        assert!(
            i32::try_from(node_count).is_ok(),
            "Node indices must fit into 32 bit signed integers"
        );

        let mut nodes = vec![LinearNode::zeroed(); node_count];
        linearize(&mut nodes, 0, tree, root);

        LinearBvh { nodes }
    }

    pub fn nodes(&self) -> &[LinearNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Size of the buffer returned by `as_bytes`.
    pub fn byte_len(&self) -> usize {
        std::mem::size_of_val(self.nodes.as_slice())
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    pub fn to_float_layout(&self) -> Vec<FloatLinearNode> {
        self.nodes.iter().map(FloatLinearNode::from).collect()
    }

    /// Checks that the buffer is a well formed pre-order layout whose leaves cover
    /// `patch_count` patches in order.
    pub fn validate(&self, patch_count: usize) -> Result<(), LayoutError> {
        let mut next_patch = 0;

        if !self.nodes.is_empty() {
            let end = self.validate_subtree(0, &mut next_patch)?;
            if end != self.nodes.len() {
                return Err(LayoutError::UnreachableNodes {
                    reachable: end,
                    total: self.nodes.len(),
                });
            }
        }

        if next_patch != patch_count {
            return Err(LayoutError::PatchCoverage {
                covered: next_patch,
                patch_count,
            });
        }

        Ok(())
    }

    /// Returns the index one past the end of the subtree.
    fn validate_subtree(&self, index: usize, next_patch: &mut usize) -> Result<usize, LayoutError> {
        let node = &self.nodes[index];
        let bounds = node.bounds();

        if node.is_leaf() {
            if node.left().is_some() || node.right().is_some() {
                return Err(LayoutError::LeafWithChildren { node: index });
            }
            let range = node.patch_range();
            if range.start != *next_patch {
                return Err(LayoutError::PatchRangeMismatch {
                    node: index,
                    start: range.start,
                    expected: *next_patch,
                });
            }
            *next_patch = range.end;
            return Ok(index + 1);
        }

        if node.left().is_none() && node.right().is_none() {
            return Err(LayoutError::EmptyInnerNode { node: index });
        }

        let mut end = index + 1;
        for child in [node.left(), node.right()].into_iter().flatten() {
            if child != end {
                return Err(LayoutError::ChildMisplaced {
                    node: index,
                    child,
                    expected: end,
                });
            }
            if child >= self.nodes.len() {
                return Err(LayoutError::ChildOutOfRange { node: index, child });
            }
            if !bounds.contains_box(&self.nodes[child].bounds()) {
                return Err(LayoutError::BoundsNotContained { node: index, child });
            }
            end = self.validate_subtree(child, next_patch)?;
        }

        Ok(end)
    }
}

/// Writes `node_index` and its subtree into `output`, starting at `position`.
///
/// The left subtree goes right after the node and takes exactly its `subtree_size` slots,
/// the right subtree follows it.
fn linearize(output: &mut [LinearNode], position: usize, tree: &BuildTree, node_index: NodeIdx) {
    let node = &tree[node_index];
    let mut next = position + 1;

    let mut left = None;
    if let Some(left_index) = node.left {
        linearize(output, next, tree, left_index);
        left = Some(next);
        next += tree[left_index].subtree_size as usize;
    }

    let mut right = None;
    if let Some(right_index) = node.right {
        linearize(output, next, tree, right_index);
        right = Some(next);
    }

    output[position] = LinearNode::new(node, left, right);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Leaf node {node} has children")]
    LeafWithChildren { node: usize },

    #[error("Inner node {node} has no children")]
    EmptyInnerNode { node: usize },

    #[error("Node {node} has child at {child}, expected {expected}")]
    ChildMisplaced {
        node: usize,
        child: usize,
        expected: usize,
    },

    #[error("Node {node} points to child {child} past the end of the buffer")]
    ChildOutOfRange { node: usize, child: usize },

    #[error("Bounds of node {node} don't contain bounds of child {child}")]
    BoundsNotContained { node: usize, child: usize },

    #[error("Leaf {node} starts at patch {start}, expected {expected}")]
    PatchRangeMismatch {
        node: usize,
        start: usize,
        expected: usize,
    },

    #[error("Only {reachable} of {total} nodes are reachable from the root")]
    UnreachableNodes { reachable: usize, total: usize },

    #[error("Leaves cover {covered} patches, expected {patch_count}")]
    PatchCoverage { covered: usize, patch_count: usize },
}
