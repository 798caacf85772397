use assert2::assert;

use crate::geometry::{Patch, WorldBox};

use super::{BuildNode, BuildTree, BvhSettings, NodeIdx, PatchRange};

impl BuildTree {
    /// Builds the tree over all patches, reordering them in place.
    ///
    /// Every leaf owns a contiguous range of the reordered sequence. The order is only
    /// meaningful once the whole build has finished.
    #[tracing::instrument(skip_all, fields(patch_count = patches.len()))]
    pub fn build(patches: &mut [Patch], settings: &BvhSettings) -> BuildTree {
        assert!(
            u32::try_from(patches.len()).is_ok(),
            "Patch indices must fit into 32 bits"
        );

        let tree = Self::build_subtree(patches, 0, settings);

        tracing::debug!(node_count = tree.len(), "patch tree built");
        tree
    }

    /// Builds a standalone tree over `patches`, which start at index `offset`
    /// of the whole patch sequence.
    fn build_subtree(patches: &mut [Patch], offset: usize, settings: &BvhSettings) -> BuildTree {
        let mut tree = BuildTree::default();
        tree.root = tree.build_recursive(patches, offset, settings);
        tree
    }

    fn build_recursive(
        &mut self,
        patches: &mut [Patch],
        offset: usize,
        settings: &BvhSettings,
    ) -> Option<NodeIdx> {
        if patches.is_empty() {
            return None;
        }

        let bounds = patch_bounds(patches);

        if patches.len() <= settings.leaf_threshold.get() {
            return Some(self.nodes.push(BuildNode {
                bounds,
                left: None,
                right: None,
                patches: PatchRange::new(offset, patches.len()),
                subtree_size: 1,
            }));
        }

        // Placeholder, overwritten once the children are known
        let node_index = self.nodes.push(BuildNode {
            bounds: WorldBox::empty(),
            left: None,
            right: None,
            patches: PatchRange::default(),
            subtree_size: 1,
        });

        let split = split_patches(patches, &bounds);
        let (left_patches, right_patches) = patches.split_at_mut(split);
        let (left, right) =
            self.build_children(left_patches, right_patches, offset, offset + split, settings);

        let subtree_size = 1 + left.map_or(0, |i| self.nodes[i].subtree_size)
            + right.map_or(0, |i| self.nodes[i].subtree_size);

        self.nodes[node_index] = BuildNode {
            bounds,
            left,
            right,
            patches: PatchRange::default(),
            subtree_size,
        };

        Some(node_index)
    }

    #[cfg(not(feature = "parallel"))]
    fn build_children(
        &mut self,
        left_patches: &mut [Patch],
        right_patches: &mut [Patch],
        left_offset: usize,
        right_offset: usize,
        settings: &BvhSettings,
    ) -> (Option<NodeIdx>, Option<NodeIdx>) {
        let left = self.build_recursive(left_patches, left_offset, settings);
        let right = self.build_recursive(right_patches, right_offset, settings);
        (left, right)
    }

    /// Large subtrees build their halves as separate trees on the rayon pool and
    /// get grafted back in pre-order, so the result matches the sequential build.
    #[cfg(feature = "parallel")]
    fn build_children(
        &mut self,
        left_patches: &mut [Patch],
        right_patches: &mut [Patch],
        left_offset: usize,
        right_offset: usize,
        settings: &BvhSettings,
    ) -> (Option<NodeIdx>, Option<NodeIdx>) {
        if left_patches.len() + right_patches.len() < settings.parallel_threshold {
            let left = self.build_recursive(left_patches, left_offset, settings);
            let right = self.build_recursive(right_patches, right_offset, settings);
            return (left, right);
        }

        let (left_tree, right_tree) = rayon::join(
            || Self::build_subtree(left_patches, left_offset, settings),
            || Self::build_subtree(right_patches, right_offset, settings),
        );
        (self.graft(left_tree), self.graft(right_tree))
    }

    /// Appends all nodes of another tree, returning the new index of its root.
    #[cfg(feature = "parallel")]
    fn graft(&mut self, other: BuildTree) -> Option<NodeIdx> {
        let shift = self.nodes.len();
        self.nodes.extend(other.nodes.into_iter().map(|node| BuildNode {
            left: node.left.map(|i| i + shift),
            right: node.right.map(|i| i + shift),
            ..node
        }));
        other.root.map(|i| i + shift)
    }
}

/// Bounds of every control point of every patch.
fn patch_bounds(patches: &[Patch]) -> WorldBox {
    let mut bounds = WorldBox::empty();
    for point in patches.iter().flat_map(Patch::iter) {
        bounds.grow_point(point);
    }
    bounds
}

/// Sorts the patches along the longest axis of their bounds and returns the index
/// where the upper half starts. The lower half gets the extra patch on odd counts.
fn split_patches(patches: &mut [Patch], bounds: &WorldBox) -> usize {
    bounds.longest_axis().sort(patches);
    patches.len().div_ceil(2)
}
