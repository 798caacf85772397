use std::fmt::Display;

use itertools::{Itertools, MinMaxResult};

use super::{BuildTree, NodeIdx};

/// Shape summary of a built tree, gathered in one walk over the leaves.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeStatistics {
    pub node_count: usize,
    pub leaf_count: usize,
    /// Depth of the leaves, root is depth 1
    pub depth: LeafSpread,
    /// Patch count of the leaves
    pub leaf_fill: LeafSpread,
}

/// Range and mean of a per-leaf quantity. All zero for a tree without leaves.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LeafSpread {
    pub min: usize,
    pub max: usize,
    pub mean: f32,
}

impl LeafSpread {
    fn of(values: &[usize]) -> LeafSpread {
        let (min, max) = match values.iter().copied().minmax() {
            MinMaxResult::NoElements => return LeafSpread::default(),
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        LeafSpread {
            min,
            max,
            mean: values.iter().sum::<usize>() as f32 / values.len() as f32,
        }
    }
}

impl BuildTree {
    pub fn print_tree(&self) {
        if let Some(root) = self.root {
            self.print_recursive(0, root);
        }
    }

    pub fn print_statistics(&self) {
        println!("{}", self.statistics());
    }

    pub fn statistics(&self) -> TreeStatistics {
        let mut depths = Vec::new();
        let mut fills = Vec::new();

        let mut stack: Vec<(NodeIdx, usize)> = self.root.map(|root| (root, 1)).into_iter().collect();
        while let Some((node_index, depth)) = stack.pop() {
            let node = &self.nodes[node_index];
            if node.is_leaf() {
                depths.push(depth);
                fills.push(node.patches.count);
            }
            stack.extend(node.children().map(|child| (child, depth + 1)));
        }

        TreeStatistics {
            node_count: self.nodes.len(),
            leaf_count: fills.len(),
            depth: LeafSpread::of(&depths),
            leaf_fill: LeafSpread::of(&fills),
        }
    }

    fn print_recursive(&self, indent: usize, node_index: NodeIdx) {
        let node = &self.nodes[node_index];
        let indent_str = "  ".repeat(indent);

        if node.is_leaf() {
            println!(
                "{}- L{}: {:?}-{:?} patches {:?}",
                indent_str,
                node_index.index(),
                node.bounds.min,
                node.bounds.max,
                node.patches.into_range(),
            );
            return;
        }

        println!(
            "{}- I{}: {:?}-{:?} ({} nodes)",
            indent_str,
            node_index.index(),
            node.bounds.min,
            node.bounds.max,
            node.subtree_size,
        );

        for child in node.children() {
            self.print_recursive(indent + 1, child);
        }
    }
}

impl Display for TreeStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Nodes: {} ({} leaves)", self.node_count, self.leaf_count)?;
        writeln!(f, "Leaf depth: {}", self.depth)?;
        write!(f, "Leaf fill: {}", self.leaf_fill)
    }
}

impl Display for LeafSpread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}; avg {:.1}", self.min, self.max, self.mean)
    }
}
