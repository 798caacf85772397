pub mod geometry;
mod model;
mod patch_bvh;

pub use model::{ModelExtents, ModelOpenError, PatchModel};
pub use patch_bvh::{
    BuildNode, BuildTree, BvhSettings, DEFAULT_LEAF_THRESHOLD, FloatLinearNode, LayoutError,
    LeafSpread, LinearBvh, LinearNode, NodeIdx, PatchRange, TreeStatistics,
};
