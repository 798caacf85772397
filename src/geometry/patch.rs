use std::ops::Index;

use bytemuck::{Pod, Zeroable};
use ordered_float::OrderedFloat;

use super::{Axis, FloatType, WorldBox, WorldPoint, WorldVector};

/// Quadrilateral surface patch given by four control points and a precomputed normal.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    points: [WorldPoint; 4],
    normal: WorldVector,
}

/// Patch in the layout expected by the shader side, five float triples.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuPatch {
    pub points: [[f32; 3]; 4],
    pub normal: [f32; 3],
}

impl Patch {
    pub fn new(points: [WorldPoint; 4], normal: WorldVector) -> Patch {
        Patch { points, normal }
    }

    /// Parallelogram spanned by three corners, the fourth one is `v3 + v2 - v1`.
    /// Normal is the normalized cross product of the two edges leaving `v1`,
    /// or zero for collinear corners.
    pub fn from_corners(v1: WorldPoint, v2: WorldPoint, v3: WorldPoint) -> Patch {
        let e1 = v2 - v1;
        let e2 = v3 - v1;
        Patch {
            points: [v1, v2, v3, v3 + e1],
            normal: e1
                .cross(&e2)
                .try_normalize(0.0)
                .unwrap_or_else(WorldVector::zeros),
        }
    }

    pub fn points(&self) -> &[WorldPoint; 4] {
        &self.points
    }

    pub fn normal(&self) -> &WorldVector {
        &self.normal
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldPoint> {
        self.points.iter()
    }

    pub fn bounding_box(&self) -> WorldBox {
        WorldBox::point_bounds(&self.points)
    }

    /// Sum of the control point coordinates along the axis.
    /// Orders the same way as the centroid does, without the division.
    pub fn ordering_key(&self, axis: Axis) -> FloatType {
        let i = axis.index();
        self.points.iter().map(|p| p[i]).sum()
    }

    /// Scales the patch around the origin and then moves it by the offset.
    /// The normal is unaffected for positive scales.
    pub fn transformed(&self, scale: FloatType, offset: &WorldVector) -> Patch {
        Patch {
            points: self.points.map(|p| WorldPoint::from(p.coords * scale + offset)),
            normal: self.normal,
        }
    }

    pub fn to_gpu(&self) -> GpuPatch {
        GpuPatch {
            points: self.points.map(|p| p.coords.into()),
            normal: self.normal.into(),
        }
    }
}

impl Index<usize> for Patch {
    type Output = WorldPoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl Axis {
    /// Strict ordering of patches along the axis, ties are not ordered.
    pub fn orders_before(self, a: &Patch, b: &Patch) -> bool {
        a.ordering_key(self) < b.ordering_key(self)
    }

    /// Sorts patches in place by their ordering key along this axis.
    pub fn sort(self, patches: &mut [Patch]) {
        patches.sort_unstable_by_key(|patch| OrderedFloat(patch.ordering_key(self)));
    }
}
