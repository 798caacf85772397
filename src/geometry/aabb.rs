use num_traits::One;
use std::ops::Sub;

use nalgebra::{ClosedAddAssign, ClosedDivAssign, Point, Scalar};

use assert2::assert;

use super::{Axis, FloatType, WorldBox, WorldPoint};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + ClosedAddAssign + ClosedDivAssign + One, const D: usize> AABB<Point<T, D>> {
    pub fn center(&self) -> Point<T, D> {
        let two = T::one() + T::one();
        let avg_coords = (&self.min.coords + &self.max.coords) / two;
        Point::from(avg_coords)
    }
}

impl WorldBox {
    /// Box that contains nothing, every real point widens it.
    /// Min is seeded with the largest representable value and max with the smallest one,
    /// so that the first sample always dominates regardless of the scene scale.
    pub fn empty() -> WorldBox {
        AABB {
            min: WorldPoint::from([FloatType::INFINITY; 3]),
            max: WorldPoint::from([FloatType::NEG_INFINITY; 3]),
        }
    }

    /// Componentwise min and max of a non-empty fixed-size set of points.
    pub fn point_bounds<const N: usize>(points: &[WorldPoint; N]) -> WorldBox {
        assert!(N > 0, "Bounds of an empty point set are undefined");
        let mut ret = WorldBox::empty();
        for point in points {
            ret.grow_point(point);
        }
        ret
    }

    /// Bounding box of the points, or None if the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a WorldPoint>) -> Option<WorldBox> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut ret = AABB::new(*first, *first);
        for point in iter {
            ret.grow_point(point);
        }
        Some(ret)
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn grow_point(&mut self, point: &WorldPoint) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn union(&self, other: &WorldBox) -> WorldBox {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Checks that the other box lies completely inside this one (touching is fine).
    /// Empty box is contained in everything.
    pub fn contains_box(&self, other: &WorldBox) -> bool {
        other.is_empty()
            || (0..3).all(|i| self.min[i] <= other.min[i] && other.max[i] <= self.max[i])
    }

    pub fn contains_point(&self, point: &WorldPoint) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    pub fn longest_axis(&self) -> Axis {
        Axis::longest(&self.size())
    }
}
