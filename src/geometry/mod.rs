mod aabb;
mod patch;

pub use aabb::AABB;
pub use patch::{GpuPatch, Patch};

pub type FloatType = f32;

pub type WorldPoint = nalgebra::Point3<FloatType>;
pub type WorldVector = nalgebra::Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

/// Coordinate axis, used to pick split planes and patch orderings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Axis with the largest extent.
    /// Ties prefer X over Y over Z.
    pub fn longest(extent: &WorldVector) -> Axis {
        if extent.x >= extent.y && extent.x >= extent.z {
            Axis::X
        } else if extent.y >= extent.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use proptest::prelude::*;

    /// Newtype with a `Deref` to the inner value and an `Arbitrary` impl driven by the
    /// given strategy, so that test_strategy can take it as a plain argument.
    macro_rules! arbitrary_wrapper {
        ( $wrapper_name:ident ( $type:ty ) -> $block:block ) => {
            #[derive(Clone, Debug)]
            pub struct $wrapper_name(pub $type);

            impl std::ops::Deref for $wrapper_name {
                type Target = $type;
                fn deref(&self) -> &$type {
                    &self.0
                }
            }

            impl Arbitrary for $wrapper_name {
                type Parameters = ();
                type Strategy = proptest::strategy::BoxedStrategy<Self>;
                fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
                    $block.prop_map(|x| $wrapper_name(x)).boxed()
                }
            }
        };
    }

    /// Coordinates up to about 2e6 in magnitude, well outside of a unit scene.
    fn simple_float() -> BoxedStrategy<f32> {
        any::<i32>().prop_map(|n| n as f32 * 1e-3).boxed()
    }

    pub fn world_point() -> BoxedStrategy<WorldPoint> {
        (simple_float(), simple_float(), simple_float())
            .prop_map(|coords| WorldPoint::new(coords.0, coords.1, coords.2))
            .boxed()
    }

    /// Patch with arbitrary corners and a fixed normal.
    /// The builder never looks at the normal, so there is no point in deriving it.
    pub fn patch() -> BoxedStrategy<Patch> {
        proptest::array::uniform4(world_point())
            .prop_map(|points| Patch::new(points, WorldVector::z()))
            .boxed()
    }

    pub fn patches(size: std::ops::Range<usize>) -> BoxedStrategy<Vec<Patch>> {
        proptest::collection::vec(patch(), size).boxed()
    }

    arbitrary_wrapper! {
        WorldPointWrapper(WorldPoint) -> {
            world_point()
        }
    }

    arbitrary_wrapper! {
        PatchesWrapper(Vec<Patch>) -> {
            patches(0..200)
        }
    }

    mod axis {
        use super::*;
        use assert2::assert;
        use test_case::test_case;

        #[test_case(1.0, 1.0, 1.0, Axis::X ; "all_equal")]
        #[test_case(3.0, 2.0, 1.0, Axis::X ; "x_longest")]
        #[test_case(1.0, 2.0, 2.0, Axis::Y ; "y_z_tie")]
        #[test_case(2.0, 2.0, 1.0, Axis::X ; "x_y_tie")]
        #[test_case(1.0, 3.0, 2.0, Axis::Y ; "y_longest")]
        #[test_case(1.0, 2.0, 3.0, Axis::Z ; "z_longest")]
        #[test_case(0.0, 0.0, 0.0, Axis::X ; "degenerate")]
        fn longest(x: f32, y: f32, z: f32, expected: Axis) {
            assert!(Axis::longest(&WorldVector::new(x, y, z)) == expected);
        }

        #[test]
        fn index_matches_vector_component() {
            let v = WorldVector::new(10.0, 20.0, 30.0);
            for axis in Axis::ALL {
                assert!(v[axis.index()] == 10.0 * (axis.index() + 1) as f32);
            }
        }
    }
}
