//! Mathematical utilities and decisions.

mod aab;
pub use aab::*;
mod color;
pub use color::*;
mod matrix;
pub use matrix::*;

/// Coordinates that are not locked to any grid: world, eye, and volume-local space all use this.
pub type FreeCoordinate = f64;

/// Unit-of-measure type for world space, the space volume bounds are given in.
#[derive(Debug, Eq, PartialEq)]
#[expect(clippy::exhaustive_enums)]
pub enum World {}

/// Unit-of-measure type for eye space: the camera sits at the origin looking along −Z,
/// with +Y up.
#[derive(Debug, Eq, PartialEq)]
#[expect(clippy::exhaustive_enums)]
pub enum Eye {}

/// Unit-of-measure type for the data space of one particular volume.
#[derive(Debug, Eq, PartialEq)]
#[expect(clippy::exhaustive_enums)]
pub enum Local {}

/// Point in world space.
pub type FreePoint = euclid::Point3D<FreeCoordinate, World>;

/// Vector in world space.
pub type FreeVector = euclid::Vector3D<FreeCoordinate, World>;

/// Point in eye space.
pub type EyePoint = euclid::Point3D<FreeCoordinate, Eye>;

/// Vector in eye space.
pub type EyeVector = euclid::Vector3D<FreeCoordinate, Eye>;

/// Sort exactly two items; swap them if `a > b`.
#[inline]
pub fn sort_two<T: PartialOrd>(a: &mut T, b: &mut T) {
    if *a > *b {
        core::mem::swap(a, b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_two_swaps_only_when_needed() {
        let (mut a, mut b) = (2.0, 1.0);
        sort_two(&mut a, &mut b);
        assert_eq!((a, b), (1.0, 2.0));
        sort_two(&mut a, &mut b);
        assert_eq!((a, b), (1.0, 2.0));
    }
}
