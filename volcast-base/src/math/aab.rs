use core::fmt;

use euclid::Point3D;

use crate::math::{FreeCoordinate, FreePoint, FreeVector};

/// Axis-Aligned Box data type, in world space.
///
/// Used to describe the extent of a volume so that its screen footprint can be bounded.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aab {
    lower_bounds: FreePoint,
    upper_bounds: FreePoint,
}

impl Aab {
    /// The [`Aab`] of zero size at the origin.
    pub const ZERO: Aab = Aab {
        lower_bounds: Point3D::new(0., 0., 0.),
        upper_bounds: Point3D::new(0., 0., 0.),
    };

    /// Pairs of indices into [`Aab::corner_points()`] which are the ends of the 12 edges
    /// of the box.
    ///
    /// Each pair differs in exactly one bit, i.e. along exactly one axis.
    pub const EDGES: [[usize; 2]; 12] = [
        [0, 1],
        [0, 2],
        [0, 4],
        [1, 3],
        [1, 5],
        [2, 3],
        [2, 6],
        [3, 7],
        [4, 5],
        [4, 6],
        [5, 7],
        [6, 7],
    ];

    /// Constructs an [`Aab`] from individual coordinates.
    #[inline]
    #[track_caller]
    pub fn new(
        lx: FreeCoordinate,
        hx: FreeCoordinate,
        ly: FreeCoordinate,
        hy: FreeCoordinate,
        lz: FreeCoordinate,
        hz: FreeCoordinate,
    ) -> Self {
        Self::from_lower_upper(Point3D::new(lx, ly, lz), Point3D::new(hx, hy, hz))
    }

    /// Constructs an [`Aab`] from most-negative and most-positive corner points.
    ///
    /// Panics if the points are not in the proper order or if they are NaN.
    #[inline]
    #[track_caller]
    pub fn from_lower_upper(
        lower_bounds: impl Into<FreePoint>,
        upper_bounds: impl Into<FreePoint>,
    ) -> Self {
        let lower_bounds = lower_bounds.into();
        let upper_bounds = upper_bounds.into();
        match Self::checked_from_lower_upper(lower_bounds, upper_bounds) {
            Some(aab) => aab,
            None => panic!(
                "invalid AAB points that are misordered or NaN: \
                lower {lower_bounds:?} upper {upper_bounds:?}"
            ),
        }
    }

    /// Constructs an [`Aab`] from most-negative and most-positive corner points.
    ///
    /// Returns [`None`] if the points are not in the proper order or if they are NaN.
    #[inline]
    pub fn checked_from_lower_upper(
        lower_bounds: FreePoint,
        upper_bounds: FreePoint,
    ) -> Option<Self> {
        if lower_bounds.x <= upper_bounds.x
            && lower_bounds.y <= upper_bounds.y
            && lower_bounds.z <= upper_bounds.z
        {
            Some(Self {
                lower_bounds,
                upper_bounds,
            })
        } else {
            None
        }
    }

    /// The most negative corner of the box.
    #[inline]
    pub const fn lower_bounds_p(&self) -> FreePoint {
        self.lower_bounds
    }

    /// The most positive corner of the box.
    #[inline]
    pub const fn upper_bounds_p(&self) -> FreePoint {
        self.upper_bounds
    }

    /// Size of the box in each axis.
    #[inline]
    pub fn size(&self) -> FreeVector {
        self.upper_bounds - self.lower_bounds
    }

    /// The center of the enclosed volume.
    ///
    /// ```
    /// use volcast_base::math::{Aab, FreePoint};
    ///
    /// let aab = Aab::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
    /// assert_eq!(aab.center(), FreePoint::new(1.5, 3.5, 5.5));
    /// ```
    #[inline]
    pub fn center(&self) -> FreePoint {
        (self.lower_bounds + self.upper_bounds.to_vector()) * 0.5
    }

    /// The eight corner points of the box.
    ///
    /// Bit 0 of the index selects the upper X bound, bit 1 the upper Y bound,
    /// and bit 2 the upper Z bound; [`Aab::EDGES`] depends on this ordering.
    #[inline]
    pub fn corner_points(self) -> [FreePoint; 8] {
        let l = self.lower_bounds;
        let u = self.upper_bounds;
        core::array::from_fn(|i| {
            Point3D::new(
                if i & 1 == 0 { l.x } else { u.x },
                if i & 2 == 0 { l.y } else { u.y },
                if i & 4 == 0 { l.z } else { u.z },
            )
        })
    }

    /// Returns whether this AAB, including the boundary, contains the point.
    #[inline]
    pub fn contains(&self, point: FreePoint) -> bool {
        let l = self.lower_bounds;
        let u = self.upper_bounds;
        (l.x..=u.x).contains(&point.x)
            && (l.y..=u.y).contains(&point.y)
            && (l.z..=u.z).contains(&point.z)
    }

    /// Returns a random point within this box, using inclusive ranges
    /// (`lower_bounds[axis] ≤ random_point()[axis] ≤ upper_bounds[axis]`).
    #[inline]
    pub fn random_point(self, rng: &mut impl rand::Rng) -> FreePoint {
        FreePoint::new(
            rng.random_range(self.lower_bounds.x..=self.upper_bounds.x),
            rng.random_range(self.lower_bounds.y..=self.upper_bounds.y),
            rng.random_range(self.lower_bounds.z..=self.upper_bounds.z),
        )
    }

    /// Translate this box by the specified offset.
    #[inline]
    #[must_use]
    #[track_caller] // in case of NaN
    pub fn translate(self, offset: FreeVector) -> Self {
        Self::from_lower_upper(self.lower_bounds + offset, self.upper_bounds + offset)
    }

    /// Computes the range of distances `t` along the ray `origin + t * direction` over which
    /// the ray is inside this box, or [`None`] if it misses entirely.
    ///
    /// The range may begin at a negative distance if the origin is inside or beyond the box.
    #[inline]
    pub fn ray_interval(
        &self,
        origin: FreePoint,
        direction: FreeVector,
    ) -> Option<(FreeCoordinate, FreeCoordinate)> {
        let mut t_min = FreeCoordinate::NEG_INFINITY;
        let mut t_max = FreeCoordinate::INFINITY;
        for (o, d, l, u) in [
            (origin.x, direction.x, self.lower_bounds.x, self.upper_bounds.x),
            (origin.y, direction.y, self.lower_bounds.y, self.upper_bounds.y),
            (origin.z, direction.z, self.lower_bounds.z, self.upper_bounds.z),
        ] {
            if d == 0.0 {
                if o < l || o > u {
                    return None;
                }
            } else {
                let mut t0 = (l - o) / d;
                let mut t1 = (u - o) / d;
                super::sort_two(&mut t0, &mut t1);
                t_min = t_min.max(t0);
                t_max = t_max.min(t1);
            }
        }
        (t_min <= t_max).then_some((t_min, t_max))
    }
}

impl fmt::Debug for Aab {
    #[allow(clippy::missing_inline_in_public_items)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Aab {
            lower_bounds: l,
            upper_bounds: u,
        } = *self;
        f.debug_tuple("Aab")
            .field(&(l.x..=u.x))
            .field(&(l.y..=u.y))
            .field(&(l.z..=u.z))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use euclid::{point3, vec3};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng as _;

    #[test]
    fn new_wrong_order() {
        assert_eq!(
            Aab::checked_from_lower_upper(point3(2., 1., 1.), point3(1., 2., 2.)),
            None
        );
        assert_eq!(
            Aab::checked_from_lower_upper(point3(1., 1., 2.), point3(2., 2., 1.)),
            None
        );
    }

    #[test]
    #[should_panic = "invalid AAB points that are misordered or NaN: lower (0.0, 0.0, 0.0) upper (1.0, 1.0, NaN)"]
    fn new_panic_message() {
        Aab::from_lower_upper([0., 0., 0.], [1., 1., f64::NAN]);
    }

    #[test]
    fn debug() {
        let aab = Aab::new(1.0000001, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(
            format!("{aab:?}"),
            "Aab(1.0000001..=2.0, 3.0..=4.0, 5.0..=6.0)"
        );
    }

    #[test]
    fn corner_points() {
        assert_eq!(
            Aab::new(10., 11., 20., 21., 30., 31.).corner_points(),
            [
                point3(10., 20., 30.),
                point3(11., 20., 30.),
                point3(10., 21., 30.),
                point3(11., 21., 30.),
                point3(10., 20., 31.),
                point3(11., 20., 31.),
                point3(10., 21., 31.),
                point3(11., 21., 31.),
            ],
        );
    }

    #[test]
    fn edges_differ_along_one_axis() {
        for [a, b] in Aab::EDGES {
            assert!(a < b);
            assert_eq!((a ^ b).count_ones(), 1, "{a} {b}");
        }
        // Every corner is the end of exactly three edges.
        for corner in 0..8 {
            let count = Aab::EDGES
                .iter()
                .filter(|edge| edge.contains(&corner))
                .count();
            assert_eq!(count, 3, "corner {corner}");
        }
    }

    #[test]
    fn random_point_is_contained() {
        let aab = Aab::new(-1.5, 2.0, 0.0, 0.25, 10.0, 30.0);
        let mut rng = rand_xoshiro::Xoshiro256Plus::seed_from_u64(1);
        for _ in 0..1000 {
            assert!(aab.contains(aab.random_point(&mut rng)));
        }
    }

    #[test]
    fn ray_interval_hit_and_miss() {
        let aab = Aab::new(-1., 1., -1., 1., -1., 1.);
        assert_eq!(
            aab.ray_interval(point3(0., 0., 5.), vec3(0., 0., -1.)),
            Some((4.0, 6.0))
        );
        assert_eq!(
            aab.ray_interval(point3(3., 0., 5.), vec3(0., 0., -1.)),
            None
        );
        // Axis-parallel ray grazing the boundary
        assert_eq!(
            aab.ray_interval(point3(1., 1., 5.), vec3(0., 0., -1.)),
            Some((4.0, 6.0))
        );
    }
}
