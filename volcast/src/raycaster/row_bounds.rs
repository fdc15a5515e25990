//! Screen-space footprints of volume bounding boxes.

use euclid::Transform3D;

use crate::camera::{ImageSize, Ndc};
use crate::math::{Aab, FreeCoordinate, World};

/// For each row of an image, the range of columns a volume's projected bounding box may
/// cover. Rays outside this range cannot hit the volume and are not cast.
///
/// Bounds are conservative: every pixel whose center ray might pass through the box is
/// included, and possibly a few more.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowBounds {
    width: u32,
    /// Inclusive `(min, max)` column per row; `min > max` for rows the box does not reach.
    rows: Vec<(i32, i32)>,
}

impl RowBounds {
    /// Projects `bounds` through `world_to_ndc` onto an image of `size` pixels and
    /// rasterizes the outline of the result.
    pub fn compute(
        bounds: &Aab,
        world_to_ndc: &Transform3D<FreeCoordinate, World, Ndc>,
        size: ImageSize,
    ) -> Self {
        let width = FreeCoordinate::from(size.width);
        let height = FreeCoordinate::from(size.height);

        let mut corners = [(0.0, 0.0); 8];
        for (display, corner) in corners.iter_mut().zip(bounds.corner_points()) {
            let h = world_to_ndc.transform_point3d_homogeneous(corner);
            if !(h.w > 0.0) {
                // Part of the box is behind the eye, so its projection is unbounded.
                return Self::full(size);
            }
            *display = (
                (h.x / h.w + 1.0) * 0.5 * width,
                (h.y / h.w + 1.0) * 0.5 * height,
            );
        }

        let mut result = Self::empty(size);
        let last_row = i64::from(size.height) - 1;
        for [a, b] in Aab::EDGES {
            let (mut p0, mut p1) = (corners[a], corners[b]);
            if p0.1 > p1.1 {
                core::mem::swap(&mut p0, &mut p1);
            }
            let first = (p0.1.floor() as i64).max(0);
            let last = (p1.1.floor() as i64).min(last_row);
            for row in first..=last {
                // Portion of the edge within this row's band of y values
                let (x_start, x_end) = if p1.1 > p0.1 {
                    let x_at = |y: FreeCoordinate| p0.0 + (p1.0 - p0.0) * ((y - p0.1) / (p1.1 - p0.1));
                    let band_low = (row as FreeCoordinate).max(p0.1);
                    let band_high = ((row + 1) as FreeCoordinate).min(p1.1);
                    (x_at(band_low), x_at(band_high))
                } else {
                    (p0.0, p1.0)
                };
                result.widen(row as usize, x_start.min(x_end), x_start.max(x_end));
            }
        }
        result
    }

    /// Bounds which include no pixels.
    pub fn empty(size: ImageSize) -> Self {
        Self {
            width: size.width,
            rows: vec![(size.width as i32 + 1, -1); size.height as usize],
        }
    }

    /// Bounds which include every pixel.
    pub fn full(size: ImageSize) -> Self {
        Self {
            width: size.width,
            rows: vec![(0, size.width as i32 - 1); size.height as usize],
        }
    }

    /// Includes the columns from `x_min` to `x_max` in `row`, plus one more column on
    /// each side.
    fn widen(&mut self, row: usize, x_min: FreeCoordinate, x_max: FreeCoordinate) {
        let clamp = |x: FreeCoordinate| x.clamp(-1.0, FreeCoordinate::from(self.width)) as i32;
        let (min, max) = &mut self.rows[row];
        *min = (*min).min(clamp(x_min.floor() - 1.0));
        *max = (*max).max(clamp(x_max.floor() + 1.0));
    }

    /// Returns the inclusive range of columns that may be covered in `row`,
    /// clipped to the image, or [`None`] if none are.
    pub fn row(&self, row: u32) -> Option<core::ops::RangeInclusive<u32>> {
        let &(min, max) = self.rows.get(row as usize)?;
        let min = min.max(0);
        let max = max.min(self.width as i32 - 1);
        (min <= max).then(|| min as u32..=max as u32)
    }

    /// Returns whether the pixel at (`column`, `row`) may be covered.
    #[inline]
    pub fn contains(&self, column: u32, row: u32) -> bool {
        match self.rows.get(row as usize) {
            Some(&(min, max)) => (min..=max).contains(&(column as i32)),
            None => false,
        }
    }
}
