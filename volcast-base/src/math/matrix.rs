//! Access to [`euclid::Transform3D`] in the conventional mathematical layout.
//! This module is private but reexported by its parent.

use euclid::Transform3D;

use crate::math::FreeCoordinate;

/// Conversions between [`Transform3D`] and the column-vector (“OpenGL”) matrix layout,
/// in which `M[row][col]` multiplies column vectors from the left and the translation
/// lives in the last column.
///
/// `euclid` stores the transpose of this (it multiplies row vectors from the right), which
/// makes element positions easy to confuse when porting formulas that are written in terms
/// of `M[row][col]`.
pub trait MatrixRows: Sized {
    /// Constructs a transform from rows of a column-vector matrix.
    fn from_rows(rows: [[FreeCoordinate; 4]; 4]) -> Self;

    /// Returns the element at `row`, `col` of the column-vector matrix.
    ///
    /// Panics if either index is not less than 4.
    fn element(&self, row: usize, col: usize) -> FreeCoordinate;

    /// Returns all rows of the column-vector matrix.
    fn to_rows(&self) -> [[FreeCoordinate; 4]; 4] {
        core::array::from_fn(|row| core::array::from_fn(|col| self.element(row, col)))
    }
}

impl<Src, Dst> MatrixRows for Transform3D<FreeCoordinate, Src, Dst> {
    #[inline]
    #[rustfmt::skip]
    fn from_rows(r: [[FreeCoordinate; 4]; 4]) -> Self {
        Transform3D::new(
            r[0][0], r[1][0], r[2][0], r[3][0],
            r[0][1], r[1][1], r[2][1], r[3][1],
            r[0][2], r[1][2], r[2][2], r[3][2],
            r[0][3], r[1][3], r[2][3], r[3][3],
        )
    }

    #[inline]
    fn element(&self, row: usize, col: usize) -> FreeCoordinate {
        self.to_arrays()[col][row]
    }
}
