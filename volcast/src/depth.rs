//! Conversion of depth buffer values back into eye-space distances.

use euclid::Transform3D;

use crate::camera::{Camera, Ndc};
use crate::math::{Eye, FreeCoordinate, MatrixRows as _};

/// Tolerance for the sparsity checks; elements computed by matrix inversion may be
/// slightly off from exact zero.
const SPARSITY_TOLERANCE: FreeCoordinate = 1e-9;

/// Decodes depth buffer values into distances from the eye, using four elements of the
/// inverse projection matrix.
///
/// The decoding assumes the inverse matrix has the sparsity pattern of a standard
/// perspective or parallel projection; [`DepthCodec::check_assumptions()`] verifies this.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthCodec {
    parallel: bool,
    m22: FreeCoordinate,
    m23: FreeCoordinate,
    m32: FreeCoordinate,
    m33: FreeCoordinate,
}

/// A projection matrix did not have the form [`DepthCodec`] relies on.
#[derive(Clone, Copy, Debug, PartialEq, displaydoc::Display)]
#[displaydoc(
    "inverse {kind} projection has M[{row}][{col}] = {actual}, expected {expected}; depths will be wrong"
)]
#[non_exhaustive]
pub struct DepthCodecError {
    /// `"parallel"` or `"perspective"`.
    pub kind: &'static str,
    /// Row of the offending element.
    pub row: usize,
    /// Column of the offending element.
    pub col: usize,
    /// Value of the offending element.
    pub actual: FreeCoordinate,
    /// Value the element should have had.
    pub expected: FreeCoordinate,
}

impl std::error::Error for DepthCodecError {}

impl DepthCodec {
    /// Extracts the coefficients from an inverse projection matrix.
    pub fn new(inverse_projection: &Transform3D<FreeCoordinate, Ndc, Eye>, parallel: bool) -> Self {
        Self {
            parallel,
            m22: inverse_projection.element(2, 2),
            m23: inverse_projection.element(2, 3),
            m32: inverse_projection.element(3, 2),
            m33: inverse_projection.element(3, 3),
        }
    }

    /// Builds the codec for `camera` viewed at `aspect`, along with the result of checking
    /// the matrix's sparsity.
    ///
    /// Returns [`None`] if the projection is not invertible.
    pub fn for_camera(
        camera: &Camera,
        aspect: FreeCoordinate,
    ) -> Option<(Self, Result<(), DepthCodecError>)> {
        let inverse = camera.projection_matrix(aspect).inverse()?;
        let parallel = camera.is_parallel();
        Some((
            Self::new(&inverse, parallel),
            Self::check_assumptions(&inverse, parallel),
        ))
    }

    /// Checks that `inverse_projection` has the element values that make the decoding
    /// formulas valid.
    pub fn check_assumptions(
        inverse_projection: &Transform3D<FreeCoordinate, Ndc, Eye>,
        parallel: bool,
    ) -> Result<(), DepthCodecError> {
        let (kind, required): (_, &[(usize, usize, FreeCoordinate)]) = if parallel {
            (
                "parallel",
                &[(3, 0, 0.0), (3, 1, 0.0), (3, 2, 0.0), (3, 3, 1.0)],
            )
        } else {
            (
                "perspective",
                &[(2, 0, 0.0), (2, 1, 0.0), (3, 0, 0.0), (3, 1, 0.0), (2, 2, 0.0)],
            )
        };
        for &(row, col, expected) in required {
            let actual = inverse_projection.element(row, col);
            if !((actual - expected).abs() <= SPARSITY_TOLERANCE) {
                return Err(DepthCodecError {
                    kind,
                    row,
                    col,
                    actual,
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Converts a depth buffer value in the range 0 to 1 into the distance from the eye
    /// to the plane (perpendicular to the view direction) at that depth.
    #[inline]
    pub fn plane_distance(&self, depth_buffer_value: f32) -> FreeCoordinate {
        self.ndc_plane_distance(2.0 * FreeCoordinate::from(depth_buffer_value) - 1.0)
    }

    /// Converts an NDC z value in the range −1 to 1 into the distance from the eye to the
    /// plane at that depth.
    #[inline]
    pub fn ndc_plane_distance(&self, z: FreeCoordinate) -> FreeCoordinate {
        if self.parallel {
            -z.mul_add(self.m22, self.m23)
        } else {
            -self.m23 / z.mul_add(self.m32, self.m33)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Projection;
    use euclid::{point3, vec3};
    use pretty_assertions::assert_eq;

    fn camera(projection: Projection) -> Camera {
        Camera::look_at(
            projection,
            point3(0.0, 0.0, 0.0),
            point3(0.0, 0.0, -1.0),
            vec3(0.0, 1.0, 0.0),
        )
        .unwrap()
        .with_clipping_range(0.5, 40.0)
    }

    fn assert_close(a: FreeCoordinate, b: FreeCoordinate) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[rstest::rstest]
    fn decodes_clip_planes(
        #[values(Projection::Perspective { fov_y: 30.0 }, Projection::Parallel { scale: 4.0 })]
        projection: Projection,
    ) {
        let camera = camera(projection);
        let (codec, check) = DepthCodec::for_camera(&camera, 1.5).unwrap();
        assert_eq!(check, Ok(()));
        assert_close(codec.plane_distance(0.0), 0.5);
        assert_close(codec.plane_distance(1.0), 40.0);
    }

    /// Decoding is the inverse of what the projection does to eye-space depth.
    #[rstest::rstest]
    fn decodes_projected_depths(
        #[values(Projection::Perspective { fov_y: 30.0 }, Projection::Parallel { scale: 4.0 })]
        projection: Projection,
    ) {
        let camera = camera(projection);
        let p = camera.projection_matrix(1.0);
        let (codec, _) = DepthCodec::for_camera(&camera, 1.0).unwrap();
        for distance in [0.5, 0.75, 1.0, 3.0, 17.25, 39.0] {
            let ndc = p.transform_point3d(point3(0.1, -0.2, -distance)).unwrap();
            assert_close(codec.ndc_plane_distance(ndc.z), distance);
        }
    }

    #[test]
    fn sparsity_violation_is_reported() {
        let mut rows = camera(Projection::Parallel { scale: 1.0 })
            .projection_matrix(1.0)
            .inverse()
            .unwrap()
            .to_rows();
        rows[3][2] = 0.25;
        let error = DepthCodec::check_assumptions(&Transform3D::from_rows(rows), true).unwrap_err();
        assert_eq!((error.row, error.col), (3, 2));
        assert_eq!(
            error.to_string(),
            "inverse parallel projection has M[3][2] = 0.25, expected 0; depths will be wrong"
        );
    }
}
