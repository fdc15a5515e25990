use euclid::{Point3D, Transform3D, point3, vec3};

use crate::camera::{Camera, ImageSize, Ndc, area_usize, pixel_center_ndc};
use crate::math::{Eye, EyePoint, EyeVector, FreeCoordinate, MatrixRows as _};

/// The eye-space rays through the pixel centers of an image of a particular size.
///
/// Rays are expressed in eye space, so they depend only on the camera's projection and
/// not on where the camera is; see [`ViewRayGenerator`] for caching.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ViewRaySet {
    /// Every ray starts at the eye and has its own unit direction.
    Perspective {
        /// Image size the rays were computed for.
        size: ImageSize,
        /// Row-major, bottom row first, one direction per pixel.
        directions: Vec<EyeVector>,
    },
    /// Every ray has direction −Z and starts on the eye's Z = 0 plane at
    /// `start + i * increment_x + j * increment_y`.
    Parallel {
        /// Image size the rays were computed for.
        size: ImageSize,
        /// Origin of the ray through pixel (0, 0).
        start: EyePoint,
        /// Change in origin from one column to the next.
        increment_x: EyeVector,
        /// Change in origin from one row to the next.
        increment_y: EyeVector,
    },
}

impl ViewRaySet {
    /// Computes the rays for an image of `size` pixels seen through `projection`.
    ///
    /// Returns [`None`] if the projection matrix is not invertible.
    pub fn compute(
        projection: &Transform3D<FreeCoordinate, Eye, Ndc>,
        parallel: bool,
        size: ImageSize,
    ) -> Option<Self> {
        let inverse = projection.inverse()?;
        // Unproject a point on the near plane; the homogeneous divide is done by hand because
        // `transform_point3d` declines to produce points with w <= 0.
        let unproject = |x: FreeCoordinate, y: FreeCoordinate| -> EyePoint {
            let h = inverse.transform_point3d_homogeneous(point3(x, y, -1.0));
            point3(h.x / h.w, h.y / h.w, h.z / h.w)
        };

        if parallel {
            let width = size.width.max(1);
            let height = size.height.max(1);
            let p00 = unproject(pixel_center_ndc(0, width), pixel_center_ndc(0, height));
            let p10 = unproject(pixel_center_ndc(1, width), pixel_center_ndc(0, height));
            let p01 = unproject(pixel_center_ndc(0, width), pixel_center_ndc(1, height));
            let on_plane = |v: EyeVector| vec3(v.x, v.y, 0.0);
            Some(ViewRaySet::Parallel {
                size,
                start: point3(p00.x, p00.y, 0.0),
                increment_x: on_plane(p10 - p00),
                increment_y: on_plane(p01 - p00),
            })
        } else {
            let mut directions = Vec::with_capacity(area_usize(size).unwrap_or(0));
            for j in 0..size.height {
                let y = pixel_center_ndc(j, size.height);
                for i in 0..size.width {
                    let x = pixel_center_ndc(i, size.width);
                    let direction = unproject(x, y).to_vector();
                    directions.push(direction.try_normalize().unwrap_or(vec3(0.0, 0.0, -1.0)));
                }
            }
            Some(ViewRaySet::Perspective { size, directions })
        }
    }

    /// The image size these rays were computed for.
    pub fn size(&self) -> ImageSize {
        match *self {
            ViewRaySet::Perspective { size, .. } | ViewRaySet::Parallel { size, .. } => size,
        }
    }

    /// Returns the origin and unit direction of the ray through pixel (`i`, `j`).
    ///
    /// Panics if the pixel is outside the image.
    #[inline]
    pub fn eye_ray(&self, i: u32, j: u32) -> (EyePoint, EyeVector) {
        match self {
            ViewRaySet::Perspective { size, directions } => {
                assert!(i < size.width && j < size.height);
                let index = j as usize * size.width as usize + i as usize;
                (Point3D::origin(), directions[index])
            }
            &ViewRaySet::Parallel {
                size,
                start,
                increment_x,
                increment_y,
            } => {
                assert!(i < size.width && j < size.height);
                (
                    start
                        + increment_x * FreeCoordinate::from(i)
                        + increment_y * FreeCoordinate::from(j),
                    vec3(0.0, 0.0, -1.0),
                )
            }
        }
    }
}

/// Produces [`ViewRaySet`]s, keeping the most recent set for each resolution level so
/// that consecutive frames at the same level and projection reuse it.
#[derive(Debug, Default)]
pub struct ViewRayGenerator {
    levels: Vec<Option<CachedRays>>,
}

#[derive(Debug)]
struct CachedRays {
    projection: [[FreeCoordinate; 4]; 4],
    rays: ViewRaySet,
}

impl ViewRayGenerator {
    /// Creates an empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rays for `camera` at `size` pixels, recomputing them only if the
    /// cached set for `level` was made for a different size or projection.
    ///
    /// Returns [`None`] if the camera's projection is degenerate.
    pub fn rays(
        &mut self,
        level: usize,
        camera: &Camera,
        aspect: FreeCoordinate,
        size: ImageSize,
    ) -> Option<&ViewRaySet> {
        if self.levels.len() <= level {
            self.levels.resize_with(level + 1, || None);
        }
        let projection = camera.projection_matrix(aspect);
        let key = projection.to_rows();
        let slot = &mut self.levels[level];
        let stale = !matches!(slot, Some(cached) if cached.projection == key && cached.rays.size() == size);
        if stale {
            *slot = Some(CachedRays {
                projection: key,
                rays: ViewRaySet::compute(&projection, camera.is_parallel(), size)?,
            });
        }
        slot.as_ref().map(|cached| &cached.rays)
    }
}
