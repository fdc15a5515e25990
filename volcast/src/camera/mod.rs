//! Projection and view matrices, viewport and window geometry, and the generation of
//! per-pixel view rays.

use core::fmt;

use euclid::{Box2D, Point2D, Size2D, Transform3D, point2};

use crate::math::{Eye, EyePoint, FreeCoordinate, FreePoint, FreeVector, MatrixRows as _, World};

mod view_rays;
pub use view_rays::*;

// -------------------------------------------------------------------------------------------------

/// Unit-of-measure type for pixel coordinates within an image.
///
/// Images are stored and addressed bottom row first, matching how window pixel buffers
/// are read back.
#[derive(Debug, Eq, PartialEq)]
#[expect(clippy::exhaustive_enums)]
pub enum ImagePixel {}

/// Unit-of-measure type for OpenGL-style normalized device coordinates,
/// in which the visible region is −1 to 1 on every axis.
#[derive(Debug, Eq, PartialEq)]
#[expect(clippy::exhaustive_enums)]
pub enum Ndc {}

/// Unit-of-measure type for fractions of the window, 0 to 1, from the lower left.
#[derive(Debug, Eq, PartialEq)]
#[expect(clippy::exhaustive_enums)]
pub enum WindowFraction {}

/// Size of an image in pixels.
pub type ImageSize = Size2D<u32, ImagePixel>;

/// Position of a pixel in an image.
pub type PixelPoint = Point2D<u32, ImagePixel>;

/// Calculate area and convert to `usize`, which is a common operation for image data lengths.
#[inline]
#[doc(hidden)] // intended as a utility for our code, not public API
pub fn area_usize<T: TryInto<usize>, U>(size: Size2D<T, U>) -> Option<usize> {
    let width = size.width.try_into().ok()?;
    let height = size.height.try_into().ok()?;
    width.checked_mul(height)
}

// -------------------------------------------------------------------------------------------------

/// The kind of projection a [`Camera`] uses.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Projection {
    /// Perspective projection with the given vertical field of view, in degrees.
    Perspective {
        /// Full vertical field of view, in degrees.
        fov_y: FreeCoordinate,
    },
    /// Parallel (orthographic) projection.
    Parallel {
        /// Half of the height of the visible region, in world units.
        scale: FreeCoordinate,
    },
}

/// Defines a view in/of the world: where the eye is, which way it looks, and how the
/// scene is projected onto the image plane.
///
/// The camera knows nothing of image sizes; the aspect ratio is supplied by the
/// [`Viewport`] whenever a projection matrix is needed.
#[derive(Clone, PartialEq)]
pub struct Camera {
    projection: Projection,
    view_to_world: Transform3D<FreeCoordinate, Eye, World>,
    world_to_view: Transform3D<FreeCoordinate, World, Eye>,
    /// Distances from the eye to the near and far clipping planes, measured along −Z in
    /// eye space.
    clipping_range: (FreeCoordinate, FreeCoordinate),
}

impl Camera {
    /// Constructs a camera from an eye-to-world transform.
    ///
    /// Returns [`None`] if the transform is not invertible.
    pub fn new(
        projection: Projection,
        view_to_world: Transform3D<FreeCoordinate, Eye, World>,
    ) -> Option<Self> {
        Some(Self {
            projection,
            world_to_view: view_to_world.inverse()?,
            view_to_world,
            clipping_range: (0.1, 1000.0),
        })
    }

    /// Constructs a camera positioned at `eye` and looking at `target`, with `up`
    /// projecting to the top of the image.
    ///
    /// Returns [`None`] if `eye` and `target` coincide or `up` is parallel to the
    /// direction of view.
    pub fn look_at(
        projection: Projection,
        eye: FreePoint,
        target: FreePoint,
        up: FreeVector,
    ) -> Option<Self> {
        let forward = (target - eye).try_normalize()?;
        let right = forward.cross(up).try_normalize()?;
        let true_up = right.cross(forward);
        let back = -forward;
        Self::new(
            projection,
            Transform3D::from_rows([
                [right.x, true_up.x, back.x, eye.x],
                [right.y, true_up.y, back.y, eye.y],
                [right.z, true_up.z, back.z, eye.z],
                [0.0, 0.0, 0.0, 1.0],
            ]),
        )
    }

    /// Sets the distances to the near and far clipping planes.
    ///
    /// Panics if `near` is not less than `far`, or, for perspective projection,
    /// if `near` is not positive.
    #[must_use]
    #[track_caller]
    pub fn with_clipping_range(mut self, near: FreeCoordinate, far: FreeCoordinate) -> Self {
        assert!(near < far, "clipping range {near}..{far} is empty or NaN");
        if !self.is_parallel() {
            assert!(near > 0.0, "perspective near clip {near} must be positive");
        }
        self.clipping_range = (near, far);
        self
    }

    /// Returns the projection kind.
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Returns whether this camera uses parallel projection, in which case all view rays
    /// share one direction.
    pub fn is_parallel(&self) -> bool {
        matches!(self.projection, Projection::Parallel { .. })
    }

    /// Distances to the near and far clipping planes.
    pub fn clipping_range(&self) -> (FreeCoordinate, FreeCoordinate) {
        self.clipping_range
    }

    /// Position of the eye in world space.
    pub fn position(&self) -> FreePoint {
        self.view_to_world
            .transform_point3d(EyePoint::origin())
            .unwrap_or_else(FreePoint::origin)
    }

    /// Distance from the eye to `point`.
    pub fn distance_to(&self, point: FreePoint) -> FreeCoordinate {
        (point - self.position()).length()
    }

    /// Transform from eye space to world space.
    pub fn view_to_world(&self) -> &Transform3D<FreeCoordinate, Eye, World> {
        &self.view_to_world
    }

    /// Transform from world space to eye space (the “view matrix”).
    pub fn view_matrix(&self) -> &Transform3D<FreeCoordinate, World, Eye> {
        &self.world_to_view
    }

    /// Returns the OpenGL-convention projection matrix for the given aspect ratio
    /// (width divided by height).
    ///
    /// Eye-space depths from the near to the far plane are mapped to NDC −1 to 1.
    pub fn projection_matrix(&self, aspect: FreeCoordinate) -> Transform3D<FreeCoordinate, Eye, Ndc> {
        let (near, far) = self.clipping_range;
        let depth = far - near;
        match self.projection {
            Projection::Perspective { fov_y } => {
                let f = 1.0 / (fov_y.to_radians() / 2.0).tan();
                Transform3D::from_rows([
                    [f / aspect, 0.0, 0.0, 0.0],
                    [0.0, f, 0.0, 0.0],
                    [0.0, 0.0, -(far + near) / depth, -2.0 * far * near / depth],
                    [0.0, 0.0, -1.0, 0.0],
                ])
            }
            Projection::Parallel { scale } => Transform3D::from_rows([
                [1.0 / (scale * aspect), 0.0, 0.0, 0.0],
                [0.0, 1.0 / scale, 0.0, 0.0],
                [0.0, 0.0, -2.0 / depth, -(far + near) / depth],
                [0.0, 0.0, 0.0, 1.0],
            ]),
        }
    }

    /// Transform from world space directly to normalized device coordinates.
    pub fn world_to_ndc(&self, aspect: FreeCoordinate) -> Transform3D<FreeCoordinate, World, Ndc> {
        self.world_to_view.then(&self.projection_matrix(aspect))
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("projection", &self.projection)
            .field("position", &self.position())
            .field("clipping_range", &self.clipping_range)
            .finish_non_exhaustive()
    }
}

// -------------------------------------------------------------------------------------------------

/// The region of a window that is to be rendered into.
///
/// Like a classic viewport, it is specified as fractions of the window size, so that
/// resizing the window keeps the layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    window_size: ImageSize,
    rect: Box2D<FreeCoordinate, WindowFraction>,
}

impl Viewport {
    /// A viewport which covers the whole of a window of the given size.
    pub fn new(window_size: ImageSize) -> Self {
        Self {
            window_size,
            rect: Box2D::new(point2(0.0, 0.0), point2(1.0, 1.0)),
        }
    }

    /// Restricts the viewport to a fraction of the window.
    ///
    /// Panics if the corners are misordered or outside of 0 to 1.
    #[must_use]
    #[track_caller]
    pub fn with_rect(
        mut self,
        lower_left: [FreeCoordinate; 2],
        upper_right: [FreeCoordinate; 2],
    ) -> Self {
        let in_range = |v: FreeCoordinate| (0.0..=1.0).contains(&v);
        assert!(
            lower_left.iter().chain(&upper_right).all(|&v| in_range(v))
                && lower_left[0] <= upper_right[0]
                && lower_left[1] <= upper_right[1],
            "invalid viewport rectangle {lower_left:?}..{upper_right:?}"
        );
        self.rect = Box2D::new(lower_left.into(), upper_right.into());
        self
    }

    /// Size of the whole window in pixels.
    pub fn window_size(&self) -> ImageSize {
        self.window_size
    }

    /// Size in pixels of the region this viewport covers at full resolution.
    pub fn full_image_size(&self) -> ImageSize {
        let w = FreeCoordinate::from(self.window_size.width);
        let h = FreeCoordinate::from(self.window_size.height);
        ImageSize::new(
            (w * self.rect.width()) as u32,
            (h * self.rect.height()) as u32,
        )
    }

    /// Size of the image to render when the viewport is reduced by `scale` in each axis.
    ///
    /// An axis which is not empty at full resolution keeps at least `min_extent` pixels,
    /// or all of them if it has fewer, so a thin viewport never scales down to nothing.
    pub fn scaled_size(&self, scale: FreeCoordinate, min_extent: u32) -> ImageSize {
        let full = self.full_image_size();
        let axis = |extent: u32| {
            let scaled = (FreeCoordinate::from(extent) * scale) as u32;
            scaled.max(min_extent.min(extent)).min(extent)
        };
        ImageSize::new(axis(full.width), axis(full.height))
    }

    /// Window pixel position of the lower left corner of this viewport.
    pub fn lower_left_corner(&self) -> PixelPoint {
        PixelPoint::new(
            (FreeCoordinate::from(self.window_size.width) * self.rect.min.x) as u32,
            (FreeCoordinate::from(self.window_size.height) * self.rect.min.y) as u32,
        )
    }

    /// Aspect ratio (width divided by height) of the full-resolution viewport image.
    ///
    /// Returns 1 if the viewport has no height.
    pub fn aspect_ratio(&self) -> FreeCoordinate {
        let size = self.full_image_size();
        if size.height == 0 {
            1.0
        } else {
            FreeCoordinate::from(size.width) / FreeCoordinate::from(size.height)
        }
    }
}

/// Converts a pixel index to the NDC coordinate of its center, along one axis.
#[inline]
pub(crate) fn pixel_center_ndc(index: u32, size: u32) -> FreeCoordinate {
    (FreeCoordinate::from(index) + 0.5) / FreeCoordinate::from(size) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use euclid::{point3, size2, vec3};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn assert_close(a: FreeCoordinate, b: FreeCoordinate) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn look_at_puts_target_on_negative_z() {
        let camera = Camera::look_at(
            Projection::Perspective { fov_y: 60.0 },
            point3(0.0, 0.0, 10.0),
            point3(0.0, 0.0, 0.0),
            vec3(0.0, 1.0, 0.0),
        )
        .unwrap();
        let target = camera
            .view_matrix()
            .transform_point3d(point3(0.0, 0.0, 0.0))
            .unwrap();
        assert_close(target.x, 0.0);
        assert_close(target.y, 0.0);
        assert_close(target.z, -10.0);
        assert_close(camera.distance_to(FreePoint::origin()), 10.0);
    }

    #[test]
    fn look_at_degenerate() {
        assert_eq!(
            Camera::look_at(
                Projection::Perspective { fov_y: 60.0 },
                point3(0.0, 5.0, 0.0),
                point3(0.0, 0.0, 0.0),
                vec3(0.0, 1.0, 0.0),
            ),
            None
        );
    }

    #[test]
    fn perspective_maps_clip_planes_to_ndc_range() {
        let camera = Camera::look_at(
            Projection::Perspective { fov_y: 90.0 },
            point3(0.0, 0.0, 0.0),
            point3(0.0, 0.0, -1.0),
            vec3(0.0, 1.0, 0.0),
        )
        .unwrap()
        .with_clipping_range(1.0, 100.0);
        let p = camera.projection_matrix(2.0);
        let near = p.transform_point3d(point3(0.0, 0.0, -1.0)).unwrap();
        let far = p.transform_point3d(point3(0.0, 0.0, -100.0)).unwrap();
        assert_close(near.z, -1.0);
        assert_close(far.z, 1.0);
        // 90 degree field of view: the top edge at depth 1 is at y = 1
        let corner = p.transform_point3d(point3(2.0, 1.0, -1.0)).unwrap();
        assert_close(corner.x, 1.0);
        assert_close(corner.y, 1.0);
    }

    #[test]
    fn parallel_maps_clip_planes_to_ndc_range() {
        let camera = Camera::look_at(
            Projection::Parallel { scale: 5.0 },
            point3(0.0, 0.0, 0.0),
            point3(0.0, 0.0, -1.0),
            vec3(0.0, 1.0, 0.0),
        )
        .unwrap()
        .with_clipping_range(2.0, 12.0);
        let p = camera.projection_matrix(1.0);
        assert_close(p.transform_point3d(point3(5.0, 5.0, -2.0)).unwrap().z, -1.0);
        assert_close(p.transform_point3d(point3(5.0, 5.0, -12.0)).unwrap().z, 1.0);
        assert_close(p.transform_point3d(point3(5.0, 5.0, -7.0)).unwrap().x, 1.0);
    }

    #[test]
    fn viewport_sizes() {
        let viewport = Viewport::new(size2(200, 100)).with_rect([0.5, 0.0], [1.0, 0.5]);
        assert_eq!(viewport.full_image_size(), size2(100, 50));
        assert_eq!(viewport.scaled_size(0.5, 1), size2(50, 25));
        assert_eq!(viewport.scaled_size(0.15, 1), size2(15, 7));
        assert_eq!(viewport.scaled_size(1.0, 1), size2(100, 50));
        assert_eq!(viewport.lower_left_corner(), point2(100, 0));
        assert_eq!(viewport.aspect_ratio(), 2.0);
    }

    #[rstest]
    #[case(size2(100, 5), 0.15, 1, size2(15, 1))]
    #[case(size2(100, 5), 0.15, 2, size2(15, 2))]
    #[case(size2(100, 1), 0.15, 2, size2(15, 1))]
    #[case(size2(100, 0), 0.15, 2, size2(15, 0))]
    #[case(size2(3, 3), 0.1, 2, size2(2, 2))]
    fn thin_viewport_keeps_pixels(
        #[case] window: ImageSize,
        #[case] scale: FreeCoordinate,
        #[case] min_extent: u32,
        #[case] expected: ImageSize,
    ) {
        assert_eq!(Viewport::new(window).scaled_size(scale, min_extent), expected);
    }

    #[test]
    fn empty_viewport_aspect() {
        assert_eq!(Viewport::new(size2(10, 0)).aspect_ratio(), 1.0);
    }

    #[test]
    fn pixel_centers() {
        assert_eq!(pixel_center_ndc(0, 2), -0.5);
        assert_eq!(pixel_center_ndc(1, 2), 0.5);
        assert_eq!(pixel_center_ndc(0, 1), 0.0);
    }
}
