//! Interfaces to the things a [`RayCaster`](crate::raycaster::RayCaster) renders:
//! the scene as a whole, the volumes in it, and their mappers.

use core::fmt;

use euclid::Transform3D;
use imgref::ImgRef;

use crate::camera::{Camera, ImageSize, PixelPoint, Viewport};
use crate::math::{Aab, FreeCoordinate, FreePoint, FreeVector, Local, Rgb, Rgba, World};
use crate::{DepthImage, RgbaImage};

// -------------------------------------------------------------------------------------------------

/// The renderer and window that a [`RayCaster`](crate::raycaster::RayCaster) composites into.
///
/// All methods are called only from the thread that called
/// [`RayCaster::render()`](crate::raycaster::RayCaster::render), so implementations
/// need not be thread-safe.
pub trait Scene {
    /// The active camera, if there is one.
    fn camera(&self) -> Option<&Camera>;

    /// The viewport and window geometry.
    fn viewport(&self) -> Viewport;

    /// The color to show where nothing else is drawn.
    fn background(&self) -> Rgb;

    /// How much time, in seconds, the current frame may take. Zero means unlimited.
    fn allocated_render_time(&self) -> f64;

    /// All volumes in the scene, visible or not.
    fn volumes(&self) -> Vec<&dyn Volume>;

    /// How many props were already drawn this frame by ordinary rasterization.
    ///
    /// If this is nonzero, the frame buffer is read back and composited with the volumes.
    /// Rasterized geometry must have been drawn into the viewport reduced by the scale
    /// factor most recently returned by
    /// [`RayCaster::viewport_scale_factor()`](crate::raycaster::RayCaster::viewport_scale_factor),
    /// anchored at the viewport's lower left corner.
    fn props_rendered_as_geometry(&self) -> usize;

    /// Reads back color from the window, with premultiplied alpha, bottom row first.
    fn read_rgba(&self, origin: PixelPoint, size: ImageSize) -> RgbaImage;

    /// Reads back the depth buffer, values 0 (near) to 1 (far), bottom row first.
    fn read_depth(&self, origin: PixelPoint, size: ImageSize) -> DepthImage;

    /// Writes the final image into the window at `origin`.
    fn write_rgba(&mut self, origin: PixelPoint, image: ImgRef<'_, [f32; 4]>);

    /// Returns whether the user has asked for the current frame to be abandoned.
    ///
    /// Polled between rows of ray casting.
    fn check_abort_status(&self) -> bool {
        false
    }
}

/// A volume in a [`Scene`].
pub trait Volume: fmt::Debug + Send + Sync {
    /// Whether the volume should be drawn at all.
    fn visible(&self) -> bool;

    /// Bounding box in world space.
    fn bounds(&self) -> Aab;

    /// Center of the volume in world space, used to order volumes by distance.
    fn center(&self) -> FreePoint {
        self.bounds().center()
    }

    /// Transform from world space to the volume's data space.
    fn world_to_local(&self) -> Transform3D<FreeCoordinate, World, Local> {
        Transform3D::identity()
    }

    /// How this volume is drawn.
    fn mapper(&self) -> Mapper<'_>;
}

/// The ways a [`Volume`] may be drawn, and the corresponding interfaces.
#[derive(Clone, Copy)]
#[non_exhaustive]
pub enum Mapper<'a> {
    /// Sampled by casting a ray per pixel.
    RayCast(&'a dyn RayCastMapper),
    /// Renders its own complete image, which is then blended in as a layer.
    SoftwareBuffer(&'a dyn SoftwareBufferMapper),
    /// Draws directly into the window's frame buffer (e.g. by texture slicing) before the
    /// ray caster runs. Such volumes are not drawn by the ray caster, but their presence
    /// means the frame buffer has content to composite with.
    Framebuffer,
    /// Not the ray caster's business.
    Other,
}

impl fmt::Debug for Mapper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mapper::RayCast(_) => "RayCast",
            Mapper::SoftwareBuffer(_) => "SoftwareBuffer",
            Mapper::Framebuffer => "Framebuffer",
            Mapper::Other => "Other",
        })
    }
}

// -------------------------------------------------------------------------------------------------

/// A mapper which is sampled one ray at a time.
pub trait RayCastMapper: Send + Sync {
    /// Called once per frame, before any rays are cast, on the rendering thread.
    ///
    /// Returns the sampler that will be used for this frame's rays, which may hold any
    /// precomputed state (transfer function tables and the like). It is shared between
    /// the worker threads and dropped when the frame is complete.
    fn prepare(&self, setup: &VolumeSetup<'_>) -> Box<dyn VolumeSampler + '_>;
}

/// Per-frame sampling state produced by [`RayCastMapper::prepare()`].
pub trait VolumeSampler: Send + Sync {
    /// Marches along one ray.
    fn cast_ray(&self, ray: &ViewRay) -> RaySample;
}

/// Information given to [`RayCastMapper::prepare()`].
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct VolumeSetup<'a> {
    /// Camera rays will be cast from.
    pub camera: &'a Camera,
    /// Transform from world space to the volume's data space.
    pub world_to_local: Transform3D<FreeCoordinate, World, Local>,
    /// Size of the image being cast this frame.
    pub image_size: ImageSize,
    /// Multiplier for the distance between samples along each ray; larger is coarser and
    /// faster.
    pub step_size: FreeCoordinate,
}

/// One ray to be cast through a volume, in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
#[expect(clippy::exhaustive_structs)]
pub struct ViewRay {
    /// Where the ray starts: the eye, or a point on the camera plane for parallel projection.
    pub origin: FreePoint,
    /// Unit direction of the ray.
    pub direction: FreeVector,
    /// Distance along the ray at which sampling should begin.
    pub near: FreeCoordinate,
    /// Distance along the ray at which sampling should end: the far clipping plane, or
    /// whatever was already drawn at this pixel, whichever is closer.
    pub far: FreeCoordinate,
    /// The pixel this ray is for, in the working-resolution image.
    pub pixel: PixelPoint,
}

/// Result of casting one ray through a volume.
#[derive(Clone, Copy, Debug, PartialEq)]
#[expect(clippy::exhaustive_structs)]
pub struct RaySample {
    /// Accumulated color along the ray, with premultiplied alpha.
    pub color: Rgba,
    /// Distance along the ray (from its origin) at which the ray left the volume.
    pub depth: FreeCoordinate,
    /// Number of sampling steps taken, for instrumentation.
    pub steps: u32,
}

impl RaySample {
    /// A sample for a ray which did not hit anything, at the given depth.
    pub const fn miss(depth: FreeCoordinate) -> Self {
        Self {
            color: Rgba::TRANSPARENT,
            depth,
            steps: 0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// A mapper which renders its own complete image.
pub trait SoftwareBufferMapper: Send + Sync {
    /// Renders the volume.
    ///
    /// The returned image must have premultiplied alpha, be stored bottom row first, and
    /// have exactly the size [`SoftwareSetup::image_size`]; images of any other size are
    /// discarded.
    fn render(&self, setup: &SoftwareSetup<'_>) -> RgbaImage;
}

/// Information given to [`SoftwareBufferMapper::render()`].
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct SoftwareSetup<'a> {
    /// The active camera, if there is one.
    pub camera: Option<&'a Camera>,
    /// Size the rendered image must have.
    pub image_size: ImageSize,
    /// Multiplier for the distance between samples; larger is coarser and faster.
    pub step_size: FreeCoordinate,
}

// -------------------------------------------------------------------------------------------------

/// The volumes of a scene that the ray caster is concerned with, sorted by kind.
#[derive(Default)]
pub(crate) struct VisibleVolumes<'a> {
    pub ray_cast: Vec<(&'a dyn Volume, &'a dyn RayCastMapper)>,
    pub software: Vec<(&'a dyn Volume, &'a dyn SoftwareBufferMapper)>,
    pub framebuffer: usize,
}

impl<'a> VisibleVolumes<'a> {
    pub fn collect(volumes: &[&'a dyn Volume]) -> Self {
        let mut result = Self::default();
        for &volume in volumes.iter().filter(|v| v.visible()) {
            match volume.mapper() {
                Mapper::RayCast(m) => result.ray_cast.push((volume, m)),
                Mapper::SoftwareBuffer(m) => result.software.push((volume, m)),
                Mapper::Framebuffer => result.framebuffer += 1,
                Mapper::Other => {}
            }
        }
        result
    }

    /// Whether there is anything whose rendering time depends on the image scale.
    pub fn any_scalable(&self) -> bool {
        !self.ray_cast.is_empty() || !self.software.is_empty()
    }
}
