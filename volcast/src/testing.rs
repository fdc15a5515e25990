//! Stand-in scenes and volumes for tests and benchmarks.
//!
//! Nothing here is part of the stable API.

#![allow(missing_docs)]

use core::cell::Cell;

use imgref::{ImgRef, ImgVec};

use crate::camera::{Camera, ImageSize, PixelPoint, Viewport, area_usize};
use crate::math::{Aab, FreeCoordinate, Rgb, Rgba};
use crate::{
    DepthImage, Mapper, RayCastMapper, RaySample, RgbaImage, Scene, SoftwareBufferMapper,
    SoftwareSetup, ViewRay, Volume, VolumeSampler, VolumeSetup,
};

/// A [`Scene`] whose window is a pair of in-memory color and depth images.
#[derive(Debug)]
pub struct TestScene {
    pub camera: Option<Camera>,
    pub viewport: Viewport,
    pub background: Rgb,
    pub allocated_render_time: f64,
    pub volumes: Vec<Box<dyn Volume>>,
    pub props_rendered_as_geometry: usize,
    window_color: RgbaImage,
    window_depth: DepthImage,
    writes: usize,
    abort_after: Option<usize>,
    abort_checks: Cell<usize>,
}

impl TestScene {
    /// A scene with no camera or volumes, whose window is transparent and at the far plane.
    pub fn new(window_size: ImageSize) -> Self {
        let (w, h) = (window_size.width as usize, window_size.height as usize);
        let area = area_usize(window_size).unwrap_or(0);
        Self {
            camera: None,
            viewport: Viewport::new(window_size),
            background: Rgb::ZERO,
            allocated_render_time: 0.0,
            volumes: Vec::new(),
            props_rendered_as_geometry: 0,
            window_color: ImgVec::new(vec![[0.0; 4]; area], w, h),
            window_depth: ImgVec::new(vec![1.0; area], w, h),
            writes: 0,
            abort_after: None,
            abort_checks: Cell::new(0),
        }
    }

    #[must_use]
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume: impl Volume + 'static) -> Self {
        self.volumes.push(Box::new(volume));
        self
    }

    /// Sets every window pixel's color and depth from a function of its coordinates.
    pub fn fill_window(&mut self, mut f: impl FnMut(usize, usize) -> ([f32; 4], f32)) {
        let width = self.window_color.width();
        for (index, (color, depth)) in self
            .window_color
            .buf_mut()
            .iter_mut()
            .zip(self.window_depth.buf_mut().iter_mut())
            .enumerate()
        {
            (*color, *depth) = f(index % width, index / width);
        }
    }

    /// Makes [`Scene::check_abort_status()`] return true once it has been called `n` times.
    pub fn abort_after(&mut self, n: usize) {
        self.abort_after = Some(n);
    }

    pub fn abort_checks(&self) -> usize {
        self.abort_checks.get()
    }

    /// Number of times an image was written to the window.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn window(&self) -> ImgRef<'_, [f32; 4]> {
        self.window_color.as_ref()
    }

    /// The window pixel at (`x`, `y`), counting from the bottom left.
    pub fn pixel(&self, x: usize, y: usize) -> [f32; 4] {
        self.window_color.buf()[y * self.window_color.stride() + x]
    }

    fn copy_rect<T: Copy>(source: &ImgVec<T>, origin: PixelPoint, size: ImageSize) -> ImgVec<T> {
        let (x0, y0) = (origin.x as usize, origin.y as usize);
        let (w, h) = (size.width as usize, size.height as usize);
        let stride = source.stride();
        let mut data = Vec::with_capacity(w * h);
        for y in y0..y0 + h {
            data.extend_from_slice(&source.buf()[y * stride + x0..][..w]);
        }
        ImgVec::new(data, w, h)
    }
}

impl Scene for TestScene {
    fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn background(&self) -> Rgb {
        self.background
    }

    fn allocated_render_time(&self) -> f64 {
        self.allocated_render_time
    }

    fn volumes(&self) -> Vec<&dyn Volume> {
        self.volumes.iter().map(|v| &**v).collect()
    }

    fn props_rendered_as_geometry(&self) -> usize {
        self.props_rendered_as_geometry
    }

    fn read_rgba(&self, origin: PixelPoint, size: ImageSize) -> RgbaImage {
        Self::copy_rect(&self.window_color, origin, size)
    }

    fn read_depth(&self, origin: PixelPoint, size: ImageSize) -> DepthImage {
        Self::copy_rect(&self.window_depth, origin, size)
    }

    fn write_rgba(&mut self, origin: PixelPoint, image: ImgRef<'_, [f32; 4]>) {
        let (x0, y0) = (origin.x as usize, origin.y as usize);
        let stride = self.window_color.stride();
        let window = self.window_color.buf_mut();
        for y in 0..image.height() {
            let src = &image.buf()[y * image.stride()..][..image.width()];
            window[(y0 + y) * stride + x0..][..image.width()].copy_from_slice(src);
        }
        self.writes += 1;
    }

    fn check_abort_status(&self) -> bool {
        let checks = self.abort_checks.get() + 1;
        self.abort_checks.set(checks);
        self.abort_after.is_some_and(|n| checks > n)
    }
}

// -------------------------------------------------------------------------------------------------

/// A box of uniform color, ray cast by intersecting each ray with the box.
///
/// The color is not attenuated by path length; any ray that passes through the box gets
/// exactly `color`, and its depth is where it leaves the box.
#[derive(Clone, Debug)]
pub struct SolidVolume {
    pub aab: Aab,
    pub color: Rgba,
    pub visible: bool,
    /// Distance between samples before the level's step size is applied.
    pub sample_spacing: FreeCoordinate,
}

impl SolidVolume {
    pub fn new(aab: Aab, color: Rgba) -> Self {
        Self {
            aab,
            color,
            visible: true,
            sample_spacing: 0.1,
        }
    }
}

impl Volume for SolidVolume {
    fn visible(&self) -> bool {
        self.visible
    }

    fn bounds(&self) -> Aab {
        self.aab
    }

    fn mapper(&self) -> Mapper<'_> {
        Mapper::RayCast(self)
    }
}

impl RayCastMapper for SolidVolume {
    fn prepare(&self, setup: &VolumeSetup<'_>) -> Box<dyn VolumeSampler + '_> {
        Box::new(SolidSampler {
            aab: self.aab,
            color: self.color,
            spacing: self.sample_spacing * setup.step_size,
        })
    }
}

struct SolidSampler {
    aab: Aab,
    color: Rgba,
    spacing: FreeCoordinate,
}

impl VolumeSampler for SolidSampler {
    fn cast_ray(&self, ray: &ViewRay) -> RaySample {
        let Some((enter, exit)) = self.aab.ray_interval(ray.origin, ray.direction) else {
            return RaySample::miss(ray.far);
        };
        let (enter, exit) = (enter.max(ray.near), exit.min(ray.far));
        if !(enter < exit) {
            return RaySample::miss(ray.far);
        }
        RaySample {
            color: self.color,
            depth: exit,
            steps: ((exit - enter) / self.spacing).ceil().max(1.0) as u32,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// A volume that renders itself as a flat image of one color.
#[derive(Clone, Debug)]
pub struct FlatImageVolume {
    pub aab: Aab,
    pub color: Rgba,
    /// If set, the image is rendered at this size instead of the one requested.
    pub wrong_size: Option<ImageSize>,
}

impl FlatImageVolume {
    pub fn new(aab: Aab, color: Rgba) -> Self {
        Self {
            aab,
            color,
            wrong_size: None,
        }
    }
}

impl Volume for FlatImageVolume {
    fn visible(&self) -> bool {
        true
    }

    fn bounds(&self) -> Aab {
        self.aab
    }

    fn mapper(&self) -> Mapper<'_> {
        Mapper::SoftwareBuffer(self)
    }
}

impl SoftwareBufferMapper for FlatImageVolume {
    fn render(&self, setup: &SoftwareSetup<'_>) -> RgbaImage {
        let size = self.wrong_size.unwrap_or(setup.image_size);
        ImgVec::new(
            vec![self.color.to_array(); area_usize(size).unwrap_or(0)],
            size.width as usize,
            size.height as usize,
        )
    }
}

/// A volume that stands for one drawn into the frame buffer by some other means.
#[derive(Clone, Debug)]
pub struct FramebufferVolume(pub Aab);

impl Volume for FramebufferVolume {
    fn visible(&self) -> bool {
        true
    }

    fn bounds(&self) -> Aab {
        self.0
    }

    fn mapper(&self) -> Mapper<'_> {
        Mapper::Framebuffer
    }
}
