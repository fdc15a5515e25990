use alloc::sync::Arc;
use core::fmt;
use core::num::NonZeroUsize;

use crate::camera::{Camera, ImageSize, ViewRayGenerator, area_usize};
use crate::depth::DepthCodec;
use crate::math::FreeCoordinate;
use crate::raycaster::cast::{CapturedDepth, CastFrame, PreparedVolume, ThreadOutcome};
use crate::raycaster::{
    AdaptiveResolutionController, ConfigError, FrameBuffers, RowBounds, Tuning, WorkerPool,
    config, partition_rows,
};
use crate::rescale::{ImageRescaler, RescaleMethod};
use crate::scene::VisibleVolumes;
use crate::time::{Clock, Duration, SystemClock, TimeStats};
use crate::{Flaws, RenderError, RgbaImage, Scene, SoftwareSetup, VolumeSetup};

/// The resources a [`RayCaster`] renders with: its worker threads and its clock.
#[derive(Debug)]
pub struct RenderContext {
    pool: WorkerPool,
    clock: Arc<dyn Clock>,
}

impl RenderContext {
    /// Creates a context with the given pool and clock.
    pub fn new(pool: WorkerPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Creates a context with one worker per hardware thread, timed by the system clock.
    pub fn with_defaults() -> Result<Self, RenderError> {
        Ok(Self::new(WorkerPool::with_available_parallelism()?, Arc::new(SystemClock)))
    }

    /// The worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// The clock frames are timed by.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

// -------------------------------------------------------------------------------------------------

/// Renders the volumes of a [`Scene`] by casting rays, at a resolution chosen to fit the
/// scene's time budget, and composites them with whatever the scene drew itself.
///
/// Each frame, call [`viewport_scale_factor()`](Self::viewport_scale_factor) once before
/// the scene draws its own geometry (at the reduced size it reports), and then
/// [`render()`](Self::render).
pub struct RayCaster {
    context: RenderContext,
    controller: AdaptiveResolutionController,
    ray_generator: ViewRayGenerator,
    rescaler: ImageRescaler,
    samples_taken: u64,
    frame_times: TimeStats,
}

/// Information about a frame produced by [`RayCaster::render()`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct FrameInfo {
    /// Resolution level used.
    pub level: usize,
    /// Image scale of that level.
    pub scale: FreeCoordinate,
    /// Size of the image that rays were cast for.
    pub working_size: ImageSize,
    /// Size of the image written to the window.
    pub full_size: ImageSize,
    /// Ray sampling steps taken, summed over all threads.
    pub samples_taken: u64,
    /// Time from the start of the frame to the image being written.
    pub render_time: Duration,
    /// Deficiencies of the frame.
    pub flaws: Flaws,
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let &Self {
            level,
            scale,
            working_size,
            full_size,
            samples_taken,
            render_time,
            flaws,
        } = self;
        write!(
            f,
            "level {level} (scale {scale:.3}): {}×{} → {}×{}, {samples_taken} samples, {render_time:.3?}",
            working_size.width, working_size.height, full_size.width, full_size.height,
        )?;
        if !flaws.is_empty() {
            write!(f, ", flaws: {flaws}")?;
        }
        Ok(())
    }
}

impl RayCaster {
    /// Creates a ray caster with the default resolution levels and [`Tuning`].
    pub fn new(context: RenderContext) -> Self {
        Self {
            context,
            controller: AdaptiveResolutionController::default(),
            ray_generator: ViewRayGenerator::new(),
            rescaler: ImageRescaler::default(),
            samples_taken: 0,
            frame_times: TimeStats::default(),
        }
    }

    /// Chooses the image scale for the coming frame, which the scene should use to reduce
    /// its viewport while drawing geometry. Call exactly once per frame.
    pub fn viewport_scale_factor(&mut self, scene: &dyn Scene) -> FreeCoordinate {
        let volumes = scene.volumes();
        let visible = VisibleVolumes::collect(&volumes);
        self.controller
            .scale_factor(visible.any_scalable(), scene.allocated_render_time())
    }

    /// Renders the scene's volumes and writes the composited image to its window.
    ///
    /// `raycast_count` and `software_count` are the caller's count of visible ray-cast
    /// and software-buffer volumes; if they disagree with the scene, the scene wins.
    pub fn render(
        &mut self,
        scene: &mut dyn Scene,
        raycast_count: usize,
        software_count: usize,
    ) -> FrameInfo {
        let start = self.context.clock.now();
        let viewport = scene.viewport();
        let level = self.controller.selected_level();
        let scale = self.controller.current_scale();
        let mut info = FrameInfo {
            level,
            scale,
            working_size: viewport.scaled_size(scale, self.rescaler.method().min_source_extent()),
            full_size: viewport.full_image_size(),
            ..FrameInfo::default()
        };

        let Some(image) = self.composite_frame(&*scene, raycast_count, software_count, &mut info)
        else {
            return info;
        };

        let origin = viewport.lower_left_corner();
        match self.rescaler.rescale(image, info.full_size) {
            Ok(image) => scene.write_rgba(origin, image.as_ref()),
            Err(error) => {
                log::error!("not presenting frame: {error}");
                info.flaws |= Flaws::NOT_PRESENTED;
            }
        }

        info.render_time = self.context.clock.now().saturating_duration_since(start);
        self.controller.record_render_time(info.render_time);
        self.frame_times += TimeStats::one(info.render_time);
        log::trace!("{info}");
        info
    }

    /// Produces the working-resolution image for a frame, or [`None`] if there is
    /// nothing to draw.
    fn composite_frame(
        &mut self,
        scene: &dyn Scene,
        raycast_count: usize,
        software_count: usize,
        info: &mut FrameInfo,
    ) -> Option<RgbaImage> {
        let volumes = scene.volumes();
        let mut visible = VisibleVolumes::collect(&volumes);
        if visible.ray_cast.len() != raycast_count || visible.software.len() != software_count {
            log::warn!(
                "told to render {raycast_count} ray-cast and {software_count} software volumes, \
                but the scene has {} and {} visible",
                visible.ray_cast.len(),
                visible.software.len()
            );
        }
        self.samples_taken = 0;
        let size = info.working_size;
        if !visible.any_scalable() || area_usize(size).is_none_or(|area| area == 0) {
            return None;
        }

        let viewport = scene.viewport();
        let something_drawn = scene.props_rendered_as_geometry() > 0 || visible.framebuffer > 0;
        let (mut buffers, flaws) =
            FrameBuffers::initialize(scene, viewport.lower_left_corner(), size, something_drawn);
        info.flaws |= flaws;
        let background = scene.background();
        let need_background_blend = buffers.first_blend && !background.is_black();

        if !visible.ray_cast.is_empty() {
            match scene.camera() {
                Some(camera) => {
                    let aspect = viewport.aspect_ratio();
                    self.cast_volumes(scene, camera, aspect, &visible, &mut buffers, info);
                }
                None => {
                    log::error!("cannot cast rays without a camera");
                    info.flaws |= Flaws::NO_CAMERA;
                }
            }
        }

        if !visible.software.is_empty() {
            let camera = scene.camera();
            if let Some(camera) = camera {
                // Far to near
                visible.software.sort_by(|(a, _), (b, _)| {
                    camera
                        .distance_to(b.center())
                        .total_cmp(&camera.distance_to(a.center()))
                });
            }
            let setup = SoftwareSetup {
                camera,
                image_size: size,
                step_size: self.controller.current_step_size(),
            };
            let adopt = visible.software.len() == 1 && buffers.first_blend;
            for &(_, mapper) in &visible.software {
                let layer = mapper.render(&setup);
                let layer_size = crate::rescale::image_size(layer.as_ref());
                if layer_size != size {
                    log::error!(
                        "software volume rendered a {layer_size:?} image instead of {size:?}; skipping it"
                    );
                    info.flaws |= Flaws::SOFTWARE_BUFFER_MISMATCH;
                } else if adopt {
                    buffers.color = layer;
                    buffers.first_blend = false;
                } else {
                    buffers.blend_over(layer.as_ref());
                }
            }
        }

        if need_background_blend {
            buffers.blend_background(background.with_alpha(1.0));
        }
        Some(buffers.color)
    }

    /// Casts rays through every ray-cast volume, compositing into `buffers`.
    fn cast_volumes(
        &mut self,
        scene: &dyn Scene,
        camera: &Camera,
        aspect: FreeCoordinate,
        visible: &VisibleVolumes<'_>,
        buffers: &mut FrameBuffers,
        info: &mut FrameInfo,
    ) {
        let size = info.working_size;
        let Some(rays) = self.ray_generator.rays(info.level, camera, aspect, size) else {
            log::error!("camera projection is not invertible; skipping ray casting");
            info.flaws |= Flaws::OTHER;
            return;
        };

        let depth = buffers.depth.as_ref().and_then(|image| {
            CapturedDepth::new(image, DepthCodec::for_camera(camera, aspect), &mut info.flaws)
        });

        let world_to_ndc = camera.world_to_ndc(aspect);
        let step_size = self.controller.current_step_size();
        let volumes: Vec<PreparedVolume<'_>> = visible
            .ray_cast
            .iter()
            .map(|&(volume, mapper)| PreparedVolume {
                sampler: mapper.prepare(&VolumeSetup {
                    camera,
                    world_to_local: volume.world_to_local(),
                    image_size: size,
                    step_size,
                }),
                row_bounds: RowBounds::compute(&volume.bounds(), &world_to_ndc, size),
            })
            .collect();

        let frame = CastFrame {
            rays,
            view_to_world: *camera.view_to_world(),
            clipping_range: camera.clipping_range(),
            volumes: &volumes,
            depth,
        };

        let pool = &self.context.pool;
        let width = buffers.color.width();
        let stride = buffers.color.stride();
        let buckets = partition_rows(buffers.color.buf_mut(), stride, pool.thread_count());
        // Drop any padding from the end of each row.
        let buckets: Vec<Vec<(usize, &mut [[f32; 4]])>> = buckets
            .into_iter()
            .map(|rows| rows.into_iter().map(|(j, row)| (j, &mut row[..width])).collect())
            .collect();
        // Only the calling thread may talk to the scene.
        let abort: &dyn Fn() -> bool = &|| scene.check_abort_status();
        let outcomes: Vec<ThreadOutcome> = pool.fork_join(
            buckets,
            |rows| frame.cast_rows(rows, Some(abort)),
            |_, rows| frame.cast_rows(rows, None),
        );
        buffers.first_blend = false;

        self.samples_taken = outcomes.iter().map(|o| o.steps).sum();
        info.samples_taken = self.samples_taken;
        let skipped: usize = outcomes.iter().map(|o| o.rows_skipped).sum();
        if skipped > 0 {
            info.flaws |= Flaws::UNFINISHED;
        }
    }

    /// Sampling steps taken by all rays of the most recent frame.
    pub fn number_of_samples_taken(&self) -> u64 {
        self.samples_taken
    }

    /// Statistics of the render times of all frames so far.
    pub fn frame_time_stats(&self) -> TimeStats {
        self.frame_times
    }

    /// The controller choosing the resolution of each frame.
    pub fn controller(&self) -> &AdaptiveResolutionController {
        &self.controller
    }

    /// The resources this ray caster renders with.
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    // --- Configuration ---

    /// Sets the image scale of a static level. See [`ScaleTable::set_scale()`].
    ///
    /// [`ScaleTable::set_scale()`]: super::ScaleTable::set_scale
    pub fn set_image_scale(&mut self, level: usize, scale: FreeCoordinate) -> Result<(), ConfigError> {
        self.controller.set_image_scale(level, scale)
    }

    /// Returns the image scale of `level`, including the adjustable level.
    pub fn image_scale(&self, level: usize) -> Option<FreeCoordinate> {
        self.controller.scale_table().scale(level)
    }

    /// Sets the ray step size multiplier of a static level.
    pub fn set_view_rays_step_size(
        &mut self,
        level: usize,
        step: FreeCoordinate,
    ) -> Result<(), ConfigError> {
        self.controller.set_step_size(level, step)
    }

    /// The ray step size multiplier of the currently selected level.
    pub fn viewport_step_size(&self) -> FreeCoordinate {
        self.controller.current_step_size()
    }

    /// Turns the automatic choice of resolution on or off. Turning it off returns to
    /// full resolution.
    pub fn set_automatic_scale_adjustment(&mut self, automatic: bool) {
        self.controller.set_automatic(automatic);
    }

    /// Whether the resolution is chosen automatically.
    pub fn automatic_scale_adjustment(&self) -> bool {
        self.controller.automatic()
    }

    /// Sets the smallest scale the automatic adjustment may choose.
    pub fn set_automatic_scale_lower_limit(
        &mut self,
        limit: FreeCoordinate,
    ) -> Result<(), ConfigError> {
        self.controller.set_lower_limit(limit)
    }

    /// The smallest scale the automatic adjustment may choose.
    pub fn automatic_scale_lower_limit(&self) -> FreeCoordinate {
        self.controller.lower_limit()
    }

    /// Selects a static level to render at while automatic adjustment is off.
    pub fn select_level(&mut self, level: usize) -> Result<(), ConfigError> {
        self.controller.select_level(level)
    }

    /// Replaces the parameters of the automatic adjustment.
    pub fn set_tuning(&mut self, tuning: Tuning) {
        self.controller.set_tuning(tuning);
    }

    /// Chooses bilinear interpolation, rather than nearest-neighbor, for enlarging
    /// reduced-resolution images.
    pub fn set_bilinear_image_zoom(&mut self, bilinear: bool) {
        self.rescaler = ImageRescaler::new(if bilinear {
            RescaleMethod::Bilinear
        } else {
            RescaleMethod::Nearest
        });
    }

    /// Whether bilinear interpolation is used for enlarging images.
    pub fn bilinear_image_zoom(&self) -> bool {
        self.rescaler.method() == RescaleMethod::Bilinear
    }

    /// Replaces the worker pool with one dividing work `thread_count` ways.
    ///
    /// On failure, the existing pool is kept.
    pub fn set_thread_count(&mut self, thread_count: usize) -> Result<(), RenderError> {
        let thread_count =
            config::logged(NonZeroUsize::new(thread_count).ok_or(ConfigError::ZeroThreads))?;
        let pool = WorkerPool::new(thread_count).inspect_err(|error| log::error!("{error}"))?;
        self.context.pool = pool;
        Ok(())
    }

    /// Number of ways ray casting is divided among threads.
    pub fn thread_count(&self) -> NonZeroUsize {
        self.context.pool.thread_count()
    }
}

impl fmt::Debug for RayCaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RayCaster")
            .field("controller", &self.controller)
            .field("rescaler", &self.rescaler)
            .field("thread_count", &self.thread_count())
            .field("samples_taken", &self.samples_taken)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Projection, Viewport};
    use crate::math::{Aab, Rgb, Rgba};
    use crate::raycaster::ADJUSTABLE_LEVEL;
    use crate::testing::{FlatImageVolume, FramebufferVolume, SolidVolume, TestScene};
    use crate::time::ManualClock;
    use crate::{Mapper, RayCastMapper, Volume, VolumeSampler};
    use euclid::{point3, size2, vec3};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
    const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

    fn caster_with_clock(threads: usize, clock: Arc<dyn Clock>) -> RayCaster {
        let pool = WorkerPool::new(NonZeroUsize::new(threads).unwrap()).unwrap();
        RayCaster::new(RenderContext::new(pool, clock))
    }

    fn caster(threads: usize) -> RayCaster {
        caster_with_clock(threads, Arc::new(ManualClock::new()))
    }

    /// Looks down −Z from z = 10, seeing 4 world units vertically.
    fn camera() -> Camera {
        Camera::look_at(
            Projection::Parallel { scale: 2.0 },
            point3(0.0, 0.0, 10.0),
            point3(0.0, 0.0, 0.0),
            vec3(0.0, 1.0, 0.0),
        )
        .unwrap()
        .with_clipping_range(1.0, 21.0)
    }

    fn everywhere(color: [f32; 4]) -> SolidVolume {
        SolidVolume::new(
            Aab::new(-100.0, 100.0, -100.0, 100.0, -1.0, 1.0),
            Rgba::from_array(color),
        )
    }

    fn frame(caster: &mut RayCaster, scene: &mut TestScene) -> FrameInfo {
        let (mut raycast, mut software) = (0, 0);
        for volume in scene.volumes() {
            match volume.mapper() {
                Mapper::RayCast(_) => raycast += 1,
                Mapper::SoftwareBuffer(_) => software += 1,
                _ => {}
            }
        }
        caster.viewport_scale_factor(scene);
        caster.render(scene, raycast, software)
    }

    fn all_pixels(scene: &TestScene) -> Vec<[f32; 4]> {
        scene.window().buf().to_vec()
    }

    #[rstest]
    fn solid_red_at_full_resolution(#[values(1, 3)] threads: usize) {
        let mut caster = caster(threads);
        let mut scene = TestScene::new(size2(8, 6))
            .with_camera(camera())
            .with_volume(everywhere(RED));

        assert_eq!(caster.viewport_scale_factor(&scene), 1.0);
        let info = caster.render(&mut scene, 1, 0);

        assert_eq!(info.flaws, Flaws::empty());
        assert_eq!(info.level, 0);
        assert_eq!(info.working_size, size2(8, 6));
        assert!(info.samples_taken > 0);
        assert_eq!(caster.number_of_samples_taken(), info.samples_taken);
        assert_eq!(scene.writes(), 1);
        assert!(all_pixels(&scene).iter().all(|&p| p == RED));
    }

    #[rstest]
    fn solid_red_is_upscaled(#[values(false, true)] bilinear: bool) {
        let mut caster = caster(2);
        caster.set_automatic_scale_adjustment(false);
        caster.select_level(1).unwrap();
        caster.set_bilinear_image_zoom(bilinear);
        let mut scene = TestScene::new(size2(8, 6))
            .with_camera(camera())
            .with_volume(everywhere(RED));

        assert_eq!(caster.viewport_scale_factor(&scene), 0.5);
        let info = caster.render(&mut scene, 1, 0);

        assert_eq!(info.flaws, Flaws::empty());
        assert_eq!(info.working_size, size2(4, 3));
        assert_eq!(info.full_size, size2(8, 6));
        for pixel in all_pixels(&scene) {
            for (c, e) in pixel.into_iter().zip(RED) {
                assert!((c - e).abs() < 1e-6, "{pixel:?}");
            }
        }
    }

    #[test]
    fn full_resolution_output_is_not_resampled() {
        let mut caster = caster(2);
        caster.set_bilinear_image_zoom(true);
        let mut scene = TestScene::new(size2(9, 7)).with_camera(camera()).with_volume(
            SolidVolume::new(
                Aab::new(-1.3, 0.4, -0.2, 1.7, -1.0, 1.0),
                Rgba::new(0.2, 0.5, 0.1, 0.7),
            ),
        );
        let info = frame(&mut caster, &mut scene);
        assert_eq!(info.working_size, info.full_size);

        let checksum = |image: imgref::ImgRef<'_, [f32; 4]>| -> f64 {
            image
                .buf()
                .iter()
                .enumerate()
                .map(|(index, p)| {
                    (index + 1) as f64 * p.iter().map(|&c| f64::from(c)).sum::<f64>()
                })
                .sum()
        };
        let before = checksum(scene.window());
        let window = RgbaImage::new(all_pixels(&scene), 9, 7);
        let rescaled = ImageRescaler::new(RescaleMethod::Bilinear)
            .rescale(window, info.full_size)
            .unwrap();
        assert_eq!(checksum(rescaled.as_ref()), before);
    }

    /// A volume which makes time pass while it is prepared, in proportion to the number
    /// of pixels in the image, as if rendering it were that slow.
    #[derive(Debug)]
    struct SlowVolume {
        inner: SolidVolume,
        clock: Arc<ManualClock>,
        seconds_per_pixel: f64,
    }

    impl Volume for SlowVolume {
        fn visible(&self) -> bool {
            true
        }
        fn bounds(&self) -> Aab {
            self.inner.aab
        }
        fn mapper(&self) -> Mapper<'_> {
            Mapper::RayCast(self)
        }
    }

    impl RayCastMapper for SlowVolume {
        fn prepare(&self, setup: &VolumeSetup<'_>) -> Box<dyn VolumeSampler + '_> {
            let pixels = f64::from(setup.image_size.width * setup.image_size.height);
            self.clock
                .advance(Duration::from_secs_f64(pixels * self.seconds_per_pixel));
            self.inner.prepare(setup)
        }
    }

    #[test]
    fn resolution_converges_to_budget() {
        let clock = Arc::new(ManualClock::new());
        let mut caster = caster_with_clock(2, clock.clone());
        let mut scene = TestScene::new(size2(100, 100))
            .with_camera(camera())
            .with_volume(SlowVolume {
                inner: everywhere(RED),
                clock,
                // 1 second at full resolution
                seconds_per_pixel: 1e-4,
            });
        scene.allocated_render_time = 0.09;

        let infos: Vec<FrameInfo> = (0..20).map(|_| frame(&mut caster, &mut scene)).collect();

        assert_eq!(infos[0].level, 0);
        assert!((infos[0].render_time.as_secs_f64() - 1.0).abs() < 1e-6);
        for info in &infos[10..] {
            assert_eq!(info.level, ADJUSTABLE_LEVEL);
            assert!((info.scale - 0.3).abs() <= Tuning::default().hysteresis, "{info}");
            assert_eq!(info.scale, infos[19].scale);
        }
        assert!(caster.frame_time_stats().count == 20);
        assert!(all_pixels(&scene).iter().all(|&p| p == RED));
    }

    #[rstest]
    fn thin_viewport_is_presented_every_frame(#[values(false, true)] bilinear: bool) {
        let clock = Arc::new(ManualClock::new());
        let mut caster = caster_with_clock(1, clock.clone());
        caster.set_bilinear_image_zoom(bilinear);
        let mut scene = TestScene::new(size2(100, 5))
            .with_camera(camera())
            .with_volume(SlowVolume {
                inner: everywhere(RED),
                clock,
                // 1 second at full resolution
                seconds_per_pixel: 2e-3,
            });
        scene.allocated_render_time = 0.01;

        let infos: Vec<FrameInfo> = (0..15).map(|_| frame(&mut caster, &mut scene)).collect();

        let min_height = if bilinear { 2 } else { 1 };
        for info in &infos {
            assert_eq!(info.flaws, Flaws::empty(), "{info}");
            assert!(info.working_size.height >= min_height, "{info}");
            assert!(info.samples_taken > 0, "{info}");
        }
        assert_eq!(infos[14].level, ADJUSTABLE_LEVEL);
        assert_eq!(scene.writes(), 15);
        assert_eq!(caster.frame_time_stats().count, 15);
        for pixel in all_pixels(&scene) {
            for (c, e) in pixel.into_iter().zip(RED) {
                assert!((c - e).abs() < 1e-6, "{pixel:?}");
            }
        }
    }

    #[test]
    fn abort_leaves_remaining_rows_uncast() {
        let mut caster = caster(1);
        let mut scene = TestScene::new(size2(4, 4))
            .with_camera(camera())
            .with_volume(everywhere(RED));
        scene.abort_after(1);

        let info = frame(&mut caster, &mut scene);

        assert_eq!(info.flaws, Flaws::UNFINISHED);
        assert_eq!(scene.writes(), 1);
        for y in 0..4 {
            let expected = if y == 0 { RED } else { [0.0; 4] };
            assert_eq!(scene.pixel(2, y), expected, "row {y}");
        }
    }

    #[test]
    fn single_software_volume_is_used_directly() {
        let mut caster = caster(1);
        let mut scene = TestScene::new(size2(5, 3)).with_volume(FlatImageVolume::new(
            Aab::new(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0),
            Rgba::from_array(GREEN),
        ));
        let info = frame(&mut caster, &mut scene);
        assert_eq!(info.flaws, Flaws::empty());
        assert!(all_pixels(&scene).iter().all(|&p| p == GREEN));
    }

    #[test]
    fn software_volume_of_wrong_size_is_skipped() {
        let mut caster = caster(1);
        let mut volume = FlatImageVolume::new(Aab::ZERO, Rgba::from_array(GREEN));
        volume.wrong_size = Some(size2(2, 2));
        let mut scene = TestScene::new(size2(5, 3)).with_volume(volume);
        let info = frame(&mut caster, &mut scene);
        assert_eq!(info.flaws, Flaws::SOFTWARE_BUFFER_MISMATCH);
        assert_eq!(scene.writes(), 1);
        assert!(all_pixels(&scene).iter().all(|&p| p == [0.0; 4]));
    }

    #[test]
    fn software_volumes_blend_far_to_near() {
        let mut caster = caster(1);
        let near = FlatImageVolume::new(
            Aab::new(-1.0, 1.0, -1.0, 1.0, 4.0, 5.0),
            Rgba::new(0.5, 0.0, 0.0, 0.5),
        );
        let far = FlatImageVolume::new(
            Aab::new(-1.0, 1.0, -1.0, 1.0, -5.0, -4.0),
            Rgba::from_array(GREEN),
        );
        let mut scene = TestScene::new(size2(2, 2))
            .with_camera(camera())
            .with_volume(near)
            .with_volume(far);
        let info = frame(&mut caster, &mut scene);
        assert_eq!(info.flaws, Flaws::empty());
        assert_eq!(scene.pixel(0, 0), [0.5, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn background_shows_through_translucent_volume() {
        let mut caster = caster(2);
        let mut scene = TestScene::new(size2(8, 8)).with_camera(camera()).with_volume(
            SolidVolume::new(
                Aab::new(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0),
                Rgba::new(0.5, 0.0, 0.0, 0.5),
            ),
        );
        scene.background = Rgb::new(0.0, 0.0, 1.0);
        let info = frame(&mut caster, &mut scene);
        assert_eq!(info.flaws, Flaws::empty());
        assert_eq!(scene.pixel(4, 4), [0.5, 0.0, 0.5, 1.0]);
        assert_eq!(scene.pixel(0, 0), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn drawn_geometry_occludes_by_depth() {
        let mut caster = caster(2);
        let mut scene = TestScene::new(size2(4, 2))
            .with_camera(camera())
            .with_volume(everywhere(RED));
        scene.props_rendered_as_geometry = 1;
        // Left half: geometry 5 units from the eye, in front of the volume.
        // Right half: nothing drawn, at the far plane.
        scene.fill_window(|x, _| if x < 2 { (GREEN, 0.2) } else { ([0.0; 4], 1.0) });

        let info = frame(&mut caster, &mut scene);

        assert_eq!(info.flaws, Flaws::empty());
        for y in 0..2 {
            assert_eq!(scene.pixel(0, y), GREEN);
            assert_eq!(scene.pixel(1, y), GREEN);
            assert_eq!(scene.pixel(2, y), RED);
            assert_eq!(scene.pixel(3, y), RED);
        }
    }

    #[test]
    fn framebuffer_volume_counts_as_drawn_content() {
        let mut caster = caster(1);
        let mut scene = TestScene::new(size2(2, 2))
            .with_camera(camera())
            .with_volume(everywhere([0.0; 4]))
            .with_volume(FramebufferVolume(Aab::ZERO));
        scene.fill_window(|_, _| (GREEN, 0.5));
        frame(&mut caster, &mut scene);
        assert!(all_pixels(&scene).iter().all(|&p| p == GREEN));
    }

    #[test]
    fn viewport_offset_is_respected() {
        let mut caster = caster(2);
        let mut scene = TestScene::new(size2(8, 4))
            .with_camera(camera())
            .with_volume(everywhere(RED));
        scene.viewport = Viewport::new(size2(8, 4)).with_rect([0.5, 0.0], [1.0, 1.0]);
        scene.fill_window(|_, _| (GREEN, 1.0));
        let info = frame(&mut caster, &mut scene);
        assert_eq!(info.full_size, size2(4, 4));
        for y in 0..4 {
            assert_eq!(scene.pixel(3, y), GREEN);
            assert_eq!(scene.pixel(4, y), RED);
        }
    }

    #[test]
    fn no_camera_is_reported() {
        let mut caster = caster(1);
        let mut scene = TestScene::new(size2(3, 3)).with_volume(everywhere(RED));
        let info = frame(&mut caster, &mut scene);
        assert_eq!(info.flaws, Flaws::NO_CAMERA);
        assert!(all_pixels(&scene).iter().all(|&p| p == [0.0; 4]));
    }

    #[test]
    fn nothing_visible_writes_nothing() {
        let mut caster = caster(1);
        let mut hidden = everywhere(RED);
        hidden.visible = false;
        let mut scene = TestScene::new(size2(3, 3))
            .with_camera(camera())
            .with_volume(hidden);
        assert_eq!(caster.viewport_scale_factor(&scene), 1.0);
        let info = caster.render(&mut scene, 0, 0);
        assert_eq!(info.samples_taken, 0);
        assert_eq!(scene.writes(), 0);
    }

    #[test]
    fn miscounted_volumes_are_still_rendered() {
        let mut caster = caster(1);
        let mut scene = TestScene::new(size2(3, 3))
            .with_camera(camera())
            .with_volume(everywhere(RED));
        caster.viewport_scale_factor(&scene);
        caster.render(&mut scene, 0, 4);
        assert!(all_pixels(&scene).iter().all(|&p| p == RED));
    }

    #[test]
    fn configuration_passthrough() {
        let mut caster = caster(1);
        assert_eq!(
            caster.set_thread_count(0),
            Err(RenderError::Config(ConfigError::ZeroThreads))
        );
        assert_eq!(caster.thread_count().get(), 1);
        caster.set_thread_count(3).unwrap();
        assert_eq!(caster.thread_count().get(), 3);

        assert!(caster.set_image_scale(2, 0.9).is_err());
        assert_eq!(caster.image_scale(2), Some(0.25));
        caster.set_image_scale(2, 0.3).unwrap();
        assert_eq!(caster.image_scale(2), Some(0.3));

        caster.set_view_rays_step_size(0, 2.0).unwrap();
        assert_eq!(caster.viewport_step_size(), 2.0);
        assert!(caster.set_automatic_scale_lower_limit(0.0).is_err());
        assert!(!caster.bilinear_image_zoom());
        caster.set_bilinear_image_zoom(true);
        assert!(caster.bilinear_image_zoom());
    }
}
