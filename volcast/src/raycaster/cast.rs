//! Casting the rays of one row of the image through every volume, and compositing the
//! results with what was already drawn.

use euclid::Transform3D;

use crate::camera::{PixelPoint, ViewRaySet};
use crate::depth::{DepthCodec, DepthCodecError};
use crate::math::{Eye, FreeCoordinate, FreePoint, FreeVector, Rgba, World};
use crate::raycaster::{CompositeSample, RowBounds, SampleList};
use crate::{DepthImage, Flaws, ViewRay, VolumeSampler};

/// A volume ready to have rays cast through it this frame.
pub(crate) struct PreparedVolume<'a> {
    pub sampler: Box<dyn VolumeSampler + 'a>,
    pub row_bounds: RowBounds,
}

/// Previously drawn depth, and how to turn it into distances.
#[derive(Clone, Copy)]
pub(crate) struct CapturedDepth<'a> {
    pub image: &'a DepthImage,
    pub codec: DepthCodec,
}

impl<'a> CapturedDepth<'a> {
    /// Pairs `image` with the codec from [`DepthCodec::for_camera()`], adding
    /// [`Flaws::DEPTH_SUSPECT`] to `flaws` if its depths cannot be trusted.
    ///
    /// A codec which failed its check is still used. Returns [`None`] if there is no codec.
    pub fn new(
        image: &'a DepthImage,
        codec: Option<(DepthCodec, Result<(), DepthCodecError>)>,
        flaws: &mut Flaws,
    ) -> Option<Self> {
        let Some((codec, check)) = codec else {
            *flaws |= Flaws::DEPTH_SUSPECT;
            return None;
        };
        if let Err(error) = check {
            if cfg!(debug_assertions) {
                log::error!("{error}");
            }
            *flaws |= Flaws::DEPTH_SUSPECT;
        }
        Some(Self { image, codec })
    }
}

/// Everything that is shared by all rows of a frame. Read-only while rows are cast.
pub(crate) struct CastFrame<'a> {
    pub rays: &'a ViewRaySet,
    pub view_to_world: Transform3D<FreeCoordinate, Eye, World>,
    /// Near and far clipping distances, measured perpendicular to the image plane.
    pub clipping_range: (FreeCoordinate, FreeCoordinate),
    pub volumes: &'a [PreparedVolume<'a>],
    pub depth: Option<CapturedDepth<'a>>,
}

/// What one thread did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct ThreadOutcome {
    /// Sampling steps taken by all rays.
    pub steps: u64,
    /// Rows left uncast because the frame was aborted.
    pub rows_skipped: usize,
}

impl CastFrame<'_> {
    /// Casts the given rows, in order, stopping early if `abort` returns true before
    /// a row is started.
    pub fn cast_rows(
        &self,
        rows: Vec<(usize, &mut [[f32; 4]])>,
        abort: Option<&dyn Fn() -> bool>,
    ) -> ThreadOutcome {
        let mut outcome = ThreadOutcome::default();
        let mut samples = SampleList::with_capacity(self.volumes.len() + 1);
        let row_count = rows.len();
        for (done, (j, row)) in rows.into_iter().enumerate() {
            if abort.is_some_and(|abort| abort()) {
                outcome.rows_skipped = row_count - done;
                break;
            }
            outcome.steps += self.cast_row(j as u32, row, &mut samples);
        }
        outcome
    }

    /// Casts every ray of row `j`, replacing the contents of `row` with the composited
    /// color. Returns the number of sampling steps taken.
    fn cast_row(&self, j: u32, row: &mut [[f32; 4]], samples: &mut SampleList) -> u64 {
        let mut steps = 0;
        let width = self.rays.size().width;
        for (i, pixel) in (0..width).zip(row.iter_mut()) {
            let (eye_origin, eye_direction) = self.rays.eye_ray(i, j);
            // Clipping distances are along the view axis; rays off-axis travel farther.
            let axial = -eye_direction.z;
            let near = self.clipping_range.0 / axial;
            let far_clip = self.clipping_range.1 / axial;

            // The far sample is whatever was already drawn, or nothing at the far plane.
            let far_sample = match self.depth {
                Some(CapturedDepth { image, codec }) => {
                    let z = image.buf()[j as usize * image.stride() + i as usize];
                    CompositeSample {
                        color: Rgba::from_array(*pixel),
                        depth: (codec.plane_distance(z) / axial).min(far_clip),
                    }
                }
                None => CompositeSample {
                    color: Rgba::TRANSPARENT,
                    depth: far_clip,
                },
            };
            samples.clear();
            samples.insert(far_sample);

            let mut ray = None;
            for volume in self.volumes {
                if !volume.row_bounds.contains(i, j) {
                    continue;
                }
                let ray = ray.get_or_insert_with(|| {
                    let (origin, direction) = self.to_world(eye_origin, eye_direction);
                    ViewRay {
                        origin,
                        direction,
                        near,
                        far: far_sample.depth,
                        pixel: PixelPoint::new(i, j),
                    }
                });
                let hit = volume.sampler.cast_ray(ray);
                steps += u64::from(hit.steps);
                samples.insert(CompositeSample {
                    color: hit.color,
                    depth: hit.depth,
                });
            }

            *pixel = samples.composite().to_array();
        }
        steps
    }

    fn to_world(
        &self,
        origin: euclid::Point3D<FreeCoordinate, Eye>,
        direction: euclid::Vector3D<FreeCoordinate, Eye>,
    ) -> (FreePoint, FreeVector) {
        let m = &self.view_to_world;
        // The view transform is affine, so no homogeneous divide is needed.
        let origin = FreePoint::new(
            origin.x * m.m11 + origin.y * m.m21 + origin.z * m.m31 + m.m41,
            origin.x * m.m12 + origin.y * m.m22 + origin.z * m.m32 + m.m42,
            origin.x * m.m13 + origin.y * m.m23 + origin.z * m.m33 + m.m43,
        );
        (origin, m.transform_vector3d(direction))
    }
}
