//! Multi-resolution, multi-threaded ray casting of volumes, composited with
//! conventionally rasterized scene content.
//!
//! The entry point is [`raycaster::RayCaster`], which is driven once per frame by a
//! renderer implementing [`Scene`]. Volumes are described by the [`Volume`] trait and
//! sampled through [`RayCastMapper`]s or [`SoftwareBufferMapper`]s supplied by the
//! application.
//!
//! ## Package features
//!
//! This package, `volcast`, defines the following feature flags:
//!
//! * `"auto-threads"` (enabled by default):
//!   Cast rays on a [`rayon`] thread pool owned by the ray caster.
//!   If disabled, every row is cast on the thread calling
//!   [`RayCaster::render()`](raycaster::RayCaster::render).
//!   This feature does not affect the public API, only performance and dependencies.
//! * `"serde"`:
//!   Implements serialization for configuration types such as
//!   [`raycaster::Tuning`] and [`raycaster::ScaleTable`].

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]

extern crate alloc;

// -------------------------------------------------------------------------------------------------

pub use volcast_base::{math, time};

// reexport for convenience of our tests and benchmarks
#[doc(hidden)]
pub use volcast_base::euclid;

pub mod camera;

mod depth;
pub use depth::{DepthCodec, DepthCodecError};

mod flaws;
pub use flaws::Flaws;

pub mod raycaster;

pub mod rescale;

mod scene;
pub use scene::*;

#[doc(hidden)] // for tests and benchmarks
pub mod testing;

// -------------------------------------------------------------------------------------------------

/// A color image with premultiplied alpha, stored bottom row first.
pub type RgbaImage = imgref::ImgVec<[f32; 4]>;

/// A depth buffer image with values from 0 (near) to 1 (far), stored bottom row first.
pub type DepthImage = imgref::ImgVec<f32>;

/// An error setting up a [`RayCaster`](raycaster::RayCaster).
#[derive(Clone, Debug, PartialEq, displaydoc::Display)]
#[non_exhaustive]
pub enum RenderError {
    /// {0}
    Config(raycaster::ConfigError),
    /// could not start worker threads: {0}
    ThreadPool(String),
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Config(e) => Some(e),
            RenderError::ThreadPool(_) => None,
        }
    }
}

impl From<raycaster::ConfigError> for RenderError {
    fn from(error: raycaster::ConfigError) -> Self {
        RenderError::Config(error)
    }
}
