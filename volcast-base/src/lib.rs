//! This library is an internal component of [`volcast`],
//! which defines the coordinate, color, and timing types used by the renderer.
//! Its contents are re-exported from `volcast`; prefer depending on that instead.
//!
//! [`volcast`]: https://crates.io/crates/volcast/

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]
#![warn(clippy::missing_inline_in_public_items)]

pub mod math;

pub mod time;

// reexport for convenience of our tests
#[doc(hidden)]
pub use euclid;
