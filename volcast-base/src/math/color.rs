//! Color data types. This module is private but reexported by its parent.

use core::fmt;
use core::ops::{Add, Mul};

use euclid::{Vector3D, vec3};

/// A floating-point RGB color value.
///
/// Components are linear and nominally in the range 0 to 1, but values out of range are
/// preserved until something explicitly clamps them.
#[derive(Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb(Vector3D<f32, Intensity>);

/// A floating-point RGBA color value, with **premultiplied** alpha.
///
/// This is the form in which ray samples and frame buffer pixels are composited:
/// `result = front + (1 − front.alpha) × back`.
#[derive(Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgba {
    rgb: Rgb,
    alpha: f32,
}

/// Unit-of-measure type for vectors that contain color channels.
#[expect(clippy::exhaustive_enums)]
#[derive(Debug, Eq, PartialEq)]
pub enum Intensity {}

impl Rgb {
    /// Black.
    pub const ZERO: Rgb = Rgb(vec3(0., 0., 0.));

    /// Constructs a color from components.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self(vec3(r, g, b))
    }

    /// Returns the red color component.
    #[inline]
    pub const fn red(self) -> f32 {
        self.0.x
    }
    /// Returns the green color component.
    #[inline]
    pub const fn green(self) -> f32 {
        self.0.y
    }
    /// Returns the blue color component.
    #[inline]
    pub const fn blue(self) -> f32 {
        self.0.z
    }

    /// Returns whether all components are exactly zero, in which case blending this color
    /// in behind anything has no effect.
    #[inline]
    pub fn is_black(self) -> bool {
        self == Self::ZERO
    }

    /// Combines this color with an alpha value to produce an [`Rgba`].
    ///
    /// The color is taken as already premultiplied.
    #[inline]
    #[must_use]
    pub const fn with_alpha(self, alpha: f32) -> Rgba {
        Rgba { rgb: self, alpha }
    }

    /// Clamps each component to the range 0 to 1. NaN becomes 0.
    #[inline]
    #[must_use]
    pub fn clamp01(self) -> Self {
        Self(self.0.map(clamp01))
    }

    /// Returns the components as an array.
    #[inline]
    pub const fn to_array(self) -> [f32; 3] {
        [self.0.x, self.0.y, self.0.z]
    }
}

impl Rgba {
    /// Transparent black (all components zero).
    pub const TRANSPARENT: Rgba = Rgb::ZERO.with_alpha(0.0);
    /// Opaque black.
    pub const BLACK: Rgba = Rgb::ZERO.with_alpha(1.0);

    /// Constructs a premultiplied color from components.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, alpha: f32) -> Self {
        Rgb::new(r, g, b).with_alpha(alpha)
    }

    /// Constructs a color from the array layout used by frame buffers: `[r, g, b, a]`.
    #[inline]
    pub const fn from_array([r, g, b, a]: [f32; 4]) -> Self {
        Self::new(r, g, b, a)
    }

    /// Returns the color components (premultiplied) without alpha.
    #[inline]
    pub const fn to_rgb(self) -> Rgb {
        self.rgb
    }

    /// Returns the alpha component.
    #[inline]
    pub const fn alpha(self) -> f32 {
        self.alpha
    }

    /// Returns the components in the array layout used by frame buffers: `[r, g, b, a]`.
    #[inline]
    pub const fn to_array(self) -> [f32; 4] {
        [self.rgb.0.x, self.rgb.0.y, self.rgb.0.z, self.alpha]
    }

    /// Porter-Duff “over”: composites `self` in front of `behind`.
    #[inline]
    #[must_use]
    pub fn over(self, behind: Rgba) -> Rgba {
        let transmittance = 1.0 - self.alpha;
        Rgba {
            rgb: self.rgb + behind.rgb * transmittance,
            alpha: self.alpha + behind.alpha * transmittance,
        }
    }

    /// Clamps each component, including alpha, to the range 0 to 1.
    #[inline]
    #[must_use]
    pub fn clamp01(self) -> Self {
        Rgba {
            rgb: self.rgb.clamp01(),
            alpha: clamp01(self.alpha),
        }
    }
}

impl Add for Rgb {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Mul<f32> for Rgb {
    type Output = Self;
    /// Multiplies this color value by a scalar.
    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Self(self.0 * scalar)
    }
}

impl From<[f32; 3]> for Rgb {
    #[inline]
    fn from([r, g, b]: [f32; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<[f32; 4]> for Rgba {
    #[inline]
    fn from(value: [f32; 4]) -> Self {
        Self::from_array(value)
    }
}

impl From<Rgba> for [f32; 4] {
    #[inline]
    fn from(value: Rgba) -> Self {
        value.to_array()
    }
}

impl fmt::Debug for Rgb {
    #[allow(clippy::missing_inline_in_public_items)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rgb({:?}, {:?}, {:?})",
            self.red(),
            self.green(),
            self.blue()
        )
    }
}

impl fmt::Debug for Rgba {
    #[allow(clippy::missing_inline_in_public_items)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_array();
        write!(f, "Rgba({r:?}, {g:?}, {b:?}, {a:?})")
    }
}

#[inline]
fn clamp01(value: f32) -> f32 {
    // `max` first so that NaN maps to 0
    value.max(0.0).min(1.0)
}
