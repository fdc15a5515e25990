//! Resampling of the working-resolution image up to the size of the viewport.

use imgref::{ImgRef, ImgVec};

use crate::RgbaImage;
use crate::camera::{ImageSize, area_usize};

/// How to enlarge an image.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[expect(clippy::exhaustive_enums)]
pub enum RescaleMethod {
    /// Each target pixel copies the source pixel it falls in.
    #[default]
    Nearest,
    /// Each target pixel interpolates between the four nearest source pixels.
    Bilinear,
}

impl RescaleMethod {
    /// The smallest width and height of image this method can enlarge.
    pub fn min_source_extent(self) -> u32 {
        match self {
            RescaleMethod::Nearest => 1,
            RescaleMethod::Bilinear => 2,
        }
    }
}

/// An image could not be rescaled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, displaydoc::Display)]
#[non_exhaustive]
pub enum RescaleError {
    /// cannot shrink image of size {source_size:?} to {target_size:?}
    SourceLargerThanTarget {
        /// Size of the image given.
        source_size: ImageSize,
        /// Size requested.
        target_size: ImageSize,
    },
    /// image of size {source_size:?} is too small to interpolate; it must be at least 2×2
    TooSmallForBilinear {
        /// Size of the image given.
        source_size: ImageSize,
    },
}

impl std::error::Error for RescaleError {}

/// Enlarges working-resolution images to the viewport size.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ImageRescaler {
    method: RescaleMethod,
}

impl ImageRescaler {
    /// Creates a rescaler using the given method.
    pub fn new(method: RescaleMethod) -> Self {
        Self { method }
    }

    /// The method this rescaler uses.
    pub fn method(&self) -> RescaleMethod {
        self.method
    }

    /// Rescales `source` to `target_size`.
    ///
    /// If the image already has that size, it is returned as-is without any resampling.
    /// An image too thin to interpolate is enlarged by nearest neighbor instead.
    pub fn rescale(
        &self,
        source: RgbaImage,
        target_size: ImageSize,
    ) -> Result<RgbaImage, RescaleError> {
        if image_size(source.as_ref()) == target_size {
            return Ok(source);
        }
        let source_size = image_size(source.as_ref());
        let min = RescaleMethod::Bilinear.min_source_extent();
        match self.method {
            RescaleMethod::Bilinear if source_size.width >= min && source_size.height >= min => {
                bilinear_zoom(source.as_ref(), target_size)
            }
            RescaleMethod::Bilinear => {
                log::debug!("{source_size:?} image is too thin to interpolate; using nearest neighbor");
                nearest_neighbor_zoom(source.as_ref(), target_size)
            }
            RescaleMethod::Nearest => nearest_neighbor_zoom(source.as_ref(), target_size),
        }
    }
}

/// Enlarges `source` to `target_size` by copying the nearest source pixel.
pub fn nearest_neighbor_zoom(
    source: ImgRef<'_, [f32; 4]>,
    target_size: ImageSize,
) -> Result<RgbaImage, RescaleError> {
    let source_size = check_not_shrinking(source, target_size)?;
    let x_scale = f64::from(source_size.width) / f64::from(target_size.width.max(1));
    let y_scale = f64::from(source_size.height) / f64::from(target_size.height.max(1));
    let stride = source.stride();
    let buf = source.buf();

    let mut data = Vec::with_capacity(area_usize(target_size).unwrap_or(0));
    for j in 0..target_size.height {
        let sy = nearest_index(j, y_scale, source_size.height);
        for i in 0..target_size.width {
            let sx = nearest_index(i, x_scale, source_size.width);
            data.push(buf[sy * stride + sx]);
        }
    }
    Ok(ImgVec::new(
        data,
        target_size.width as usize,
        target_size.height as usize,
    ))
}

/// Enlarges `source` to `target_size` by bilinear interpolation.
///
/// The corner pixels of the target coincide with the corner pixels of the source.
pub fn bilinear_zoom(
    source: ImgRef<'_, [f32; 4]>,
    target_size: ImageSize,
) -> Result<RgbaImage, RescaleError> {
    let source_size = check_not_shrinking(source, target_size)?;
    if source_size.width < 2 || source_size.height < 2 {
        return Err(RescaleError::TooSmallForBilinear { source_size });
    }
    // Both target dimensions are at least 2 here, since they are at least the source's.
    let x_scale = f64::from(source_size.width - 1) / f64::from(target_size.width - 1);
    let y_scale = f64::from(source_size.height - 1) / f64::from(target_size.height - 1);
    let stride = source.stride();
    let buf = source.buf();
    let last_x = source_size.width as usize - 1;
    let last_y = source_size.height as usize - 1;

    let mut data = Vec::with_capacity(area_usize(target_size).unwrap_or(0));
    for j in 0..target_size.height {
        let (y0, fy) = split_position(j, y_scale, last_y);
        // At the far edge the fraction is zero, so the clamped neighbor has no weight.
        let y1 = (y0 + 1).min(last_y);
        for i in 0..target_size.width {
            let (x0, fx) = split_position(i, x_scale, last_x);
            let x1 = (x0 + 1).min(last_x);

            let a = (1.0 - fy) * (1.0 - fx);
            let b = (1.0 - fy) * fx;
            let c = fy * (1.0 - fx);
            let d = fy * fx;
            let p00 = buf[y0 * stride + x0];
            let p10 = buf[y0 * stride + x1];
            let p01 = buf[y1 * stride + x0];
            let p11 = buf[y1 * stride + x1];
            data.push(core::array::from_fn(|ch| {
                a * p00[ch] + b * p10[ch] + c * p01[ch] + d * p11[ch]
            }));
        }
    }
    Ok(ImgVec::new(
        data,
        target_size.width as usize,
        target_size.height as usize,
    ))
}

pub(crate) fn image_size<T>(image: ImgRef<'_, T>) -> ImageSize {
    ImageSize::new(image.width() as u32, image.height() as u32)
}

fn check_not_shrinking(
    source: ImgRef<'_, [f32; 4]>,
    target_size: ImageSize,
) -> Result<ImageSize, RescaleError> {
    let source_size = image_size(source);
    if source_size.width > target_size.width || source_size.height > target_size.height {
        Err(RescaleError::SourceLargerThanTarget {
            source_size,
            target_size,
        })
    } else {
        Ok(source_size)
    }
}

#[inline]
fn nearest_index(target_index: u32, scale: f64, source_len: u32) -> usize {
    ((f64::from(target_index) * scale) as usize).min(source_len as usize - 1)
}

/// Returns the integer and fractional parts of a source position.
#[inline]
fn split_position(target_index: u32, scale: f64, last: usize) -> (usize, f32) {
    let position = f64::from(target_index) * scale;
    let whole = (position as usize).min(last);
    (whole, (position - whole as f64) as f32)
}
