//! The working-resolution color and depth buffers of one frame.

use imgref::ImgVec;

use crate::camera::{ImageSize, PixelPoint, area_usize};
use crate::math::Rgba;
use crate::rescale::image_size;
use crate::{DepthImage, Flaws, RgbaImage, Scene};

/// Color and depth images at the working resolution, from which one frame is composited.
#[derive(Clone, Debug)]
pub struct FrameBuffers {
    /// Premultiplied color, bottom row first.
    pub color: RgbaImage,
    /// Depth buffer values of what was already drawn, if anything was.
    pub depth: Option<DepthImage>,
    /// True if nothing was drawn before the ray caster ran, so that `color` holds no
    /// content yet and the first layer blended into it may simply replace it.
    pub first_blend: bool,
}

impl FrameBuffers {
    /// Creates empty buffers of `size`, with nothing drawn.
    pub fn blank(size: ImageSize) -> Self {
        let area = area_usize(size).unwrap_or(0);
        Self {
            color: ImgVec::new(
                vec![Rgba::TRANSPARENT.to_array(); area],
                size.width as usize,
                size.height as usize,
            ),
            depth: None,
            first_blend: true,
        }
    }

    /// Prepares the buffers for a frame of `size` working pixels.
    ///
    /// If `something_drawn`, the window's current color and depth within the `size`
    /// rectangle at `origin` are read back so that the volumes may be composited with
    /// them. Otherwise, or if the read back images have the wrong size, the buffers
    /// start out blank.
    pub fn initialize(
        scene: &dyn Scene,
        origin: PixelPoint,
        size: ImageSize,
        something_drawn: bool,
    ) -> (Self, Flaws) {
        if !something_drawn {
            return (Self::blank(size), Flaws::empty());
        }

        let color = scene.read_rgba(origin, size);
        let depth = scene.read_depth(origin, size);
        let (color_size, depth_size) = (image_size(color.as_ref()), image_size(depth.as_ref()));
        if color_size != size || depth_size != size {
            log::error!(
                "frame buffer read back as {color_size:?} color and {depth_size:?} depth \
                instead of {size:?}; ignoring previously drawn content"
            );
            return (Self::blank(size), Flaws::OTHER);
        }

        (
            Self {
                color,
                depth: Some(depth),
                first_blend: false,
            },
            Flaws::empty(),
        )
    }

    /// The size of the buffers.
    pub fn size(&self) -> ImageSize {
        image_size(self.color.as_ref())
    }

    /// Composites `layer`, which must be the same size, over the current contents.
    pub fn blend_over(&mut self, layer: imgref::ImgRef<'_, [f32; 4]>) {
        let width = self.color.width();
        let (dst_stride, src_stride) = (self.color.stride(), layer.stride());
        let src = layer.buf();
        for (j, dst_row) in self.color.buf_mut().chunks_mut(dst_stride).enumerate() {
            let Some(src_row) = src.get(j * src_stride..) else {
                break;
            };
            for (dst, src) in dst_row[..width].iter_mut().zip(&src_row[..width]) {
                *dst = Rgba::from_array(*src)
                    .over(Rgba::from_array(*dst))
                    .clamp01()
                    .to_array();
            }
        }
        self.first_blend = false;
    }

    /// Composites the current contents over an opaque background.
    pub fn blend_background(&mut self, background: Rgba) {
        for pixel in self.color.buf_mut().iter_mut() {
            *pixel = Rgba::from_array(*pixel).over(background).clamp01().to_array();
        }
    }
}
