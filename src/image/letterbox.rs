//! Aspect-preserving fit into a padded square canvas.

use image::{Rgb, Rgba, RgbaImage};

use crate::error::{Error, Result};

use super::blend::composite_over;
use super::scale::{scale, ResampleFilter};
use super::surface;

/// Where the real content sits inside a letterboxed canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LetterboxPlacement {
    /// Side of the square canvas.
    pub target_size: u32,
    /// Width of the scaled source inside the canvas.
    pub content_width: u32,
    /// Height of the scaled source inside the canvas.
    pub content_height: u32,
    /// Left padding.
    pub offset_x: u32,
    /// Top padding.
    pub offset_y: u32,
}

impl LetterboxPlacement {
    /// Compute the placement of a `src_width` x `src_height` raster.
    ///
    /// Content sides that would round to zero are kept at one pixel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDimensions`] if the source or target is empty.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_lossless
    )]
    pub fn compute(src_width: u32, src_height: u32, target_size: u32) -> Result<Self> {
        if src_width == 0 || src_height == 0 {
            return Err(Error::UnsupportedDimensions {
                width: src_width,
                height: src_height,
                reason: "cannot letterbox an empty raster".to_string(),
            });
        }
        if target_size == 0 {
            return Err(Error::UnsupportedDimensions {
                width: target_size,
                height: target_size,
                reason: "letterbox target size must be positive".to_string(),
            });
        }

        let target = f64::from(target_size);
        let scale = (target / f64::from(src_width)).min(target / f64::from(src_height));

        // Safe: both products are within [0, target_size] before rounding.
        let content_width = ((f64::from(src_width) * scale).round() as u32).clamp(1, target_size);
        let content_height = ((f64::from(src_height) * scale).round() as u32).clamp(1, target_size);

        Ok(Self {
            target_size,
            content_width,
            content_height,
            offset_x: (target_size - content_width) / 2,
            offset_y: (target_size - content_height) / 2,
        })
    }

    /// Whether the content fills the whole canvas.
    #[must_use]
    pub const fn is_unpadded(&self) -> bool {
        self.content_width == self.target_size && self.content_height == self.target_size
    }
}

/// Scale `source` to fit a `target_size` square, centred on a `pad_color` canvas.
///
/// Returns the square canvas and the placement needed to crop the content
/// back out after inference.
///
/// # Errors
///
/// Returns [`Error::UnsupportedDimensions`] for an empty source or target, or
/// [`Error::SurfaceUnavailable`] if the canvas cannot be allocated.
pub fn letterbox(
    source: &RgbaImage,
    target_size: u32,
    pad_color: Rgb<u8>,
    filter: ResampleFilter,
) -> Result<(RgbaImage, LetterboxPlacement)> {
    let (src_width, src_height) = source.dimensions();
    let placement = LetterboxPlacement::compute(src_width, src_height, target_size)?;

    let [r, g, b] = pad_color.0;
    let mut canvas = surface(target_size, target_size, Rgba([r, g, b, u8::MAX]))?;

    let content = scale(
        source,
        placement.content_width,
        placement.content_height,
        filter,
    )?;
    composite_over(
        &mut canvas,
        &content,
        placement.offset_x,
        placement.offset_y,
        1.0,
    );

    tracing::debug!(
        src_width,
        src_height,
        target_size,
        content_width = placement.content_width,
        content_height = placement.content_height,
        offset_x = placement.offset_x,
        offset_y = placement.offset_y,
        "letterboxed image"
    );

    Ok((canvas, placement))
}
