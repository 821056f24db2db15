//! Removal of letterbox padding.

use image::imageops;
use image::RgbaImage;

use crate::error::{Error, Result};

use super::LetterboxPlacement;

/// Extract the content region described by `placement` from `raster`.
///
/// The result is exactly `content_width` x `content_height`.
///
/// # Errors
///
/// Returns [`Error::PlacementMismatch`] if `raster` is not the
/// `target_size` square the placement was computed for, and
/// [`Error::CropOutOfBounds`] if the rectangle does not lie inside `raster`.
/// The rectangle is never clamped.
pub fn crop(raster: &RgbaImage, placement: &LetterboxPlacement) -> Result<RgbaImage> {
    let (width, height) = raster.dimensions();
    let LetterboxPlacement {
        target_size,
        content_width,
        content_height,
        offset_x,
        offset_y,
    } = *placement;

    if (width, height) != (target_size, target_size) {
        return Err(Error::PlacementMismatch {
            target_size,
            width,
            height,
        });
    }

    let fits_x = offset_x
        .checked_add(content_width)
        .is_some_and(|right| right <= width);
    let fits_y = offset_y
        .checked_add(content_height)
        .is_some_and(|bottom| bottom <= height);

    if !fits_x || !fits_y || content_width == 0 || content_height == 0 {
        return Err(Error::CropOutOfBounds {
            x: offset_x,
            y: offset_y,
            width: content_width,
            height: content_height,
            source_width: width,
            source_height: height,
        });
    }

    if (offset_x, offset_y, content_width, content_height) == (0, 0, width, height) {
        return Ok(raster.clone());
    }

    Ok(imageops::crop_imm(raster, offset_x, offset_y, content_width, content_height).to_image())
}
