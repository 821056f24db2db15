//! Conversion between RGBA8 rasters and planar NCHW float tensors.

use image::{Rgba, RgbaImage};
use ndarray::Array4;

use crate::error::{Error, Result};

use super::RGB_CHANNELS;

/// Image tensor in NCHW format (1, 3, height, width).
///
/// Values are raw 0..=255 magnitudes, not normalized.
pub type ImageTensor = Array4<f32>;

/// Pack an RGBA8 raster into a `[1, 3, H, W]` tensor. Alpha is dropped.
///
/// Channel `c` of pixel `(row, col)` lands at flat index
/// `c * H * W + row * W + col`.
#[must_use]
pub fn pack(raster: &RgbaImage) -> ImageTensor {
    let (width, height) = (raster.width() as usize, raster.height() as usize);
    let plane = width * height;

    let mut data = vec![0.0f32; RGB_CHANNELS * plane];
    for (index, pixel) in raster.pixels().enumerate() {
        data[index] = f32::from(pixel[0]);
        data[plane + index] = f32::from(pixel[1]);
        data[2 * plane + index] = f32::from(pixel[2]);
    }

    // Safe: data was sized from the same dimensions
    Array4::from_shape_vec((1, RGB_CHANNELS, height, width), data)
        .unwrap_or_else(|_| unreachable!("tensor buffer sized from raster dimensions"))
}

/// Unpack a `[1, 3, H, W]` tensor into an opaque RGBA8 raster.
///
/// Each value is rounded and clamped to `0..=255`; NaN maps to 0.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the tensor is not `[1, 3, H, W]` or its
/// spatial size does not fit a raster.
pub fn unpack(tensor: &ImageTensor) -> Result<RgbaImage> {
    let (batch, channels, height, width) = tensor.dim();
    if batch != 1 || channels != RGB_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: format!("[1, {RGB_CHANNELS}, H, W]"),
            actual: format!("{:?}", tensor.shape()),
        });
    }

    let (Ok(raster_width), Ok(raster_height)) = (u32::try_from(width), u32::try_from(height))
    else {
        return Err(Error::ShapeMismatch {
            expected: "spatial size within u32".to_string(),
            actual: format!("{height}x{width}"),
        });
    };

    let planar = tensor.as_standard_layout();
    let data = planar.as_slice().ok_or_else(|| Error::ShapeMismatch {
        expected: "contiguous tensor".to_string(),
        actual: "non-contiguous tensor".to_string(),
    })?;
    let plane = width * height;

    let mut raster = RgbaImage::new(raster_width, raster_height);
    for (index, pixel) in raster.pixels_mut().enumerate() {
        *pixel = Rgba([
            to_channel(data[index]),
            to_channel(data[plane + index]),
            to_channel(data[2 * plane + index]),
            u8::MAX,
        ]);
    }

    Ok(raster)
}

/// Round and clamp a model output value to an 8-bit channel.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    // Safe: clamped to [0, 255] range before casting
    value.round().clamp(0.0, 255.0) as u8
}
