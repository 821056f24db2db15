//! Strength blending between the original and the stylized raster.

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};

use super::scale::{scale, ResampleFilter};
use super::{is_opaque, surface};

/// Composite `original` and `stylized` at the given style `strength`.
///
/// Both rasters are stretched to `(max width, max height)`. The original is
/// the base layer and the stylized raster is drawn over it with opacity
/// `strength` (source-over). For opaque inputs every channel is exactly
/// `original * (1 - strength) + stylized * strength`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `strength` is outside `[0, 1]`, or a
/// scaling error if either raster is empty.
pub fn blend(
    original: &RgbaImage,
    stylized: &RgbaImage,
    strength: f32,
    filter: ResampleFilter,
) -> Result<RgbaImage> {
    if !(0.0..=1.0).contains(&strength) {
        return Err(Error::InvalidParameter {
            name: "strength".to_string(),
            reason: format!("must be between 0.0 and 1.0, got {strength}"),
        });
    }

    let width = original.width().max(stylized.width());
    let height = original.height().max(stylized.height());

    if !is_opaque(original) || !is_opaque(stylized) {
        tracing::warn!("blending translucent rasters; result depends on layer order");
    }

    let base = scale(original, width, height, filter)?;
    let layer = scale(stylized, width, height, filter)?;

    let mut canvas = surface(width, height, Rgba([0, 0, 0, 0]))?;
    composite_over(&mut canvas, &base, 0, 0, 1.0);
    composite_over(&mut canvas, &layer, 0, 0, strength);

    Ok(canvas)
}

/// Draw `src` onto `dst` at `(x, y)` with source-over compositing.
///
/// `opacity` multiplies the source alpha. Pixels falling outside `dst` are
/// skipped.
pub(crate) fn composite_over(dst: &mut RgbaImage, src: &RgbaImage, x: u32, y: u32, opacity: f32) {
    let (dst_width, dst_height) = dst.dimensions();

    for (sx, sy, &pixel) in src.enumerate_pixels() {
        let (Some(dx), Some(dy)) = (x.checked_add(sx), y.checked_add(sy)) else {
            continue;
        };
        if dx >= dst_width || dy >= dst_height {
            continue;
        }

        let under = dst.get_pixel_mut(dx, dy);
        *under = over(*under, pixel, opacity);
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn over(dst: Rgba<u8>, src: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let src_alpha = f32::from(src[3]) / 255.0 * opacity;
    if src_alpha >= 1.0 {
        return src;
    }
    if src_alpha <= 0.0 {
        return dst;
    }

    let dst_alpha = f32::from(dst[3]) / 255.0;
    let out_alpha = dst_alpha.mul_add(1.0 - src_alpha, src_alpha);
    if out_alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = f32::from(src[c]).mul_add(
            src_alpha,
            f32::from(dst[c]) * dst_alpha * (1.0 - src_alpha),
        ) / out_alpha;
        // Safe: clamped to [0, 255] before casting
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;

    Rgba(out)
}
