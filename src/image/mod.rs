//! Raster loading, conversion, compositing, and saving utilities.
//!
//! Every stage works on owned [`RgbaImage`] buffers and is synchronous:
//! letterbox → pack → (inference) → unpack → crop → scale → blend.

mod blend;
mod crop;
mod letterbox;
mod load;
mod save;
mod scale;
mod tensor;

pub use blend::blend;
pub use crop::crop;
pub use letterbox::{letterbox, LetterboxPlacement};
pub use load::{decode_image, load_image};
pub use save::{encode_image, rescale_encoded, save_image, OutputEncoding, DEFAULT_JPEG_QUALITY};
pub use scale::{scale, ResampleFilter};
pub use tensor::{pack, unpack, ImageTensor};

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};

/// Default letterbox square used by the fast neural style models.
pub const DEFAULT_TARGET_SIZE: u32 = 224;

/// Number of channels in the model tensors.
pub const RGB_CHANNELS: usize = 3;

/// Largest surface, in pixels, that a stage will allocate.
pub const MAX_SURFACE_PIXELS: u64 = 268_435_456;

/// Allocate a `width` x `height` surface filled with `fill`.
///
/// # Errors
///
/// Returns [`Error::SurfaceUnavailable`] for empty or oversized surfaces.
pub(crate) fn surface(width: u32, height: u32, fill: Rgba<u8>) -> Result<RgbaImage> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels == 0 || pixels > MAX_SURFACE_PIXELS {
        return Err(Error::SurfaceUnavailable { width, height });
    }

    Ok(RgbaImage::from_pixel(width, height, fill))
}

/// Whether every pixel of `raster` has full alpha.
pub(crate) fn is_opaque(raster: &RgbaImage) -> bool {
    raster.pixels().all(|p| p[3] == u8::MAX)
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{Rgba, RgbaImage};
    use rand::{Rng, SeedableRng};

    /// Seeded opaque noise raster.
    pub fn noise(width: u32, height: u32, seed: u64) -> RgbaImage {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        RgbaImage::from_fn(width, height, |_, _| {
            Rgba([rng.random(), rng.random(), rng.random(), u8::MAX])
        })
    }

    /// Horizontal then vertical gradient, smooth enough for resampling checks.
    #[allow(clippy::cast_possible_truncation)]
    pub fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            Rgba([r, g, 128, u8::MAX])
        })
    }

    /// Largest per-channel difference between two equally sized rasters.
    pub fn max_channel_diff(a: &RgbaImage, b: &RgbaImage) -> u8 {
        assert_eq!(a.dimensions(), b.dimensions());
        a.as_raw()
            .iter()
            .zip(b.as_raw())
            .map(|(x, y)| x.abs_diff(*y))
            .max()
            .unwrap_or(0)
    }
}
