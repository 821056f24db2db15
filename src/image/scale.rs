//! Resampling to exact target dimensions.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::{Error, Result};

use super::MAX_SURFACE_PIXELS;

/// Interpolation kernel used whenever a raster changes size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    /// Nearest neighbour.
    Nearest,
    /// Linear (triangle) filter.
    Bilinear,
    /// Catmull-Rom cubic filter.
    #[default]
    Bicubic,
    /// Lanczos with window 3.
    Lanczos3,
}

impl ResampleFilter {
    /// Name accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Bicubic => "bicubic",
            Self::Lanczos3 => "lanczos3",
        }
    }
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => Self::Nearest,
            ResampleFilter::Bilinear => Self::Triangle,
            ResampleFilter::Bicubic => Self::CatmullRom,
            ResampleFilter::Lanczos3 => Self::Lanczos3,
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" | "triangle" => Ok(Self::Bilinear),
            "bicubic" | "catmullrom" => Ok(Self::Bicubic),
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            _ => Err(Error::InvalidParameter {
                name: "filter".to_string(),
                reason: format!("unknown filter {s:?}"),
            }),
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resample `raster` to exactly `width` x `height`.
///
/// The aspect ratio is not preserved. A request for the raster's own size
/// returns an identical copy.
///
/// # Errors
///
/// Returns [`Error::UnsupportedDimensions`] for a zero-sized source or target
/// and [`Error::SurfaceUnavailable`] when the target is too large.
pub fn scale(
    raster: &RgbaImage,
    width: u32,
    height: u32,
    filter: ResampleFilter,
) -> Result<RgbaImage> {
    let (src_width, src_height) = raster.dimensions();
    if src_width == 0 || src_height == 0 {
        return Err(Error::UnsupportedDimensions {
            width: src_width,
            height: src_height,
            reason: "cannot resample an empty raster".to_string(),
        });
    }
    if width == 0 || height == 0 {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: "target size must be at least 1x1".to_string(),
        });
    }
    if u64::from(width) * u64::from(height) > MAX_SURFACE_PIXELS {
        return Err(Error::SurfaceUnavailable { width, height });
    }

    if (width, height) == (src_width, src_height) {
        return Ok(raster.clone());
    }

    tracing::trace!(src_width, src_height, width, height, %filter, "resampling");
    Ok(imageops::resize(raster, width, height, filter.into()))
}
