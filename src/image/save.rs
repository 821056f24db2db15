//! Image saving and encoding utilities.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageError, RgbaImage};

use crate::error::{Error, Result};

use super::load::decode_image;
use super::scale::{scale, ResampleFilter};

/// JPEG quality used when an encoding is inferred from a file extension.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Encoding used when a raster leaves the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    /// Lossy JPEG with quality 1-100. Alpha is discarded.
    Jpeg { quality: u8 },
    /// Lossless PNG.
    Png,
}

impl OutputEncoding {
    /// Pick an encoding from the path extension, falling back to PNG.
    ///
    /// `jpeg_quality` is used when the extension is `jpg` or `jpeg`.
    #[must_use]
    pub fn for_path(path: &Path, jpeg_quality: u8) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_lowercase();

        match extension.as_str() {
            "jpg" | "jpeg" => Self::Jpeg {
                quality: jpeg_quality,
            },
            _ => Self::Png,
        }
    }
}

/// Encode a raster into an in-memory buffer.
///
/// # Errors
///
/// Returns [`Error::ImageEncode`] if the encoder rejects the raster.
pub fn encode_image(raster: &RgbaImage, encoding: OutputEncoding) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_encoded(raster, encoding, &mut bytes).map_err(|source| Error::ImageEncode { source })?;

    Ok(bytes)
}

/// Save a raster to `path`.
///
/// With no explicit `encoding`, `.jpg`/`.jpeg` paths are written as JPEG at
/// [`DEFAULT_JPEG_QUALITY`] and anything else as PNG.
///
/// # Errors
///
/// Returns an error if the file cannot be created or the image cannot be
/// encoded.
pub fn save_image<P: AsRef<Path>>(
    raster: &RgbaImage,
    path: P,
    encoding: Option<OutputEncoding>,
) -> Result<()> {
    let path = path.as_ref();
    let encoding =
        encoding.unwrap_or_else(|| OutputEncoding::for_path(path, DEFAULT_JPEG_QUALITY));

    let mut output = BufWriter::new(File::create(path)?);
    write_encoded(raster, encoding, &mut output).map_err(|source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;
    output.flush()?;

    tracing::debug!(path = %path.display(), ?encoding, "saved image");
    Ok(())
}

/// Re-encode `bytes` at `width` x `height` for display.
///
/// Any failure is logged and the input bytes are returned unchanged, so a
/// preview is always available.
#[must_use]
pub fn rescale_encoded(
    bytes: &[u8],
    width: u32,
    height: u32,
    filter: ResampleFilter,
    encoding: OutputEncoding,
) -> Vec<u8> {
    let rescaled = decode_image(bytes)
        .and_then(|raster| scale(&raster, width, height, filter))
        .and_then(|raster| encode_image(&raster, encoding));

    match rescaled {
        Ok(encoded) => encoded,
        Err(err) => {
            tracing::warn!("preview rescale failed, keeping original bytes: {err}");
            bytes.to_vec()
        }
    }
}

fn write_encoded<W: Write>(
    raster: &RgbaImage,
    encoding: OutputEncoding,
    writer: &mut W,
) -> std::result::Result<(), ImageError> {
    match encoding {
        OutputEncoding::Jpeg { quality } => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(raster.clone()).into_rgb8();
            let encoder = JpegEncoder::new_with_quality(writer, quality);
            DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder)
        }
        OutputEncoding::Png => {
            let encoder = PngEncoder::new(writer);
            DynamicImage::ImageRgba8(raster.clone()).write_with_encoder(encoder)
        }
    }
}
