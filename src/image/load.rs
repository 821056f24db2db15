//! Image loading utilities.

use std::io::{BufRead, Cursor, Seek};
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader, ImageResult, RgbaImage};

use crate::error::{Error, Result};

/// Load an image from disk as an RGBA8 raster.
///
/// The format is inferred from the file contents and extension. An EXIF
/// orientation tag is applied, so the raster is upright as displayed.
///
/// # Errors
///
/// Returns [`Error::ImageLoad`] if the file cannot be read or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbaImage> {
    let path = path.as_ref();

    let img = ImageReader::open(path)
        .map_err(image::ImageError::IoError)
        .and_then(decode_upright)
        .map_err(|source| Error::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(into_raster(img))
}

/// Decode encoded image bytes (PNG, JPEG, ...) into an RGBA8 raster.
///
/// EXIF orientation is applied as in [`load_image`].
///
/// # Errors
///
/// Returns [`Error::ImageDecode`] if the bytes are not a supported image.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    let img = decode_upright(ImageReader::new(Cursor::new(bytes)))
        .map_err(|source| Error::ImageDecode { source })?;

    Ok(into_raster(img))
}

fn decode_upright<R: BufRead + Seek>(reader: ImageReader<R>) -> ImageResult<DynamicImage> {
    let mut decoder = reader.with_guessed_format()?.into_decoder()?;
    let orientation = decoder.orientation()?;

    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);

    Ok(img)
}

fn into_raster(img: DynamicImage) -> RgbaImage {
    let (width, height) = img.dimensions();
    tracing::debug!(width, height, color = ?img.color(), "decoded image");

    img.into_rgba8()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba};

    use super::*;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let img = RgbaImage::from_pixel(5, 3, Rgba([10, 20, 30, 255]));
        let decoded = decode_image(&png_bytes(&img)).unwrap();

        assert_eq!(decoded, img);
    }

    /// Splice an APP1 segment carrying only an orientation tag after the SOI marker.
    fn with_exif_orientation(jpeg: &[u8], orientation: u8) -> Vec<u8> {
        #[rustfmt::skip]
        let app1: [u8; 36] = [
            0xFF, 0xE1, 0x00, 0x22,
            b'E', b'x', b'i', b'f', 0, 0,
            b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08,
            0x00, 0x01,
            0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, orientation, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn jpeg_bytes(img: &RgbaImage) -> Vec<u8> {
        let rgb = DynamicImage::ImageRgba8(img.clone()).into_rgb8();
        let mut out = Cursor::new(Vec::new());
        rgb.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_exif_rotation_is_applied() {
        // Left half black, right half white.
        let img = RgbaImage::from_fn(16, 8, |x, _| {
            if x < 8 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let plain = jpeg_bytes(&img);

        assert_eq!(decode_image(&plain).unwrap().dimensions(), (16, 8));

        // Orientation 6: rotate 90 degrees clockwise, so the left half ends up on top.
        let rotated = decode_image(&with_exif_orientation(&plain, 6)).unwrap();
        assert_eq!(rotated.dimensions(), (8, 16));
        assert!(rotated.get_pixel(4, 2)[0] < 64);
        assert!(rotated.get_pixel(4, 13)[0] > 192);
    }

    #[test]
    fn test_exif_rotation_applies_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotated.jpg");
        let img = RgbaImage::from_pixel(12, 4, Rgba([90, 90, 90, 255]));
        std::fs::write(&path, with_exif_orientation(&jpeg_bytes(&img), 8)).unwrap();

        assert_eq!(load_image(&path).unwrap().dimensions(), (4, 12));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::ImageDecode { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.png");

        match load_image(&path) {
            Err(Error::ImageLoad { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        let img = RgbaImage::from_pixel(2, 2, Rgba([200, 100, 50, 255]));
        img.save(&path).unwrap();

        assert_eq!(load_image(&path).unwrap(), img);
    }
}
