//! Custom error types for restyle.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the restyle library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Encoded image bytes could not be decoded.
    #[error("failed to decode image: {source}")]
    ImageDecode {
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to encode a raster into bytes.
    #[error("failed to encode image: {source}")]
    ImageEncode {
        #[source]
        source: image::ImageError,
    },

    /// Image dimensions are not supported.
    #[error("unsupported image dimensions {width}x{height}: {reason}")]
    UnsupportedDimensions {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A drawing surface of the requested size cannot be allocated.
    #[error("cannot allocate a {width}x{height} surface")]
    SurfaceUnavailable { width: u32, height: u32 },

    /// A crop rectangle does not fit inside the source raster.
    #[error(
        "crop rectangle {width}x{height} at ({x}, {y}) exceeds {source_width}x{source_height} raster"
    )]
    CropOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        source_width: u32,
        source_height: u32,
    },

    /// A letterbox placement is applied to a raster of another size.
    #[error("placement for a {target_size}x{target_size} canvas applied to a {width}x{height} raster")]
    PlacementMismatch {
        target_size: u32,
        width: u32,
        height: u32,
    },

    /// A model file is neither cached nor downloadable.
    #[error("model {name} not found at {path}")]
    ModelNotFound { name: String, path: PathBuf },

    /// Failed to download a model.
    #[error("failed to download model {name}: {source}")]
    ModelDownload {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// Failed to create cache directory.
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// The run was cancelled or superseded before its result was applied.
    #[error("run {run} was cancelled")]
    Cancelled { run: u64 },
}

/// Result type alias for restyle operations.
pub type Result<T> = std::result::Result<T, Error>;
