//! Main style-transfer pipeline.

use std::path::{Path, PathBuf};

use ::image::{Rgb, RgbaImage};

use crate::error::{Error, Result};
use crate::image::{
    self, ImageTensor, LetterboxPlacement, OutputEncoding, ResampleFilter, DEFAULT_TARGET_SIZE,
};
use crate::model::{ModelCache, StyleModel};

use super::onnx::{OnnxStylizer, Stylizer};
use super::runs::{RunTicket, RunTracker};

/// Configuration for the style-transfer pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Style whose model is resolved through the model cache.
    pub style: StyleModel,

    /// Explicit model file. Overrides `style` when set.
    pub model_path: Option<PathBuf>,

    /// Model cache directory. None for the platform cache directory.
    pub model_dir: Option<PathBuf>,

    /// Base URL to download missing style models from.
    pub model_base_url: Option<String>,

    /// Side of the square canvas fed to the model.
    pub target_size: u32,

    /// Color of the letterbox padding.
    pub pad_color: Rgb<u8>,

    /// Style strength (0.0-1.0). 0 keeps the original, 1 is fully stylized.
    pub strength: f32,

    /// Interpolation used for every resize.
    pub filter: ResampleFilter,

    /// JPEG quality (1-100) for stylized-only exports and previews.
    pub intermediate_quality: u8,

    /// JPEG quality (1-100) for the final image when saved as JPEG.
    pub output_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            style: StyleModel::VanGogh,
            model_path: None,
            model_dir: None,
            model_base_url: None,
            target_size: DEFAULT_TARGET_SIZE,
            pad_color: Rgb([0, 0, 0]),
            strength: 1.0,
            filter: ResampleFilter::default(),
            intermediate_quality: 90,
            output_quality: image::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(Error::InvalidParameter {
                name: "strength".to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }

        if self.target_size == 0 {
            return Err(Error::InvalidParameter {
                name: "target_size".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        for (name, quality) in [
            ("intermediate_quality", self.intermediate_quality),
            ("output_quality", self.output_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(Error::InvalidParameter {
                    name: name.to_string(),
                    reason: "must be between 1 and 100".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Encoding for stylized-only exports and previews.
    #[must_use]
    pub const fn intermediate_encoding(&self) -> OutputEncoding {
        OutputEncoding::Jpeg {
            quality: self.intermediate_quality,
        }
    }
}

/// Parse a `#rgb` or `#rrggbb` color; the `#` is optional.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for anything else.
pub fn parse_pad_color(value: &str) -> Result<Rgb<u8>> {
    let invalid = || Error::InvalidParameter {
        name: "pad_color".to_string(),
        reason: format!("expected #rgb or #rrggbb, got {value:?}"),
    };

    let hex = value.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, slot) in rgb.iter_mut().enumerate() {
                let nibble = channel(&hex[i..=i])?;
                *slot = nibble * 17;
            }
            Ok(Rgb(rgb))
        }
        6 => Ok(Rgb([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ])),
        _ => Err(invalid()),
    }
}

/// A letterboxed source ready for inference.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// The padded square canvas.
    pub canvas: RgbaImage,
    /// Where the source content sits in `canvas`.
    pub placement: LetterboxPlacement,
    /// `canvas` packed as a `[1, 3, size, size]` tensor.
    pub tensor: ImageTensor,
    /// Source width before letterboxing.
    pub original_width: u32,
    /// Source height before letterboxing.
    pub original_height: u32,
}

/// Result of one run: original and stylized rasters at the source size.
#[derive(Debug, Clone)]
pub struct StyledImage {
    original: RgbaImage,
    stylized: RgbaImage,
    filter: ResampleFilter,
}

impl StyledImage {
    /// The source image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// The fully stylized image.
    #[must_use]
    pub const fn stylized(&self) -> &RgbaImage {
        &self.stylized
    }

    /// Blend original and stylized output at `strength`.
    ///
    /// Re-blending does not rerun the model.
    ///
    /// # Errors
    ///
    /// Returns an error if `strength` is outside `[0, 1]`.
    pub fn blend(&self, strength: f32) -> Result<RgbaImage> {
        image::blend(&self.original, &self.stylized, strength, self.filter)
    }

    /// The image at full strength.
    #[must_use]
    pub fn reset(&self) -> RgbaImage {
        self.stylized.clone()
    }
}

/// Style-transfer pipeline: letterbox, pack, stylize, unpack, crop, rescale, blend.
pub struct Pipeline<S = OnnxStylizer> {
    config: Config,
    stylizer: S,
    runs: RunTracker,
}

impl Pipeline<OnnxStylizer> {
    /// Create a pipeline backed by the configured ONNX style model.
    ///
    /// This will download the model if it is not cached and a base URL is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the model cannot
    /// be loaded.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tracing::info!("Initializing pipeline with config: {config:?}");

        let model_path = match &config.model_path {
            Some(path) => path.clone(),
            None => {
                let cache = ModelCache::new(config.model_dir.clone(), config.model_base_url.clone())?;
                cache.model_path(config.style)?
            }
        };

        let stylizer = OnnxStylizer::from_path(&model_path)?;
        tracing::info!("Pipeline initialized with model {}", stylizer.name());

        Self::with_stylizer(config, stylizer)
    }
}

impl<S: Stylizer> Pipeline<S> {
    /// Create a pipeline around any [`Stylizer`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_stylizer(config: Config, stylizer: S) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            stylizer,
            runs: RunTracker::new(),
        })
    }

    /// The pipeline configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Letterbox `source` and pack it for the model.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty source or an unallocatable canvas.
    pub fn preprocess(&self, source: &RgbaImage) -> Result<Preprocessed> {
        let (original_width, original_height) = source.dimensions();
        let (canvas, placement) = image::letterbox(
            source,
            self.config.target_size,
            self.config.pad_color,
            self.config.filter,
        )?;
        let tensor = image::pack(&canvas);

        tracing::debug!(
            original_width,
            original_height,
            tensor_len = tensor.len(),
            "image preprocessed"
        );

        Ok(Preprocessed {
            canvas,
            placement,
            tensor,
            original_width,
            original_height,
        })
    }

    /// Turn the model output back into an image at the source size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the model changed the spatial size,
    /// or a geometry error from cropping/scaling.
    pub fn postprocess(&self, output: &ImageTensor, pre: &Preprocessed) -> Result<RgbaImage> {
        let raster = image::unpack(output)?;
        if raster.dimensions() != pre.canvas.dimensions() {
            return Err(Error::ShapeMismatch {
                expected: format!("{:?}", pre.tensor.shape()),
                actual: format!("{:?}", output.shape()),
            });
        }

        let content = image::crop(&raster, &pre.placement)?;
        image::scale(
            &content,
            pre.original_width,
            pre.original_height,
            self.config.filter,
        )
    }

    /// Stylize `source`. Other runs in flight are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails, or [`Error::Cancelled`] if
    /// [`Pipeline::cancel`] was called while the run was in flight.
    pub fn stylize(&self, source: &RgbaImage) -> Result<StyledImage> {
        self.run(source, self.runs.begin())
    }

    /// Stylize `source`, superseding every run started before this one.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::stylize`].
    pub fn stylize_latest(&self, source: &RgbaImage) -> Result<StyledImage> {
        self.run(source, self.runs.begin_exclusive())
    }

    /// Decode and stylize encoded image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageDecode`] for undecodable bytes, otherwise as
    /// [`Pipeline::stylize`].
    pub fn stylize_bytes(&self, bytes: &[u8]) -> Result<StyledImage> {
        let source = image::decode_image(bytes)?;
        self.stylize(&source)
    }

    /// Stylize the image at `input_path` and save the blend at the configured
    /// strength to `output_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, processing, or saving fails.
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<StyledImage> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        tracing::info!("Processing image: {}", input_path.display());
        let source = image::load_image(input_path)?;

        let styled = self.stylize(&source)?;
        let blended = styled.blend(self.config.strength)?;

        tracing::info!("Saving output to: {}", output_path.display());
        image::save_image(
            &blended,
            output_path,
            Some(OutputEncoding::for_path(output_path, self.config.output_quality)),
        )?;

        tracing::info!("Processing complete");
        Ok(styled)
    }

    /// Save the pure stylized image, JPEG paths at the intermediate quality.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_stylized<P: AsRef<Path>>(&self, styled: &StyledImage, path: P) -> Result<()> {
        let path = path.as_ref();
        image::save_image(
            styled.stylized(),
            path,
            Some(OutputEncoding::for_path(path, self.config.intermediate_quality)),
        )
    }

    /// Rescale encoded preview bytes for display, keeping `bytes` on failure.
    #[must_use]
    pub fn preview(&self, bytes: &[u8], width: u32, height: u32) -> Vec<u8> {
        image::rescale_encoded(
            bytes,
            width,
            height,
            self.config.filter,
            self.config.intermediate_encoding(),
        )
    }

    /// Discard the results of every run currently in flight.
    pub fn cancel(&self) {
        self.runs.cancel_all();
    }

    fn run(&self, source: &RgbaImage, ticket: RunTicket) -> Result<StyledImage> {
        let pre = self.preprocess(source)?;
        self.runs.ensure_live(ticket)?;

        tracing::info!(run = ticket.id(), "Running inference...");
        let output = self
            .stylizer
            .stylize(&pre.tensor)
            .inspect_err(|err| tracing::error!(run = ticket.id(), "inference failed: {err}"))?;

        // A late result of a cancelled run must not be applied.
        self.runs.ensure_live(ticket)?;

        let stylized = self.postprocess(&output, &pre)?;
        self.runs.ensure_live(ticket)?;

        tracing::info!(
            run = ticket.id(),
            width = pre.original_width,
            height = pre.original_height,
            "Style transfer complete"
        );

        Ok(StyledImage {
            original: source.clone(),
            stylized,
            filter: self.config.filter,
        })
    }
}
