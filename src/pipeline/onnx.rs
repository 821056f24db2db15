//! Model execution: the [`Stylizer`] seam and its ONNX Runtime implementation.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use ndarray::Array4;
use once_cell::sync::Lazy;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::image::ImageTensor;
use crate::model::{load_session, SessionCache};

/// Sessions shared by every pipeline in the process, keyed by model path.
static SESSIONS: Lazy<SessionCache<Mutex<Session>>> = Lazy::new(SessionCache::new);

/// A resolution-preserving image transform.
///
/// Takes a `[1, 3, H, W]` tensor of raw 0..=255 values and returns a tensor
/// of the same shape.
pub trait Stylizer: Send + Sync {
    /// Run the model on `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn stylize(&self, input: &ImageTensor) -> Result<ImageTensor>;
}

impl<F> Stylizer for F
where
    F: Fn(&ImageTensor) -> Result<ImageTensor> + Send + Sync,
{
    fn stylize(&self, input: &ImageTensor) -> Result<ImageTensor> {
        self(input)
    }
}

/// Fast neural style model executed with ONNX Runtime.
pub struct OnnxStylizer {
    name: String,
    session: Arc<Mutex<Session>>,
}

impl OnnxStylizer {
    /// Get the stylizer for the model at `path`.
    ///
    /// The session is created once per path and shared afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn from_path(path: &Path) -> Result<Self> {
        let key = path.to_string_lossy();
        let session = SESSIONS.get_or_try_init(&key, || load_session(path).map(Mutex::new))?;

        Ok(Self {
            name: key.into_owned(),
            session,
        })
    }

    /// Model path this stylizer was created from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Stylizer for OnnxStylizer {
    fn stylize(&self, input: &ImageTensor) -> Result<ImageTensor> {
        let input_value =
            Tensor::from_array(input.clone()).map_err(|source| Error::Inference { source })?;

        // `Session::run` needs exclusive access; runs on the same model queue here.
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|source| Error::Inference { source })?;

        // Get first output
        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "stylized image output".to_string(),
                actual: "no output".to_string(),
            })?;

        extract_array4(&output)
    }
}

/// Extract a 4D array from an ONNX value.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn extract_array4(value: &ort::value::ValueRef<'_>) -> Result<Array4<f32>> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative and within bounds
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    if dims.len() != 4 {
        return Err(Error::ShapeMismatch {
            expected: "4D tensor".to_string(),
            actual: format!("{}D tensor", dims.len()),
        });
    }

    Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), data.to_vec()).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}
