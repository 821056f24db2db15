//! Style-transfer pipeline around a pluggable model.

mod onnx;
mod runs;
mod transfer;

pub use onnx::{OnnxStylizer, Stylizer};
pub use runs::{RunTicket, RunTracker};
pub use transfer::{parse_pad_color, Config, Pipeline, Preprocessed, StyledImage};
