//! # restyle
//!
//! Apply fast neural style-transfer models to photos and blend the result
//! with the original.
//!
//! The model sees a fixed-size square, so the source is letterboxed into it,
//! packed into a planar `[1, 3, H, W]` tensor of raw 0..=255 values, run
//! through the model, unpacked, cropped back to the content region, rescaled
//! to the source size, and finally blended with the original at a chosen
//! style strength.
//!
//! ## Example
//!
//! ```no_run
//! use restyle::{Config, Pipeline};
//!
//! # fn main() -> restyle::Result<()> {
//! let config = Config {
//!     strength: 0.8,
//!     ..Config::default()
//! };
//! let pipeline = Pipeline::new(config)?;
//!
//! let styled = pipeline.process("photo.jpg", "stylized.png")?;
//! let softer = styled.blend(0.3)?;
//! # let _ = softer;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;

pub use error::{Error, Result};
pub use pipeline::{Config, Pipeline, StyledImage, Stylizer};
