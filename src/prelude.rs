//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use pixelcnn::prelude::*;
//! ```

pub use crate::data::{Dataset, FitOptions};
pub use crate::error::{PixelCnnError, Result};
pub use crate::nn::{pixel_sse_loss, PixelSSELoss};
pub use crate::pixelcnn::{CheckpointPolicy, Checkpointer, PixelCnn, PixelCnnConfig};
pub use crate::tensor::Tensor;
