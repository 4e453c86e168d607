//! Pixelcnn: causal (conditional) Gated PixelCNN graphs in pure Rust.
//!
//! The crate builds the feed-forward graph of a PixelCNN, an autoregressive
//! image model that predicts each pixel only from the pixels before it in
//! raster order, optionally conditioned on a latent vector. Causality comes
//! from padding and kernel shapes alone; no mask tensor is involved.
//!
//! # Quick Start
//!
//! ```
//! use pixelcnn::prelude::*;
//!
//! let config = PixelCnnConfig::new((8, 8))
//!     .with_channels(1)
//!     .with_filters(4)
//!     .with_layers(2)
//!     .with_seed(0);
//! let model = PixelCnn::build(config).unwrap();
//!
//! let images = Tensor::zeros(&[4, 8, 8, 1]);
//! let predicted = model.predict(&images, None, 2).unwrap();
//! let loss = pixel_sse_loss(&images, &predicted).unwrap();
//! assert_eq!(loss.shape(), &[4]);
//! ```
//!
//! # Modules
//!
//! - [`pixelcnn`]: Masked convolutions, activation units, graph builder and model
//! - [`tensor`]: NHWC `f32` tensors and the operations the graph executes
//! - [`nn`]: Convolution, padding and dense layers, initializers, loss
//! - [`serialization`]: SafeTensors weight files
//! - [`data`]: Fit options and batch iteration for an external training loop
//! - [`error`]: Error type shared by every module

pub mod data;
pub mod error;
pub mod nn;
pub mod pixelcnn;
pub mod prelude;
pub mod serialization;
pub mod tensor;

pub use error::{PixelCnnError, Result};
