//! Causal (conditional) Gated PixelCNN.
//!
//! A PixelCNN predicts every pixel from the pixels before it in raster
//! order. Causality is enforced without any mask tensor: each convolution's
//! padding and kernel shape restrict its receptive field, and two stacks
//! cooperate to cover the full causal context.
//!
//! - The **vertical stack** sees the current row and every row above.
//! - The **horizontal stack** sees the current row up to the current column
//!   (mask B) or strictly before it (mask A, first layer only).
//! - The vertical map is shifted down one row before it is merged into the
//!   horizontal stack, so the current row never leaks through it.
//!
//! ```text
//!  image ─┬─ v masked conv ─ act ─┬──────────── v masked conv ─ ...
//!         │                       └ shift ─ 1×1 ┐
//!         └─ h masked conv (A) ─ crop ─────────(+)─ act ─ 1×1 ─┬─ h masked conv (B) ─ ... (+)
//!                                                              └──────── residual ────────┘
//! ```
//!
//! After `nb_pixelcnn_layers` layers, two 1×1 ReLU convolutions and a final
//! 1×1 projection map the horizontal stack to per-pixel predictions.
//!
//! # Example
//!
//! ```
//! use pixelcnn::pixelcnn::{PixelCnn, PixelCnnConfig};
//! use pixelcnn::tensor::Tensor;
//!
//! let config = PixelCnnConfig::new((8, 8))
//!     .with_channels(1)
//!     .with_filters(4)
//!     .with_layers(2)
//!     .with_latent(3)
//!     .with_seed(1);
//! let model = PixelCnn::build(config).unwrap();
//!
//! let images = Tensor::zeros(&[2, 8, 8, 1]);
//! let latents = Tensor::ones(&[2, 3]);
//! let y = model.predict(&images, Some(&latents), 1).unwrap();
//! assert_eq!(y.shape(), &[2, 8, 8, 1]);
//! ```
//!
//! # References
//!
//! - van den Oord, A., et al. (2016). Conditional Image Generation with
//!   `PixelCNN` Decoders. NeurIPS.
//! - van den Oord, A., Kalchbrenner, N., & Kavukcuoglu, K. (2016). Pixel
//!   Recurrent Neural Networks. ICML.

mod activation;
mod builder;
mod checkpoint;
mod conditioning;
mod config;
mod feed;
mod graph;
mod masked_conv;
mod model;
mod node;
mod residual;

pub use activation::{ActivationPolicy, ActivationUnit};
pub use builder::{PixelCnnGraphBuilder, HEAD_LAYERS};
pub use checkpoint::{CheckpointPolicy, Checkpointer};
pub use conditioning::LatentConditioner;
pub use config::{validate_kernel, PixelCnnConfig};
pub use feed::VerticalFeedProjector;
pub use graph::{Graph, GraphBuilder};
pub use masked_conv::{ConvGeometry, MaskedConvolutionBuilder};
pub use model::{GraphDescription, NodeDescription, PixelCnn, JSON_EXPORT_FILE, YAML_EXPORT_FILE};
pub use node::{MaskKind, Node, NodeId, NodeRef, Op, OpSpec, Role, Scope, StackKind};
pub use residual::ResidualAggregator;
