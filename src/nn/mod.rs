//! Primitive layers the PixelCNN graph is assembled from.
//!
//! - **Layers**: [`Conv2d`] (NHWC, stride 1, valid), [`ZeroPad2d`], [`Linear`]
//! - **Initialization**: [`init`] (Xavier, Kaiming, zeros)
//! - **Loss**: [`loss::PixelSSELoss`]
//!
//! # References
//!
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.
//! - He, K., et al. (2015). Delving deep into rectifiers. ICCV.

mod conv;
pub mod init;
mod linear;
pub mod loss;

pub use conv::{Conv2d, ZeroPad2d};
pub use linear::Linear;
pub use loss::{pixel_sse_loss, PixelSSELoss, Reduction};
