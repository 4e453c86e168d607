//! Loss functions for training pixel-prediction models.
//!
//! The training loop itself lives outside this crate; it receives a built
//! graph together with one of these loss functions.

use crate::error::{PixelCnnError, Result};
use crate::tensor::Tensor;

/// Reduction applied over the batch axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// One loss value per example
    #[default]
    None,
    /// Mean over examples
    Mean,
    /// Sum over examples
    Sum,
}

/// Scaled per-example sum of squared pixel errors.
///
/// Computes, for each example, `scale * Σ (target - pred)²` over the
/// flattened `H × W × C` values. The reference scale is 10.
///
/// # Example
///
/// ```
/// use pixelcnn::nn::loss::PixelSSELoss;
/// use pixelcnn::tensor::Tensor;
///
/// let target = Tensor::zeros(&[2, 2, 2, 1]);
/// let pred = Tensor::ones(&[2, 2, 2, 1]);
/// let loss = PixelSSELoss::new().forward(&pred, &target).unwrap();
/// assert_eq!(loss.data(), &[40.0, 40.0]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PixelSSELoss {
    scale: f32,
    reduction: Reduction,
}

impl Default for PixelSSELoss {
    fn default() -> Self {
        Self {
            scale: 10.0,
            reduction: Reduction::None,
        }
    }
}

impl PixelSSELoss {
    /// Create the reference loss (scale 10, per-example output).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the scale factor.
    #[must_use]
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Override the batch reduction.
    #[must_use]
    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    /// Compute the loss between predictions and targets.
    ///
    /// Returns shape `(batch,)` for [`Reduction::None`], a one-element tensor
    /// otherwise.
    pub fn forward(&self, pred: &Tensor, target: &Tensor) -> Result<Tensor> {
        if pred.shape() != target.shape() {
            return Err(PixelCnnError::shape_mismatch(
                "loss target",
                pred.shape(),
                target.shape(),
            ));
        }
        let batch = pred.batch_size();
        if batch == 0 {
            return Err(PixelCnnError::InvalidInput("empty batch".to_string()));
        }

        let diff = pred.sub(target);
        let per_example: Vec<f32> = diff
            .data()
            .chunks_exact(diff.numel() / batch)
            .map(|chunk| self.scale * chunk.iter().map(|d| d * d).sum::<f32>())
            .collect();

        Ok(match self.reduction {
            Reduction::None => Tensor::from_vec(per_example, &[batch]),
            Reduction::Mean => {
                Tensor::from_slice(&[per_example.iter().sum::<f32>() / batch as f32])
            }
            Reduction::Sum => Tensor::from_slice(&[per_example.iter().sum::<f32>()]),
        })
    }
}

/// Reference PixelCNN loss: `10 × Σ (y − ŷ)²` per example.
///
/// Argument order follows the training convention `(target, prediction)`.
pub fn pixel_sse_loss(target: &Tensor, prediction: &Tensor) -> Result<Tensor> {
    PixelSSELoss::new().forward(prediction, target)
}
