//! Fully connected (linear) layer.
//!
//! Implements the transformation y = xW^T + b.
//!
//! # References
//!
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.

use super::conv::check_param_shape;
use super::init::{xavier_uniform, zeros};
use crate::error::{PixelCnnError, Result};
use crate::tensor::Tensor;

/// Fully connected layer: y = xW^T + b
///
/// Weight initialization follows Xavier/Glorot (Glorot & Bengio, 2010).
///
/// # Shape
///
/// - Input: `(N, in_features)`
/// - Output: `(N, out_features)`
#[derive(Clone)]
pub struct Linear {
    /// Weight matrix, shape: [out_features, in_features]
    weight: Tensor,

    /// Bias vector, shape: [out_features]
    bias: Tensor,

    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Create a Linear layer with a specific random seed.
    #[must_use]
    pub fn with_seed(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        let weight = xavier_uniform(
            &[out_features, in_features],
            in_features,
            out_features,
            seed,
        );

        Self {
            weight,
            bias: zeros(&[out_features]),
            in_features,
            out_features,
        }
    }

    /// Get the input feature dimension.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Get the output feature dimension.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Weight tensor.
    #[must_use]
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Bias tensor.
    #[must_use]
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Replace the weight; the shape must match the layer's.
    pub fn set_weight(&mut self, weight: Tensor) -> Result<()> {
        check_param_shape("weight", self.weight.shape(), weight.shape())?;
        self.weight = weight;
        Ok(())
    }

    /// Replace the bias; the shape must match the layer's.
    pub fn set_bias(&mut self, bias: Tensor) -> Result<()> {
        check_param_shape("bias", self.bias.shape(), bias.shape())?;
        self.bias = bias;
        Ok(())
    }

    /// Number of trainable scalars.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.weight.numel() + self.bias.numel()
    }

    /// Output shape `[out_features]` for an input shape `[in_features]`.
    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        if input != [self.in_features].as_slice() {
            return Err(PixelCnnError::shape_mismatch(
                "linear input",
                &[self.in_features],
                input,
            ));
        }
        Ok(vec![self.out_features])
    }

    /// Apply the layer to a `(N, in_features)` tensor.
    #[must_use]
    pub fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.ndim(),
            2,
            "Linear expects 2D input [N, in_features], got {:?}",
            input.shape()
        );
        let batch = input.shape()[0];
        assert_eq!(
            input.shape()[1],
            self.in_features,
            "Expected {} input features, got {}",
            self.in_features,
            input.shape()[1]
        );

        let x = input.data();
        let w = self.weight.data();
        let b = self.bias.data();
        let mut out = Vec::with_capacity(batch * self.out_features);

        for row in x.chunks_exact(self.in_features) {
            for (o, w_row) in w.chunks_exact(self.in_features).enumerate() {
                let dot: f32 = row.iter().zip(w_row).map(|(a, b)| a * b).sum();
                out.push(dot + b[o]);
            }
        }

        Tensor::from_vec(out, &[batch, self.out_features])
    }
}

impl std::fmt::Debug for Linear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_shapes() {
        let layer = Linear::with_seed(10, 6, Some(42));
        assert_eq!(layer.in_features(), 10);
        assert_eq!(layer.out_features(), 6);
        assert_eq!(layer.num_parameters(), 66);

        let y = layer.forward(&Tensor::ones(&[3, 10]));
        assert_eq!(y.shape(), &[3, 6]);
        assert_eq!(layer.output_shape(&[10]).unwrap(), vec![6]);
        assert!(layer.output_shape(&[9]).is_err());
    }

    #[test]
    fn test_linear_known_values() {
        let mut layer = Linear::with_seed(2, 2, Some(0));
        layer
            .set_weight(Tensor::new(&[1.0, 2.0, -1.0, 0.5], &[2, 2]))
            .unwrap();
        layer.set_bias(Tensor::new(&[0.0, 1.0], &[2])).unwrap();

        let y = layer.forward(&Tensor::new(&[1.0, 1.0, 2.0, 0.0], &[2, 2]));
        assert_eq!(y.data(), &[3.0, 0.5, 2.0, -1.0]);
    }
}
