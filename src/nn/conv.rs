//! 2D convolution and zero padding over NHWC feature maps.
//!
//! Convolutions here are always stride 1 with `valid` padding: any padding a
//! caller needs is expressed as an explicit, possibly asymmetric,
//! [`ZeroPad2d`] in front of the convolution. That split is what lets the
//! masked convolutions shape their receptive fields.
//!
//! # References
//!
//! - `LeCun`, Y., et al. (1998). Gradient-based learning applied to document
//!   recognition. Proceedings of the IEEE.
//! - He, K., et al. (2015). Delving deep into rectifiers: Surpassing
//!   human-level performance on `ImageNet` classification. ICCV.

use serde::{Deserialize, Serialize};

use super::init::{kaiming_uniform, zeros};
use crate::error::{PixelCnnError, Result};
use crate::tensor::Tensor;

/// Explicit zero padding of the spatial axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZeroPad2d {
    /// Rows added above
    pub top: usize,
    /// Rows added below
    pub bottom: usize,
    /// Columns added on the left
    pub left: usize,
    /// Columns added on the right
    pub right: usize,
}

impl ZeroPad2d {
    /// Create a padding spec from `((top, bottom), (left, right))`.
    #[must_use]
    pub fn new((top, bottom): (usize, usize), (left, right): (usize, usize)) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// Output shape `[H, W, C]` for an input shape `[H, W, C]`.
    #[must_use]
    pub fn output_shape(&self, input: &[usize]) -> Vec<usize> {
        vec![
            input[0] + self.top + self.bottom,
            input[1] + self.left + self.right,
            input[2],
        ]
    }

    /// Apply the padding to an NHWC tensor.
    #[must_use]
    pub fn forward(&self, input: &Tensor) -> Tensor {
        input.pad_hw(self.top, self.bottom, self.left, self.right)
    }
}

/// 2D Convolution layer (stride 1, valid padding, NHWC).
///
/// # Shape
///
/// - Input: `(N, H, W, C_in)`
/// - Output: `(N, H - kernel_h + 1, W - kernel_w + 1, C_out)`
///
/// # Example
///
/// ```
/// use pixelcnn::nn::Conv2d;
/// use pixelcnn::tensor::Tensor;
///
/// let conv = Conv2d::with_seed(1, 4, (2, 3), Some(0));
/// let x = Tensor::zeros(&[2, 5, 5, 1]);
/// let y = conv.forward(&x);
/// assert_eq!(y.shape(), &[2, 4, 3, 4]);
/// ```
#[derive(Clone)]
pub struct Conv2d {
    /// Weight tensor, shape: [`out_channels`, `in_channels`, `kernel_h`, `kernel_w`]
    weight: Tensor,
    /// Bias tensor, shape: [`out_channels`]
    bias: Tensor,
    in_channels: usize,
    out_channels: usize,
    kernel_h: usize,
    kernel_w: usize,
}

impl Conv2d {
    /// Create a Conv2d layer with a specific random seed.
    ///
    /// Weights use Kaiming initialization, the bias starts at zero.
    #[must_use]
    pub fn with_seed(
        in_channels: usize,
        out_channels: usize,
        (kernel_h, kernel_w): (usize, usize),
        seed: Option<u64>,
    ) -> Self {
        let fan_in = in_channels * kernel_h * kernel_w;
        let weight = kaiming_uniform(
            &[out_channels, in_channels, kernel_h, kernel_w],
            fan_in,
            seed,
        );

        Self {
            weight,
            bias: zeros(&[out_channels]),
            in_channels,
            out_channels,
            kernel_h,
            kernel_w,
        }
    }

    /// Create a 1×1 convolution (a per-pixel channel projection).
    #[must_use]
    pub fn pointwise(in_channels: usize, out_channels: usize, seed: Option<u64>) -> Self {
        Self::with_seed(in_channels, out_channels, (1, 1), seed)
    }

    /// Number of input channels.
    #[must_use]
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Number of output channels.
    #[must_use]
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Kernel size as `(height, width)`.
    #[must_use]
    pub fn kernel_size(&self) -> (usize, usize) {
        (self.kernel_h, self.kernel_w)
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

    /// Output shape `[H, W, C]` for an input shape `[H, W, C]`.
    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        if input.len() != 3 || input[2] != self.in_channels {
            return Err(PixelCnnError::ShapeMismatch {
                context: "conv2d input".to_string(),
                expected: format!("[H, W, {}]", self.in_channels),
                actual: format!("{input:?}"),
            });
        }
        if input[0] < self.kernel_h || input[1] < self.kernel_w {
            return Err(PixelCnnError::ShapeMismatch {
                context: "conv2d input".to_string(),
                expected: format!("spatial size >= ({}, {})", self.kernel_h, self.kernel_w),
                actual: format!("{input:?}"),
            });
        }
        Ok(vec![
            input[0] - self.kernel_h + 1,
            input[1] - self.kernel_w + 1,
            self.out_channels,
        ])
    }

    /// Valid convolution over an NHWC tensor.
    #[must_use]
    pub fn forward(&self, input: &Tensor) -> Tensor {
        let (batch_size, in_h, in_w, in_channels) = input.dims4();

        assert_eq!(
            in_channels, self.in_channels,
            "Expected {} input channels, got {}",
            self.in_channels, in_channels
        );

        let out_h = in_h + 1 - self.kernel_h;
        let out_w = in_w + 1 - self.kernel_w;
        let mut output = Tensor::zeros(&[batch_size, out_h, out_w, self.out_channels]);

        let input_data = input.data();
        let weight_data = self.weight.data();
        let bias_data = self.bias.data();
        let k_area = self.kernel_h * self.kernel_w;

        for n in 0..batch_size {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    for oc in 0..self.out_channels {
                        let mut sum = bias_data[oc];

                        for kh in 0..self.kernel_h {
                            for kw in 0..self.kernel_w {
                                let base = input.offset4(n, oh + kh, ow + kw, 0);
                                for ic in 0..self.in_channels {
                                    let w_idx = (oc * self.in_channels + ic) * k_area
                                        + kh * self.kernel_w
                                        + kw;
                                    sum += input_data[base + ic] * weight_data[w_idx];
                                }
                            }
                        }

                        output.set4(n, oh, ow, oc, sum);
                    }
                }
            }
        }

        output
    }
}

impl std::fmt::Debug for Conv2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conv2d")
            .field("in_channels", &self.in_channels)
            .field("out_channels", &self.out_channels)
            .field("kernel_size", &(self.kernel_h, self.kernel_w))
            .finish_non_exhaustive()
    }
}

pub(crate) fn check_param_shape(name: &str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(PixelCnnError::shape_mismatch(name, expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv2d_output_shape() {
        let conv = Conv2d::with_seed(3, 8, (4, 7), Some(1));
        assert_eq!(conv.output_shape(&[11, 13, 3]).unwrap(), vec![8, 7, 8]);
        assert!(conv.output_shape(&[11, 13, 2]).is_err());
        assert!(conv.output_shape(&[3, 13, 3]).is_err());
    }

    #[test]
    fn test_conv2d_known_values() {
        // 1 in, 1 out, 2x2 all-ones kernel sums each window.
        let mut conv = Conv2d::with_seed(1, 1, (2, 2), Some(0));
        conv.set_weight(Tensor::ones(&[1, 1, 2, 2])).unwrap();
        conv.set_bias(Tensor::new(&[0.5], &[1])).unwrap();

        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0], &[1, 3, 3, 1]);
        let y = conv.forward(&x);
        assert_eq!(y.shape(), &[1, 2, 2, 1]);
        assert_eq!(y.data(), &[12.5, 16.5, 24.5, 28.5]);
    }

    #[test]
    fn test_pointwise_mixes_channels_only() {
        let mut conv = Conv2d::pointwise(2, 1, Some(0));
        conv.set_weight(Tensor::new(&[1.0, -1.0], &[1, 2, 1, 1])).unwrap();

        let x = Tensor::new(&[3.0, 1.0, 5.0, 2.0], &[1, 1, 2, 2]);
        let y = conv.forward(&x);
        assert_eq!(y.data(), &[2.0, 3.0]);
    }

    #[test]
    fn test_set_weight_rejects_wrong_shape() {
        let mut conv = Conv2d::pointwise(2, 3, Some(0));
        assert!(conv.set_weight(Tensor::zeros(&[3, 2, 3, 3])).is_err());
        assert!(conv.set_bias(Tensor::zeros(&[2])).is_err());
    }

    #[test]
    fn test_zero_pad_then_conv_preserves_size() {
        let pad = ZeroPad2d::new((1, 1), (1, 1));
        let conv = Conv2d::with_seed(1, 2, (3, 3), Some(9));
        let x = Tensor::ones(&[1, 4, 5, 1]);
        let y = conv.forward(&pad.forward(&x));
        assert_eq!(y.shape(), &[1, 4, 5, 2]);
        assert_eq!(pad.output_shape(&[4, 5, 1]), vec![6, 7, 1]);
    }
}
