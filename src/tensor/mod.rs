//! Dense `f32` tensors in row-major order.
//!
//! Feature maps are rank-4 tensors laid out as `(batch, height, width,
//! channels)`; latent vectors are rank-2 `(batch, latent_dim)`. Tensors are
//! values: every operation in [`ops`] returns a fresh tensor and leaves its
//! operands untouched.

mod ops;

use std::fmt;

use crate::error::{PixelCnnError, Result};

/// A dense tensor with an owned data buffer.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    /// Underlying data storage (row-major)
    data: Vec<f32>,

    /// Shape of the tensor
    shape: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor from a slice with the given shape.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of shape dimensions.
    #[must_use]
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        Self::from_vec(data.to_vec(), shape)
    }

    /// Create a tensor from a 1D slice (vector).
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self::new(data, &[data.len()])
    }

    /// Create a tensor taking ownership of `data`.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of shape dimensions.
    #[must_use]
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Self {
        let expected_len: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_len,
            "Data length {} doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_len
        );

        Self {
            data,
            shape: shape.to_vec(),
        }
    }

    /// Fallible constructor for data coming from outside the crate.
    pub fn try_new(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected_len = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                PixelCnnError::InvalidInput(format!("shape {shape:?} overflows usize"))
            })?;
        if data.len() != expected_len {
            return Err(PixelCnnError::InvalidInput(format!(
                "data length {} doesn't match shape {shape:?} (expected {expected_len})",
                data.len()
            )));
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
        })
    }

    /// Create a tensor filled with zeros.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self::from_vec(vec![0.0; len], shape)
    }

    /// Create a tensor filled with ones.
    #[must_use]
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// Create a tensor filled with `value`.
    #[must_use]
    pub fn full(shape: &[usize], value: f32) -> Self {
        let len: usize = shape.iter().product();
        Self::from_vec(vec![value; len], shape)
    }

    /// Get the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Get the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get a reference to the underlying data.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get a mutable reference to the underlying data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Size of the leading (batch) axis, 0 for scalars.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Flat offset of `(n, h, w, c)` in a rank-4 NHWC tensor.
    #[must_use]
    pub fn offset4(&self, n: usize, h: usize, w: usize, c: usize) -> usize {
        let (_, height, width, channels) = self.dims4();
        ((n * height + h) * width + w) * channels + c
    }

    /// Read element `(n, h, w, c)` of a rank-4 NHWC tensor.
    #[must_use]
    pub fn at4(&self, n: usize, h: usize, w: usize, c: usize) -> f32 {
        self.data[self.offset4(n, h, w, c)]
    }

    /// Write element `(n, h, w, c)` of a rank-4 NHWC tensor.
    pub fn set4(&mut self, n: usize, h: usize, w: usize, c: usize, value: f32) {
        let idx = self.offset4(n, h, w, c);
        self.data[idx] = value;
    }

    /// Dimensions of a rank-4 tensor as `(batch, height, width, channels)`.
    ///
    /// # Panics
    ///
    /// Panics if the tensor is not rank 4.
    #[must_use]
    pub fn dims4(&self) -> (usize, usize, usize, usize) {
        assert_eq!(self.ndim(), 4, "expected NHWC tensor, got shape {:?}", self.shape);
        (self.shape[0], self.shape[1], self.shape[2], self.shape[3])
    }

    /// Maximum absolute elementwise difference to `other`.
    #[must_use]
    pub fn max_abs_diff(&self, other: &Tensor) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("numel", &self.numel())
            .finish_non_exhaustive()
    }
}
