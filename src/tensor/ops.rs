//! Tensor operations used by the graph executor.
//!
//! Shapes are validated when the graph is built, so these kernels only
//! assert their preconditions.

use super::Tensor;

// ============================================================================
// Element-wise Operations
// ============================================================================

impl Tensor {
    /// Element-wise addition: z = self + other
    #[must_use]
    pub fn add(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, "add", |a, b| a + b)
    }

    /// Element-wise subtraction: z = self - other
    #[must_use]
    pub fn sub(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, "sub", |a, b| a - b)
    }

    /// Element-wise multiplication: z = self * other
    #[must_use]
    pub fn mul(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, "mul", |a, b| a * b)
    }

    /// Multiply every element by a scalar.
    #[must_use]
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        self.map(|x| x * scalar)
    }

    /// ReLU activation: max(0, x)
    #[must_use]
    pub fn relu(&self) -> Tensor {
        self.map(|x| x.max(0.0))
    }

    /// Sigmoid activation: σ(x) = 1 / (1 + exp(-x))
    #[must_use]
    pub fn sigmoid(&self) -> Tensor {
        self.map(|x| 1.0 / (1.0 + (-x).exp()))
    }

    /// Tanh activation.
    #[must_use]
    pub fn tanh(&self) -> Tensor {
        self.map(f32::tanh)
    }

    /// Sum of all elements.
    #[must_use]
    pub fn sum(&self) -> f32 {
        self.data().iter().sum()
    }

    fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        let data: Vec<f32> = self.data().iter().map(|&x| f(x)).collect();
        Tensor::from_vec(data, self.shape())
    }

    fn zip_with(&self, other: &Tensor, op: &str, f: impl Fn(f32, f32) -> f32) -> Tensor {
        assert_eq!(
            self.shape(),
            other.shape(),
            "{op}: shape mismatch {:?} vs {:?}",
            self.shape(),
            other.shape()
        );
        let data: Vec<f32> = self
            .data()
            .iter()
            .zip(other.data().iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        Tensor::from_vec(data, self.shape())
    }
}

// ============================================================================
// Spatial Operations (NHWC)
// ============================================================================

impl Tensor {
    /// Zero-pad the spatial axes with independent amounts on each side.
    #[must_use]
    pub fn pad_hw(&self, top: usize, bottom: usize, left: usize, right: usize) -> Tensor {
        let (batch, height, width, channels) = self.dims4();
        let out_h = height + top + bottom;
        let out_w = width + left + right;
        let mut out = Tensor::zeros(&[batch, out_h, out_w, channels]);

        for n in 0..batch {
            for h in 0..height {
                let src = self.offset4(n, h, 0, 0);
                let dst = out.offset4(n, h + top, left, 0);
                let row = width * channels;
                out.data_mut()[dst..dst + row].copy_from_slice(&self.data()[src..src + row]);
            }
        }
        out
    }

    /// Keep columns `[start, end)` of the width axis.
    #[must_use]
    pub fn slice_width(&self, start: usize, end: usize) -> Tensor {
        let (batch, height, width, channels) = self.dims4();
        assert!(
            start <= end && end <= width,
            "slice_width: [{start}, {end}) out of range for width {width}"
        );
        let out_w = end - start;
        let mut data = Vec::with_capacity(batch * height * out_w * channels);
        for n in 0..batch {
            for h in 0..height {
                let src = self.offset4(n, h, start, 0);
                data.extend_from_slice(&self.data()[src..src + out_w * channels]);
            }
        }
        Tensor::from_vec(data, &[batch, height, out_w, channels])
    }

    /// Keep rows `[start, end)` of the height axis.
    #[must_use]
    pub fn slice_height(&self, start: usize, end: usize) -> Tensor {
        let (batch, height, width, channels) = self.dims4();
        assert!(
            start <= end && end <= height,
            "slice_height: [{start}, {end}) out of range for height {height}"
        );
        let out_h = end - start;
        let plane = width * channels;
        let mut data = Vec::with_capacity(batch * out_h * plane);
        for n in 0..batch {
            let src = self.offset4(n, start, 0, 0);
            data.extend_from_slice(&self.data()[src..src + out_h * plane]);
        }
        Tensor::from_vec(data, &[batch, out_h, width, channels])
    }

    /// Drop the last column.
    #[must_use]
    pub fn crop_right(&self) -> Tensor {
        let (_, _, width, _) = self.dims4();
        assert!(width > 0, "crop_right on empty width");
        self.slice_width(0, width - 1)
    }

    /// Shift down by one row: a zero row enters at the top, the last row
    /// falls off, height is preserved.
    #[must_use]
    pub fn shift_down(&self) -> Tensor {
        let (_, height, _, _) = self.dims4();
        self.pad_hw(1, 0, 0, 0).slice_height(0, height)
    }

    /// Keep channels `[start, end)`.
    #[must_use]
    pub fn slice_channels(&self, start: usize, end: usize) -> Tensor {
        let (batch, height, width, channels) = self.dims4();
        assert!(
            start <= end && end <= channels,
            "slice_channels: [{start}, {end}) out of range for {channels} channels"
        );
        let out_c = end - start;
        let mut data = Vec::with_capacity(batch * height * width * out_c);
        for pixel in self.data().chunks_exact(channels) {
            data.extend_from_slice(&pixel[start..end]);
        }
        Tensor::from_vec(data, &[batch, height, width, out_c])
    }

    /// Add a `(batch, C)` tensor to every spatial position of a
    /// `(batch, H, W, C)` map.
    #[must_use]
    pub fn broadcast_add_channels(&self, bias: &Tensor) -> Tensor {
        let (batch, height, width, channels) = self.dims4();
        assert_eq!(
            bias.shape(),
            &[batch, channels],
            "broadcast_add_channels: expected [{batch}, {channels}], got {:?}",
            bias.shape()
        );
        let mut out = self.clone();
        let plane = height * width * channels;
        for n in 0..batch {
            let row = &bias.data()[n * channels..(n + 1) * channels];
            for pixel in out.data_mut()[n * plane..(n + 1) * plane].chunks_exact_mut(channels) {
                for (v, b) in pixel.iter_mut().zip(row) {
                    *v += b;
                }
            }
        }
        out
    }
}

// ============================================================================
// Batch-axis Operations
// ============================================================================

impl Tensor {
    /// Items `[start, end)` of the leading axis.
    #[must_use]
    pub fn slice_batch(&self, start: usize, end: usize) -> Tensor {
        let batch = self.batch_size();
        assert!(
            start <= end && end <= batch,
            "slice_batch: [{start}, {end}) out of range for batch {batch}"
        );
        let item: usize = self.shape()[1..].iter().product();
        let mut shape = self.shape().to_vec();
        shape[0] = end - start;
        Tensor::new(&self.data()[start * item..end * item], &shape)
    }

    /// Gather items of the leading axis in the given order.
    #[must_use]
    pub fn select_batch(&self, indices: &[usize]) -> Tensor {
        let item: usize = self.shape()[1..].iter().product();
        let mut data = Vec::with_capacity(indices.len() * item);
        for &i in indices {
            data.extend_from_slice(&self.data()[i * item..(i + 1) * item]);
        }
        let mut shape = self.shape().to_vec();
        shape[0] = indices.len();
        Tensor::from_vec(data, &shape)
    }

    /// Concatenate tensors along the leading axis.
    ///
    /// # Panics
    ///
    /// Panics if `parts` is empty or trailing shapes differ.
    #[must_use]
    pub fn concat_batch(parts: &[Tensor]) -> Tensor {
        assert!(!parts.is_empty(), "concat_batch: no tensors");
        let tail = &parts[0].shape()[1..];
        let mut data = Vec::new();
        let mut batch = 0;
        for part in parts {
            assert_eq!(&part.shape()[1..], tail, "concat_batch: trailing shape mismatch");
            data.extend_from_slice(part.data());
            batch += part.batch_size();
        }
        let mut shape = parts[0].shape().to_vec();
        shape[0] = batch;
        Tensor::from_vec(data, &shape)
    }
}
