//! Causal convolutions built from padding and kernel shape alone.
//!
//! For a `kh × kw` kernel:
//!
//! | stack      | mask | padding (top, bottom, left, right) | kernel            |
//! |------------|------|------------------------------------|-------------------|
//! | vertical   | B    | (kh/2, 0, kw/2, kw/2)              | (kh/2 + 1, kw)    |
//! | horizontal | B    | (0, 0, kw/2, 0)                    | (1, kw/2 + 1)     |
//! | horizontal | A    | (0, 0, kw/2, 0)                    | (1, kw/2)         |
//!
//! The mask A output is one column wider than its input; the activation unit
//! drops that column (crop-right) so output column `c` reads input columns
//! `c - kw/2 ..= c - 1`.

use tracing::debug;

use super::config::validate_kernel;
use super::graph::GraphBuilder;
use super::node::{MaskKind, NodeId, NodeRef, Op, Role, StackKind};
use crate::error::{PixelCnnError, Result};
use crate::nn::{Conv2d, ZeroPad2d};

/// Padding and kernel of one causal convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    /// Zero padding applied before the valid convolution
    pub padding: ZeroPad2d,
    /// Effective `(height, width)` of the convolution kernel
    pub kernel: (usize, usize),
}

impl ConvGeometry {
    /// Geometry for `stack` with a nominal `kernel` and `mask`.
    ///
    /// Vertical convolutions only exist as mask B: the current row is always
    /// included and the shift in the feed projector removes it later.
    pub fn new(stack: StackKind, kernel: (usize, usize), mask: MaskKind) -> Result<Self> {
        validate_kernel(kernel)?;
        let (kh, kw) = kernel;

        match (stack, mask) {
            (StackKind::Vertical, MaskKind::B) => Ok(Self {
                padding: ZeroPad2d::new((kh / 2, 0), (kw / 2, kw / 2)),
                kernel: (kh / 2 + 1, kw),
            }),
            (StackKind::Vertical, MaskKind::A) => Err(PixelCnnError::invalid_config(
                "mask",
                "A",
                "vertical convolutions use mask B",
            )),
            (StackKind::Horizontal, MaskKind::B) => Ok(Self {
                padding: ZeroPad2d::new((0, 0), (kw / 2, 0)),
                kernel: (1, kw / 2 + 1),
            }),
            (StackKind::Horizontal, MaskKind::A) => {
                if kw < 3 {
                    return Err(PixelCnnError::InvalidKernel {
                        height: kh,
                        width: kw,
                        reason: "mask A needs a width of at least 3".to_string(),
                    });
                }
                Ok(Self {
                    padding: ZeroPad2d::new((0, 0), (kw / 2, 0)),
                    kernel: (1, kw / 2),
                })
            }
        }
    }

    /// Whether the output carries one extra column that must be cropped.
    #[must_use]
    pub fn widens_output(&self) -> bool {
        self.padding.left + self.padding.right + 1 > self.kernel.1
    }
}

/// Appends causal (padding + valid convolution) pairs to a graph.
#[derive(Debug, Clone, Copy)]
pub struct MaskedConvolutionBuilder {
    out_channels: usize,
}

impl MaskedConvolutionBuilder {
    /// Builder producing maps with `out_channels` channels.
    #[must_use]
    pub fn new(out_channels: usize) -> Self {
        Self { out_channels }
    }

    /// Append the masked convolution for `stack` at `layer` and return its
    /// output node.
    pub fn build(
        &self,
        g: &mut GraphBuilder,
        input: NodeRef,
        stack: StackKind,
        kernel: (usize, usize),
        mask: MaskKind,
        layer: usize,
    ) -> Result<NodeRef> {
        let geometry = ConvGeometry::new(stack, kernel, mask)?;
        let in_channels = g.channels(input);

        let padded = g.push(
            NodeId::stack(stack, layer, Role::Pad),
            Op::Pad(geometry.padding),
            &[input],
        )?;
        let seed = g.next_seed();
        let conv = g.push(
            NodeId::stack(stack, layer, Role::Conv),
            Op::Conv(Conv2d::with_seed(in_channels, self.out_channels, geometry.kernel, seed)),
            &[padded],
        )?;

        debug!(
            layer,
            %stack,
            ?mask,
            kernel = ?geometry.kernel,
            shape = ?g.shape(conv),
            "masked convolution"
        );
        Ok(conv)
    }
}
