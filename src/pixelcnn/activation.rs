//! Activation units of the two stacks.
//!
//! One [`ActivationUnit`] covers both the gated (`tanh(write) ⊙ σ(gate)`)
//! and the plain ReLU variant; [`ActivationPolicy`] picks between them.
//! Optional merges happen before the nonlinearity, in this order:
//!
//! 1. crop-right (mask A only)
//! 2. vertical feed, elementwise
//! 3. latent projection, broadcast over every pixel

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::conditioning::LatentConditioner;
use super::graph::GraphBuilder;
use super::node::{NodeId, NodeRef, Op, Role, StackKind};
use crate::error::{PixelCnnError, Result};

/// Nonlinearity applied by every activation unit of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationPolicy {
    /// `tanh` of the first channel half times `sigmoid` of the second half
    Gated,
    /// Plain ReLU
    Relu,
}

impl ActivationPolicy {
    /// Channel count the unit expects on its pre-activation map.
    #[must_use]
    pub fn pre_activation_channels(self, nb_filters: usize) -> usize {
        match self {
            ActivationPolicy::Gated => 2 * nb_filters,
            ActivationPolicy::Relu => nb_filters,
        }
    }
}

/// Activation unit of one stack.
#[derive(Debug, Clone, Copy)]
pub struct ActivationUnit {
    policy: ActivationPolicy,
    nb_filters: usize,
    stack: StackKind,
}

impl ActivationUnit {
    #[must_use]
    pub fn new(policy: ActivationPolicy, nb_filters: usize, stack: StackKind) -> Self {
        Self {
            policy,
            nb_filters,
            stack,
        }
    }

    /// Append the unit for `layer` on top of `pre` and return its output,
    /// which always has `nb_filters` channels.
    ///
    /// `feed` must match the (cropped) pre-activation shape exactly.
    pub fn build(
        &self,
        g: &mut GraphBuilder,
        pre: NodeRef,
        layer: usize,
        feed: Option<NodeRef>,
        latent: Option<NodeRef>,
        crop_right: bool,
    ) -> Result<NodeRef> {
        let id = |role| NodeId::stack(self.stack, layer, role);

        let mut x = if crop_right {
            g.push(id(Role::CropRight), Op::CropRight, &[pre])?
        } else {
            pre
        };

        let expected = self.policy.pre_activation_channels(self.nb_filters);
        if g.channels(x) != expected {
            return Err(PixelCnnError::ShapeMismatch {
                context: format!("{} activation {layer}", self.stack),
                expected: format!("{expected} channels"),
                actual: format!("{:?}", g.shape(x)),
            });
        }

        if let Some(feed) = feed {
            x = g.push(id(Role::MergeFeed), Op::Add, &[x, feed])?;
        }
        if let Some(latent) = latent {
            x = LatentConditioner::new(expected).build(g, x, latent, self.stack, layer)?;
        }

        let out = match self.policy {
            ActivationPolicy::Gated => {
                let n = self.nb_filters;
                let write = g.push(
                    id(Role::Write),
                    Op::ChannelSlice { start: 0, end: n },
                    &[x],
                )?;
                let gate = g.push(
                    id(Role::Gate),
                    Op::ChannelSlice { start: n, end: 2 * n },
                    &[x],
                )?;
                let write = g.push(id(Role::Tanh), Op::Tanh, &[write])?;
                let gate = g.push(id(Role::Sigmoid), Op::Sigmoid, &[gate])?;
                g.push(id(Role::MergeGate), Op::Mul, &[write, gate])?
            }
            ActivationPolicy::Relu => g.push(id(Role::Relu), Op::Relu, &[x])?,
        };

        trace!(layer, stack = %self.stack, policy = ?self.policy, "activation unit");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixelcnn::node::Scope;
    use crate::tensor::Tensor;

    fn image(g: &mut GraphBuilder, shape: &[usize]) -> NodeRef {
        g.input(NodeId::new(Scope::Input, 0, Role::Image), shape).unwrap()
    }

    #[test]
    fn test_pre_activation_channels() {
        assert_eq!(ActivationPolicy::Gated.pre_activation_channels(16), 32);
        assert_eq!(ActivationPolicy::Relu.pre_activation_channels(16), 16);
    }

    #[test]
    fn test_gated_halves_channels() {
        let mut g = GraphBuilder::new(Some(0));
        let x = image(&mut g, &[3, 3, 8]);
        let unit = ActivationUnit::new(ActivationPolicy::Gated, 4, StackKind::Vertical);
        let out = unit.build(&mut g, x, 0, None, None, false).unwrap();
        assert_eq!(g.shape(out), &[3, 3, 4]);
    }

    #[test]
    fn test_gated_value() {
        let mut g = GraphBuilder::new(None);
        let x = image(&mut g, &[1, 1, 2]);
        let unit = ActivationUnit::new(ActivationPolicy::Gated, 1, StackKind::Horizontal);
        let out = unit.build(&mut g, x, 0, None, None, false).unwrap();
        let graph = g.finish(x, None, out);

        let y = graph.forward(&Tensor::new(&[0.5, 0.0], &[1, 1, 1, 2]), None).unwrap();
        let expected = 0.5f32.tanh() * 0.5;
        assert!((y.data()[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_relu_keeps_channels() {
        let mut g = GraphBuilder::new(None);
        let x = image(&mut g, &[2, 2, 4]);
        let unit = ActivationUnit::new(ActivationPolicy::Relu, 4, StackKind::Vertical);
        let out = unit.build(&mut g, x, 0, None, None, false).unwrap();
        let graph = g.finish(x, None, out);
        let y = graph.forward(&Tensor::full(&[1, 2, 2, 4], -1.0), None).unwrap();
        assert_eq!(y.shape(), &[1, 2, 2, 4]);
        assert!(y.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_wrong_width_rejected() {
        let mut g = GraphBuilder::new(None);
        let x = image(&mut g, &[3, 3, 6]);
        let unit = ActivationUnit::new(ActivationPolicy::Gated, 4, StackKind::Horizontal);
        assert!(matches!(
            unit.build(&mut g, x, 2, None, None, false),
            Err(PixelCnnError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_crop_then_merge_feed() {
        let mut g = GraphBuilder::new(Some(1));
        let x = image(&mut g, &[4, 5, 2]);
        let feed = g
            .input(NodeId::new(Scope::Input, 0, Role::Latent), &[4, 4, 2])
            .unwrap();
        let unit = ActivationUnit::new(ActivationPolicy::Relu, 2, StackKind::Horizontal);
        let out = unit.build(&mut g, x, 0, Some(feed), None, true).unwrap();
        assert_eq!(g.shape(out), &[4, 4, 2]);

        // Without the crop the feed no longer lines up.
        let unit_out = unit.build(&mut g, x, 1, Some(feed), None, false);
        assert!(matches!(unit_out, Err(PixelCnnError::ShapeMismatch { .. })));
    }
}
