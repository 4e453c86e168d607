//! Assembly of the full PixelCNN graph.

use tracing::{debug, info};

use super::activation::ActivationUnit;
use super::config::PixelCnnConfig;
use super::feed::VerticalFeedProjector;
use super::graph::{Graph, GraphBuilder};
use super::masked_conv::MaskedConvolutionBuilder;
use super::node::{MaskKind, NodeId, NodeRef, Op, Role, Scope, StackKind};
use super::residual::ResidualAggregator;
use crate::error::Result;
use crate::nn::Conv2d;

/// Number of 1×1 ReLU convolutions between the last layer and the output.
pub const HEAD_LAYERS: usize = 2;

/// Builds the vertical and horizontal stacks, the 1×1 head and the output
/// projection for a validated [`PixelCnnConfig`].
///
/// Layer 0 uses the first-layer kernel, mask A on the horizontal stack
/// (with crop-right) and no residual connection. Layers `1..N` use the
/// standard kernel, mask B and a residual add on the horizontal stack.
#[derive(Debug, Clone, Copy)]
pub struct PixelCnnGraphBuilder<'a> {
    config: &'a PixelCnnConfig,
}

impl<'a> PixelCnnGraphBuilder<'a> {
    #[must_use]
    pub fn new(config: &'a PixelCnnConfig) -> Self {
        Self { config }
    }

    /// Validate the configuration and build the graph.
    pub fn build(&self) -> Result<Graph> {
        let config = self.config;
        config.validate()?;

        let policy = config.activation_policy();
        let nb_filters = config.nb_filters;
        let pre_channels = policy.pre_activation_channels(nb_filters);
        let (height, width) = config.input_size;

        let mut g = GraphBuilder::new(config.seed);
        let image = g.input(
            NodeId::new(Scope::Input, 0, Role::Image),
            &[height, width, config.nb_channels],
        )?;
        let latent = if config.conditional {
            Some(g.input(
                NodeId::new(Scope::Input, 0, Role::Latent),
                &[config.latent_dim],
            )?)
        } else {
            None
        };

        let masked = MaskedConvolutionBuilder::new(pre_channels);
        let feed = VerticalFeedProjector::new(pre_channels);
        let residual = ResidualAggregator::new(nb_filters);
        let v_unit = ActivationUnit::new(policy, nb_filters, StackKind::Vertical);
        let h_unit = ActivationUnit::new(policy, nb_filters, StackKind::Horizontal);

        let mut v_stack = image;
        let mut h_stack = image;
        for layer in 0..config.nb_pixelcnn_layers {
            let first = layer == 0;
            let (kernel, h_mask) = if first {
                (config.filter_size_1st, MaskKind::A)
            } else {
                (config.filter_size, MaskKind::B)
            };

            let v_pre = masked.build(
                &mut g,
                v_stack,
                StackKind::Vertical,
                kernel,
                MaskKind::B,
                layer,
            )?;
            let v_out = v_unit.build(&mut g, v_pre, layer, None, latent, false)?;
            let v_feed = feed.build(&mut g, v_out, layer)?;

            let h_pre =
                masked.build(&mut g, h_stack, StackKind::Horizontal, kernel, h_mask, layer)?;
            let h_act = h_unit.build(&mut g, h_pre, layer, Some(v_feed), latent, first)?;
            let previous = if first { None } else { Some(h_stack) };
            let h_out = residual.build(&mut g, h_act, previous, layer)?;

            debug!(
                layer,
                ?kernel,
                ?h_mask,
                vertical = ?g.shape(v_out),
                horizontal = ?g.shape(h_out),
                "built pixelcnn layer"
            );
            v_stack = v_out;
            h_stack = h_out;
        }

        let head = self.head(&mut g, h_stack)?;
        let seed = g.next_seed();
        let output = g.push(
            NodeId::new(Scope::Output, 0, Role::Conv),
            Op::Conv(Conv2d::pointwise(nb_filters, config.nb_channels, seed)),
            &[head],
        )?;

        let graph = g.finish(image, latent, output);
        info!(
            nodes = graph.nodes().len(),
            parameters = graph.num_parameters(),
            conditional = graph.is_conditional(),
            "built pixelcnn graph"
        );
        Ok(graph)
    }

    fn head(&self, g: &mut GraphBuilder, mut x: NodeRef) -> Result<NodeRef> {
        let nb_filters = self.config.nb_filters;
        for i in 0..HEAD_LAYERS {
            let in_channels = g.channels(x);
            let seed = g.next_seed();
            let conv = g.push(
                NodeId::new(Scope::Head, i, Role::Conv),
                Op::Conv(Conv2d::pointwise(in_channels, nb_filters, seed)),
                &[x],
            )?;
            x = g.push(NodeId::new(Scope::Head, i, Role::Relu), Op::Relu, &[conv])?;
        }
        Ok(x)
    }
}
