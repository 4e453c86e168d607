//! Residual connections on the horizontal stack.

use super::graph::GraphBuilder;
use super::node::{NodeId, NodeRef, Op, Role, StackKind};
use crate::error::Result;
use crate::nn::Conv2d;

/// Projects a horizontal activation to `nb_filters` channels with a 1×1
/// convolution and, from the second layer on, adds the previous layer's
/// horizontal output.
#[derive(Debug, Clone, Copy)]
pub struct ResidualAggregator {
    nb_filters: usize,
}

impl ResidualAggregator {
    #[must_use]
    pub fn new(nb_filters: usize) -> Self {
        Self { nb_filters }
    }

    /// Append `h_projection_{layer}` and, when `previous` is given,
    /// `h_residual_{layer}`.
    pub fn build(
        &self,
        g: &mut GraphBuilder,
        horizontal: NodeRef,
        previous: Option<NodeRef>,
        layer: usize,
    ) -> Result<NodeRef> {
        let in_channels = g.channels(horizontal);
        let seed = g.next_seed();
        let projected = g.push(
            NodeId::stack(StackKind::Horizontal, layer, Role::Projection),
            Op::Conv(Conv2d::pointwise(in_channels, self.nb_filters, seed)),
            &[horizontal],
        )?;

        match previous {
            Some(previous) => g.push(
                NodeId::stack(StackKind::Horizontal, layer, Role::Residual),
                Op::Add,
                &[projected, previous],
            ),
            None => Ok(projected),
        }
    }
}
