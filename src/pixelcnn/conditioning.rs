//! Latent-vector conditioning.

use super::graph::GraphBuilder;
use super::node::{NodeId, NodeRef, Op, Role, StackKind};
use crate::error::{PixelCnnError, Result};
use crate::nn::Linear;

/// Projects a `(batch, latent_dim)` vector to a layer's channel width and
/// adds it to every pixel of that layer's pre-activation map.
#[derive(Debug, Clone, Copy)]
pub struct LatentConditioner {
    out_channels: usize,
}

impl LatentConditioner {
    /// Conditioner for maps with `out_channels` channels.
    #[must_use]
    pub fn new(out_channels: usize) -> Self {
        Self { out_channels }
    }

    /// Append `{stack}_dense_latent_{layer}` and `{stack}_merge_latent_{layer}`.
    ///
    /// `map` must already carry `out_channels` channels; the broadcast never
    /// stretches across a different channel count.
    pub fn build(
        &self,
        g: &mut GraphBuilder,
        map: NodeRef,
        latent: NodeRef,
        stack: StackKind,
        layer: usize,
    ) -> Result<NodeRef> {
        let latent_dim = match g.shape(latent) {
            [dim] => *dim,
            other => {
                return Err(PixelCnnError::ShapeMismatch {
                    context: NodeId::stack(stack, layer, Role::DenseLatent).to_string(),
                    expected: "[latent_dim]".to_string(),
                    actual: format!("{other:?}"),
                })
            }
        };

        let seed = g.next_seed();
        let projected = g.push(
            NodeId::stack(stack, layer, Role::DenseLatent),
            Op::Dense(Linear::with_seed(latent_dim, self.out_channels, seed)),
            &[latent],
        )?;
        g.push(
            NodeId::stack(stack, layer, Role::MergeLatent),
            Op::BroadcastAdd,
            &[map, projected],
        )
    }
}
