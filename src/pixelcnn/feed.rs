//! Vertical-to-horizontal feed.

use super::graph::GraphBuilder;
use super::node::{NodeId, NodeRef, Op, Role, StackKind};
use crate::error::Result;
use crate::nn::Conv2d;

/// Shifts the vertical activation map down one row and projects it with a
/// 1×1 convolution to the horizontal pre-activation width.
///
/// After the shift, row `r` of the feed only carries vertical information
/// from rows `< r`, so merging it into the horizontal stack cannot leak the
/// current row.
#[derive(Debug, Clone, Copy)]
pub struct VerticalFeedProjector {
    out_channels: usize,
}

impl VerticalFeedProjector {
    #[must_use]
    pub fn new(out_channels: usize) -> Self {
        Self { out_channels }
    }

    /// Append `v_shift_down_{layer}` and `v_feed_conv_{layer}`.
    pub fn build(&self, g: &mut GraphBuilder, vertical: NodeRef, layer: usize) -> Result<NodeRef> {
        let in_channels = g.channels(vertical);
        let shifted = g.push(
            NodeId::stack(StackKind::Vertical, layer, Role::ShiftDown),
            Op::ShiftDown,
            &[vertical],
        )?;
        let seed = g.next_seed();
        g.push(
            NodeId::stack(StackKind::Vertical, layer, Role::FeedConv),
            Op::Conv(Conv2d::pointwise(in_channels, self.out_channels, seed)),
            &[shifted],
        )
    }
}
