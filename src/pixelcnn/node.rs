//! Graph nodes and their structured identifiers.
//!
//! A node's identity is a `(scope, layer, role)` triple; its display name
//! (`v_conv_0`, `h_merge_feed_2`, `head_relu_1`) is derived from that triple
//! and only ever used for output: parameter keys in weight files and node
//! names in exported architecture descriptions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PixelCnnError, Result};
use crate::nn::{Conv2d, Linear, ZeroPad2d};
use crate::tensor::Tensor;

/// Which of the two convolutional stacks a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackKind {
    /// Sees all rows above and including the current row.
    Vertical,
    /// Sees the current row up to the current column.
    Horizontal,
}

impl StackKind {
    /// Short tag used in node names.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            StackKind::Vertical => "v",
            StackKind::Horizontal => "h",
        }
    }

    /// Full name of the stack.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            StackKind::Vertical => "vertical",
            StackKind::Horizontal => "horizontal",
        }
    }
}

impl FromStr for StackKind {
    type Err = PixelCnnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "vertical" | "v" => Ok(StackKind::Vertical),
            "horizontal" | "h" => Ok(StackKind::Horizontal),
            _ => Err(PixelCnnError::UnknownStack(s.to_string())),
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Causal mask variant of a horizontal convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaskKind {
    /// Excludes the current pixel (first layer only).
    A,
    /// Includes the current pixel, excludes everything after it.
    B,
}

/// Part of the network a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Graph inputs
    Input,
    /// Vertical stack
    Vertical,
    /// Horizontal stack
    Horizontal,
    /// 1×1 ReLU convolutions after the last layer
    Head,
    /// Final projection to pixel values
    Output,
}

impl From<StackKind> for Scope {
    fn from(stack: StackKind) -> Self {
        match stack {
            StackKind::Vertical => Scope::Vertical,
            StackKind::Horizontal => Scope::Horizontal,
        }
    }
}

/// What a node does within its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Image,
    Latent,
    Pad,
    Conv,
    CropRight,
    MergeFeed,
    DenseLatent,
    MergeLatent,
    Write,
    Gate,
    Tanh,
    Sigmoid,
    MergeGate,
    Relu,
    ShiftDown,
    FeedConv,
    Projection,
    Residual,
}

impl Role {
    fn name(self) -> &'static str {
        match self {
            Role::Image => "image",
            Role::Latent => "latent",
            Role::Pad => "pad",
            Role::Conv => "conv",
            Role::CropRight => "crop_right",
            Role::MergeFeed => "merge_feed",
            Role::DenseLatent => "dense_latent",
            Role::MergeLatent => "merge_latent",
            Role::Write => "write",
            Role::Gate => "gate",
            Role::Tanh => "tanh",
            Role::Sigmoid => "sigmoid",
            Role::MergeGate => "merge_gate",
            Role::Relu => "relu",
            Role::ShiftDown => "shift_down",
            Role::FeedConv => "feed_conv",
            Role::Projection => "projection",
            Role::Residual => "residual",
        }
    }
}

/// Structured identifier of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Part of the network
    pub scope: Scope,
    /// Layer index within the scope
    pub layer: usize,
    /// Purpose of the node
    pub role: Role,
}

impl NodeId {
    /// Create an identifier.
    #[must_use]
    pub fn new(scope: Scope, layer: usize, role: Role) -> Self {
        Self { scope, layer, role }
    }

    /// Identifier of a node inside one of the two stacks.
    #[must_use]
    pub fn stack(stack: StackKind, layer: usize, role: Role) -> Self {
        Self::new(stack.into(), layer, role)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Input => match self.role {
                Role::Latent => f.write_str("latent_vector"),
                _ => f.write_str("input_image"),
            },
            Scope::Vertical => write!(f, "v_{}_{}", self.role.name(), self.layer),
            Scope::Horizontal => write!(f, "h_{}_{}", self.role.name(), self.layer),
            Scope::Head => write!(f, "head_{}_{}", self.role.name(), self.layer),
            Scope::Output => write!(f, "output_{}", self.role.name()),
        }
    }
}

/// Index of a node in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub(crate) usize);

impl NodeRef {
    /// Position of the node in evaluation order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Operation computed by a node.
#[derive(Debug, Clone)]
pub enum Op {
    /// Externally supplied tensor
    Input,
    /// Explicit zero padding
    Pad(ZeroPad2d),
    /// Valid convolution
    Conv(Conv2d),
    /// Drop the last column
    CropRight,
    /// Move every row down by one, zero row on top
    ShiftDown,
    /// Elementwise sum of two maps
    Add,
    /// Dense projection of a `(batch, features)` tensor
    Dense(Linear),
    /// Add `(batch, C)` to every pixel of `(batch, H, W, C)`
    BroadcastAdd,
    /// Keep channels `[start, end)`
    ChannelSlice {
        /// First kept channel
        start: usize,
        /// One past the last kept channel
        end: usize,
    },
    Tanh,
    Sigmoid,
    /// Elementwise product of two maps
    Mul,
    Relu,
}

/// Serializable description of an [`Op`] without its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpSpec {
    Input,
    ZeroPad2d {
        top: usize,
        bottom: usize,
        left: usize,
        right: usize,
    },
    Conv2d {
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
    },
    CropRight,
    ShiftDown,
    Add,
    Dense {
        in_features: usize,
        out_features: usize,
    },
    BroadcastAdd,
    ChannelSlice {
        start: usize,
        end: usize,
    },
    Tanh,
    Sigmoid,
    Mul,
    Relu,
}

impl Op {
    fn arity(&self) -> usize {
        match self {
            Op::Input => 0,
            Op::Add | Op::Mul | Op::BroadcastAdd => 2,
            _ => 1,
        }
    }

    /// Parameter-free description of the operation.
    #[must_use]
    pub fn spec(&self) -> OpSpec {
        match self {
            Op::Input => OpSpec::Input,
            Op::Pad(p) => OpSpec::ZeroPad2d {
                top: p.top,
                bottom: p.bottom,
                left: p.left,
                right: p.right,
            },
            Op::Conv(c) => OpSpec::Conv2d {
                in_channels: c.in_channels(),
                out_channels: c.out_channels(),
                kernel_size: c.kernel_size(),
            },
            Op::CropRight => OpSpec::CropRight,
            Op::ShiftDown => OpSpec::ShiftDown,
            Op::Add => OpSpec::Add,
            Op::Dense(l) => OpSpec::Dense {
                in_features: l.in_features(),
                out_features: l.out_features(),
            },
            Op::BroadcastAdd => OpSpec::BroadcastAdd,
            Op::ChannelSlice { start, end } => OpSpec::ChannelSlice {
                start: *start,
                end: *end,
            },
            Op::Tanh => OpSpec::Tanh,
            Op::Sigmoid => OpSpec::Sigmoid,
            Op::Mul => OpSpec::Mul,
            Op::Relu => OpSpec::Relu,
        }
    }

    /// Number of trainable scalars owned by the operation.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        match self {
            Op::Conv(c) => c.num_parameters(),
            Op::Dense(l) => l.num_parameters(),
            _ => 0,
        }
    }

    /// Infer the per-example output shape from the input shapes.
    ///
    /// `context` names the node in error messages.
    pub fn infer_shape(&self, context: &str, inputs: &[&[usize]]) -> Result<Vec<usize>> {
        if inputs.len() != self.arity() {
            return Err(PixelCnnError::ShapeMismatch {
                context: context.to_string(),
                expected: format!("{} inputs", self.arity()),
                actual: format!("{} inputs", inputs.len()),
            });
        }

        let expect_map = |shape: &[usize]| -> Result<()> {
            if shape.len() == 3 {
                Ok(())
            } else {
                Err(PixelCnnError::ShapeMismatch {
                    context: context.to_string(),
                    expected: "[H, W, C]".to_string(),
                    actual: format!("{shape:?}"),
                })
            }
        };

        match self {
            Op::Input => Err(PixelCnnError::InvalidInput(format!(
                "{context}: input nodes carry a declared shape"
            ))),
            Op::Pad(p) => {
                expect_map(inputs[0])?;
                Ok(p.output_shape(inputs[0]))
            }
            Op::Conv(c) => c.output_shape(inputs[0]).map_err(|e| rename(e, context)),
            Op::CropRight => {
                expect_map(inputs[0])?;
                let [h, w, c] = [inputs[0][0], inputs[0][1], inputs[0][2]];
                if w < 2 {
                    return Err(PixelCnnError::ShapeMismatch {
                        context: context.to_string(),
                        expected: "width >= 2".to_string(),
                        actual: format!("{:?}", inputs[0]),
                    });
                }
                Ok(vec![h, w - 1, c])
            }
            Op::ShiftDown | Op::Tanh | Op::Sigmoid | Op::Relu => {
                expect_map(inputs[0])?;
                Ok(inputs[0].to_vec())
            }
            Op::Add | Op::Mul => {
                expect_map(inputs[0])?;
                if inputs[0] != inputs[1] {
                    return Err(PixelCnnError::shape_mismatch(context, inputs[0], inputs[1]));
                }
                Ok(inputs[0].to_vec())
            }
            Op::Dense(l) => l.output_shape(inputs[0]).map_err(|e| rename(e, context)),
            Op::BroadcastAdd => {
                expect_map(inputs[0])?;
                let channels = inputs[0][2];
                if inputs[1] != [channels].as_slice() {
                    return Err(PixelCnnError::shape_mismatch(context, &[channels], inputs[1]));
                }
                Ok(inputs[0].to_vec())
            }
            Op::ChannelSlice { start, end } => {
                expect_map(inputs[0])?;
                let channels = inputs[0][2];
                if start >= end || *end > channels {
                    return Err(PixelCnnError::ShapeMismatch {
                        context: context.to_string(),
                        expected: format!("channel range [{start}, {end}) within {channels}"),
                        actual: format!("{:?}", inputs[0]),
                    });
                }
                Ok(vec![inputs[0][0], inputs[0][1], end - start])
            }
        }
    }

    /// Evaluate the operation on batched inputs.
    ///
    /// # Panics
    ///
    /// Panics if called on [`Op::Input`]; input values are bound by the graph.
    #[must_use]
    pub fn eval(&self, inputs: &[&Tensor]) -> Tensor {
        match self {
            Op::Input => unreachable!("input nodes are bound, not evaluated"),
            Op::Pad(p) => p.forward(inputs[0]),
            Op::Conv(c) => c.forward(inputs[0]),
            Op::CropRight => inputs[0].crop_right(),
            Op::ShiftDown => inputs[0].shift_down(),
            Op::Add => inputs[0].add(inputs[1]),
            Op::Dense(l) => l.forward(inputs[0]),
            Op::BroadcastAdd => inputs[0].broadcast_add_channels(inputs[1]),
            Op::ChannelSlice { start, end } => inputs[0].slice_channels(*start, *end),
            Op::Tanh => inputs[0].tanh(),
            Op::Sigmoid => inputs[0].sigmoid(),
            Op::Mul => inputs[0].mul(inputs[1]),
            Op::Relu => inputs[0].relu(),
        }
    }
}

fn rename(err: PixelCnnError, context: &str) -> PixelCnnError {
    match err {
        PixelCnnError::ShapeMismatch {
            expected, actual, ..
        } => PixelCnnError::ShapeMismatch {
            context: context.to_string(),
            expected,
            actual,
        },
        other => other,
    }
}

/// One operation in the built graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Structured identifier
    pub id: NodeId,
    /// Operation and its parameters
    pub op: Op,
    /// Producer nodes, all earlier in evaluation order
    pub inputs: Vec<NodeRef>,
    /// Per-example output shape (batch axis excluded)
    pub shape: Vec<usize>,
}

impl Node {
    /// Display name of the node.
    #[must_use]
    pub fn name(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_kind_parse() {
        assert_eq!("vertical".parse::<StackKind>().unwrap(), StackKind::Vertical);
        assert_eq!("H".parse::<StackKind>().unwrap(), StackKind::Horizontal);
        let err = "diagonal".parse::<StackKind>().unwrap_err();
        assert!(matches!(err, PixelCnnError::UnknownStack(ref s) if s == "diagonal"));
    }

    #[test]
    fn test_node_names() {
        assert_eq!(
            NodeId::stack(StackKind::Vertical, 0, Role::Conv).to_string(),
            "v_conv_0"
        );
        assert_eq!(
            NodeId::stack(StackKind::Horizontal, 3, Role::MergeFeed).to_string(),
            "h_merge_feed_3"
        );
        assert_eq!(NodeId::new(Scope::Head, 1, Role::Relu).to_string(), "head_relu_1");
        assert_eq!(NodeId::new(Scope::Output, 0, Role::Conv).to_string(), "output_conv");
        assert_eq!(NodeId::new(Scope::Input, 0, Role::Latent).to_string(), "latent_vector");
        assert_eq!(NodeId::new(Scope::Input, 0, Role::Image).to_string(), "input_image");
    }

    #[test]
    fn test_infer_add_mismatch() {
        let err = Op::Add
            .infer_shape("h_merge_feed_0", &[&[4, 4, 8], &[4, 5, 8]])
            .unwrap_err();
        assert!(err.to_string().contains("h_merge_feed_0"));
    }

    #[test]
    fn test_infer_broadcast_add() {
        assert_eq!(
            Op::BroadcastAdd.infer_shape("m", &[&[4, 4, 8], &[8]]).unwrap(),
            vec![4, 4, 8]
        );
        assert!(Op::BroadcastAdd.infer_shape("m", &[&[4, 4, 8], &[4]]).is_err());
    }

    #[test]
    fn test_infer_channel_slice() {
        let op = Op::ChannelSlice { start: 4, end: 8 };
        assert_eq!(op.infer_shape("g", &[&[3, 3, 8]]).unwrap(), vec![3, 3, 4]);
        assert!(op.infer_shape("g", &[&[3, 3, 6]]).is_err());
    }

    #[test]
    fn test_infer_crop_right() {
        assert_eq!(Op::CropRight.infer_shape("c", &[&[5, 6, 2]]).unwrap(), vec![5, 5, 2]);
    }

    #[test]
    fn test_infer_arity() {
        assert!(Op::Relu.infer_shape("r", &[&[1, 1, 1], &[1, 1, 1]]).is_err());
    }

    #[test]
    fn test_conv_mismatch_names_node() {
        let op = Op::Conv(Conv2d::pointwise(4, 4, Some(0)));
        let err = op.infer_shape("h_projection_2", &[&[3, 3, 8]]).unwrap_err();
        assert!(err.to_string().starts_with("h_projection_2"));
    }
}
