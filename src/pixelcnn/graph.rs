//! The built computation graph and the reference executor that runs it.
//!
//! Nodes are appended in dependency order while the graph is built, so
//! evaluation is a single forward walk over the node list. Each node's
//! output shape is inferred when it is appended; a merge between maps of
//! different shapes fails right there instead of at the first forward pass.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::node::{Node, NodeId, NodeRef, Op, Role, Scope};
use crate::error::{PixelCnnError, Result};
use crate::serialization::StateDict;
use crate::tensor::Tensor;

/// Incrementally assembles a [`Graph`].
#[derive(Debug)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    names: HashMap<NodeId, NodeRef>,
    seed: Option<u64>,
    seeds_drawn: u64,
}

impl GraphBuilder {
    /// Create an empty builder; `seed` fixes parameter initialization.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            nodes: Vec::new(),
            names: HashMap::new(),
            seed,
            seeds_drawn: 0,
        }
    }

    /// Seed for the next parameterized layer.
    ///
    /// Every layer draws a distinct seed so that no two layers share weights.
    pub fn next_seed(&mut self) -> Option<u64> {
        let seed = self
            .seed
            .map(|s| s.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(self.seeds_drawn));
        self.seeds_drawn += 1;
        seed
    }

    /// Declare a graph input with its per-example shape.
    pub fn input(&mut self, id: NodeId, shape: &[usize]) -> Result<NodeRef> {
        self.insert(Node {
            id,
            op: Op::Input,
            inputs: Vec::new(),
            shape: shape.to_vec(),
        })
    }

    /// Append an operation, inferring its output shape.
    pub fn push(&mut self, id: NodeId, op: Op, inputs: &[NodeRef]) -> Result<NodeRef> {
        if let Some(bad) = inputs.iter().find(|r| r.0 >= self.nodes.len()) {
            return Err(PixelCnnError::InvalidInput(format!(
                "{id}: input node #{} does not exist",
                bad.0
            )));
        }
        let shapes: Vec<&[usize]> = inputs
            .iter()
            .map(|r| self.nodes[r.0].shape.as_slice())
            .collect();
        let shape = op.infer_shape(&id.to_string(), &shapes)?;
        trace!(node = %id, ?shape, "appended node");

        self.insert(Node {
            id,
            op,
            inputs: inputs.to_vec(),
            shape,
        })
    }

    /// Per-example shape of a node already in the builder.
    #[must_use]
    pub fn shape(&self, node: NodeRef) -> &[usize] {
        &self.nodes[node.0].shape
    }

    /// Channel count of a feature-map node.
    #[must_use]
    pub fn channels(&self, node: NodeRef) -> usize {
        self.shape(node).last().copied().unwrap_or(0)
    }

    /// Finish construction.
    pub fn finish(self, image: NodeRef, latent: Option<NodeRef>, output: NodeRef) -> Graph {
        Graph {
            nodes: self.nodes,
            names: self.names,
            image,
            latent,
            output,
        }
    }

    fn insert(&mut self, node: Node) -> Result<NodeRef> {
        let r = NodeRef(self.nodes.len());
        if self.names.insert(node.id, r).is_some() {
            return Err(PixelCnnError::InvalidInput(format!(
                "duplicate node identifier {}",
                node.id
            )));
        }
        self.nodes.push(node);
        Ok(r)
    }
}

/// An immutable, fully built computation graph.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    names: HashMap<NodeId, NodeRef>,
    image: NodeRef,
    latent: Option<NodeRef>,
    output: NodeRef,
}

impl Graph {
    /// All nodes in evaluation order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Look up a node by its structured identifier.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.names.get(&id).map(|r| &self.nodes[r.0])
    }

    /// Look up a node by display name (`"h_conv_0"`).
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// Reference of the image input node.
    #[must_use]
    pub fn image(&self) -> NodeRef {
        self.image
    }

    /// Reference of the latent input node, if the graph is conditional.
    #[must_use]
    pub fn latent(&self) -> Option<NodeRef> {
        self.latent
    }

    /// Reference of the output node.
    #[must_use]
    pub fn output(&self) -> NodeRef {
        self.output
    }

    /// Whether the graph consumes a latent vector.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.latent.is_some()
    }

    /// Number of trainable scalars.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.nodes.iter().map(|n| n.op.num_parameters()).sum()
    }

    /// Whether any node plays `role` in `scope`.
    #[must_use]
    pub fn contains(&self, scope: Scope, role: Role) -> bool {
        self.nodes.iter().any(|n| n.id.scope == scope && n.id.role == role)
    }

    /// Evaluate every node and return all values in node order.
    ///
    /// `image` is `(batch, H, W, C)`; `latent` is `(batch, latent_dim)` and
    /// required if and only if the graph is conditional. A latent passed to
    /// an unconditional graph is ignored.
    pub fn evaluate(&self, image: &Tensor, latent: Option<&Tensor>) -> Result<Vec<Tensor>> {
        let batch = self.check_inputs(image, latent)?;
        let mut values: Vec<Tensor> = Vec::with_capacity(self.nodes.len());

        for (i, node) in self.nodes.iter().enumerate() {
            let value = match node.op {
                Op::Input if Some(NodeRef(i)) == self.latent => match latent {
                    Some(l) => l.clone(),
                    None => return Err(PixelCnnError::MissingLatent(node.name())),
                },
                Op::Input => image.clone(),
                _ => {
                    let args: Vec<&Tensor> = node.inputs.iter().map(|r| &values[r.0]).collect();
                    node.op.eval(&args)
                }
            };
            values.push(value);
        }

        debug!(batch, nodes = values.len(), "evaluated graph");
        Ok(values)
    }

    /// Evaluate the graph and return only the output node's value.
    pub fn forward(&self, image: &Tensor, latent: Option<&Tensor>) -> Result<Tensor> {
        let mut values = self.evaluate(image, latent)?;
        Ok(values.swap_remove(self.output.0))
    }

    fn check_inputs(&self, image: &Tensor, latent: Option<&Tensor>) -> Result<usize> {
        let expected = &self.nodes[self.image.0].shape;
        if image.ndim() != 4 || &image.shape()[1..] != expected.as_slice() {
            return Err(PixelCnnError::InvalidInput(format!(
                "image must be (batch, {}, {}, {}), got {:?}",
                expected[0],
                expected[1],
                expected[2],
                image.shape()
            )));
        }
        let batch = image.batch_size();
        if batch == 0 {
            return Err(PixelCnnError::InvalidInput("empty batch".to_string()));
        }

        match (self.latent, latent) {
            (Some(node), Some(l)) => {
                let dim = self.nodes[node.0].shape[0];
                if l.shape() != [batch, dim].as_slice() {
                    return Err(PixelCnnError::InvalidInput(format!(
                        "latent must be ({batch}, {dim}), got {:?}",
                        l.shape()
                    )));
                }
            }
            (Some(node), None) => {
                return Err(PixelCnnError::MissingLatent(self.nodes[node.0].name()));
            }
            (None, Some(_)) => debug!("unconditional graph ignores the supplied latent"),
            (None, None) => {}
        }
        Ok(batch)
    }

    /// Extract all parameters keyed by `"{node}.weight"` / `"{node}.bias"`.
    #[must_use]
    pub fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        for node in &self.nodes {
            let (weight, bias) = match &node.op {
                Op::Conv(c) => (c.weight(), c.bias()),
                Op::Dense(l) => (l.weight(), l.bias()),
                _ => continue,
            };
            let name = node.name();
            state.insert(
                format!("{name}.weight"),
                (weight.data().to_vec(), weight.shape().to_vec()),
            );
            state.insert(
                format!("{name}.bias"),
                (bias.data().to_vec(), bias.shape().to_vec()),
            );
        }
        state
    }

    /// Replace all parameters from a state dictionary.
    ///
    /// The dictionary must name exactly the graph's parameters with matching
    /// shapes. On error the graph is left unchanged.
    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let mut staged = self.nodes.clone();
        let mut consumed = 0;

        for node in &mut staged {
            let name = node.name();
            let mut take = |suffix: &str| -> Result<Tensor> {
                let key = format!("{name}.{suffix}");
                let (data, shape) = state
                    .get(&key)
                    .ok_or_else(|| PixelCnnError::Checkpoint(format!("missing tensor '{key}'")))?;
                consumed += 1;
                Tensor::try_new(data.clone(), shape)
                    .map_err(|e| PixelCnnError::Checkpoint(format!("tensor '{key}': {e}")))
            };

            let loaded = match &mut node.op {
                Op::Conv(c) => {
                    let (w, b) = (take("weight")?, take("bias")?);
                    c.set_weight(w).and_then(|()| c.set_bias(b))
                }
                Op::Dense(l) => {
                    let (w, b) = (take("weight")?, take("bias")?);
                    l.set_weight(w).and_then(|()| l.set_bias(b))
                }
                _ => continue,
            };
            loaded.map_err(|e| PixelCnnError::Checkpoint(format!("{name}: {e}")))?;
        }

        if consumed != state.len() {
            return Err(PixelCnnError::Checkpoint(format!(
                "checkpoint has {} tensors, graph expects {consumed}",
                state.len()
            )));
        }

        self.nodes = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::Conv2d;
    use crate::pixelcnn::node::StackKind;

    fn tiny_graph() -> Graph {
        let mut g = GraphBuilder::new(Some(1));
        let image = g
            .input(NodeId::new(Scope::Input, 0, Role::Image), &[3, 3, 1])
            .unwrap();
        let seed = g.next_seed();
        let conv = g
            .push(
                NodeId::stack(StackKind::Horizontal, 0, Role::Projection),
                Op::Conv(Conv2d::pointwise(1, 2, seed)),
                &[image],
            )
            .unwrap();
        let relu = g
            .push(NodeId::stack(StackKind::Horizontal, 0, Role::Relu), Op::Relu, &[conv])
            .unwrap();
        g.finish(image, None, relu)
    }

    #[test]
    fn test_push_infers_shape() {
        let graph = tiny_graph();
        assert_eq!(graph.nodes().len(), 3);
        assert_eq!(graph.nodes()[1].shape, vec![3, 3, 2]);
        assert_eq!(graph.num_parameters(), 4);
        assert!(graph.node("h_projection_0").is_some());

        let relu = graph
            .get(NodeId::stack(StackKind::Horizontal, 0, Role::Relu))
            .unwrap();
        assert_eq!(relu.name(), "h_relu_0");
        assert_eq!(relu.shape, vec![3, 3, 2]);
        assert!(graph.get(NodeId::stack(StackKind::Vertical, 0, Role::Relu)).is_none());
    }

    #[test]
    fn test_push_rejects_mismatch() {
        let mut g = GraphBuilder::new(None);
        let a = g.input(NodeId::new(Scope::Input, 0, Role::Image), &[3, 3, 1]).unwrap();
        let b = g
            .push(
                NodeId::stack(StackKind::Vertical, 0, Role::Pad),
                Op::Pad(crate::nn::ZeroPad2d::new((1, 0), (0, 0))),
                &[a],
            )
            .unwrap();
        let err = g
            .push(NodeId::stack(StackKind::Vertical, 0, Role::Residual), Op::Add, &[a, b])
            .unwrap_err();
        assert!(matches!(err, PixelCnnError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut g = GraphBuilder::new(None);
        let id = NodeId::new(Scope::Input, 0, Role::Image);
        g.input(id, &[1, 1, 1]).unwrap();
        assert!(g.input(id, &[1, 1, 1]).is_err());
    }

    #[test]
    fn test_next_seed_distinct() {
        let mut g = GraphBuilder::new(Some(5));
        let a = g.next_seed();
        let b = g.next_seed();
        assert_ne!(a, b);
        assert_eq!(GraphBuilder::new(None).next_seed(), None);
    }

    #[test]
    fn test_forward_validates_image() {
        let graph = tiny_graph();
        assert!(graph.forward(&Tensor::zeros(&[1, 3, 4, 1]), None).is_err());
        assert!(graph.forward(&Tensor::zeros(&[0, 3, 3, 1]), None).is_err());
        let y = graph.forward(&Tensor::ones(&[2, 3, 3, 1]), None).unwrap();
        assert_eq!(y.shape(), &[2, 3, 3, 2]);
        assert!(y.data().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_state_dict_round_trip_and_atomic_load() {
        let mut graph = tiny_graph();
        let state = graph.state_dict();
        assert_eq!(state.len(), 2);
        assert!(state.contains_key("h_projection_0.weight"));

        let mut bad = state.clone();
        bad.insert("h_projection_0.bias".to_string(), (vec![0.0; 3], vec![3]));
        let before = graph.state_dict();
        assert!(matches!(
            graph.load_state_dict(&bad),
            Err(PixelCnnError::Checkpoint(_))
        ));
        assert_eq!(graph.state_dict(), before);

        let mut extra = state.clone();
        extra.insert("unknown.weight".to_string(), (vec![1.0], vec![1]));
        assert!(graph.load_state_dict(&extra).is_err());

        let mut changed = state;
        changed.insert("h_projection_0.bias".to_string(), (vec![1.0, 2.0], vec![2]));
        graph.load_state_dict(&changed).unwrap();
        assert_eq!(graph.state_dict()["h_projection_0.bias"].0, vec![1.0, 2.0]);
    }
}
