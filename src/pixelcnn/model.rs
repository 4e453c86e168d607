//! The user-facing PixelCNN model: a built graph plus its configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::builder::PixelCnnGraphBuilder;
use super::config::PixelCnnConfig;
use super::graph::Graph;
use super::node::OpSpec;
use crate::error::{PixelCnnError, Result};
use crate::serialization::{load_safetensors, save_safetensors};
use crate::tensor::Tensor;

/// File name written by [`PixelCnn::export_to_json`].
pub const JSON_EXPORT_FILE: &str = "pixelcnn_model.json";
/// File name written by [`PixelCnn::export_to_yaml`].
pub const YAML_EXPORT_FILE: &str = "pixelcnn_model.yml";

/// A (conditional) Gated PixelCNN.
///
/// # Example
///
/// ```
/// use pixelcnn::pixelcnn::{PixelCnn, PixelCnnConfig};
/// use pixelcnn::tensor::Tensor;
///
/// let config = PixelCnnConfig::new((8, 8))
///     .with_channels(1)
///     .with_filters(4)
///     .with_layers(2)
///     .with_seed(0);
/// let model = PixelCnn::build(config).unwrap();
/// let y = model.forward(&Tensor::zeros(&[2, 8, 8, 1]), None).unwrap();
/// assert_eq!(y.shape(), &[2, 8, 8, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct PixelCnn {
    config: PixelCnnConfig,
    graph: Graph,
}

impl PixelCnn {
    /// Build the model graph from `config`.
    pub fn build(config: PixelCnnConfig) -> Result<Self> {
        let graph = PixelCnnGraphBuilder::new(&config).build()?;
        Ok(Self { config, graph })
    }

    #[must_use]
    pub fn config(&self) -> &PixelCnnConfig {
        &self.config
    }

    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Number of trainable scalars.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.graph.num_parameters()
    }

    /// Single forward pass over `(batch, H, W, C)` images.
    ///
    /// Conditional models need a `(batch, latent_dim)` latent; unconditional
    /// models ignore one if given.
    pub fn forward(&self, image: &Tensor, latent: Option<&Tensor>) -> Result<Tensor> {
        self.graph.forward(image, latent)
    }

    /// Forward pass in chunks of at most `batch_size` examples.
    pub fn predict(
        &self,
        images: &Tensor,
        latents: Option<&Tensor>,
        batch_size: usize,
    ) -> Result<Tensor> {
        if batch_size == 0 {
            return Err(PixelCnnError::invalid_config("batch_size", 0, "> 0"));
        }
        if images.ndim() != 4 || images.batch_size() == 0 {
            return Err(PixelCnnError::InvalidInput(format!(
                "images must be a non-empty (batch, H, W, C) tensor, got {:?}",
                images.shape()
            )));
        }
        let total = images.batch_size();

        let latents = if self.graph.is_conditional() {
            match latents {
                Some(l) if l.ndim() == 2 && l.batch_size() == total => Some(l),
                Some(l) => {
                    return Err(PixelCnnError::InvalidInput(format!(
                        "latents must be ({total}, {}), got {:?}",
                        self.config.latent_dim,
                        l.shape()
                    )))
                }
                None => return Err(PixelCnnError::MissingLatent("predict".to_string())),
            }
        } else {
            None
        };

        let mut outputs = Vec::with_capacity(total.div_ceil(batch_size));
        let mut start = 0;
        while start < total {
            let end = (start + batch_size).min(total);
            let chunk_latent = latents.map(|l| l.slice_batch(start, end));
            outputs.push(
                self.graph
                    .forward(&images.slice_batch(start, end), chunk_latent.as_ref())?,
            );
            start = end;
        }
        Ok(Tensor::concat_batch(&outputs))
    }

    /// Save all parameters (weights only) as a SafeTensors file.
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let state = self.graph.state_dict();
        save_safetensors(path.as_ref(), &state)?;
        info!(path = %path.as_ref().display(), tensors = state.len(), "saved weights");
        Ok(())
    }

    /// Load parameters saved by [`PixelCnn::save_weights`].
    ///
    /// The file must match this model's architecture exactly; on error the
    /// current parameters are kept.
    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let state = load_safetensors(path.as_ref())?;
        self.graph.load_state_dict(&state)?;
        info!(path = %path.as_ref().display(), tensors = state.len(), "loaded weights");
        Ok(())
    }

    /// Parameter-free description of every node.
    #[must_use]
    pub fn describe(&self) -> GraphDescription {
        let nodes = self.graph.nodes();
        GraphDescription {
            config: self.config.clone(),
            nodes: nodes
                .iter()
                .map(|node| NodeDescription {
                    name: node.name(),
                    op: node.op.spec(),
                    inputs: node.inputs.iter().map(|r| nodes[r.index()].name()).collect(),
                    output_shape: node.shape.clone(),
                })
                .collect(),
        }
    }

    /// Architecture as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.describe())?)
    }

    /// Architecture as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.describe())?)
    }

    /// Write [`PixelCnn::to_json`] to `dir/pixelcnn_model.json`.
    pub fn export_to_json<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(JSON_EXPORT_FILE);
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    /// Write [`PixelCnn::to_yaml`] to `dir/pixelcnn_model.yml`.
    pub fn export_to_yaml<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(YAML_EXPORT_FILE);
        fs::write(&path, self.to_yaml()?)?;
        Ok(path)
    }
}

/// Exported architecture: configuration plus every named node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub config: PixelCnnConfig,
    pub nodes: Vec<NodeDescription>,
}

/// One node of a [`GraphDescription`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    pub op: OpSpec,
    /// Names of the producer nodes
    pub inputs: Vec<String>,
    /// Per-example output shape (batch axis excluded)
    pub output_shape: Vec<usize>,
}
