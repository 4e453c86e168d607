//! PixelCNN hyperparameters.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::activation::ActivationPolicy;
use crate::error::{PixelCnnError, Result};

/// Configuration of a (conditional) PixelCNN.
///
/// # Example
///
/// ```
/// use pixelcnn::pixelcnn::PixelCnnConfig;
///
/// let config = PixelCnnConfig::new((8, 8))
///     .with_channels(1)
///     .with_filters(4)
///     .with_layers(2)
///     .with_seed(0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelCnnConfig {
    /// (height, width) of input images
    pub input_size: (usize, usize),

    /// Channels per pixel (1 for grayscale, 3 for color)
    pub nb_channels: usize,

    /// Model p(x|h) with a latent vector h
    pub conditional: bool,

    /// Dimension of the latent vector (conditional models only)
    pub latent_dim: usize,

    /// Number of PixelCNN layers before the 1×1 head
    pub nb_pixelcnn_layers: usize,

    /// Feature maps per layer
    pub nb_filters: usize,

    /// Gated tanh/sigmoid units instead of ReLU
    pub gated: bool,

    /// Kernel of the first layer
    pub filter_size_1st: (usize, usize),

    /// Kernel of the subsequent layers
    pub filter_size: (usize, usize),

    /// Epochs without improvement before the external trainer stops
    pub es_patience: usize,

    /// Parameter initialization seed (None = entropy)
    pub seed: Option<u64>,
}

impl PixelCnnConfig {
    /// Default configuration for images of the given size.
    #[must_use]
    pub fn new(input_size: (usize, usize)) -> Self {
        Self {
            input_size,
            nb_channels: 3,
            conditional: false,
            latent_dim: 10,
            nb_pixelcnn_layers: 3,
            nb_filters: 128,
            gated: true,
            filter_size_1st: (7, 7),
            filter_size: (3, 3),
            es_patience: 100,
            seed: None,
        }
    }

    /// Set the number of image channels.
    #[must_use]
    pub fn with_channels(mut self, nb_channels: usize) -> Self {
        self.nb_channels = nb_channels;
        self
    }

    /// Make the model conditional on a latent vector of `latent_dim`.
    #[must_use]
    pub fn with_latent(mut self, latent_dim: usize) -> Self {
        self.conditional = true;
        self.latent_dim = latent_dim;
        self
    }

    /// Set the number of PixelCNN layers.
    #[must_use]
    pub fn with_layers(mut self, nb_pixelcnn_layers: usize) -> Self {
        self.nb_pixelcnn_layers = nb_pixelcnn_layers;
        self
    }

    /// Set the number of feature maps per layer.
    #[must_use]
    pub fn with_filters(mut self, nb_filters: usize) -> Self {
        self.nb_filters = nb_filters;
        self
    }

    /// Choose gated (true) or ReLU (false) activation units.
    #[must_use]
    pub fn with_gated(mut self, gated: bool) -> Self {
        self.gated = gated;
        self
    }

    /// Set the first-layer and subsequent kernel sizes.
    #[must_use]
    pub fn with_filter_sizes(mut self, first: (usize, usize), rest: (usize, usize)) -> Self {
        self.filter_size_1st = first;
        self.filter_size = rest;
        self
    }

    /// Fix the parameter initialization seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Activation policy selected by the `gated` flag.
    #[must_use]
    pub fn activation_policy(&self) -> ActivationPolicy {
        if self.gated {
            ActivationPolicy::Gated
        } else {
            ActivationPolicy::Relu
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        let (height, width) = self.input_size;
        if height == 0 || width == 0 {
            return Err(PixelCnnError::invalid_config(
                "input_size",
                format!("({height}, {width})"),
                "both dimensions > 0",
            ));
        }
        for (param, value) in [
            ("nb_channels", self.nb_channels),
            ("nb_pixelcnn_layers", self.nb_pixelcnn_layers),
            ("nb_filters", self.nb_filters),
        ] {
            if value == 0 {
                return Err(PixelCnnError::invalid_config(param, value, "> 0"));
            }
        }
        if self.conditional && self.latent_dim == 0 {
            return Err(PixelCnnError::MissingLatent(
                "conditional model declared with latent_dim = 0".to_string(),
            ));
        }

        validate_kernel(self.filter_size_1st)?;
        validate_kernel(self.filter_size)?;
        if self.filter_size_1st.1 < 3 {
            let (h, w) = self.filter_size_1st;
            return Err(PixelCnnError::InvalidKernel {
                height: h,
                width: w,
                reason: "first-layer width must be >= 3 so the mask A kernel is non-empty"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Write the parameter report to `dir/parameters.txt`.
    pub fn export_parameters<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join("parameters.txt");
        fs::write(&path, format!("{self}\n"))?;
        Ok(path)
    }
}

/// Kernel dimensions must be odd and non-zero so that `k / 2` splits the
/// kernel symmetrically around its center.
pub fn validate_kernel((height, width): (usize, usize)) -> Result<()> {
    if height % 2 == 0 || width % 2 == 0 {
        return Err(PixelCnnError::InvalidKernel {
            height,
            width,
            reason: "dimensions must be odd and >= 1".to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for PixelCnnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "########## PixelCNN options ##########")?;
        writeln!(f, "input_size\t: {:?}", self.input_size)?;
        writeln!(f, "nb_pixelcnn_layers: {}", self.nb_pixelcnn_layers)?;
        writeln!(f, "nb_filters\t: {}", self.nb_filters)?;
        writeln!(f, "filter_size_1st\t: {:?}", self.filter_size_1st)?;
        writeln!(f, "filter_size\t: {:?}", self.filter_size)?;
        writeln!(f, "conditional\t: {}", self.conditional)?;
        if self.conditional {
            writeln!(f, "latent_dim\t: {}", self.latent_dim)?;
        }
        writeln!(f, "nb_channels\t: {}", self.nb_channels)?;
        writeln!(f, "gated\t\t: {}", self.gated)?;
        write!(f, "es_patience\t: {}", self.es_patience)
    }
}
