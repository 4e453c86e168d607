//! Training-side data surface.
//!
//! The training loop lives outside this crate. This module gives it the
//! pieces it needs to drive a [`crate::pixelcnn::PixelCnn`]: fit options
//! and a batch iterator over in-memory examples that can stand in for a
//! generator of batches.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{PixelCnnError, Result};
use crate::tensor::Tensor;

/// Options an external training loop consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Examples per gradient step
    pub batch_size: usize,
    /// Passes over the data
    pub epochs: usize,
    /// Shuffle example order every epoch
    pub shuffle: bool,
    /// Cap on batches per epoch (generator-style training)
    pub steps_per_epoch: Option<usize>,
    /// Shuffle seed (None = entropy)
    pub seed: Option<u64>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            epochs: 1,
            shuffle: true,
            steps_per_epoch: None,
            seed: None,
        }
    }
}

impl FitOptions {
    #[must_use]
    pub fn new(batch_size: usize, epochs: usize) -> Self {
        Self {
            batch_size,
            epochs,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn with_steps_per_epoch(mut self, steps: usize) -> Self {
        self.steps_per_epoch = Some(steps);
        self
    }

    /// Set a seed for reproducible shuffling (implies shuffling).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.shuffle = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PixelCnnError::invalid_config("batch_size", 0, "> 0"));
        }
        if self.epochs == 0 {
            return Err(PixelCnnError::invalid_config("epochs", 0, "> 0"));
        }
        if self.steps_per_epoch == Some(0) {
            return Err(PixelCnnError::invalid_config("steps_per_epoch", 0, "> 0"));
        }
        Ok(())
    }
}

/// In-memory training examples: inputs, targets and optional latents,
/// all sharing the leading batch axis.
#[derive(Debug, Clone)]
pub struct Dataset {
    inputs: Tensor,
    targets: Tensor,
    latents: Option<Tensor>,
}

impl Dataset {
    pub fn new(inputs: Tensor, targets: Tensor, latents: Option<Tensor>) -> Result<Self> {
        let n = inputs.batch_size();
        if n == 0 {
            return Err(PixelCnnError::InvalidInput("empty dataset".to_string()));
        }
        if targets.batch_size() != n {
            return Err(PixelCnnError::InvalidInput(format!(
                "targets hold {} examples, inputs {n}",
                targets.batch_size()
            )));
        }
        if let Some(l) = &latents {
            if l.batch_size() != n {
                return Err(PixelCnnError::InvalidInput(format!(
                    "latents hold {} examples, inputs {n}",
                    l.batch_size()
                )));
            }
        }
        Ok(Self {
            inputs,
            targets,
            latents,
        })
    }

    /// Number of examples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.batch_size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Batches of one epoch.
    ///
    /// With a seed, epoch `e` is shuffled with `seed + e` so every epoch
    /// gets a different but reproducible order.
    pub fn batches(&self, options: &FitOptions, epoch: usize) -> Result<Batches<'_>> {
        options.validate()?;
        let mut order: Vec<usize> = (0..self.len()).collect();
        if options.shuffle {
            let mut rng = match options.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(epoch as u64)),
                None => StdRng::from_entropy(),
            };
            order.shuffle(&mut rng);
        }

        let available = self.len().div_ceil(options.batch_size);
        Ok(Batches {
            dataset: self,
            order,
            batch_size: options.batch_size,
            position: 0,
            remaining: options.steps_per_epoch.map_or(available, |s| s.min(available)),
        })
    }
}

/// One batch of examples.
#[derive(Debug, Clone)]
pub struct Batch {
    pub inputs: Tensor,
    pub targets: Tensor,
    pub latents: Option<Tensor>,
}

/// Iterator over the batches of one epoch.
#[derive(Debug)]
pub struct Batches<'a> {
    dataset: &'a Dataset,
    order: Vec<usize>,
    batch_size: usize,
    position: usize,
    remaining: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.remaining == 0 || self.position >= self.order.len() {
            return None;
        }
        let end = (self.position + self.batch_size).min(self.order.len());
        let indices = &self.order[self.position..end];
        self.position = end;
        self.remaining -= 1;

        Some(Batch {
            inputs: self.dataset.inputs.select_batch(indices),
            targets: self.dataset.targets.select_batch(indices),
            latents: self.dataset.latents.as_ref().map(|l| l.select_batch(indices)),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}
