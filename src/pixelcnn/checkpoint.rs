//! Periodic weight checkpoints for an external training loop.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::model::PixelCnn;
use crate::error::{PixelCnnError, Result};

/// When and where weights are written during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPolicy {
    /// Weight file, overwritten on every save
    pub path: PathBuf,
    /// Epochs between saves
    pub period: usize,
    /// Only save when the monitored score improved (lower is better)
    pub save_best_only: bool,
}

impl CheckpointPolicy {
    /// Save to `path` every 10 epochs.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            period: 10,
            save_best_only: false,
        }
    }

    #[must_use]
    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub fn with_save_best_only(mut self, save_best_only: bool) -> Self {
        self.save_best_only = save_best_only;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.period == 0 {
            return Err(PixelCnnError::invalid_config("period", 0, ">= 1"));
        }
        Ok(())
    }
}

/// Applies a [`CheckpointPolicy`] at the end of every epoch.
///
/// # Example
///
/// ```no_run
/// use pixelcnn::pixelcnn::{CheckpointPolicy, Checkpointer, PixelCnn, PixelCnnConfig};
///
/// let model = PixelCnn::build(PixelCnnConfig::new((8, 8)).with_filters(4)).unwrap();
/// let mut checkpointer =
///     Checkpointer::new(CheckpointPolicy::new("weights.safetensors").with_period(2)).unwrap();
/// for epoch in 0..4 {
///     let val_loss = 1.0 / (epoch + 1) as f32;
///     checkpointer.on_epoch_end(&model, epoch, Some(val_loss)).unwrap();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Checkpointer {
    policy: CheckpointPolicy,
    epochs_since_save: usize,
    best: Option<f32>,
}

impl Checkpointer {
    pub fn new(policy: CheckpointPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            epochs_since_save: 0,
            best: None,
        })
    }

    #[must_use]
    pub fn policy(&self) -> &CheckpointPolicy {
        &self.policy
    }

    /// Best score seen at a save point so far.
    #[must_use]
    pub fn best(&self) -> Option<f32> {
        self.best
    }

    /// Notify the end of `epoch` (0-based) with its monitored `score`.
    ///
    /// With `save_best_only`, a missing or non-finite score never counts as
    /// an improvement. Returns whether weights were written.
    pub fn on_epoch_end(
        &mut self,
        model: &PixelCnn,
        epoch: usize,
        score: Option<f32>,
    ) -> Result<bool> {
        self.epochs_since_save += 1;
        if self.epochs_since_save < self.policy.period {
            return Ok(false);
        }
        self.epochs_since_save = 0;

        if self.policy.save_best_only {
            let Some(score) = score else {
                warn!(epoch, "save_best_only requires a monitored score, skipping");
                return Ok(false);
            };
            if !score.is_finite() {
                warn!(epoch, score, "non-finite score never improves, skipping");
                return Ok(false);
            }
            if self.best.is_some_and(|best| score >= best) {
                info!(epoch, score, best = ?self.best, "score did not improve");
                return Ok(false);
            }
            self.best = Some(score);
        }

        model.save_weights(&self.policy.path)?;
        info!(epoch, path = %self.policy.path.display(), "checkpoint written");
        Ok(true)
    }
}
