//! Error types for PixelCNN graph construction and evaluation.
//!
//! Every error is raised synchronously: configuration and shape problems
//! surface while the graph is being built, never on the first forward pass.

use thiserror::Error;

/// Main error type for PixelCNN operations.
///
/// # Examples
///
/// ```
/// use pixelcnn::error::PixelCnnError;
///
/// let err = PixelCnnError::shape_mismatch("h_merge_feed_0", &[8, 8, 8], &[8, 9, 8]);
/// assert!(err.to_string().contains("shape mismatch"));
/// ```
#[derive(Debug, Error)]
pub enum PixelCnnError {
    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {param} = {value}, expected {constraint}")]
    InvalidConfig {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// A stack name other than vertical/horizontal was requested.
    #[error("Unknown stack kind: {0:?} (expected \"vertical\" or \"horizontal\")")]
    UnknownStack(String),

    /// Kernel dimensions must be odd and non-zero.
    #[error("Invalid kernel size ({height}, {width}): {reason}")]
    InvalidKernel {
        /// Kernel height
        height: usize,
        /// Kernel width
        width: usize,
        /// Why the kernel was rejected
        reason: String,
    },

    /// Two operands of a merge (or an operator and its input) disagree in shape.
    #[error("{context}: shape mismatch, expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Node or operation where the mismatch was found
        context: String,
        /// Expected shape description
        expected: String,
        /// Actual shape description
        actual: String,
    },

    /// The model is conditional but no latent vector was supplied.
    #[error("Conditional model requires a latent vector: {0}")]
    MissingLatent(String),

    /// Input tensor rejected before evaluation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Weight file is corrupt or incompatible with the built graph.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// JSON/YAML encoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PixelCnnError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(param: &str, value: impl ToString, constraint: &str) -> Self {
        Self::InvalidConfig {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create a shape mismatch error from two shapes.
    #[must_use]
    pub fn shape_mismatch(context: &str, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.to_string(),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}

impl From<serde_json::Error> for PixelCnnError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PixelCnnError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, PixelCnnError>;
