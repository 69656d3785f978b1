//! Error types for message-passing network operations.
//!
//! Every failure is either a configuration problem caught at construction
//! or a malformed input graph caught at the start of a forward pass.

use thiserror::Error;

/// Result type alias for fallible crate operations.
pub type Result<T> = std::result::Result<T, MpnError>;

/// Main error type for model construction and inference.
///
/// # Examples
///
/// ```
/// use mot_mpn::error::MpnError;
///
/// let err = MpnError::DimensionMismatch {
///     expected: "[6, 16]".to_string(),
///     actual: "[6, 12]".to_string(),
/// };
/// assert!(err.to_string().contains("dimension mismatch"));
/// ```
#[derive(Error, Debug)]
pub enum MpnError {
    /// Tensor or network widths don't line up.
    #[error("Tensor dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter value provided.
    #[error("Invalid hyperparameter: {param} = {value}, expected {constraint}")]
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Edge endpoint refers to a node that does not exist.
    #[error("Edge {edge} references node {index}, but graph has {num_nodes} nodes")]
    IndexOutOfRange {
        /// Position of the offending edge
        edge: usize,
        /// Offending endpoint index
        index: usize,
        /// Number of nodes in the graph
        num_nodes: usize,
    },

    /// Graph carries image crops but the model has no appearance encoder.
    #[error("Node input is image crops but no appearance encoder is attached")]
    MissingAppearanceEncoder,

    /// Appearance encoder reported a failure.
    #[error("Appearance encoder failed: {0}")]
    Appearance(String),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MpnError {
    /// Shorthand for a [`MpnError::InvalidHyperparameter`].
    pub(crate) fn hyperparameter(
        param: impl Into<String>,
        value: impl std::fmt::Display,
        constraint: impl Into<String>,
    ) -> Self {
        MpnError::InvalidHyperparameter {
            param: param.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }
}
