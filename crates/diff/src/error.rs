//! Error types for evaluation and differentiation.

use chainrule_core::{CoreError, NodeId};
use thiserror::Error;

/// Errors that can occur while running a computation graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiffError {
    /// The graph itself is malformed (arity, unknown id, cycle).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A source node has no value for this evaluation.
    #[error("No value bound for source node {0}")]
    MissingBinding(NodeId),

    /// The supplied order puts a node before one of its inputs.
    #[error("Node {node} is ordered before its input {input}")]
    OutOfOrder { node: NodeId, input: NodeId },

    /// Analytical and numerical gradients disagree.
    #[error("Gradient mismatch at {node}: analytical={analytical}, numerical={numerical}")]
    GradientMismatch {
        node: NodeId,
        analytical: f64,
        numerical: f64,
    },

    /// A configuration value is out of range or failed to parse.
    #[error("Invalid config {key}: {message}")]
    Config { key: String, message: String },
}
