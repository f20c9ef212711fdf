//! # Error Types
//!
//! Errors here are structural: they describe a graph that cannot be wired or
//! ordered the way the caller asked. Every failing operation leaves the
//! diagram exactly as it was before the call.

use thiserror::Error;

use crate::diagram::NodeId;

/// Core errors for graph construction and ordering.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A node has a number of inputs its operation can't take.
    ///
    /// `node` is `None` when the node was rejected before it got an id.
    #[error("Arity mismatch on {op}: expected {expected} inputs, got {got}")]
    ArityMismatch {
        node: Option<NodeId>,
        op: String,
        expected: usize,
        got: usize,
    },

    /// Connecting another input to a node whose input list is already full.
    #[error("Node {node} already has all {arity} of its inputs")]
    ArityExceeded { node: NodeId, arity: usize },

    /// The id doesn't name a node in this diagram.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// No edge runs from `from` into `to`.
    #[error("No edge from {from} to {to}")]
    EdgeNotFound { from: NodeId, to: NodeId },

    /// The graph contains a cycle. `nodes` are the ones left unordered.
    #[error("Graph contains a cycle through {} node(s): {}", nodes.len(), format_ids(nodes))]
    CyclicGraph { nodes: Vec<NodeId> },
}

fn format_ids(nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
