//! # Backward Pass - Reverse-Mode Autodiff
//!
//! Gradients flow against the wires. Seed the sink with 1, walk the forward
//! order backwards, and for every input slot of every node push
//! `g(node) · ∂node/∂input` into that input's running total.
//!
//! The push is an addition, never an assignment: a node read by several
//! consumers collects one contribution from each. That sum is the
//! multivariate chain rule, and it is what makes `z = x² + sin(x)` give
//! `dz/dx = 2x + cos(x)`.
//!
//! ## Example
//!
//! ```rust
//! use chainrule_diff::backward::propagate;
//! use chainrule_diff::forward::{evaluate, ComputeGraph};
//! use chainrule_core::topological_order;
//! use std::collections::HashMap;
//!
//! // z = x² + sin(x)
//! let mut graph = ComputeGraph::new();
//! let x = graph.input("x");
//! let sq = graph.square(x).unwrap();
//! let s = graph.sin(x).unwrap();
//! let z = graph.add(sq, s).unwrap();
//!
//! let order = topological_order(graph.diagram()).unwrap();
//! let values = evaluate(graph.diagram(), &order, &HashMap::from([(x, 0.5)])).unwrap();
//! let grads = propagate(graph.diagram(), &order, &values, None).unwrap();
//!
//! assert_eq!(grads.nodes[&z], 1.0);
//! assert!((grads.nodes[&x] - (2.0 * 0.5 + 0.5f64.cos())).abs() < 1e-12);
//! ```

use chainrule_core::{CoreError, Diagram, NodeId, Operation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DiffError;
use crate::forward::{gather_inputs, ForwardValues};
use crate::ops::Op;

/// Gradient carried along one wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeGradient {
    pub from: NodeId,
    pub to: NodeId,
    /// Input slot on `to`
    pub slot: usize,
    /// ∂to/∂from at the current values
    pub local: f64,
    /// g(to) · local, the amount added into g(from)
    pub contribution: f64,
}

/// Result of one backward pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gradients {
    /// ∂sink/∂node for every node in the order
    pub nodes: BTreeMap<NodeId, f64>,
    /// One entry per wire, sorted by consumer then slot
    pub edges: Vec<EdgeGradient>,
}

/// Perform the backward pass.
///
/// # Arguments
///
/// * `diagram` - The computation graph
/// * `order` - Topological order used for the forward pass
/// * `values` - Forward values for every node in `order`
/// * `sink` - Node to differentiate; `None` means the last node in `order`
///
/// Nodes with no path to the sink end with gradient 0.
pub fn propagate(
    diagram: &Diagram<Op>,
    order: &[NodeId],
    values: &ForwardValues,
    sink: Option<NodeId>,
) -> Result<Gradients, DiffError> {
    let sink = match sink.or_else(|| order.last().copied()) {
        Some(sink) => sink,
        None => return Ok(Gradients::default()),
    };
    if !diagram.contains(sink) {
        return Err(CoreError::UnknownNode(sink).into());
    }

    let mut nodes: BTreeMap<NodeId, f64> = order.iter().map(|&id| (id, 0.0)).collect();
    nodes.insert(sink, 1.0);
    let mut edges = Vec::with_capacity(diagram.edge_count());

    for &id in order.iter().rev() {
        let op = diagram.op(id).ok_or(CoreError::UnknownNode(id))?;
        if op.is_source() {
            continue;
        }
        let g = nodes.get(&id).copied().unwrap_or(0.0);
        let (input_ids, input_values) = gather_inputs(diagram, id, values)?;

        for (slot, &input) in input_ids.iter().enumerate() {
            let local = op.local_grad(&input_values, slot);
            let contribution = g * local;
            *nodes.entry(input).or_insert(0.0) += contribution;
            edges.push(EdgeGradient {
                from: input,
                to: id,
                slot,
                local,
                contribution,
            });
        }
        log::trace!("{} [{}] grad {} pushed to {:?}", id, op, g, input_ids);
    }

    edges.sort_by_key(|e| (e.to, e.slot));
    Ok(Gradients { nodes, edges })
}
