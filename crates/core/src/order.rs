//! # Topological Ordering
//!
//! Kahn's algorithm over a [`Diagram`]. Among nodes that are ready at the
//! same time, the one created first goes first, so the same diagram always
//! produces the same order.
//!
//! Cycles are found here, lazily, rather than at mutation time: if the
//! algorithm stalls before every node is placed, the leftovers are reported
//! as [`CoreError::CyclicGraph`].

use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

use crate::diagram::{Diagram, NodeId, Operation};
use crate::error::CoreError;

/// Order nodes so every node comes after all of its inputs.
pub fn topological_order<O: Operation>(diagram: &Diagram<O>) -> Result<Vec<NodeId>, CoreError> {
    let graph = diagram.graph();
    let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
    let mut ready: BTreeSet<NodeId> = BTreeSet::new();
    let mut order: Vec<NodeId> = Vec::with_capacity(diagram.node_count());

    // Parallel edges count once each, matching the decrements below.
    for id in diagram.node_ids() {
        let idx = diagram.index_of(id)?;
        let degree = graph.edges_directed(idx, Direction::Incoming).count();
        in_degree.insert(idx, degree);
        if degree == 0 {
            ready.insert(id);
        }
    }

    while let Some(id) = ready.pop_first() {
        order.push(id);
        let idx = diagram.index_of(id)?;
        for edge in graph.edges_directed(idx, Direction::Outgoing) {
            let target = edge.target();
            if let Some(deg) = in_degree.get_mut(&target) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(graph[target].id);
                }
            }
        }
    }

    if order.len() < diagram.node_count() {
        let placed: BTreeSet<NodeId> = order.iter().copied().collect();
        let nodes: Vec<NodeId> = diagram
            .node_ids()
            .filter(|id| !placed.contains(id))
            .collect();
        log::debug!("ordering stalled; {} node(s) on or behind a cycle", nodes.len());
        return Err(CoreError::CyclicGraph { nodes });
    }

    Ok(order)
}

/// Would wiring `from` into `to` close a cycle?
///
/// True when the two are the same node, or when `to` already reaches `from`.
pub fn would_create_cycle<O: Operation>(
    diagram: &Diagram<O>,
    from: NodeId,
    to: NodeId,
) -> Result<bool, CoreError> {
    let from_idx = diagram.index_of(from)?;
    let to_idx = diagram.index_of(to)?;
    if from_idx == to_idx {
        return Ok(true);
    }
    Ok(has_path_connecting(diagram.graph(), to_idx, from_idx, None))
}
