//! # The Run Pipeline
//!
//! One call, three passes: order the graph, evaluate it forward, then
//! propagate gradients back. Nothing is cached between calls, so the report
//! always describes the graph exactly as it stands.

use chainrule_core::{topological_order, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::backward::{propagate, EdgeGradient};
use crate::error::DiffError;
use crate::forward::{evaluate, Bindings, ComputeGraph};

/// Everything a view needs to draw one evaluated graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Evaluation order
    pub order: Vec<NodeId>,
    /// Forward value per node
    pub values: BTreeMap<NodeId, f64>,
    /// ∂sink/∂node per node
    pub gradients: BTreeMap<NodeId, f64>,
    /// Per-wire gradients
    pub edges: Vec<EdgeGradient>,
    /// The node gradients are taken with respect to; `None` for an empty graph
    pub sink: Option<NodeId>,
}

impl RunReport {
    /// Value of the sink, if there is one.
    pub fn sink_value(&self) -> Option<f64> {
        self.sink.and_then(|s| self.values.get(&s).copied())
    }
}

impl ComputeGraph {
    /// Order, evaluate and differentiate with respect to the last node.
    pub fn run(&self, bindings: &Bindings) -> Result<RunReport, DiffError> {
        self.run_with_sink(bindings, None)
    }

    /// Like [`ComputeGraph::run`], but differentiates `sink` when given.
    pub fn run_with_sink(
        &self,
        bindings: &Bindings,
        sink: Option<NodeId>,
    ) -> Result<RunReport, DiffError> {
        let diagram = self.diagram();
        let order = topological_order(diagram)?;
        let values = evaluate(diagram, &order, bindings)?;
        let gradients = propagate(diagram, &order, &values, sink)?;
        let sink = sink.or_else(|| order.last().copied());

        log::debug!(
            "run: {} nodes, {} wires, sink {:?}",
            order.len(),
            gradients.edges.len(),
            sink
        );

        Ok(RunReport {
            order,
            values,
            gradients: gradients.nodes,
            edges: gradients.edges,
            sink,
        })
    }

    /// Forward values only; used where gradients would be wasted work.
    pub fn forward(&self, bindings: &Bindings) -> Result<BTreeMap<NodeId, f64>, DiffError> {
        let order = topological_order(self.diagram())?;
        evaluate(self.diagram(), &order, bindings)
    }
}
