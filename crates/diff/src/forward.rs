//! # Forward Evaluation
//!
//! This module implements forward evaluation of computation graphs: the
//! deterministic map `(graph, bindings) → value of every node`.
//!
//! ## Key Concepts
//!
//! - **Topological order**: Process nodes so inputs are computed first
//! - **Bindings**: Values for `Input`/`Parameter` nodes, supplied per run
//! - **Value map**: One scalar per node, rebuilt from scratch on every call
//!
//! ## Example
//!
//! ```rust
//! use chainrule_diff::forward::{evaluate, ComputeGraph};
//! use chainrule_core::topological_order;
//! use std::collections::HashMap;
//!
//! // Build: y = sin(x²)
//! let mut graph = ComputeGraph::new();
//! let x = graph.input("x");
//! let sq = graph.square(x).unwrap();
//! let y = graph.sin(sq).unwrap();
//!
//! let order = topological_order(graph.diagram()).unwrap();
//! let values = evaluate(graph.diagram(), &order, &HashMap::from([(x, 2.0)])).unwrap();
//! assert_eq!(values[&sq], 4.0);
//! assert_eq!(values[&y], 4.0f64.sin());
//! ```

use chainrule_core::{would_create_cycle, CoreError, Diagram, NodeId, Operation};
use std::collections::{BTreeMap, HashMap};

use crate::config::EngineConfig;
use crate::error::DiffError;
use crate::ops::Op;
use crate::optim::is_trainable;

/// Values for source nodes, keyed by node id.
pub type Bindings = HashMap<NodeId, f64>;

/// Value of every evaluated node.
pub type ForwardValues = BTreeMap<NodeId, f64>;

/// A scalar computation graph a learner edits.
///
/// Wraps `Diagram<Op>` with builder methods and an edit-time cycle guard.
#[derive(Debug, Clone, Default)]
pub struct ComputeGraph {
    diagram: Diagram<Op>,
    config: EngineConfig,
}

impl ComputeGraph {
    /// Create a new empty computation graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph whose builders use `config`.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            diagram: Diagram::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying store.
    pub fn diagram(&self) -> &Diagram<Op> {
        &self.diagram
    }

    /// Insert a node, wired to `inputs` or left unwired when `inputs` is empty.
    pub fn insert_node(&mut self, op: Op, inputs: &[NodeId]) -> Result<NodeId, CoreError> {
        self.diagram.insert_node(op, inputs)
    }

    /// Append `from` to `to`'s inputs, refusing edges that would close a cycle.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), CoreError> {
        if would_create_cycle(&self.diagram, from, to)? {
            log::debug!("refusing {} -> {}: would close a cycle", from, to);
            return Err(CoreError::CyclicGraph {
                nodes: vec![from, to],
            });
        }
        self.diagram.connect(from, to)
    }

    /// Remove a node and every wire touching it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), CoreError> {
        self.diagram.delete_node(id).map(|_| ())
    }

    /// Remove one wire from `from` into `to`.
    pub fn delete_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), CoreError> {
        self.diagram.delete_edge(from, to)
    }

    /// Add a data input, e.g. `x`.
    pub fn input(&mut self, name: impl Into<String>) -> NodeId {
        self.source(Op::Input { name: name.into() })
    }

    /// Add a learnable parameter, e.g. `w`.
    pub fn param(&mut self, name: impl Into<String>) -> NodeId {
        self.source(Op::Parameter { name: name.into() })
    }

    /// Add an output marker reading `x`.
    pub fn output(&mut self, x: NodeId) -> Result<NodeId, CoreError> {
        self.insert_node(Op::Output, &[x])
    }

    /// Add a squaring node: x²
    pub fn square(&mut self, x: NodeId) -> Result<NodeId, CoreError> {
        self.insert_node(Op::Square, &[x])
    }

    /// Add a sine node.
    pub fn sin(&mut self, x: NodeId) -> Result<NodeId, CoreError> {
        self.insert_node(Op::Sine, &[x])
    }

    /// Add an exponential node, clamped at the configured ceiling.
    pub fn exp(&mut self, x: NodeId) -> Result<NodeId, CoreError> {
        let clamp = self.config.exp_clamp;
        self.insert_node(Op::Exp { clamp }, &[x])
    }

    /// Add an affine node: m·x + b
    pub fn linear(&mut self, x: NodeId, m: f64, b: f64) -> Result<NodeId, CoreError> {
        self.insert_node(Op::Linear { m, b }, &[x])
    }

    /// Add a fourth-power node: x⁴
    pub fn pow4(&mut self, x: NodeId) -> Result<NodeId, CoreError> {
        self.insert_node(Op::Power4, &[x])
    }

    /// Add an addition node: a + b
    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CoreError> {
        self.insert_node(Op::Add, &[a, b])
    }

    /// Add a subtraction node: a − b
    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CoreError> {
        self.insert_node(Op::Sub, &[a, b])
    }

    /// Add a multiplication node: a · b
    pub fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CoreError> {
        self.insert_node(Op::Mul, &[a, b])
    }

    /// Source nodes whose op is `Parameter`, in creation order.
    pub fn parameters(&self) -> Vec<NodeId> {
        self.diagram
            .node_ids()
            .filter(|&id| self.diagram.op(id).is_some_and(is_trainable))
            .collect()
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.diagram.node_count()
    }

    /// Number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.diagram.edge_count()
    }

    fn source(&mut self, op: Op) -> NodeId {
        self.diagram
            .insert_node(op, &[])
            .expect("source nodes take no inputs")
    }
}

/// Adopt a diagram built elsewhere. Its wiring is taken as is, so any cycle
/// it already contains surfaces when the graph is run.
impl From<Diagram<Op>> for ComputeGraph {
    fn from(diagram: Diagram<Op>) -> Self {
        Self {
            diagram,
            config: EngineConfig::default(),
        }
    }
}

/// Compute every node's value, visiting nodes in `order`.
///
/// Sources read `bindings`; every other node applies its op to the values
/// of its inputs, which `order` must place earlier.
pub fn evaluate(
    diagram: &Diagram<Op>,
    order: &[NodeId],
    bindings: &Bindings,
) -> Result<ForwardValues, DiffError> {
    let mut values = ForwardValues::new();

    for &id in order {
        let op = diagram.op(id).ok_or(CoreError::UnknownNode(id))?;
        let value = if op.is_source() {
            *bindings.get(&id).ok_or(DiffError::MissingBinding(id))?
        } else {
            let (_, inputs) = gather_inputs(diagram, id, &values)?;
            op.forward(&inputs)
        };
        log::trace!("{} [{}] = {}", id, op, value);
        values.insert(id, value);
    }

    Ok(values)
}

/// Ordered input ids of a compute node and their values.
///
/// Fails if the node is not fully wired or an input has no value yet.
pub(crate) fn gather_inputs(
    diagram: &Diagram<Op>,
    id: NodeId,
    values: &ForwardValues,
) -> Result<(Vec<NodeId>, Vec<f64>), DiffError> {
    let op = diagram.op(id).ok_or(CoreError::UnknownNode(id))?;
    let ids = diagram.inputs(id)?;
    if ids.len() != op.arity() {
        return Err(CoreError::ArityMismatch {
            node: Some(id),
            op: op.to_string(),
            expected: op.arity(),
            got: ids.len(),
        }
        .into());
    }

    let inputs = ids
        .iter()
        .map(|input| {
            values
                .get(input)
                .copied()
                .ok_or(DiffError::OutOfOrder { node: id, input: *input })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((ids, inputs))
}
