//! # Diagrams - Graph Store
//!
//! A diagram is a program: boxes (operations) connected by wires (data flow).
//! The diagram owns its nodes and is the only thing allowed to mutate them.
//!
//! ## Key Concepts
//!
//! - **NodeId**: A handle issued by one diagram, never reused after deletion
//! - **Node**: An operation plus its identity
//! - **Edge**: A wire from a producer into one input slot of a consumer
//!
//! A node's ordered input list is not stored on the node. It is derived from
//! the incoming edges sorted by slot, so the list and the edge set can never
//! disagree.
//!
//! ## Example
//!
//! ```rust
//! use chainrule_core::{Diagram, Operation};
//! use std::fmt;
//!
//! #[derive(Debug, Clone)]
//! enum Op { Leaf, Neg }
//!
//! impl fmt::Display for Op {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl Operation for Op {
//!     fn arity(&self) -> usize {
//!         match self { Op::Leaf => 0, Op::Neg => 1 }
//!     }
//! }
//!
//! let mut diagram = Diagram::new();
//! let x = diagram.insert_node(Op::Leaf, &[]).unwrap();
//! let y = diagram.insert_node(Op::Neg, &[]).unwrap();
//! diagram.connect(x, y).unwrap();
//! assert_eq!(diagram.inputs(y).unwrap(), vec![x]);
//! ```

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;

/// What the store needs to know about an operation.
///
/// Domains define their own operation enums; the store only validates wiring.
pub trait Operation: fmt::Display {
    /// Number of inputs a fully wired node of this kind takes.
    fn arity(&self) -> usize;

    /// Sources take their value from outside the graph.
    fn is_source(&self) -> bool {
        self.arity() == 0
    }
}

/// Identity of a node within one diagram.
///
/// Ids increase in creation order, so sorting by id is sorting by age.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A node in the diagram, parameterized by operation type.
#[derive(Debug, Clone)]
pub struct Node<O> {
    /// Identity issued by the owning diagram
    pub id: NodeId,
    /// The operation this node performs
    pub op: O,
}

/// An edge feeds the source node's value into input `slot` of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub slot: usize,
}

/// A wire as seen from outside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub from: NodeId,
    pub to: NodeId,
    pub slot: usize,
}

/// A directed graph of operations with stable, never-reused node ids.
#[derive(Debug, Clone)]
pub struct Diagram<O> {
    graph: StableDiGraph<Node<O>, Edge>,
    /// Creation-ordered id lookup
    index: BTreeMap<NodeId, NodeIndex>,
    next_id: u64,
}

impl<O: Operation> Diagram<O> {
    /// Create a new empty diagram.
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            index: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Insert a node wired to `inputs` in slot order.
    ///
    /// `inputs` must hold exactly `op.arity()` ids, or be empty for a node
    /// that will be wired later with [`Diagram::connect`].
    pub fn insert_node(&mut self, op: O, inputs: &[NodeId]) -> Result<NodeId, CoreError> {
        let arity = op.arity();
        if !inputs.is_empty() && inputs.len() != arity {
            return Err(CoreError::ArityMismatch {
                node: None,
                op: op.to_string(),
                expected: arity,
                got: inputs.len(),
            });
        }
        let sources = inputs
            .iter()
            .map(|&id| self.index_of(id))
            .collect::<Result<Vec<_>, _>>()?;

        let id = NodeId(self.next_id);
        self.next_id += 1;

        log::debug!("insert {} as {} with inputs {:?}", op, id, inputs);
        let idx = self.graph.add_node(Node { id, op });
        for (slot, source) in sources.into_iter().enumerate() {
            self.graph.add_edge(source, idx, Edge { slot });
        }
        self.index.insert(id, idx);
        Ok(id)
    }

    /// Append `from` to the end of `to`'s input list.
    ///
    /// Does not look for cycles; see [`crate::order::would_create_cycle`].
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), CoreError> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;

        let arity = self.graph[to_idx].op.arity();
        let wired = self.graph.edges_directed(to_idx, Direction::Incoming).count();
        if wired >= arity {
            return Err(CoreError::ArityExceeded { node: to, arity });
        }

        log::debug!("connect {} -> {} slot {}", from, to, wired);
        self.graph.add_edge(from_idx, to_idx, Edge { slot: wired });
        Ok(())
    }

    /// Remove a node and every wire touching it.
    ///
    /// Consumers lose that input; their later inputs move down one slot.
    pub fn delete_node(&mut self, id: NodeId) -> Result<Node<O>, CoreError> {
        let idx = self.index_of(id)?;

        let mut consumers: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        consumers.sort();
        consumers.dedup();

        for consumer in consumers {
            let remaining: Vec<NodeIndex> = self
                .ordered_sources(consumer)
                .into_iter()
                .filter(|&s| s != idx)
                .collect();
            self.rewire(consumer, &remaining);
        }

        self.index.remove(&id);
        log::debug!("delete node {}", id);
        // Only the node's own incoming edges remain, and remove_node drops them.
        self.graph
            .remove_node(idx)
            .ok_or(CoreError::UnknownNode(id))
    }

    /// Remove the first occurrence of `from` in `to`'s input list.
    pub fn delete_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), CoreError> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;

        let mut sources = self.ordered_sources(to_idx);
        let position = sources
            .iter()
            .position(|&s| s == from_idx)
            .ok_or(CoreError::EdgeNotFound { from, to })?;
        sources.remove(position);

        log::debug!("delete edge {} -> {} (slot {})", from, to, position);
        self.rewire(to_idx, &sources);
        Ok(())
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node<O>> {
        self.index.get(&id).map(|&idx| &self.graph[idx])
    }

    /// Look up a node's operation by id.
    pub fn op(&self, id: NodeId) -> Option<&O> {
        self.node(id).map(|n| &n.op)
    }

    /// Ordered input list of a node.
    pub fn inputs(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        let idx = self.index_of(id)?;
        Ok(self
            .ordered_sources(idx)
            .into_iter()
            .map(|s| self.graph[s].id)
            .collect())
    }

    /// Distinct nodes that read from `id`, in creation order.
    pub fn consumers(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        let idx = self.index_of(id)?;
        let mut out: Vec<NodeId> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| self.graph[e.target()].id)
            .collect();
        out.sort();
        out.dedup();
        Ok(out)
    }

    /// Every wire, grouped by consumer in creation order, then by slot.
    pub fn wires(&self) -> Vec<Wire> {
        let mut out = Vec::with_capacity(self.graph.edge_count());
        for (&to, &idx) in &self.index {
            for (slot, source) in self.ordered_sources(idx).into_iter().enumerate() {
                out.push(Wire {
                    from: self.graph[source].id,
                    to,
                    slot,
                });
            }
        }
        out
    }

    /// Node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.index.keys().copied()
    }

    /// True if the node has exactly as many inputs as its operation takes.
    pub fn is_wired(&self, id: NodeId) -> Result<bool, CoreError> {
        let idx = self.index_of(id)?;
        let wired = self.graph.edges_directed(idx, Direction::Incoming).count();
        Ok(wired == self.graph[idx].op.arity())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of nodes in the diagram.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of wires in the diagram.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Read-only view of the underlying petgraph structure.
    pub fn graph(&self) -> &StableDiGraph<Node<O>, Edge> {
        &self.graph
    }

    pub(crate) fn index_of(&self, id: NodeId) -> Result<NodeIndex, CoreError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(CoreError::UnknownNode(id))
    }

    fn ordered_sources(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut incoming: Vec<(usize, NodeIndex)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.weight().slot, e.source()))
            .collect();
        incoming.sort_by_key(|&(slot, _)| slot);
        incoming.into_iter().map(|(_, s)| s).collect()
    }

    /// Replace all incoming edges of `idx` with `sources` in slot order.
    fn rewire(&mut self, idx: NodeIndex, sources: &[NodeIndex]) {
        let old: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.id())
            .collect();
        for edge in old {
            self.graph.remove_edge(edge);
        }
        for (slot, &source) in sources.iter().enumerate() {
            self.graph.add_edge(source, idx, Edge { slot });
        }
    }
}

impl<O: Operation> Default for Diagram<O> {
    fn default() -> Self {
        Self::new()
    }
}
