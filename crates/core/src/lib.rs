//! # Core - Computation Graph Store
//!
//! This crate provides the structural half of the chain-rule engine:
//!
//! - **Diagrams**: An arena-backed graph store with ordered input slots
//! - **Ordering**: Kahn's topological sort and an edit-time cycle guard
//! - **Errors**: Structural failures (arity, unknown ids, cycles)
//!
//! It knows nothing about numbers. Any operation type that implements
//! [`Operation`] can be stored; the `chainrule-diff` crate supplies the
//! scalar operations and the forward/backward passes.

pub mod diagram;
pub mod error;
pub mod order;

// Re-export key types at crate root for convenience
pub use diagram::{Diagram, Edge, Node, NodeId, Operation, Wire};
pub use error::CoreError;
pub use order::{topological_order, would_create_cycle};
