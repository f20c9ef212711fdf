//! # Diff - Reverse-Mode Autodiff over Scalar Graphs
//!
//! This crate is the numeric half of the chain-rule engine. A learner wires
//! scalar operations into a DAG; the engine evaluates it and shows how every
//! node's gradient is assembled from local derivatives.
//!
//! ## Core Concepts
//!
//! - **Operations are a closed enum**: each knows its forward formula and
//!   its derivative with respect to each input
//! - **Forward pass** walks a topological order, one value per node
//! - **Backward pass** walks the same order reversed, summing contributions
//!   into each input, so fan-out is handled by addition
//!
//! ## Modules
//!
//! - [`ops`] - The operation registry
//! - [`forward`] - `ComputeGraph` builder and forward evaluation
//! - [`backward`] - Gradient propagation, per node and per wire
//! - [`engine`] - `run`: order, evaluate, propagate in one call
//! - [`check`] - Finite-difference gradient checking
//! - [`optim`] - Gradient descent over parameters
//! - [`config`] - Tunables and their environment overrides
//!
//! ## Example
//!
//! ```rust
//! use chainrule_diff::{Bindings, ComputeGraph};
//!
//! // x → square → 3u+1 → sin → out
//! let mut graph = ComputeGraph::new();
//! let x = graph.input("x");
//! let sq = graph.square(x).unwrap();
//! let lin = graph.linear(sq, 3.0, 1.0).unwrap();
//! let s = graph.sin(lin).unwrap();
//! graph.output(s).unwrap();
//!
//! let report = graph.run(&Bindings::from([(x, 0.0)])).unwrap();
//! assert_eq!(report.values[&lin], 1.0);
//! assert_eq!(report.gradients[&x], 0.0);
//! ```

pub mod backward;
pub mod check;
pub mod config;
pub mod engine;
pub mod error;
pub mod forward;
pub mod ops;
pub mod optim;

// Re-export key types
pub use backward::{EdgeGradient, Gradients};
pub use config::EngineConfig;
pub use engine::RunReport;
pub use error::DiffError;
pub use forward::{Bindings, ComputeGraph, ForwardValues};
pub use ops::Op;
