//! # Optimization
//!
//! Gradient descent over the `Parameter` nodes of a graph, as used by the
//! optimization lessons: nudge `w`, re-run, watch the loss fall.
//!
//! ## Example
//!
//! ```rust
//! use chainrule_diff::forward::{Bindings, ComputeGraph};
//! use chainrule_diff::optim::Sgd;
//!
//! // L = (w·x − y)²
//! let mut graph = ComputeGraph::new();
//! let w = graph.param("w");
//! let x = graph.input("x");
//! let y = graph.input("y");
//! let wx = graph.mul(w, x).unwrap();
//! let d = graph.sub(wx, y).unwrap();
//! graph.square(d).unwrap();
//!
//! let mut bindings = Bindings::from([(w, 0.5), (x, 1.0), (y, 1.0)]);
//! let report = graph.run(&bindings).unwrap();
//! Sgd::new(0.1).step(&graph, &mut bindings, &report.gradients);
//! // w = 0.5 - 0.1 * (-1.0)
//! assert!((bindings[&w] - 0.6).abs() < 1e-12);
//! ```

use chainrule_core::NodeId;
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::error::DiffError;
use crate::forward::{Bindings, ComputeGraph};
use crate::ops::Op;

/// Stochastic Gradient Descent optimizer.
///
/// Updates parameters using: `θ = θ - lr * ∂L/∂θ`
#[derive(Debug, Clone)]
pub struct Sgd {
    /// Learning rate (step size)
    pub learning_rate: f64,
}

impl Sgd {
    /// Create a new SGD optimizer with the given learning rate.
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.learning_rate)
    }

    /// Perform a single optimization step.
    ///
    /// Only bindings of `Parameter` nodes move; `Input` bindings are data.
    /// Returns how many parameters were updated.
    pub fn step(
        &self,
        graph: &ComputeGraph,
        bindings: &mut Bindings,
        gradients: &BTreeMap<NodeId, f64>,
    ) -> usize {
        self.step_with(graph, bindings, gradients, |g| g)
    }

    /// Perform an optimization step with each gradient clipped to
    /// `[-max_grad, max_grad]`.
    pub fn step_with_clip(
        &self,
        graph: &ComputeGraph,
        bindings: &mut Bindings,
        gradients: &BTreeMap<NodeId, f64>,
        max_grad: f64,
    ) -> usize {
        self.step_with(graph, bindings, gradients, |g| g.clamp(-max_grad, max_grad))
    }

    fn step_with(
        &self,
        graph: &ComputeGraph,
        bindings: &mut Bindings,
        gradients: &BTreeMap<NodeId, f64>,
        adjust: impl Fn(f64) -> f64,
    ) -> usize {
        let mut updated = 0;
        for id in graph.parameters() {
            if let (Some(value), Some(&g)) = (bindings.get_mut(&id), gradients.get(&id)) {
                *value -= self.learning_rate * adjust(g);
                updated += 1;
            }
        }
        updated
    }
}

/// Run `steps` rounds of run-then-step, returning the sink value before each step.
pub fn train(
    graph: &ComputeGraph,
    bindings: &mut Bindings,
    optimizer: &Sgd,
    steps: usize,
) -> Result<Vec<f64>, DiffError> {
    let mut losses = Vec::with_capacity(steps);
    for step in 0..steps {
        let report = graph.run(bindings)?;
        let loss = report.sink_value().unwrap_or(0.0);
        log::debug!("step {}: loss {}", step, loss);
        losses.push(loss);
        optimizer.step(graph, bindings, &report.gradients);
    }
    Ok(losses)
}

/// True if `op` is moved by the optimizer.
pub fn is_trainable(op: &Op) -> bool {
    matches!(op, Op::Parameter { .. })
}
