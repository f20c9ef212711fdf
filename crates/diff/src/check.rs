//! Numerical gradient checking.
//!
//! Central differences, `(f(x+h) − f(x−h)) / 2h`, against the sink of the
//! graph. Slow but independent of the backward pass, which makes it the
//! reference the analytical gradients are tested against.

use chainrule_core::{topological_order, NodeId, Operation};

use crate::config::EngineConfig;
use crate::error::DiffError;
use crate::forward::{evaluate, Bindings, ComputeGraph};

/// ∂sink/∂source by central differences with step `h`.
///
/// The sink is the last node in topological order; an empty graph has
/// derivative 0.
pub fn numerical_gradient(
    graph: &ComputeGraph,
    bindings: &Bindings,
    source: NodeId,
    h: f64,
) -> Result<f64, DiffError> {
    let diagram = graph.diagram();
    let order = topological_order(diagram)?;
    let Some(&sink) = order.last() else {
        return Ok(0.0);
    };
    let base = *bindings
        .get(&source)
        .ok_or(DiffError::MissingBinding(source))?;

    let mut plus = bindings.clone();
    plus.insert(source, base + h);
    let mut minus = bindings.clone();
    minus.insert(source, base - h);

    let f_plus = evaluate(diagram, &order, &plus)?[&sink];
    let f_minus = evaluate(diagram, &order, &minus)?[&sink];

    Ok((f_plus - f_minus) / (2.0 * h))
}

/// Check analytical gradients of every source against numerical ones.
///
/// Uses `config.fd_step` as `h` and `config.fd_tolerance` as the allowed
/// error, relative to the larger gradient when that exceeds 1.
pub fn grad_check(
    graph: &ComputeGraph,
    bindings: &Bindings,
    config: &EngineConfig,
) -> Result<(), DiffError> {
    let report = graph.run(bindings)?;

    for &id in &report.order {
        let is_source = graph.diagram().op(id).is_some_and(|op| op.is_source());
        if !is_source {
            continue;
        }
        let analytical = report.gradients.get(&id).copied().unwrap_or(0.0);
        let numerical = numerical_gradient(graph, bindings, id, config.fd_step)?;

        let diff = (analytical - numerical).abs();
        let scale = analytical.abs().max(numerical.abs()).max(1.0);
        if diff > config.fd_tolerance * scale {
            return Err(DiffError::GradientMismatch {
                node: id,
                analytical,
                numerical,
            });
        }
    }

    Ok(())
}
