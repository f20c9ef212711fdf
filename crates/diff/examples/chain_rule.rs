//! The Chain Rule, One Wire at a Time
//!
//! Run with: cargo run -p chainrule-diff --example chain_rule
//!
//! This example demonstrates:
//! - Forward and backward passes through a single-path chain
//! - Gradient summation where a value fans out to two consumers
//! - Per-wire contributions, the numbers a learner traces by hand
//! - Gradient descent on a one-parameter squared error
//!
//! Set `RUST_LOG=debug` to see the engine's own trace, and
//! `CHAINRULE_LEARNING_RATE` to change the step size in part 4.

use chainrule_diff::check::grad_check;
use chainrule_diff::optim::{train, Sgd};
use chainrule_diff::{Bindings, ComputeGraph, DiffError, EngineConfig, RunReport};

fn print_report(graph: &ComputeGraph, report: &RunReport) {
    println!("  {:<6} {:<10} {:>10} {:>10}", "node", "op", "value", "grad");
    for id in &report.order {
        let op = graph
            .diagram()
            .op(*id)
            .map(|op| op.to_string())
            .unwrap_or_default();
        println!(
            "  {:<6} {:<10} {:>10.4} {:>10.4}",
            id.to_string(),
            op,
            report.values[id],
            report.gradients[id]
        );
    }
}

fn main() -> Result<(), DiffError> {
    env_logger::init();
    let config = EngineConfig::from_env()?;

    println!("=== The Chain Rule ===\n");

    // -------------------------------------------------------------------------
    // 1. A single path: gradients multiply along the chain
    // -------------------------------------------------------------------------
    println!("1. Single path: out = sin(3x² + 1)");
    println!("----------------------------------");
    println!();

    let mut graph = ComputeGraph::with_config(config.clone());
    let x = graph.input("x");
    let sq = graph.square(x)?;
    let lin = graph.linear(sq, 3.0, 1.0)?;
    let s = graph.sin(lin)?;
    graph.output(s)?;

    let report = graph.run(&Bindings::from([(x, 0.5)]))?;
    print_report(&graph, &report);
    println!();
    println!("  d out/dx = cos(3x² + 1) · 3 · 2x");
    println!("           = {:.4}", (3.0f64 * 0.25 + 1.0).cos() * 3.0 * 1.0);
    println!();

    // -------------------------------------------------------------------------
    // 2. Fan-out: one value, two consumers, gradients add
    // -------------------------------------------------------------------------
    println!("2. Fan-out: z = x² + sin(x)");
    println!("---------------------------");
    println!();

    let mut graph = ComputeGraph::with_config(config.clone());
    let x = graph.input("x");
    let a = graph.square(x)?;
    let b = graph.sin(x)?;
    graph.add(a, b)?;

    let xv = 1.0f64;
    let report = graph.run(&Bindings::from([(x, xv)]))?;
    print_report(&graph, &report);
    println!();
    println!("  Per-wire contributions:");
    for edge in &report.edges {
        println!(
            "    {} → {} (slot {}): local {:.4}, contribution {:.4}",
            edge.from, edge.to, edge.slot, edge.local, edge.contribution
        );
    }
    println!(
        "  Sum into x: {:.4} (2x + cos x = {:.4})",
        report.gradients[&x],
        2.0 * xv + xv.cos()
    );
    println!();

    // -------------------------------------------------------------------------
    // 3. Checking against finite differences
    // -------------------------------------------------------------------------
    println!("3. Gradient check: out = exp(w·x) − sin(x)⁴");
    println!("-------------------------------------------");
    println!();

    let mut graph = ComputeGraph::with_config(config.clone());
    let w = graph.param("w");
    let x = graph.input("x");
    let wx = graph.mul(w, x)?;
    let e = graph.exp(wx)?;
    let sx = graph.sin(x)?;
    let p = graph.pow4(sx)?;
    let d = graph.sub(e, p)?;
    graph.output(d)?;

    let bindings = Bindings::from([(w, 0.7), (x, 1.3)]);
    match grad_check(&graph, &bindings, &config) {
        Ok(()) => println!("  analytical and numerical gradients agree"),
        Err(e) => println!("  mismatch: {}", e),
    }
    println!();

    // -------------------------------------------------------------------------
    // 4. Training: L = (w·x − y)²
    // -------------------------------------------------------------------------
    println!("4. Training: L = (w·x − y)², x = 1, y = 1");
    println!("-----------------------------------------");
    println!();

    let mut graph = ComputeGraph::with_config(config.clone());
    let w = graph.param("w");
    let x = graph.input("x");
    let y = graph.input("y");
    let wx = graph.mul(w, x)?;
    let diff = graph.sub(wx, y)?;
    graph.square(diff)?;

    let mut bindings = Bindings::from([(w, 0.5), (x, 1.0), (y, 1.0)]);
    let optimizer = Sgd::from_config(&config);
    let losses = train(&graph, &mut bindings, &optimizer, 20)?;

    for (step, loss) in losses.iter().enumerate().step_by(5) {
        println!("  step {:>2}: loss = {:.6}", step, loss);
    }
    println!();
    println!("  learned w = {:.4} (target 1.0)", bindings[&w]);

    Ok(())
}
