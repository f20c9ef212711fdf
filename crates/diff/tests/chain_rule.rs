//! End-to-end tests for the chain-rule engine.
//!
//! These check the properties a learner relies on:
//! - single-path compositions match closed-form derivatives
//! - fan-out gradients are summed
//! - analytical gradients agree with finite differences
//! - ordering, cycle rejection and repeatability

use chainrule_core::{topological_order, CoreError, Diagram, NodeId};
use chainrule_diff::check::{grad_check, numerical_gradient};
use chainrule_diff::{Bindings, ComputeGraph, DiffError, EngineConfig, Op};
use rstest::rstest;

const TOL: f64 = 1e-9;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_close(got: f64, expected: f64, tol: f64) {
    assert!(
        (got - expected).abs() <= tol,
        "got {}, expected {} (tol {})",
        got,
        expected,
        tol
    );
}

// ============================================================================
// Single-path chain rule, one case per operation
// ============================================================================

#[rstest]
#[case::square(Op::Square, |u: f64| 2.0 * u)]
#[case::sine(Op::Sine, |u: f64| u.cos())]
#[case::exponential(Op::exp(), |u: f64| u.exp())]
#[case::linear(Op::Linear { m: -1.5, b: 4.0 }, |_u: f64| -1.5)]
#[case::power4(Op::Power4, |u: f64| 4.0 * u.powi(3))]
#[case::output(Op::Output, |_u: f64| 1.0)]
fn unary_composition_matches_closed_form(#[case] op: Op, #[case] df: fn(f64) -> f64) {
    init_logging();
    // h = f(g(x)) with g(x) = 2x + 0.5
    let mut graph = ComputeGraph::new();
    let x = graph.input("x");
    let g = graph.linear(x, 2.0, 0.5).unwrap();
    let h = graph.insert_node(op, &[g]).unwrap();

    for xv in [-1.2, 0.0, 0.3, 1.7] {
        let report = graph.run(&Bindings::from([(x, xv)])).unwrap();
        let u = 2.0 * xv + 0.5;
        assert_eq!(report.sink, Some(h));
        assert_close(report.gradients[&g], df(u), TOL);
        assert_close(report.gradients[&x], df(u) * 2.0, TOL);
    }
}

#[rstest]
#[case::add(Op::Add, |_u: f64, _v: f64| 1.0, |_u: f64, _v: f64| 1.0)]
#[case::subtract(Op::Sub, |_u: f64, _v: f64| 1.0, |_u: f64, _v: f64| -1.0)]
#[case::multiply(Op::Mul, |_u: f64, v: f64| v, |u: f64, _v: f64| u)]
fn binary_composition_matches_closed_form(
    #[case] op: Op,
    #[case] df_du: fn(f64, f64) -> f64,
    #[case] df_dv: fn(f64, f64) -> f64,
) {
    // h = f(a², sin b)
    let mut graph = ComputeGraph::new();
    let a = graph.input("a");
    let b = graph.input("b");
    let u = graph.square(a).unwrap();
    let v = graph.sin(b).unwrap();
    graph.insert_node(op, &[u, v]).unwrap();

    let (av, bv) = (1.3, -0.4);
    let report = graph.run(&Bindings::from([(a, av), (b, bv)])).unwrap();
    let (uv, vv) = (av * av, bv.sin());

    assert_close(report.gradients[&a], df_du(uv, vv) * 2.0 * av, TOL);
    assert_close(report.gradients[&b], df_dv(uv, vv) * bv.cos(), TOL);
}

// ============================================================================
// Multi-path summation
// ============================================================================

#[test]
fn fan_out_sums_both_branches() {
    init_logging();
    // z = x² + sin(x)
    let mut graph = ComputeGraph::new();
    let x = graph.input("x");
    let sq = graph.square(x).unwrap();
    let s = graph.sin(x).unwrap();
    graph.add(sq, s).unwrap();

    for xv in [-3.0, -1.0, 0.25, 2.0] {
        let report = graph.run(&Bindings::from([(x, xv)])).unwrap();
        assert_close(report.gradients[&x], 2.0 * xv + xv.cos(), TOL);

        let into_x: f64 = report
            .edges
            .iter()
            .filter(|e| e.from == x)
            .map(|e| e.contribution)
            .sum();
        assert_close(into_x, report.gradients[&x], TOL);
    }
}

#[test]
fn diamond_through_three_consumers() {
    // y = x·x + x⁴ − 3x+1
    let mut graph = ComputeGraph::new();
    let x = graph.input("x");
    let xx = graph.mul(x, x).unwrap();
    let p = graph.pow4(x).unwrap();
    let l = graph.linear(x, 3.0, 1.0).unwrap();
    let s = graph.add(xx, p).unwrap();
    graph.sub(s, l).unwrap();

    let xv = 0.8;
    let report = graph.run(&Bindings::from([(x, xv)])).unwrap();
    assert_close(report.gradients[&x], 2.0 * xv + 4.0 * xv.powi(3) - 3.0, TOL);
}

// ============================================================================
// Finite differences
// ============================================================================

/// A DAG touching every operation, with fan-out at several levels.
fn kitchen_sink() -> (ComputeGraph, Bindings) {
    let mut graph = ComputeGraph::new();
    let x = graph.input("x");
    let w = graph.param("w");
    let b = graph.param("b");

    let wx = graph.mul(w, x).unwrap();
    let z = graph.add(wx, b).unwrap();
    let s = graph.sin(z).unwrap();
    let e = graph.exp(s).unwrap();
    let sq = graph.square(z).unwrap();
    let l = graph.linear(sq, 0.5, -1.0).unwrap();
    let p = graph.pow4(x).unwrap();
    let d = graph.sub(e, l).unwrap();
    let m = graph.mul(d, s).unwrap();
    let t = graph.add(m, p).unwrap();
    graph.output(t).unwrap();

    let bindings = Bindings::from([(x, 0.6), (w, -1.1), (b, 0.35)]);
    (graph, bindings)
}

#[test]
fn analytical_matches_finite_difference() {
    init_logging();
    let (graph, bindings) = kitchen_sink();
    let report = graph.run(&bindings).unwrap();

    for (&id, _) in &bindings {
        let numerical = numerical_gradient(&graph, &bindings, id, 1e-5).unwrap();
        assert_close(report.gradients[&id], numerical, 1e-3);
    }
}

#[test]
fn grad_check_accepts_kitchen_sink() {
    let (graph, bindings) = kitchen_sink();
    grad_check(&graph, &bindings, &EngineConfig::default()).unwrap();
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn order_places_inputs_first() {
    let (graph, bindings) = kitchen_sink();
    let report = graph.run(&bindings).unwrap();
    let diagram = graph.diagram();

    assert_eq!(report.order.len(), graph.node_count());
    for (pos, &id) in report.order.iter().enumerate() {
        for input in diagram.inputs(id).unwrap() {
            let input_pos = report.order.iter().position(|&n| n == input).unwrap();
            assert!(input_pos < pos, "{} ordered before its input {}", id, input);
        }
    }
}

#[test]
fn order_is_stable_under_late_wiring() {
    // A consumer created before its producer still evaluates after it.
    let mut graph = ComputeGraph::new();
    let out = graph.insert_node(Op::Output, &[]).unwrap();
    let sq = graph.insert_node(Op::Square, &[]).unwrap();
    let x = graph.input("x");
    graph.connect(x, sq).unwrap();
    graph.connect(sq, out).unwrap();

    let report = graph.run(&Bindings::from([(x, 3.0)])).unwrap();
    assert_eq!(report.order, vec![x, sq, out]);
    assert_eq!(report.sink_value(), Some(9.0));
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn builder_refuses_to_close_a_cycle() {
    let mut graph = ComputeGraph::new();
    let a = graph.insert_node(Op::Square, &[]).unwrap();
    let b = graph.insert_node(Op::Sine, &[]).unwrap();
    graph.connect(a, b).unwrap();

    let err = graph.connect(b, a).unwrap_err();
    assert!(matches!(err, CoreError::CyclicGraph { .. }));
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn run_on_cyclic_diagram_fails_instead_of_hanging() {
    // Raw diagrams skip the edit-time guard, so the orderer must catch it.
    let mut diagram: Diagram<Op> = Diagram::new();
    let x = diagram.insert_node(Op::Input { name: "x".into() }, &[]).unwrap();
    let a = diagram.insert_node(Op::Add, &[]).unwrap();
    let b = diagram.insert_node(Op::Square, &[]).unwrap();
    diagram.connect(x, a).unwrap();
    diagram.connect(b, a).unwrap();
    diagram.connect(a, b).unwrap();

    assert!(matches!(
        topological_order(&diagram),
        Err(CoreError::CyclicGraph { .. })
    ));

    let graph = ComputeGraph::from(diagram);
    let err = graph.run(&Bindings::from([(x, 1.0)])).unwrap_err();
    assert_eq!(
        err,
        DiffError::Core(CoreError::CyclicGraph { nodes: vec![a, b] })
    );
}

// ============================================================================
// Repeatability
// ============================================================================

#[test]
fn run_is_idempotent() {
    let (graph, bindings) = kitchen_sink();
    let first = graph.run(&bindings).unwrap();
    let second = graph.run(&bindings).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Lesson scenarios
// ============================================================================

#[test]
fn lesson_square_linear_sine() {
    // x → square → linear(3,1) → sine → output, x = 0
    let mut graph = ComputeGraph::new();
    let x = graph.input("x");
    let sq = graph.square(x).unwrap();
    let lin = graph.linear(sq, 3.0, 1.0).unwrap();
    let s = graph.sin(lin).unwrap();
    let out = graph.output(s).unwrap();

    let report = graph.run(&Bindings::from([(x, 0.0)])).unwrap();

    assert_eq!(report.values[&sq], 0.0);
    assert_eq!(report.values[&lin], 1.0);
    assert_close(report.values[&s], 0.8415, 1e-4);
    assert_close(report.values[&out], 0.8415, 1e-4);
    assert_close(report.gradients[&lin], 1.0f64.cos(), TOL);
    assert_close(report.gradients[&sq], 3.0 * 1.0f64.cos(), TOL);
    assert_eq!(report.gradients[&x], 0.0);
}

#[test]
fn lesson_squared_error() {
    // L = (w·x − y)², w = 0.5, x = 1, y = 1
    let mut graph = ComputeGraph::new();
    let w = graph.param("w");
    let x = graph.input("x");
    let y = graph.input("y");
    let wx = graph.mul(w, x).unwrap();
    let d = graph.sub(wx, y).unwrap();
    let l = graph.square(d).unwrap();

    let report = graph.run(&Bindings::from([(w, 0.5), (x, 1.0), (y, 1.0)])).unwrap();

    assert_eq!(report.values[&wx], 0.5);
    assert_eq!(report.values[&d], -0.5);
    assert_eq!(report.values[&l], 0.25);
    assert_eq!(report.gradients[&w], -1.0);
    assert_eq!(report.gradients[&x], -0.5);
    assert_eq!(report.gradients[&y], 1.0);
}

#[test]
fn unknown_ids_are_rejected_everywhere() {
    let mut graph = ComputeGraph::new();
    let x = graph.input("x");
    let ghost = NodeId(1000);

    assert_eq!(graph.square(ghost).unwrap_err(), CoreError::UnknownNode(ghost));
    assert_eq!(graph.connect(x, ghost).unwrap_err(), CoreError::UnknownNode(ghost));
    assert_eq!(graph.delete_node(ghost).unwrap_err(), CoreError::UnknownNode(ghost));
    assert_eq!(
        graph.delete_edge(ghost, x).unwrap_err(),
        CoreError::UnknownNode(ghost)
    );
    assert_eq!(graph.node_count(), 1);
}
