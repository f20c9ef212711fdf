//! # Differentiable Operations
//!
//! This module defines [`Op`], the closed set of scalar operations a learner
//! can drop into a computation graph. Each operation knows how to:
//!
//! - Execute forward (compute its value from its inputs)
//! - Give its local derivative with respect to each input
//!
//! ## Operations
//!
//! | Op | Forward | ∂/∂u | ∂/∂v |
//! |----|---------|------|------|
//! | Square | u² | 2u | |
//! | Sine | sin u | cos u | |
//! | Exp | e^min(u, c) | e^min(u, c) | |
//! | Linear | m·u + b | m | |
//! | Power4 | u⁴ | 4u³ | |
//! | Add | u + v | 1 | 1 |
//! | Sub | u − v | 1 | −1 |
//! | Mul | u · v | v | u |
//! | Output | u | 1 | |
//!
//! `Input` and `Parameter` are sources: their value is bound from outside and
//! they have no local derivatives.

use chainrule_core::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exponent ceiling used when no config overrides it.
pub const DEFAULT_EXP_CLAMP: f64 = 6.0;

/// Scalar operations for computation graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Op {
    /// Data fed in by the learner (e.g. `x`)
    Input { name: String },

    /// A learnable weight (e.g. `w`); behaves like `Input`
    Parameter { name: String },

    /// Marks the value the lesson reads out: u
    Output,

    /// u²
    Square,

    /// sin(u)
    Sine,

    /// e^min(u, clamp)
    #[serde(rename = "exponential")]
    Exp { clamp: f64 },

    /// m·u + b, with coefficients fixed per node
    Linear { m: f64, b: f64 },

    /// u⁴
    Power4,

    /// u + v
    Add,

    /// u − v
    #[serde(rename = "subtract")]
    Sub,

    /// u · v
    #[serde(rename = "multiply")]
    Mul,
}

impl Op {
    /// Exponential with the default clamp.
    pub fn exp() -> Self {
        Op::Exp {
            clamp: DEFAULT_EXP_CLAMP,
        }
    }

    /// Short lowercase name; the same string serde uses as the tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Input { .. } => "input",
            Op::Parameter { .. } => "parameter",
            Op::Output => "output",
            Op::Square => "square",
            Op::Sine => "sine",
            Op::Exp { .. } => "exponential",
            Op::Linear { .. } => "linear",
            Op::Power4 => "power4",
            Op::Add => "add",
            Op::Sub => "subtract",
            Op::Mul => "multiply",
        }
    }

    /// Execute the forward pass for this operation.
    ///
    /// # Panics
    ///
    /// On a source op, or when `inputs.len()` differs from the arity.
    pub fn forward(&self, inputs: &[f64]) -> f64 {
        self.check_inputs(inputs);
        match self {
            Op::Input { .. } | Op::Parameter { .. } => unreachable!(),
            Op::Output => inputs[0],
            Op::Square => inputs[0] * inputs[0],
            Op::Sine => inputs[0].sin(),
            Op::Exp { clamp } => inputs[0].min(*clamp).exp(),
            Op::Linear { m, b } => m * inputs[0] + b,
            Op::Power4 => inputs[0].powi(4),
            Op::Add => inputs[0] + inputs[1],
            Op::Sub => inputs[0] - inputs[1],
            Op::Mul => inputs[0] * inputs[1],
        }
    }

    /// Derivative of this op's output with respect to input `index`,
    /// evaluated at `inputs`.
    ///
    /// # Panics
    ///
    /// On a source op, when `inputs.len()` differs from the arity, or when
    /// `index` is not an input slot.
    pub fn local_grad(&self, inputs: &[f64], index: usize) -> f64 {
        self.check_inputs(inputs);
        assert!(
            index < inputs.len(),
            "{} has no input slot {}",
            self.kind(),
            index
        );
        match (self, index) {
            (Op::Input { .. } | Op::Parameter { .. }, _) => unreachable!(),
            (Op::Output, _) => 1.0,
            (Op::Square, _) => 2.0 * inputs[0],
            (Op::Sine, _) => inputs[0].cos(),
            // Same clamped exponent as forward, also past the clamp.
            (Op::Exp { clamp }, _) => inputs[0].min(*clamp).exp(),
            (Op::Linear { m, .. }, _) => *m,
            (Op::Power4, _) => 4.0 * inputs[0].powi(3),
            (Op::Add, _) => 1.0,
            (Op::Sub, 0) => 1.0,
            (Op::Sub, _) => -1.0,
            (Op::Mul, 0) => inputs[1],
            (Op::Mul, _) => inputs[0],
        }
    }

    fn check_inputs(&self, inputs: &[f64]) {
        assert!(
            !self.is_source(),
            "{} takes its value from a binding, not from inputs",
            self.kind()
        );
        assert_eq!(
            inputs.len(),
            self.arity(),
            "{} requires {} input(s)",
            self.kind(),
            self.arity()
        );
    }
}

impl Operation for Op {
    fn arity(&self) -> usize {
        match self {
            Op::Input { .. } | Op::Parameter { .. } => 0,
            Op::Output
            | Op::Square
            | Op::Sine
            | Op::Exp { .. }
            | Op::Linear { .. }
            | Op::Power4 => 1,
            Op::Add | Op::Sub | Op::Mul => 2,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Input { name } => write!(f, "{}", name),
            Op::Parameter { name } => write!(f, "{}", name),
            Op::Output => write!(f, "out"),
            Op::Square => write!(f, "u²"),
            Op::Sine => write!(f, "sin"),
            Op::Exp { .. } => write!(f, "exp"),
            Op::Linear { m, b } if *b < 0.0 => write!(f, "{}u−{}", m, -b),
            Op::Linear { m, b } => write!(f, "{}u+{}", m, b),
            Op::Power4 => write!(f, "u⁴"),
            Op::Add => write!(f, "+"),
            Op::Sub => write!(f, "−"),
            Op::Mul => write!(f, "×"),
        }
    }
}
