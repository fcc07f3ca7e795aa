// src/path/mod.rs - Arc-length parameterized geometric paths

mod polynomial;

pub use polynomial::{PiecewisePolynomialPath, Polynomial};

use crate::error::ConstraintError;

/// Joint configuration and its arc-length derivatives at one point of a path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPoint {
    /// q(s)
    pub position: Vec<f64>,
    /// dq/ds
    pub tangent: Vec<f64>,
    /// d²q/ds²
    pub curvature: Vec<f64>,
}

/// A geometric path through joint space, parameterized by arc length s in [0, length].
pub trait Path: Send + Sync {
    /// Number of joints.
    fn dof(&self) -> usize;

    /// Total arc length.
    fn length(&self) -> f64;

    /// Evaluate position and derivatives at s.
    fn evaluate(&self, s: f64) -> Result<PathPoint, ConstraintError>;

    /// Interior arc lengths where the path is only piecewise smooth.
    fn discontinuities(&self) -> Vec<f64> {
        Vec::new()
    }
}
