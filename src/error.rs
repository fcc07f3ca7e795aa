// src/error.rs - Error kinds shared by the sampler and the constraint evaluators
use thiserror::Error;

/// Errors raised while sampling a path or querying phase-plane constraints.
///
/// `DegenerateInterval` and `NoFeasibleSlope` describe local infeasibility
/// the outer sweep is expected to recover from (for example by lowering
/// its speed ceiling). The other kinds are caller faults.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    #[error("Path cannot be evaluated at s = {s}: {reason}")]
    InvalidPath { s: f64, reason: String },
    #[error("Arc length {s} is outside the sampled domain [{start}, {end}]")]
    OutOfRange { s: f64, start: f64, end: f64 },
    #[error("Empty admissible acceleration interval at s = {s}, sd = {sd}: [{sdd_min}, {sdd_max}]")]
    DegenerateInterval {
        s: f64,
        sd: f64,
        sdd_min: f64,
        sdd_max: f64,
    },
    #[error(
        "Singular joints {first_joint} and {second_joint} imply incompatible speeds \
         {first_speed} and {second_speed} at s = {s}"
    )]
    InconsistentSingularity {
        s: f64,
        first_joint: usize,
        first_speed: f64,
        second_joint: usize,
        second_speed: f64,
    },
    #[error("No feasible slope at singular point s = {s}, sd = {sd}")]
    NoFeasibleSlope { s: f64, sd: f64 },
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl ConstraintError {
    /// True for outcomes the outer sweep can handle without aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConstraintError::DegenerateInterval { .. } | ConstraintError::NoFeasibleSlope { .. }
        )
    }
}
