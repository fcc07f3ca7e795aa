// src/path/polynomial.rs - Piecewise polynomial joint-space paths
use std::str::FromStr;

use super::{Path, PathPoint};
use crate::error::ConstraintError;

// Evaluations this far past either end are clamped onto the path.
const END_SLACK: f64 = 1e-9;

/// Polynomial in the local chunk parameter, coefficients in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// Third-degree segment from (q0, qd0) at 0 to (q1, qd1) at `duration`.
    pub fn cubic_interpolation(q0: f64, q1: f64, qd0: f64, qd1: f64, duration: f64) -> Self {
        let t = duration;
        let dq = q1 - q0;
        let a2 = (3.0 * dq - (2.0 * qd0 + qd1) * t) / (t * t);
        let a3 = (-2.0 * dq + (qd0 + qd1) * t) / (t * t * t);
        Self::new(vec![q0, qd0, a2, a3])
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
    }

    pub fn derivative(&self, t: f64) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (k, c)| acc * t + k as f64 * c)
    }

    pub fn second_derivative(&self, t: f64) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .skip(2)
            .rev()
            .fold(0.0, |acc, (k, c)| acc * t + (k * (k - 1)) as f64 * c)
    }
}

#[derive(Debug, Clone)]
struct Chunk {
    start: f64,
    duration: f64,
    polynomials: Vec<Polynomial>,
}

/// Concatenation of polynomial chunks; each chunk spans `duration` units of arc length.
#[derive(Debug, Clone)]
pub struct PiecewisePolynomialPath {
    dof: usize,
    length: f64,
    chunks: Vec<Chunk>,
}

impl PiecewisePolynomialPath {
    pub fn new(chunks: Vec<(f64, Vec<Polynomial>)>) -> Result<Self, ConstraintError> {
        let Some((_, first)) = chunks.first() else {
            return Err(ConstraintError::InvalidParameters("Path needs at least one chunk".to_string()));
        };
        let dof = first.len();
        if dof == 0 {
            return Err(ConstraintError::InvalidParameters("Path chunks need at least one joint".to_string()));
        }
        let mut start = 0.0;
        let mut built = Vec::with_capacity(chunks.len());
        for (k, (duration, polynomials)) in chunks.into_iter().enumerate() {
            if !(duration > 0.0) || !duration.is_finite() {
                return Err(ConstraintError::InvalidParameters(format!(
                    "Chunk {} has invalid duration {}",
                    k, duration
                )));
            }
            if polynomials.len() != dof {
                return Err(ConstraintError::InvalidParameters(format!(
                    "Chunk {} has {} joints, expected {}",
                    k,
                    polynomials.len(),
                    dof
                )));
            }
            built.push(Chunk { start, duration, polynomials });
            start += duration;
        }
        Ok(Self { dof, length: start, chunks: built })
    }

    /// Build a path from consecutive cubic pieces through `waypoints`, with the
    /// given joint velocities (dq/ds) at each waypoint.
    pub fn from_cubic_segments(
        waypoints: &[Vec<f64>],
        velocities: &[Vec<f64>],
        durations: &[f64],
    ) -> Result<Self, ConstraintError> {
        if waypoints.len() < 2 || velocities.len() != waypoints.len() || durations.len() + 1 != waypoints.len() {
            return Err(ConstraintError::InvalidParameters(format!(
                "Need n >= 2 waypoints with n velocities and n-1 durations, got {} / {} / {}",
                waypoints.len(),
                velocities.len(),
                durations.len()
            )));
        }
        let chunks = durations
            .iter()
            .enumerate()
            .map(|(k, &duration)| {
                let polynomials = (0..waypoints[k].len())
                    .map(|i| {
                        Polynomial::cubic_interpolation(
                            waypoints[k][i],
                            waypoints[k + 1][i],
                            velocities[k][i],
                            velocities[k + 1][i],
                            duration,
                        )
                    })
                    .collect();
                (duration, polynomials)
            })
            .collect();
        Self::new(chunks)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn locate(&self, s: f64) -> &Chunk {
        let index = self.chunks.partition_point(|chunk| chunk.start <= s);
        &self.chunks[index.saturating_sub(1)]
    }
}

impl Path for PiecewisePolynomialPath {
    fn dof(&self) -> usize {
        self.dof
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn evaluate(&self, s: f64) -> Result<PathPoint, ConstraintError> {
        if !s.is_finite() || s < -END_SLACK || s > self.length + END_SLACK {
            return Err(ConstraintError::InvalidPath {
                s,
                reason: format!("outside [0, {}]", self.length),
            });
        }
        let s = s.clamp(0.0, self.length);
        let chunk = self.locate(s);
        let t = (s - chunk.start).min(chunk.duration);
        let point = PathPoint {
            position: chunk.polynomials.iter().map(|p| p.evaluate(t)).collect(),
            tangent: chunk.polynomials.iter().map(|p| p.derivative(t)).collect(),
            curvature: chunk.polynomials.iter().map(|p| p.second_derivative(t)).collect(),
        };
        let finite = point
            .position
            .iter()
            .chain(&point.tangent)
            .chain(&point.curvature)
            .all(|v| v.is_finite());
        if !finite {
            return Err(ConstraintError::InvalidPath {
                s,
                reason: "non-finite joint values".to_string(),
            });
        }
        Ok(point)
    }

    fn discontinuities(&self) -> Vec<f64> {
        self.chunks.iter().skip(1).map(|chunk| chunk.start).collect()
    }
}

/// Parses the TOPP trajectory text format: repeated blocks of
/// `duration`, `ndof`, then `ndof` lines of ascending coefficients.
impl FromStr for PiecewisePolynomialPath {
    type Err = ConstraintError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parse_error = |line: usize, msg: String| {
            ConstraintError::InvalidParameters(format!("Trajectory line {}: {}", line + 1, msg))
        };
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(n, line)| (n, line.trim()))
            .filter(|(_, line)| !line.is_empty());
        let mut chunks = Vec::new();
        while let Some((n, duration_line)) = lines.next() {
            let duration: f64 = duration_line
                .parse()
                .map_err(|e| parse_error(n, format!("bad duration '{}': {}", duration_line, e)))?;
            let (n, dof_line) = lines
                .next()
                .ok_or_else(|| parse_error(n, "missing joint count".to_string()))?;
            let dof: usize = dof_line
                .parse()
                .map_err(|e| parse_error(n, format!("bad joint count '{}': {}", dof_line, e)))?;
            let mut polynomials = Vec::with_capacity(dof);
            for joint in 0..dof {
                let (n, coefficient_line) = lines
                    .next()
                    .ok_or_else(|| parse_error(n, format!("missing coefficients for joint {}", joint)))?;
                let coefficients = coefficient_line
                    .split_whitespace()
                    .map(|token| token.parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| parse_error(n, format!("bad coefficient: {}", e)))?;
                polynomials.push(Polynomial::new(coefficients));
            }
            chunks.push((duration, polynomials));
        }
        Self::new(chunks)
    }
}
