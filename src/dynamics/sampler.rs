// src/dynamics/sampler.rs - One-time dynamics sampling pass along a path
use rayon::prelude::*;

use super::{DynamicsTable, InverseDynamics};
use crate::config::SamplingConfig;
use crate::error::ConstraintError;
use crate::path::Path;

// Keeps floating-point noise in length/step from adding a sliver interval
const GRID_GUARD: f64 = 1e-9;

/// Standard sampling grid on [0, length]: ceil(length/step) + 1 points spaced
/// by `step`, the last one pinned to `length`.
pub fn sample_grid(length: f64, step: f64) -> Result<Vec<f64>, ConstraintError> {
    if !(length > 0.0) || !length.is_finite() {
        return Err(ConstraintError::InvalidParameters(format!("Path length must be > 0, got {}", length)));
    }
    if !(step > 0.0) || !step.is_finite() {
        return Err(ConstraintError::InvalidParameters(format!("Sampling step must be > 0, got {}", step)));
    }
    let intervals = ((length / step) - GRID_GUARD).ceil().max(1.0) as usize;
    let mut grid: Vec<f64> = (0..intervals).map(|k| k as f64 * step).collect();
    grid.push(length);
    Ok(grid)
}

/// Evaluate the robot dynamics at every grid point of `path`.
///
/// With `c = ID(q, 0, 0)`, `a = ID(q, 0, q') - c` and `b = ID(q, q', q'') - c`,
/// the joint torques along the path satisfy `torque = a·sdd + b·sd² + c`
/// exactly at each sample.
pub fn sample_path<P, D>(path: &P, dynamics: &D, config: &SamplingConfig) -> Result<DynamicsTable, ConstraintError>
where
    P: Path + ?Sized,
    D: InverseDynamics + ?Sized,
{
    let ndof = path.dof();
    if dynamics.dof() != ndof {
        return Err(ConstraintError::InvalidParameters(format!(
            "Path has {} joints but the dynamics model has {}",
            ndof,
            dynamics.dof()
        )));
    }
    let grid = sample_grid(path.length(), config.step)?;
    let parallel = config.parallel && grid.len() >= config.parallel_threshold;
    let started = std::time::Instant::now();

    let rows: Vec<Vec<f64>> = if parallel {
        grid.par_iter()
            .map(|&s| sample_row(path, dynamics, s))
            .collect::<Result<_, _>>()?
    } else {
        grid.iter()
            .map(|&s| sample_row(path, dynamics, s))
            .collect::<Result<_, _>>()?
    };

    tracing::info!(
        "Sampled dynamics: {} samples x {} joints in {:.3}ms (parallel: {})",
        grid.len(),
        ndof,
        started.elapsed().as_secs_f64() * 1000.0,
        parallel
    );
    DynamicsTable::from_rows(ndof, grid, rows.concat(), path.discontinuities(), config.domain_tolerance)
}

fn sample_row<P, D>(path: &P, dynamics: &D, s: f64) -> Result<Vec<f64>, ConstraintError>
where
    P: Path + ?Sized,
    D: InverseDynamics + ?Sized,
{
    let point = path.evaluate(s)?;
    let ndof = point.position.len();
    let zeros = vec![0.0; ndof];

    let check = |torques: Vec<f64>| {
        if torques.len() != ndof || torques.iter().any(|t| !t.is_finite()) {
            Err(ConstraintError::InvalidPath {
                s,
                reason: format!("dynamics returned {} torques or non-finite values", torques.len()),
            })
        } else {
            Ok(torques)
        }
    };
    let c = check(dynamics.inverse_dynamics(&point.position, &zeros, &zeros))?;
    let a_full = check(dynamics.inverse_dynamics(&point.position, &zeros, &point.tangent))?;
    let b_full = check(dynamics.inverse_dynamics(&point.position, &point.tangent, &point.curvature))?;

    let mut row = Vec::with_capacity(4 * ndof);
    row.extend(a_full.iter().zip(&c).map(|(full, c)| full - c));
    row.extend(b_full.iter().zip(&c).map(|(full, c)| full - c));
    row.extend_from_slice(&c);
    row.extend_from_slice(&point.tangent);
    Ok(row)
}
