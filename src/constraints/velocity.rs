// src/constraints/velocity.rs - Joint velocity limits
use std::sync::Arc;

use super::switch_point::{SwitchPoint, SwitchPointScan, find_discontinuities};
use super::{PhasePlaneConstraint, SddInterval};
use crate::config::Tolerances;
use crate::dynamics::DynamicsTable;
use crate::error::ConstraintError;

/// Largest path speed keeping |q'_i(s)·sd| <= vmax_i for every joint.
/// Tangent components at or below `zero_tangent` do not limit the speed.
pub(crate) fn velocity_ceiling(
    table: &DynamicsTable,
    vmax: &[f64],
    s: f64,
    zero_tangent: f64,
) -> Result<f64, ConstraintError> {
    let tangent = table.interpolate_tangent(s)?;
    Ok(tangent
        .iter()
        .zip(vmax)
        .filter(|(t, _)| t.abs() > zero_tangent)
        .map(|(t, v)| v / t.abs())
        .fold(f64::INFINITY, f64::min))
}

pub(crate) fn validate_vmax(table: &DynamicsTable, vmax: &[f64]) -> Result<(), ConstraintError> {
    if vmax.len() != table.ndof() {
        return Err(ConstraintError::InvalidParameters(format!(
            "Expected {} velocity limits, got {}",
            table.ndof(),
            vmax.len()
        )));
    }
    if let Some((i, v)) = vmax.iter().enumerate().find(|(_, v)| !(**v > 0.0)) {
        return Err(ConstraintError::InvalidParameters(format!(
            "Joint {} velocity limit must be > 0, got {}",
            i, v
        )));
    }
    Ok(())
}

/// Pure joint-velocity constraint: acceleration is free below the speed ceiling.
#[derive(Debug, Clone)]
pub struct VelocityLimits {
    table: Arc<DynamicsTable>,
    vmax: Vec<f64>,
    tolerances: Tolerances,
}

impl VelocityLimits {
    pub fn new(table: Arc<DynamicsTable>, vmax: Vec<f64>, tolerances: Tolerances) -> Result<Self, ConstraintError> {
        validate_vmax(&table, &vmax)?;
        Ok(Self {
            table,
            vmax,
            tolerances,
        })
    }

    pub fn vmax(&self) -> &[f64] {
        &self.vmax
    }
}

impl PhasePlaneConstraint for VelocityLimits {
    fn table(&self) -> &DynamicsTable {
        &self.table
    }

    fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    fn sdd_limits(&self, s: f64, sd: f64) -> Result<SddInterval, ConstraintError> {
        let ceiling = self.sd_limit_bobrow_init(s)?;
        if sd > ceiling * (1.0 + self.tolerances.speed_tolerance) {
            return Ok(SddInterval::empty());
        }
        Ok(SddInterval::unbounded())
    }

    fn sd_limit_bobrow_init(&self, s: f64) -> Result<f64, ConstraintError> {
        velocity_ceiling(&self.table, &self.vmax, s, self.tolerances.zero_coefficient)
    }

    fn find_singular_switch_points(&self) -> Result<SwitchPointScan, ConstraintError> {
        Ok(SwitchPointScan::default())
    }

    fn find_discontinuous_switch_points(&self) -> Result<Vec<SwitchPoint>, ConstraintError> {
        find_discontinuities(&self.table, &self.tolerances, |s| self.sd_limit_combined(s))
    }

    fn compute_slope_dynamic_singularity(&self, s: f64, _sd: f64) -> Result<Vec<f64>, ConstraintError> {
        // Still reject out-of-range queries
        self.table.interpolate_tangent(s)?;
        Ok(Vec::new())
    }
}
