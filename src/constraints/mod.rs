// src/constraints/mod.rs - Phase-plane constraints over a sampled path
//
// Each constraint variant answers the same queries: the admissible path
// acceleration at (s, sd), the maximal speed at s, and the switch points
// a forward/backward phase-plane sweep has to pass through.

mod switch_point;
mod torque;
mod velocity;

use std::sync::Arc;

use serde::Serialize;

pub use switch_point::{SwitchPoint, SwitchPointKind, SwitchPointScan, effective_separation, find_discontinuities};
pub use torque::TorqueLimits;
pub use velocity::VelocityLimits;

use crate::config::{ConstraintStrategy, LimitsConfig, Tolerances};
use crate::dynamics::DynamicsTable;
use crate::error::ConstraintError;

/// Admissible path accelerations at one (s, sd), with the joints providing each bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SddInterval {
    pub min: f64,
    pub max: f64,
    pub min_joint: Option<usize>,
    pub max_joint: Option<usize>,
}

impl SddInterval {
    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            min_joint: None,
            max_joint: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            min_joint: None,
            max_joint: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn contains(&self, sdd: f64, slack: f64) -> bool {
        sdd >= self.min - slack && sdd <= self.max + slack
    }

    /// Turn an empty interval into `DegenerateInterval`.
    pub fn ensure_admissible(self, s: f64, sd: f64) -> Result<Self, ConstraintError> {
        if self.is_empty() {
            return Err(ConstraintError::DegenerateInterval {
                s,
                sd,
                sdd_min: self.min,
                sdd_max: self.max,
            });
        }
        Ok(self)
    }
}

/// The primitives a time-optimal phase-plane sweep queries.
pub trait PhasePlaneConstraint: Send + Sync {
    fn table(&self) -> &DynamicsTable;

    fn tolerances(&self) -> &Tolerances;

    /// Admissible sdd at (s, sd). Empty (min > max) when no acceleration is admissible.
    fn sdd_limits(&self, s: f64, sd: f64) -> Result<SddInterval, ConstraintError>;

    /// Largest sd for which `sdd_limits(s, sd)` is non-empty.
    ///
    /// Only an upper bound: a velocity-only joint whose static torque is below
    /// tau_min (and grows with sd) also imposes a minimum speed, and
    /// `sdd_limits` stays empty under that minimum.
    fn sd_limit_bobrow_init(&self, s: f64) -> Result<f64, ConstraintError>;

    /// Speed ceiling including any additional velocity limits.
    fn sd_limit_combined(&self, s: f64) -> Result<f64, ConstraintError> {
        self.sd_limit_bobrow_init(s)
    }

    fn find_singular_switch_points(&self) -> Result<SwitchPointScan, ConstraintError>;

    fn find_discontinuous_switch_points(&self) -> Result<Vec<SwitchPoint>, ConstraintError>;

    /// Admissible slopes dsd/ds through a dynamic singularity at (s, sd).
    /// An empty result means the point cannot be traversed at that speed.
    fn compute_slope_dynamic_singularity(&self, s: f64, sd: f64) -> Result<Vec<f64>, ConstraintError>;

    /// All switch points ordered by s.
    fn switch_points(&self) -> Result<SwitchPointScan, ConstraintError> {
        let mut scan = self.find_singular_switch_points()?;
        let discontinuous = self.find_discontinuous_switch_points()?;
        scan.merge_discontinuous(discontinuous, effective_separation(self.table(), self.tolerances()));
        tracing::info!(
            "Found {} switch points ({} singular), {} conflicts",
            scan.points.len(),
            scan.singular().count(),
            scan.conflicts.len()
        );
        Ok(scan)
    }
}

/// Constraint variant selected by `ConstraintStrategy`.
#[derive(Debug, Clone)]
pub enum Constraint {
    VelocityLimited(VelocityLimits),
    TorqueLimited(TorqueLimits),
}

impl Constraint {
    pub fn build(
        strategy: ConstraintStrategy,
        table: Arc<DynamicsTable>,
        limits: &LimitsConfig,
        tolerances: Tolerances,
    ) -> Result<Self, ConstraintError> {
        match strategy {
            ConstraintStrategy::Velocity => {
                let vmax = limits
                    .vmax
                    .clone()
                    .ok_or_else(|| ConstraintError::InvalidParameters("Velocity strategy requires vmax".to_string()))?;
                Ok(Constraint::VelocityLimited(VelocityLimits::new(table, vmax, tolerances)?))
            }
            ConstraintStrategy::Torque => {
                let mut torque =
                    TorqueLimits::new(table, limits.tau_min.clone(), limits.tau_max.clone(), tolerances)?;
                if let Some(vmax) = &limits.vmax {
                    torque = torque.with_velocity_limits(vmax.clone())?;
                }
                Ok(Constraint::TorqueLimited(torque))
            }
        }
    }

    pub fn strategy(&self) -> ConstraintStrategy {
        match self {
            Constraint::VelocityLimited(_) => ConstraintStrategy::Velocity,
            Constraint::TorqueLimited(_) => ConstraintStrategy::Torque,
        }
    }
}

impl PhasePlaneConstraint for Constraint {
    fn table(&self) -> &DynamicsTable {
        match self {
            Constraint::VelocityLimited(c) => c.table(),
            Constraint::TorqueLimited(c) => c.table(),
        }
    }

    fn tolerances(&self) -> &Tolerances {
        match self {
            Constraint::VelocityLimited(c) => c.tolerances(),
            Constraint::TorqueLimited(c) => c.tolerances(),
        }
    }

    fn sdd_limits(&self, s: f64, sd: f64) -> Result<SddInterval, ConstraintError> {
        match self {
            Constraint::VelocityLimited(c) => c.sdd_limits(s, sd),
            Constraint::TorqueLimited(c) => c.sdd_limits(s, sd),
        }
    }

    fn sd_limit_bobrow_init(&self, s: f64) -> Result<f64, ConstraintError> {
        match self {
            Constraint::VelocityLimited(c) => c.sd_limit_bobrow_init(s),
            Constraint::TorqueLimited(c) => c.sd_limit_bobrow_init(s),
        }
    }

    fn sd_limit_combined(&self, s: f64) -> Result<f64, ConstraintError> {
        match self {
            Constraint::VelocityLimited(c) => c.sd_limit_combined(s),
            Constraint::TorqueLimited(c) => c.sd_limit_combined(s),
        }
    }

    fn find_singular_switch_points(&self) -> Result<SwitchPointScan, ConstraintError> {
        match self {
            Constraint::VelocityLimited(c) => c.find_singular_switch_points(),
            Constraint::TorqueLimited(c) => c.find_singular_switch_points(),
        }
    }

    fn find_discontinuous_switch_points(&self) -> Result<Vec<SwitchPoint>, ConstraintError> {
        match self {
            Constraint::VelocityLimited(c) => c.find_discontinuous_switch_points(),
            Constraint::TorqueLimited(c) => c.find_discontinuous_switch_points(),
        }
    }

    fn compute_slope_dynamic_singularity(&self, s: f64, sd: f64) -> Result<Vec<f64>, ConstraintError> {
        match self {
            Constraint::VelocityLimited(c) => c.compute_slope_dynamic_singularity(s, sd),
            Constraint::TorqueLimited(c) => c.compute_slope_dynamic_singularity(s, sd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::Coefficients;

    fn table() -> Arc<DynamicsTable> {
        Arc::new(
            DynamicsTable::tabulate(1, 1.0, 0.01, |_| Coefficients::new(vec![1.0], vec![0.0], vec![0.0])).unwrap(),
        )
    }

    #[test]
    fn test_interval_helpers() {
        let interval = SddInterval {
            min: -1.0,
            max: 2.0,
            min_joint: Some(0),
            max_joint: Some(1),
        };
        assert!(!interval.is_empty());
        assert!(interval.contains(2.0 + 1e-9, 1e-8));
        assert!(!interval.contains(2.1, 1e-8));
        assert_eq!(interval.ensure_admissible(0.1, 0.2), Ok(interval));
        assert!(SddInterval::empty().is_empty());
        assert!(!SddInterval::unbounded().is_empty());
        let err = SddInterval::empty().ensure_admissible(0.1, 0.2).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_build_selects_variant() {
        let limits = LimitsConfig {
            strategy: ConstraintStrategy::Torque,
            tau_min: vec![-1.0],
            tau_max: vec![1.0],
            vmax: None,
        };
        let constraint = Constraint::build(ConstraintStrategy::Torque, table(), &limits, Tolerances::default()).unwrap();
        assert_eq!(constraint.strategy(), ConstraintStrategy::Torque);
        let interval = constraint.sdd_limits(0.5, 3.0).unwrap();
        assert_eq!((interval.min, interval.max), (-1.0, 1.0));
        assert_eq!(constraint.sd_limit_bobrow_init(0.5).unwrap(), f64::INFINITY);

        // Velocity strategy needs vmax
        assert!(Constraint::build(ConstraintStrategy::Velocity, table(), &limits, Tolerances::default()).is_err());
        let limits = LimitsConfig {
            vmax: Some(vec![2.0]),
            ..limits
        };
        let constraint =
            Constraint::build(ConstraintStrategy::Velocity, table(), &limits, Tolerances::default()).unwrap();
        assert_eq!(constraint.strategy(), ConstraintStrategy::Velocity);
        // Tabulated tables carry zero tangents, so the velocity ceiling is unbounded
        assert_eq!(constraint.sd_limit_combined(0.5).unwrap(), f64::INFINITY);
        assert!(constraint.switch_points().unwrap().points.is_empty());
    }

    #[test]
    fn test_constraints_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Constraint>();
        assert_send_sync::<TorqueLimits>();
        assert_send_sync::<VelocityLimits>();
    }
}
