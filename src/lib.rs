// src/lib.rs - Torque-limited time-optimal path parameterization primitives
//
// A geometric path and a robot's inverse dynamics are sampled once into a
// `DynamicsTable`; constraint variants then answer the queries of a
// phase-plane sweep (acceleration bounds, speed ceilings, switch points,
// slopes at dynamic singularities) against that shared table.

pub mod config;
pub mod constraints;
pub mod dynamics;
pub mod error;
pub mod numeric;
pub mod path;

pub use config::{ConfigError, ConstraintStrategy, ProblemConfig, SamplingConfig, Tolerances, load_config};
pub use constraints::{
    Constraint, PhasePlaneConstraint, SddInterval, SwitchPoint, SwitchPointKind, SwitchPointScan, TorqueLimits,
    VelocityLimits,
};
pub use dynamics::{Coefficients, DynamicsTable, InverseDynamics, PlanarArm, sample_path};
pub use error::ConstraintError;
pub use path::{Path, PathPoint, PiecewisePolynomialPath, Polynomial};
