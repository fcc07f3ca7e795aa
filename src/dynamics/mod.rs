// src/dynamics/mod.rs - Robot dynamics: injected evaluator, sampling pass, coefficient table

mod planar;
pub mod sampler;
pub mod table;

pub use planar::PlanarArm;
pub use sampler::{sample_grid, sample_path};
pub use table::{Coefficients, DynamicsTable, SampleRow};

/// Inverse dynamics of a robot: the joint torques needed to realize a given
/// acceleration at a given configuration and velocity.
///
/// Torques must be affine in `qdd` and quadratic in `qd`, as for any rigid
/// multibody system; the sampler relies on that to split them into the
/// (a, b, c) path coefficients.
pub trait InverseDynamics: Send + Sync {
    fn dof(&self) -> usize;

    fn inverse_dynamics(&self, q: &[f64], qd: &[f64], qdd: &[f64]) -> Vec<f64>;
}
