//! # Problem Configuration
//!
//! Sampling density, numerical tolerances, actuator limits, robot model and
//! path are all read from a single TOML file.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [sampling]
//! step = 0.005
//!
//! [tolerances]
//! zero_coefficient = 1e-10
//! max_iterations = 80
//!
//! [limits]
//! strategy = "torque"
//! tau_min = [-40.0, -15.0]
//! tau_max = [40.0, 15.0]
//!
//! [robot]
//! type = "planar_arm"
//! link_lengths = [1.0, 0.8]
//! masses = [2.0, 1.0]
//!
//! [[path.segments]]
//! duration = 1.5
//! start = [-1.0, 0.5]
//! end = [1.0, -0.5]
//! start_velocity = [1.0, 1.0]
//! end_velocity = [-1.0, -1.0]
//! ```
//!
//! Every field has a default, so partial files are fine; `ProblemConfig::validate`
//! catches the combinations that cannot describe a problem.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dynamics::PlanarArm;
use crate::error::ConstraintError;
use crate::path::{PiecewisePolynomialPath, Polynomial};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Path error: {0}")]
    Path(#[from] ConstraintError),
}

/// Main configuration struct: one retiming problem.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProblemConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub tolerances: Tolerances,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub path: PathConfig,
}

/// Discretization of the path for the one-time dynamics pass.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplingConfig {
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Grids smaller than this are sampled on the calling thread.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    /// Queries this far outside the sampled domain are clamped instead of rejected.
    #[serde(default = "default_domain_tolerance")]
    pub domain_tolerance: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            parallel: default_parallel(),
            parallel_threshold: default_parallel_threshold(),
            domain_tolerance: default_domain_tolerance(),
        }
    }
}

impl SamplingConfig {
    pub fn with_step(step: f64) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }
}

/// Numerical tolerances used by the bound evaluators and switch-point finders.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Tolerances {
    /// |a_i| at or below this makes joint i velocity-only.
    #[serde(default = "default_zero_coefficient")]
    pub zero_coefficient: f64,
    /// Torque slack when checking velocity-only joints.
    #[serde(default = "default_torque_tolerance")]
    pub torque: f64,
    /// Width at which zero-crossing refinement stops.
    #[serde(default = "default_root_tolerance")]
    pub root_tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Relative tolerance for comparing singular speeds with each other and with the ceiling.
    #[serde(default = "default_speed_tolerance")]
    pub speed_tolerance: f64,
    /// Slack on sdd when validating candidate slopes against the other joints.
    #[serde(default = "default_slope_tolerance")]
    pub slope_tolerance: f64,
    /// Minimum distance between two reported switch points.
    #[serde(default = "default_min_separation")]
    pub min_separation: f64,
    /// A ceiling change this many times larger than both neighbouring changes is a jump.
    #[serde(default = "default_jump_ratio")]
    pub jump_ratio: f64,
    /// Jumps smaller than this fraction of the ceiling value are ignored.
    #[serde(default = "default_jump_floor")]
    pub jump_floor: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            zero_coefficient: default_zero_coefficient(),
            torque: default_torque_tolerance(),
            root_tolerance: default_root_tolerance(),
            max_iterations: default_max_iterations(),
            speed_tolerance: default_speed_tolerance(),
            slope_tolerance: default_slope_tolerance(),
            min_separation: default_min_separation(),
            jump_ratio: default_jump_ratio(),
            jump_floor: default_jump_floor(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintStrategy {
    Velocity,
    #[default]
    Torque,
}

/// Actuator limits and the constraint variant they feed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default)]
    pub strategy: ConstraintStrategy,
    #[serde(default)]
    pub tau_min: Vec<f64>,
    #[serde(default)]
    pub tau_max: Vec<f64>,
    #[serde(default)]
    pub vmax: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobotConfig {
    PlanarArm {
        #[serde(default = "default_link_lengths")]
        link_lengths: [f64; 2],
        #[serde(default = "default_masses")]
        masses: [f64; 2],
        #[serde(default = "default_gravity")]
        gravity: f64,
    },
}

impl Default for RobotConfig {
    fn default() -> Self {
        RobotConfig::PlanarArm {
            link_lengths: default_link_lengths(),
            masses: default_masses(),
            gravity: default_gravity(),
        }
    }
}

impl RobotConfig {
    pub fn dof(&self) -> usize {
        match self {
            RobotConfig::PlanarArm { .. } => 2,
        }
    }

    pub fn build(&self) -> PlanarArm {
        match self {
            RobotConfig::PlanarArm {
                link_lengths,
                masses,
                gravity,
            } => PlanarArm::new(*link_lengths, *masses, *gravity),
        }
    }
}

/// One cubic (Hermite) piece of the geometric path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CubicSegmentConfig {
    pub duration: f64,
    pub start: Vec<f64>,
    pub end: Vec<f64>,
    #[serde(default)]
    pub start_velocity: Vec<f64>,
    #[serde(default)]
    pub end_velocity: Vec<f64>,
}

/// Geometric path, either as a TOPP trajectory string or as cubic segments.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathConfig {
    #[serde(default)]
    pub trajectory: Option<String>,
    #[serde(default)]
    pub segments: Vec<CubicSegmentConfig>,
}

impl PathConfig {
    pub fn build(&self) -> Result<PiecewisePolynomialPath, ConfigError> {
        if let Some(text) = &self.trajectory {
            return Ok(text.parse()?);
        }
        let mut chunks = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let ndof = segment.start.len();
            let zeros = vec![0.0; ndof];
            let start_velocity = if segment.start_velocity.is_empty() { &zeros } else { &segment.start_velocity };
            let end_velocity = if segment.end_velocity.is_empty() { &zeros } else { &segment.end_velocity };
            let polynomials = (0..ndof)
                .map(|i| {
                    Polynomial::cubic_interpolation(
                        segment.start[i],
                        segment.end[i],
                        start_velocity[i],
                        end_velocity[i],
                        segment.duration,
                    )
                })
                .collect();
            chunks.push((segment.duration, polynomials));
        }
        Ok(PiecewisePolynomialPath::new(chunks)?)
    }
}

impl ProblemConfig {
    /// Validate the configuration (positivity, vector lengths, bound ordering).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if !(self.sampling.step > 0.0) || !self.sampling.step.is_finite() {
            return invalid(format!("Sampling step must be > 0, got {}", self.sampling.step));
        }
        if self.sampling.domain_tolerance < 0.0 {
            return invalid("Sampling domain_tolerance must be >= 0".to_string());
        }
        let tol = &self.tolerances;
        if tol.max_iterations == 0 {
            return invalid("Tolerance max_iterations must be > 0".to_string());
        }
        for (name, value) in [
            ("zero_coefficient", tol.zero_coefficient),
            ("torque", tol.torque),
            ("root_tolerance", tol.root_tolerance),
            ("speed_tolerance", tol.speed_tolerance),
            ("slope_tolerance", tol.slope_tolerance),
            ("min_separation", tol.min_separation),
            ("jump_floor", tol.jump_floor),
        ] {
            if value < 0.0 || !value.is_finite() {
                return invalid(format!("Tolerance {} must be finite and >= 0, got {}", name, value));
            }
        }
        if tol.jump_ratio <= 1.0 {
            return invalid(format!("Tolerance jump_ratio must be > 1, got {}", tol.jump_ratio));
        }

        let ndof = self.robot.dof();
        let limits = &self.limits;
        match limits.strategy {
            ConstraintStrategy::Torque => {
                if limits.tau_min.len() != ndof || limits.tau_max.len() != ndof {
                    return invalid(format!(
                        "Torque limits must have {} entries, got {} / {}",
                        ndof,
                        limits.tau_min.len(),
                        limits.tau_max.len()
                    ));
                }
                for (i, (lo, hi)) in limits.tau_min.iter().zip(&limits.tau_max).enumerate() {
                    if lo > hi {
                        return invalid(format!("Joint {}: tau_min {} exceeds tau_max {}", i, lo, hi));
                    }
                }
            }
            ConstraintStrategy::Velocity => {
                if limits.vmax.is_none() {
                    return invalid("Velocity strategy requires vmax".to_string());
                }
            }
        }
        if let Some(vmax) = &limits.vmax {
            if vmax.len() != ndof {
                return invalid(format!("vmax must have {} entries, got {}", ndof, vmax.len()));
            }
            if vmax.iter().any(|v| *v <= 0.0) {
                return invalid("vmax entries must be > 0".to_string());
            }
        }

        if self.path.trajectory.is_none() {
            if self.path.segments.is_empty() {
                return invalid("Path needs a trajectory string or at least one segment".to_string());
            }
            for (k, segment) in self.path.segments.iter().enumerate() {
                if segment.duration <= 0.0 {
                    return invalid(format!("Segment {} duration must be > 0", k));
                }
                let lengths_ok = segment.start.len() == ndof
                    && segment.end.len() == ndof
                    && (segment.start_velocity.is_empty() || segment.start_velocity.len() == ndof)
                    && (segment.end_velocity.is_empty() || segment.end_velocity.len() == ndof);
                if !lengths_ok {
                    return invalid(format!("Segment {} vectors must have {} entries", k, ndof));
                }
            }
        }
        Ok(())
    }
}

// Default value functions
fn default_step() -> f64 { 0.01 }
fn default_parallel() -> bool { true }
fn default_parallel_threshold() -> usize { 256 }
fn default_domain_tolerance() -> f64 { 1e-9 }
fn default_zero_coefficient() -> f64 { 1e-10 }
fn default_torque_tolerance() -> f64 { 1e-8 }
fn default_root_tolerance() -> f64 { 1e-12 }
fn default_max_iterations() -> usize { 64 }
fn default_speed_tolerance() -> f64 { 1e-4 }
fn default_slope_tolerance() -> f64 { 1e-6 }
fn default_min_separation() -> f64 { 1e-3 }
fn default_jump_ratio() -> f64 { 10.0 }
fn default_jump_floor() -> f64 { 0.05 }
fn default_link_lengths() -> [f64; 2] { [1.0, 0.8] }
fn default_masses() -> [f64; 2] { [2.0, 1.0] }
fn default_gravity() -> f64 { 9.81 }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<ProblemConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const ARM_PROBLEM: &str = r#"
        [sampling]
        step = 0.005
        parallel = false

        [tolerances]
        max_iterations = 80

        [limits]
        strategy = "torque"
        tau_min = [-40.0, -15.0]
        tau_max = [40.0, 15.0]
        vmax = [3.0, 3.0]

        [robot]
        type = "planar_arm"
        link_lengths = [1.0, 0.5]

        [[path.segments]]
        duration = 1.5
        start = [-1.0, 0.5]
        end = [1.0, -0.5]
        start_velocity = [1.0, 1.0]
        end_velocity = [-1.0, -1.0]
    "#;

    #[test]
    fn test_default_values() {
        let config = ProblemConfig::default();
        assert_eq!(config.sampling.step, 0.01);
        assert!(config.sampling.parallel);
        assert_eq!(config.tolerances.zero_coefficient, 1e-10);
        assert_eq!(config.tolerances.max_iterations, 64);
        assert_eq!(config.limits.strategy, ConstraintStrategy::Torque);
        assert_eq!(config.robot.dof(), 2);
        // No path and no limits: the default problem is incomplete
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_problem_parsing() {
        let config: ProblemConfig = toml::from_str(ARM_PROBLEM).unwrap();
        assert_eq!(config.sampling.step, 0.005);
        assert!(!config.sampling.parallel);
        assert_eq!(config.tolerances.max_iterations, 80);
        // Defaults for missing fields
        assert_eq!(config.tolerances.jump_ratio, 10.0);
        assert_eq!(config.limits.tau_max, vec![40.0, 15.0]);
        match &config.robot {
            RobotConfig::PlanarArm { link_lengths, masses, gravity } => {
                assert_eq!(*link_lengths, [1.0, 0.5]);
                assert_eq!(*masses, [2.0, 1.0]);
                assert_eq!(*gravity, 9.81);
            }
        }
        assert!(config.validate().is_ok());
        let path = config.path.build().unwrap();
        assert!((crate::path::Path::length(&path) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_swapped_torque_bounds() {
        let mut config: ProblemConfig = toml::from_str(ARM_PROBLEM).unwrap();
        config.limits.tau_min = vec![50.0, -15.0];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("Joint 0"));
    }

    #[test]
    fn test_validate_velocity_strategy_needs_vmax() {
        let mut config: ProblemConfig = toml::from_str(ARM_PROBLEM).unwrap();
        config.limits.strategy = ConstraintStrategy::Velocity;
        config.limits.vmax = None;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_step() {
        let mut config: ProblemConfig = toml::from_str(ARM_PROBLEM).unwrap();
        config.sampling.step = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_success() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("problem.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", ARM_PROBLEM).unwrap();
        file.flush().unwrap();
        let config = load_config(file_path.to_str().unwrap()).unwrap();
        assert_eq!(config.limits.tau_min, vec![-40.0, -15.0]);
        assert_eq!(config.path.segments.len(), 1);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent_problem.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "not a valid toml").unwrap();
        file.flush().unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_trajectory_string_path() {
        let config = PathConfig {
            trajectory: Some("1.0\n1\n0.0 1.0\n".to_string()),
            segments: Vec::new(),
        };
        let path = config.build().unwrap();
        assert_eq!(crate::path::Path::length(&path), 1.0);
    }
}
