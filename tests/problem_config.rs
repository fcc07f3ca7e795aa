// Integration tests: TOML problem files through sampling and switch-point detection

use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use tempfile::tempdir;
use topp_torque::config::{ConfigError, load_config};
use topp_torque::{Constraint, ConstraintStrategy, PhasePlaneConstraint, sample_path};
use topp_torque::path::Path;

const TRAJECTORY_PROBLEM: &str = r#"
[sampling]
step = 0.01

[limits]
strategy = "torque"
tau_min = [-60.0, -20.0]
tau_max = [60.0, 20.0]

[robot]
type = "planar_arm"

[path]
trajectory = """
0.8
2
-1.0 1.0 0.5
0.5 1.0 -0.5
0.7
2
-0.4 2.0
0.5 0.2
"""
"#;

fn write_problem(contents: &str) -> (tempfile::TempDir, String) {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("problem.toml");
    let mut file = File::create(&file_path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    (dir, file_path.to_str().unwrap().to_string())
}

#[test]
fn test_trajectory_problem_end_to_end() {
    let (_dir, file_path) = write_problem(TRAJECTORY_PROBLEM);
    let config = load_config(&file_path).unwrap();
    config.validate().unwrap();

    let path = config.path.build().unwrap();
    assert!((path.length() - 1.5).abs() < 1e-12);
    assert_eq!(path.discontinuities(), vec![0.8]);

    let table = Arc::new(sample_path(&path, &config.robot.build(), &config.sampling).unwrap());
    assert_eq!(table.len(), 151);
    let constraint = Constraint::build(config.limits.strategy, table, &config.limits, config.tolerances).unwrap();
    assert_eq!(constraint.strategy(), ConstraintStrategy::Torque);

    let scan = constraint.switch_points().unwrap();
    assert!(scan.points.iter().any(|p| (p.s - 0.8).abs() < 1e-12));
    assert!(scan.points.windows(2).all(|w| w[0].s <= w[1].s));
}

#[test]
fn test_velocity_problem_end_to_end() {
    let problem = r#"
        [limits]
        strategy = "velocity"
        vmax = [1.0, 1.0]

        [[path.segments]]
        duration = 1.0
        start = [0.0, 0.0]
        end = [0.5, 0.25]
        start_velocity = [0.5, 0.25]
        end_velocity = [0.5, 0.25]
    "#;
    let (_dir, file_path) = write_problem(problem);
    let config = load_config(&file_path).unwrap();
    config.validate().unwrap();
    let path = config.path.build().unwrap();
    let table = Arc::new(sample_path(&path, &config.robot.build(), &config.sampling).unwrap());
    let constraint = Constraint::build(config.limits.strategy, table, &config.limits, config.tolerances).unwrap();

    // Straight line in joint space: q' = (0.5, 0.25) everywhere
    for s in [0.0, 0.3, 1.0] {
        assert!((constraint.sd_limit_bobrow_init(s).unwrap() - 2.0).abs() < 1e-9);
    }
    assert!(constraint.switch_points().unwrap().points.is_empty());
}

#[test]
fn test_invalid_problem_rejected() {
    let problem = r#"
        [limits]
        tau_min = [-1.0]
        tau_max = [1.0]

        [[path.segments]]
        duration = 1.0
        start = [0.0, 0.0]
        end = [1.0, 1.0]
    "#;
    let (_dir, file_path) = write_problem(problem);
    let config = load_config(&file_path).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_bundled_problem_file_loads() {
    let config = load_config(concat!(env!("CARGO_MANIFEST_DIR"), "/topp.toml")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.limits.strategy, ConstraintStrategy::Torque);
    assert_eq!(config.limits.vmax, Some(vec![3.0, 4.0]));
}
