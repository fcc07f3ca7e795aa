// src/main.rs - Inspect the phase-plane constraints of a configured problem
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use topp_torque::{
    Constraint, ConstraintStrategy, PhasePlaneConstraint, SddInterval, SwitchPoint, load_config, sample_path,
};
use topp_torque::path::Path;

/// Torque-limited TOPP constraint inspector
#[derive(Parser, Debug)]
#[command(name = "topp-inspect", about = "Sample a path and report its phase-plane switch points.")]
struct Cli {
    /// Path to the TOML problem file
    #[arg(default_value = "topp.toml")]
    config: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Also tabulate the speed ceiling and acceleration bounds at N points
    #[arg(long, value_name = "N")]
    profile: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct ProfileRow {
    s: f64,
    ceiling: f64,
    /// Speed the interval was evaluated at
    sd: f64,
    interval: SddInterval,
}

#[derive(Debug, Serialize)]
struct Report {
    strategy: ConstraintStrategy,
    length: f64,
    samples: usize,
    switch_points: Vec<SwitchPoint>,
    conflicts: Vec<String>,
    profile: Vec<ProfileRow>,
}

fn profile(constraint: &Constraint, length: f64, rows: usize) -> Result<Vec<ProfileRow>, Box<dyn std::error::Error>> {
    let mut profile = Vec::with_capacity(rows);
    for k in 0..rows {
        let s = if rows > 1 { length * k as f64 / (rows - 1) as f64 } else { 0.0 };
        let ceiling = constraint.sd_limit_combined(s)?;
        // Evaluate just below the ceiling, or at rest when it is unbounded
        let sd = if ceiling.is_finite() { 0.9 * ceiling } else { 0.0 };
        let interval = constraint.sdd_limits(s, sd)?;
        profile.push(ProfileRow { s, ceiling, sd, interval });
    }
    Ok(profile)
}

fn print_text(report: &Report) {
    println!(
        "{:?} constraint on a path of length {:.4} ({} samples)",
        report.strategy, report.length, report.samples
    );
    println!("Switch points: {}", report.switch_points.len());
    for point in &report.switch_points {
        let slopes = point
            .slopes
            .iter()
            .map(|s| format!("{:.5}", s))
            .collect::<Vec<_>>()
            .join(", ");
        match point.joint {
            Some(joint) => println!(
                "  s = {:.6}  sd = {:.6}  {:?} (joint {})  slopes [{}]",
                point.s, point.sd, point.kind, joint, slopes
            ),
            None => println!("  s = {:.6}  sd = {:.6}  {:?}", point.s, point.sd, point.kind),
        }
    }
    if !report.conflicts.is_empty() {
        println!("Locally infeasible:");
        for conflict in &report.conflicts {
            println!("  {}", conflict);
        }
    }
    if !report.profile.is_empty() {
        println!("{:>10} {:>12} {:>12} {:>12} {:>12}", "s", "ceiling", "sd", "sdd_min", "sdd_max");
        for row in &report.profile {
            println!(
                "{:>10.4} {:>12.5} {:>12.5} {:>12.5} {:>12.5}",
                row.s, row.ceiling, row.sd, row.interval.min, row.interval.max
            );
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    tracing::info!("Loading problem from: {}", cli.config);
    let config = load_config(&cli.config)?;
    config.validate()?;

    let path = config.path.build()?;
    let robot = config.robot.build();
    tracing::info!("Path: {} joints, length {:.4}", path.dof(), path.length());

    let table = Arc::new(sample_path(&path, &robot, &config.sampling)?);
    let constraint = Constraint::build(config.limits.strategy, table.clone(), &config.limits, config.tolerances)?;
    let scan = constraint.switch_points()?;

    let report = Report {
        strategy: constraint.strategy(),
        length: path.length(),
        samples: table.len(),
        switch_points: scan.points,
        conflicts: scan.conflicts.iter().map(|c| c.to_string()).collect(),
        profile: match cli.profile {
            Some(rows) => profile(&constraint, path.length(), rows)?,
            None => Vec::new(),
        },
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }
    Ok(())
}
