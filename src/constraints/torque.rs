// src/constraints/torque.rs - Joint torque limits: bounds, ceilings, singularities, slopes
use std::ops::Range;
use std::sync::Arc;

use super::switch_point::{SwitchPoint, SwitchPointScan, find_discontinuities};
use super::velocity::{validate_vmax, velocity_ceiling};
use super::{PhasePlaneConstraint, SddInterval};
use crate::config::Tolerances;
use crate::dynamics::{Coefficients, DynamicsTable};
use crate::error::ConstraintError;
use crate::numeric::{RootOptions, find_root, solve_quadratic};

/// Admissible range of x = sd², narrowed one linear constraint at a time.
#[derive(Debug, Clone, Copy)]
struct SquaredSpeedRange {
    lo: f64,
    hi: f64,
    feasible: bool,
}

impl SquaredSpeedRange {
    fn new() -> Self {
        Self {
            lo: 0.0,
            hi: f64::INFINITY,
            feasible: true,
        }
    }

    /// Intersect with { x : p + q·x >= 0 }. `slack` only applies when q is zero.
    fn require(&mut self, p: f64, q: f64, slack: f64) {
        if q == 0.0 {
            if p < -slack {
                self.feasible = false;
            }
            return;
        }
        let root = -p / q;
        if q > 0.0 {
            self.lo = self.lo.max(root);
        } else {
            self.hi = self.hi.min(root);
        }
        if self.lo > self.hi {
            self.feasible = false;
        }
    }

    fn max_speed(&self) -> f64 {
        if self.feasible { self.hi.sqrt() } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Crossing {
    s: f64,
    joint: usize,
    speed: f64,
}

/// Torque-limited constraint: tau_min <= a·sdd + b·sd² + c <= tau_max per joint,
/// optionally combined with joint velocity limits.
#[derive(Debug, Clone)]
pub struct TorqueLimits {
    table: Arc<DynamicsTable>,
    tau_min: Vec<f64>,
    tau_max: Vec<f64>,
    vmax: Option<Vec<f64>>,
    tolerances: Tolerances,
}

impl TorqueLimits {
    pub fn new(
        table: Arc<DynamicsTable>,
        tau_min: Vec<f64>,
        tau_max: Vec<f64>,
        tolerances: Tolerances,
    ) -> Result<Self, ConstraintError> {
        let ndof = table.ndof();
        if tau_min.len() != ndof || tau_max.len() != ndof {
            return Err(ConstraintError::InvalidParameters(format!(
                "Expected {} torque limits, got {} / {}",
                ndof,
                tau_min.len(),
                tau_max.len()
            )));
        }
        for (i, (lo, hi)) in tau_min.iter().zip(&tau_max).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(ConstraintError::InvalidParameters(format!(
                    "Joint {}: invalid torque bounds [{}, {}]",
                    i, lo, hi
                )));
            }
        }
        Ok(Self {
            table,
            tau_min,
            tau_max,
            vmax: None,
            tolerances,
        })
    }

    pub fn with_velocity_limits(mut self, vmax: Vec<f64>) -> Result<Self, ConstraintError> {
        validate_vmax(&self.table, &vmax)?;
        self.vmax = Some(vmax);
        Ok(self)
    }

    pub fn tau_min(&self) -> &[f64] {
        &self.tau_min
    }

    pub fn tau_max(&self) -> &[f64] {
        &self.tau_max
    }

    pub fn vmax(&self) -> Option<&[f64]> {
        self.vmax.as_deref()
    }

    fn torque_slack(&self, joint: usize) -> f64 {
        self.tolerances.torque * (1.0 + self.tau_min[joint].abs().max(self.tau_max[joint].abs()))
    }

    fn is_velocity_only(&self, a: f64) -> bool {
        a.abs() <= self.tolerances.zero_coefficient
    }

    /// (lower, upper) torque bounds as seen through the sign of `a`.
    fn ordered_bounds(&self, joint: usize, a: f64) -> (f64, f64) {
        if a > 0.0 {
            (self.tau_min[joint], self.tau_max[joint])
        } else {
            (self.tau_max[joint], self.tau_min[joint])
        }
    }

    fn interval_from(&self, coefficients: &Coefficients, sd: f64, skip: &[usize]) -> SddInterval {
        let sd2 = sd * sd;
        let mut interval = SddInterval::unbounded();
        for i in (0..coefficients.dof()).filter(|i| !skip.contains(i)) {
            let a = coefficients.a[i];
            let rest = coefficients.b[i] * sd2 + coefficients.c[i];
            if self.is_velocity_only(a) {
                let slack = self.torque_slack(i);
                if rest < self.tau_min[i] - slack || rest > self.tau_max[i] + slack {
                    return SddInterval {
                        min_joint: Some(i),
                        max_joint: Some(i),
                        ..SddInterval::empty()
                    };
                }
                continue;
            }
            let (alpha, beta) = self.ordered_bounds(i, a);
            let lower = (alpha - rest) / a;
            let upper = (beta - rest) / a;
            if lower > interval.min {
                interval.min = lower;
                interval.min_joint = Some(i);
            }
            if upper < interval.max {
                interval.max = upper;
                interval.max_joint = Some(i);
            }
        }
        interval
    }

    /// Largest sd with a non-empty `interval_from`. When rounding leaves the
    /// interval empty exactly at the closed-form ceiling, the ceiling is pulled
    /// down by at most `speed_tolerance` (relative).
    fn ceiling_from(&self, coefficients: &Coefficients) -> f64 {
        let ceiling = self.closed_form_ceiling(coefficients);
        if !ceiling.is_finite() || ceiling == 0.0 {
            return ceiling;
        }
        let mut sd = ceiling;
        let mut shrink = f64::EPSILON;
        while self.interval_from(coefficients, sd, &[]).is_empty() && shrink <= self.tolerances.speed_tolerance {
            sd = ceiling * (1.0 - shrink);
            shrink *= 16.0;
        }
        sd
    }

    fn closed_form_ceiling(&self, coefficients: &Coefficients) -> f64 {
        let mut range = SquaredSpeedRange::new();
        let (a, b, c) = (&coefficients.a, &coefficients.b, &coefficients.c);
        let mut carrying = Vec::with_capacity(a.len());
        for i in 0..a.len() {
            if self.is_velocity_only(a[i]) {
                let slack = self.torque_slack(i);
                range.require(c[i] - self.tau_min[i], b[i], slack);
                range.require(self.tau_max[i] - c[i], -b[i], slack);
            } else {
                carrying.push(i);
            }
        }
        // Lower bound of joint k must stay below upper bound of joint m
        for &k in &carrying {
            let (alpha_k, _) = self.ordered_bounds(k, a[k]);
            for &m in carrying.iter().filter(|&&m| m != k) {
                let (_, beta_m) = self.ordered_bounds(m, a[m]);
                let p = (beta_m - c[m]) / a[m] - (alpha_k - c[k]) / a[k];
                let q = b[k] / a[k] - b[m] / a[m];
                range.require(p, q, 0.0);
            }
            if !range.feasible {
                break;
            }
        }
        range.max_speed()
    }

    fn velocity_ceiling(&self, s: f64) -> Result<f64, ConstraintError> {
        match &self.vmax {
            Some(vmax) => velocity_ceiling(&self.table, vmax, s, self.tolerances.zero_coefficient),
            None => Ok(f64::INFINITY),
        }
    }

    /// Speed at which `joint`'s torque sits on its active bound with zero acceleration term.
    fn singular_speed(&self, coefficients: &Coefficients, joint: usize) -> Option<f64> {
        let (b, c) = (coefficients.b[joint], coefficients.c[joint]);
        if b.abs() <= self.tolerances.zero_coefficient {
            return None;
        }
        let active = if b > 0.0 { self.tau_max[joint] } else { self.tau_min[joint] };
        let squared = (active - c) / b;
        (squared >= 0.0 && squared.is_finite()).then(|| squared.sqrt())
    }

    /// Joint closest to singular and saturated at (s, sd).
    fn binding_joint(&self, coefficients: &Coefficients, sd: f64) -> usize {
        let scale_a = coefficients.a.iter().fold(0.0f64, |m, a| m.max(a.abs())).max(f64::MIN_POSITIVE);
        let score = |j: usize| {
            let rest = coefficients.b[j] * sd * sd + coefficients.c[j];
            let residual = (rest - self.tau_max[j]).abs().min((rest - self.tau_min[j]).abs());
            let scale_tau = 1.0 + self.tau_max[j].abs() + self.tau_min[j].abs();
            coefficients.a[j].abs() / scale_a + residual / scale_tau
        };
        (0..coefficients.dof())
            .min_by(|&i, &j| score(i).total_cmp(&score(j)))
            .unwrap_or(0)
    }

    fn slopes_for_joint(&self, s: f64, sd: f64, joint: usize, skip: &[usize]) -> Result<Vec<f64>, ConstraintError> {
        let coefficients = self.table.interpolate(s)?;
        let derivative = self.table.derivative(s)?;
        // a·σ² + (a' + 2b)·sd·σ + (b'·sd² + c') = 0 keeps the joint's torque on its bound
        let quadratic = coefficients.a[joint];
        let linear = (derivative.a[joint] + 2.0 * coefficients.b[joint]) * sd;
        let constant = derivative.b[joint] * sd * sd + derivative.c[joint];
        let roots = solve_quadratic(quadratic, linear, constant, self.tolerances.zero_coefficient);

        let others = self.interval_from(&coefficients, sd, skip);
        let mut slopes: Vec<f64> = roots
            .into_iter()
            .filter(|sigma| {
                let sdd = sd * sigma;
                let slack = self.tolerances.slope_tolerance * sdd.abs().max(1.0);
                others.contains(sdd, slack)
            })
            .collect();
        slopes.sort_by(f64::total_cmp);
        slopes.dedup_by(|x, y| (*x - *y).abs() <= self.tolerances.slope_tolerance);
        if slopes.is_empty() {
            tracing::debug!("No admissible slope for joint {} at s = {:.6}, sd = {:.6}", joint, s, sd);
        }
        Ok(slopes)
    }

    fn sign(&self, a: f64) -> i8 {
        if self.is_velocity_only(a) {
            0
        } else if a > 0.0 {
            1
        } else {
            -1
        }
    }

    /// Zero crossings of every joint's `a` over sample intervals `intervals`.
    fn crossings(&self, intervals: Range<usize>) -> Result<Vec<Crossing>, ConstraintError> {
        let grid = self.table.s_values();
        let options = RootOptions {
            tolerance: self.tolerances.root_tolerance,
            max_iterations: self.tolerances.max_iterations,
        };
        let mut crossings = Vec::new();
        for joint in 0..self.table.ndof() {
            for k in intervals.clone() {
                let (a0, a1) = (self.table.row(k).a[joint], self.table.row(k + 1).a[joint]);
                let (sign0, sign1) = (self.sign(a0), self.sign(a1));
                if sign0 == 0 || sign1 == sign0 {
                    continue;
                }
                let (s0, s1) = (grid[k], grid[k + 1]);
                let root = if sign1 == 0 {
                    Some(s1)
                } else {
                    let a_at = |s: f64| {
                        let t = (s - s0) / (s1 - s0);
                        (1.0 - t) * a0 + t * a1
                    };
                    find_root(a_at, s0, s1, options)
                };
                let Some(root) = root else {
                    tracing::warn!("Could not refine zero crossing of joint {} in [{:.6}, {:.6}]", joint, s0, s1);
                    continue;
                };
                let coefficients = self.table.interpolate(root)?;
                match self.singular_speed(&coefficients, joint) {
                    Some(speed) => crossings.push(Crossing { s: root, joint, speed }),
                    None => tracing::debug!("Joint {} crosses zero at s = {:.6} without a singular speed", joint, root),
                }
            }
        }
        crossings.sort_by(|x, y| x.s.total_cmp(&y.s));
        Ok(crossings)
    }

    /// Singular switch points whose crossings fall in sample intervals `intervals`
    /// (interval k spans samples k and k+1). Lets callers scan a long path in pieces.
    pub fn find_singular_switch_points_in(&self, intervals: Range<usize>) -> Result<SwitchPointScan, ConstraintError> {
        let last = self.table.len() - 1;
        let end = intervals.end.min(last);
        let start = intervals.start.min(end);
        let crossings = self.crossings(start..end)?;

        let mut groups: Vec<Vec<Crossing>> = Vec::new();
        for crossing in crossings {
            let joins = groups
                .last()
                .and_then(|group| group.last())
                .is_some_and(|prev| crossing.s - prev.s < self.tolerances.min_separation);
            match groups.last_mut() {
                Some(group) if joins => group.push(crossing),
                _ => groups.push(vec![crossing]),
            }
        }

        let mut scan = SwitchPointScan::default();
        for group in groups {
            if let Some(conflict) = self.inconsistency(&group) {
                tracing::warn!("{}", conflict);
                scan.conflicts.push(conflict);
                continue;
            }
            let Some(lead) = group.iter().copied().min_by(|x, y| x.speed.total_cmp(&y.speed)) else {
                continue;
            };
            let joints: Vec<usize> = group.iter().map(|c| c.joint).collect();
            let mut coefficients = self.table.interpolate(lead.s)?;
            for &j in &joints {
                coefficients.a[j] = 0.0;
            }
            let ceiling = self.ceiling_from(&coefficients).min(self.velocity_ceiling(lead.s)?);
            let tolerance = self.tolerances.speed_tolerance * lead.speed.max(1.0);
            if (lead.speed - ceiling).abs() > tolerance {
                tracing::debug!(
                    "Singular speed {:.6} of joint {} at s = {:.6} is not binding (ceiling {:.6})",
                    lead.speed,
                    lead.joint,
                    lead.s,
                    ceiling
                );
                continue;
            }
            let slopes = self.slopes_for_joint(lead.s, lead.speed, lead.joint, &joints)?;
            scan.points.push(SwitchPoint::singular(lead.s, lead.speed, lead.joint, slopes));
        }
        tracing::info!(
            "Singular scan over intervals {}..{}: {} points, {} conflicts",
            start,
            end,
            scan.points.len(),
            scan.conflicts.len()
        );
        Ok(scan)
    }

    fn inconsistency(&self, group: &[Crossing]) -> Option<ConstraintError> {
        for (n, first) in group.iter().enumerate() {
            for second in group[n + 1..].iter().filter(|c| c.joint != first.joint) {
                let tolerance = self.tolerances.speed_tolerance * first.speed.max(second.speed).max(1.0);
                if (first.speed - second.speed).abs() > tolerance {
                    return Some(ConstraintError::InconsistentSingularity {
                        s: first.s,
                        first_joint: first.joint,
                        first_speed: first.speed,
                        second_joint: second.joint,
                        second_speed: second.speed,
                    });
                }
            }
        }
        None
    }
}

impl PhasePlaneConstraint for TorqueLimits {
    fn table(&self) -> &DynamicsTable {
        &self.table
    }

    fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    fn sdd_limits(&self, s: f64, sd: f64) -> Result<SddInterval, ConstraintError> {
        let coefficients = self.table.interpolate(s)?;
        Ok(self.interval_from(&coefficients, sd, &[]))
    }

    fn sd_limit_bobrow_init(&self, s: f64) -> Result<f64, ConstraintError> {
        let coefficients = self.table.interpolate(s)?;
        Ok(self.ceiling_from(&coefficients))
    }

    fn sd_limit_combined(&self, s: f64) -> Result<f64, ConstraintError> {
        Ok(self.sd_limit_bobrow_init(s)?.min(self.velocity_ceiling(s)?))
    }

    fn find_singular_switch_points(&self) -> Result<SwitchPointScan, ConstraintError> {
        self.find_singular_switch_points_in(0..self.table.len() - 1)
    }

    fn find_discontinuous_switch_points(&self) -> Result<Vec<SwitchPoint>, ConstraintError> {
        find_discontinuities(&self.table, &self.tolerances, |s| self.sd_limit_combined(s))
    }

    fn compute_slope_dynamic_singularity(&self, s: f64, sd: f64) -> Result<Vec<f64>, ConstraintError> {
        let coefficients = self.table.interpolate(s)?;
        let joint = self.binding_joint(&coefficients, sd);
        self.slopes_for_joint(s, sd, joint, &[joint])
    }
}
