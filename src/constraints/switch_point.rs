// src/constraints/switch_point.rs - Switch points and discontinuity detection
use serde::Serialize;

use crate::config::Tolerances;
use crate::dynamics::DynamicsTable;
use crate::error::ConstraintError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchPointKind {
    Singular,
    Discontinuous,
}

/// A location where the maximal-speed profile has to change integration direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchPoint {
    /// Arc length
    pub s: f64,
    /// Speed the profile must pass through at `s`
    pub sd: f64,
    pub kind: SwitchPointKind,
    /// Admissible phase-plane slopes dsd/ds (singular points only)
    pub slopes: Vec<f64>,
    /// Joint whose acceleration coefficient vanishes (singular points only)
    pub joint: Option<usize>,
}

impl SwitchPoint {
    pub fn singular(s: f64, sd: f64, joint: usize, slopes: Vec<f64>) -> Self {
        Self {
            s,
            sd,
            kind: SwitchPointKind::Singular,
            slopes,
            joint: Some(joint),
        }
    }

    pub fn discontinuous(s: f64, sd: f64) -> Self {
        Self {
            s,
            sd,
            kind: SwitchPointKind::Discontinuous,
            slopes: Vec::new(),
            joint: None,
        }
    }

    /// Slopes the sweep may leave a singular point along.
    pub fn traversal_slopes(&self) -> Result<&[f64], ConstraintError> {
        if self.kind == SwitchPointKind::Singular && self.slopes.is_empty() {
            return Err(ConstraintError::NoFeasibleSlope { s: self.s, sd: self.sd });
        }
        Ok(&self.slopes)
    }
}

/// Ordered switch points plus the locations flagged as locally infeasible.
#[derive(Debug, Clone, Default)]
pub struct SwitchPointScan {
    pub points: Vec<SwitchPoint>,
    pub conflicts: Vec<ConstraintError>,
}

impl SwitchPointScan {
    pub fn is_locally_feasible(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn singular(&self) -> impl Iterator<Item = &SwitchPoint> {
        self.points.iter().filter(|p| p.kind == SwitchPointKind::Singular)
    }

    pub fn discontinuous(&self) -> impl Iterator<Item = &SwitchPoint> {
        self.points.iter().filter(|p| p.kind == SwitchPointKind::Discontinuous)
    }

    /// Append another scan over a later part of the path.
    pub fn extend(&mut self, other: SwitchPointScan) {
        self.points.extend(other.points);
        self.conflicts.extend(other.conflicts);
        self.points.sort_by(|a, b| a.s.total_cmp(&b.s));
    }

    /// Add discontinuous points, skipping those within `separation` of a singular point.
    pub fn merge_discontinuous(&mut self, discontinuous: Vec<SwitchPoint>, separation: f64) {
        let singular: Vec<f64> = self.singular().map(|p| p.s).collect();
        let kept = discontinuous
            .into_iter()
            .filter(|p| singular.iter().all(|s| (p.s - s).abs() >= separation));
        self.points.extend(kept);
        self.points.sort_by(|a, b| a.s.total_cmp(&b.s));
    }
}

/// Minimum distance between reported switch points: never below the grid resolution.
pub fn effective_separation(table: &DynamicsTable, tolerances: &Tolerances) -> f64 {
    tolerances.min_separation.max(2.0 * table.max_spacing())
}

fn ceiling_change(from: f64, to: f64) -> f64 {
    match (from.is_finite(), to.is_finite()) {
        (true, true) => to - from,
        (false, false) => 0.0,
        _ => f64::INFINITY,
    }
}

/// Discontinuous switch points of a speed ceiling sampled on `table`'s grid:
/// recorded path boundaries plus detected ceiling jumps.
pub fn find_discontinuities<F>(
    table: &DynamicsTable,
    tolerances: &Tolerances,
    ceiling: F,
) -> Result<Vec<SwitchPoint>, ConstraintError>
where
    F: Fn(f64) -> Result<f64, ConstraintError>,
{
    let grid = table.s_values();
    let values = grid.iter().map(|&s| ceiling(s)).collect::<Result<Vec<f64>, _>>()?;
    let mut points = Vec::new();

    for &boundary in table.boundaries() {
        let above = grid.partition_point(|&s| s <= boundary);
        let Some(below) = grid.partition_point(|&s| s < boundary).checked_sub(1) else {
            continue;
        };
        if above >= grid.len() {
            continue;
        }
        points.push(SwitchPoint::discontinuous(boundary, values[below].min(values[above])));
    }

    let mut jumps = Vec::new();
    let changes: Vec<f64> = values.windows(2).map(|w| ceiling_change(w[0], w[1])).collect();
    let neighbour = |k: Option<usize>| {
        k.and_then(|k| changes.get(k))
            .map(|d| d.abs())
            .filter(|d| d.is_finite())
            .unwrap_or(0.0)
    };
    for (k, change) in changes.iter().enumerate() {
        let (left, right) = (values[k], values[k + 1]);
        let is_jump = match (left.is_finite(), right.is_finite()) {
            (true, true) => {
                let surrounding = neighbour(k.checked_sub(1)).max(neighbour(Some(k + 1)));
                change.abs() > tolerances.jump_ratio * surrounding
                    && change.abs() > tolerances.jump_floor * left.min(right).max(1.0)
            }
            (false, false) => false,
            _ => true,
        };
        if is_jump {
            let (s, sd) = if left <= right { (grid[k], left) } else { (grid[k + 1], right) };
            tracing::debug!("Speed ceiling jumps from {:.6} to {:.6} near s = {:.6}", left, right, s);
            jumps.push(SwitchPoint::discontinuous(s, sd));
        }
    }

    // Jumps next to a recorded boundary belong to that boundary
    let separation = effective_separation(table, tolerances);
    let recorded = points.len();
    for jump in jumps {
        match points[..recorded].iter_mut().find(|p| (p.s - jump.s).abs() < separation) {
            Some(boundary) => boundary.sd = boundary.sd.min(jump.sd),
            None => points.push(jump),
        }
    }

    points.sort_by(|a, b| a.s.total_cmp(&b.s));
    Ok(dedupe(points, separation))
}

/// Collapse points closer than `separation`, keeping the lower speed.
fn dedupe(points: Vec<SwitchPoint>, separation: f64) -> Vec<SwitchPoint> {
    let mut kept: Vec<SwitchPoint> = Vec::with_capacity(points.len());
    for point in points {
        match kept.last_mut() {
            Some(last) if point.s - last.s < separation => {
                if point.sd < last.sd {
                    *last = point;
                }
            }
            _ => kept.push(point),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::Coefficients;

    fn flat_table(boundaries: Vec<f64>) -> DynamicsTable {
        let base = DynamicsTable::tabulate(1, 1.0, 0.01, |_| Coefficients::new(vec![1.0], vec![0.0], vec![0.0])).unwrap();
        let n = base.len();
        DynamicsTable::from_rows(1, base.s_values().to_vec(), vec![0.0; n * 4], boundaries, 1e-9).unwrap()
    }

    #[test]
    fn test_step_in_ceiling_detected_once() {
        let table = flat_table(Vec::new());
        let tolerances = Tolerances::default();
        let points = find_discontinuities(&table, &tolerances, |s| Ok(if s < 0.4 { 2.0 } else { 1.0 })).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].kind, SwitchPointKind::Discontinuous);
        assert!((points[0].s - 0.4).abs() < 0.011);
        assert_eq!(points[0].sd, 1.0);
    }

    #[test]
    fn test_smooth_ceiling_has_no_jumps() {
        let table = flat_table(Vec::new());
        let tolerances = Tolerances::default();
        let points = find_discontinuities(&table, &tolerances, |s| Ok(1.0 + (s - 0.5).abs())).unwrap();
        assert!(points.is_empty());
        let points = find_discontinuities(&table, &tolerances, |_| Ok(f64::INFINITY)).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_finite_to_infinite_is_a_jump() {
        let table = flat_table(Vec::new());
        let tolerances = Tolerances::default();
        let points =
            find_discontinuities(&table, &tolerances, |s| Ok(if s < 0.7 { 3.0 } else { f64::INFINITY })).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].sd, 3.0);
    }

    #[test]
    fn test_known_boundaries_reported() {
        let table = flat_table(vec![0.255, 0.75]);
        let tolerances = Tolerances::default();
        let points = find_discontinuities(&table, &tolerances, |s| Ok(if s < 0.255 { 1.5 } else { 1.2 })).unwrap();
        // The jump coincides with the first boundary and is merged into it
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].s, 0.255);
        assert_eq!(points[0].sd, 1.2);
        assert_eq!(points[1].s, 0.75);
        assert_eq!(points[1].sd, 1.2);
    }

    #[test]
    fn test_merge_skips_points_near_singular() {
        let mut scan = SwitchPointScan {
            points: vec![SwitchPoint::singular(0.5, 1.0, 0, vec![-0.2])],
            conflicts: Vec::new(),
        };
        scan.merge_discontinuous(
            vec![SwitchPoint::discontinuous(0.505, 1.1), SwitchPoint::discontinuous(0.2, 0.9)],
            0.02,
        );
        assert_eq!(scan.points.len(), 2);
        assert_eq!(scan.points[0].s, 0.2);
        assert_eq!(scan.points[1].kind, SwitchPointKind::Singular);
        assert!(scan.is_locally_feasible());
    }

    #[test]
    fn test_traversal_slopes() {
        let point = SwitchPoint::singular(0.3, 1.0, 1, Vec::new());
        assert!(matches!(point.traversal_slopes(), Err(ConstraintError::NoFeasibleSlope { .. })));
        let point = SwitchPoint::singular(0.3, 1.0, 1, vec![0.5]);
        assert_eq!(point.traversal_slopes().unwrap(), &[0.5]);
        assert!(SwitchPoint::discontinuous(0.3, 1.0).traversal_slopes().unwrap().is_empty());
    }
}
