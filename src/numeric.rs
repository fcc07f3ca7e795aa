// src/numeric.rs - Small numerical helpers for switch-point detection

/// Stopping rules for bracketed root refinement.
#[derive(Debug, Clone, Copy)]
pub struct RootOptions {
    pub tolerance: f64,
    pub max_iterations: usize,
}

/// Refine a sign change of `f` inside [lo, hi].
///
/// Illinois-modified false position: exact in one step for linear `f`,
/// never leaves the bracket, and falls back to halving when the secant
/// point stalls. Returns `None` when the endpoints do not bracket a root.
pub fn find_root<F>(f: F, mut lo: f64, mut hi: f64, options: RootOptions) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let mut f_lo = f(lo);
    let mut f_hi = f(hi);
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if !f_lo.is_finite() || !f_hi.is_finite() || f_lo.signum() == f_hi.signum() {
        return None;
    }
    // Which end was kept on the previous step: -1 lo, 1 hi
    let mut retained = 0i8;
    let mut x = lo;
    for _ in 0..options.max_iterations {
        if hi - lo <= options.tolerance {
            break;
        }
        x = (lo * f_hi - hi * f_lo) / (f_hi - f_lo);
        if !(x > lo && x < hi) {
            x = 0.5 * (lo + hi);
        }
        let f_x = f(x);
        if f_x == 0.0 {
            return Some(x);
        }
        if f_x.signum() == f_lo.signum() {
            lo = x;
            f_lo = f_x;
            if retained == 1 {
                f_hi *= 0.5;
            }
            retained = 1;
        } else {
            hi = x;
            f_hi = f_x;
            if retained == -1 {
                f_lo *= 0.5;
            }
            retained = -1;
        }
    }
    if hi - lo <= options.tolerance {
        Some(0.5 * (lo + hi))
    } else {
        Some(x)
    }
}

/// Real roots of `a·x² + b·x + c = 0`, ascending.
///
/// Coefficients with magnitude at or below `tiny` are treated as zero, so a
/// vanishing leading term degrades to the linear case. An identically zero
/// polynomial has no isolated roots and yields an empty vector.
pub fn solve_quadratic(a: f64, b: f64, c: f64, tiny: f64) -> Vec<f64> {
    if a.abs() <= tiny {
        if b.abs() <= tiny {
            return Vec::new();
        }
        return vec![-c / b];
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return Vec::new();
    }
    if discriminant == 0.0 {
        return vec![-b / (2.0 * a)];
    }
    // Citardauq form avoids cancellation for the smaller root
    let q = -0.5 * (b + b.signum() * discriminant.sqrt());
    let mut roots = if q == 0.0 {
        vec![0.0, 0.0]
    } else {
        vec![q / a, c / q]
    };
    roots.sort_by(f64::total_cmp);
    roots.dedup();
    roots
}
