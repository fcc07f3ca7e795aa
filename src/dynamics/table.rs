// src/dynamics/table.rs - Sampled dynamics coefficients and their interpolation
use super::sampler::sample_grid;
use crate::error::ConstraintError;

// Per-sample layout: a | b | c | tangent, each `ndof` wide
const COMPONENTS: usize = 4;

/// Dynamics coefficients at one arc length: torque_i = a_i·sdd + b_i·sd² + c_i.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
}

impl Coefficients {
    pub fn new(a: Vec<f64>, b: Vec<f64>, c: Vec<f64>) -> Self {
        Self { a, b, c }
    }

    pub fn dof(&self) -> usize {
        self.a.len()
    }

    /// Torque of `joint` at path speed `sd` and path acceleration `sdd`.
    pub fn torque(&self, joint: usize, sd: f64, sdd: f64) -> f64 {
        self.a[joint] * sdd + self.b[joint] * sd * sd + self.c[joint]
    }
}

/// Borrowed view of one stored sample.
#[derive(Debug, Clone, Copy)]
pub struct SampleRow<'a> {
    pub s: f64,
    pub a: &'a [f64],
    pub b: &'a [f64],
    pub c: &'a [f64],
    pub tangent: &'a [f64],
}

/// Immutable table of dynamics samples along a path.
///
/// All samples live in one contiguous buffer indexed by `[sample][component][joint]`;
/// samples are addressed by index. Built once, then shared read-only.
#[derive(Debug, Clone)]
pub struct DynamicsTable {
    ndof: usize,
    s: Vec<f64>,
    data: Vec<f64>,
    boundaries: Vec<f64>,
    domain_tolerance: f64,
}

impl DynamicsTable {
    /// Assemble a table from a grid and a flat buffer of `s.len()` rows.
    pub fn from_rows(
        ndof: usize,
        s: Vec<f64>,
        data: Vec<f64>,
        boundaries: Vec<f64>,
        domain_tolerance: f64,
    ) -> Result<Self, ConstraintError> {
        if ndof == 0 {
            return Err(ConstraintError::InvalidParameters("Table needs at least one joint".to_string()));
        }
        if s.len() < 2 {
            return Err(ConstraintError::InvalidParameters(format!(
                "Table needs at least two samples, got {}",
                s.len()
            )));
        }
        if s.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(ConstraintError::InvalidParameters(
                "Sample arc lengths must be strictly increasing".to_string(),
            ));
        }
        if data.len() != s.len() * COMPONENTS * ndof {
            return Err(ConstraintError::InvalidParameters(format!(
                "Expected {} table entries, got {}",
                s.len() * COMPONENTS * ndof,
                data.len()
            )));
        }
        if let Some(position) = data.iter().position(|v| !v.is_finite()) {
            let sample = position / (COMPONENTS * ndof);
            return Err(ConstraintError::InvalidPath {
                s: s[sample],
                reason: "non-finite dynamics coefficient".to_string(),
            });
        }
        let (start, end) = (s[0], s[s.len() - 1]);
        let mut boundaries: Vec<f64> = boundaries.into_iter().filter(|b| *b > start && *b < end).collect();
        boundaries.sort_by(f64::total_cmp);
        Ok(Self {
            ndof,
            s,
            data,
            boundaries,
            domain_tolerance: domain_tolerance.max(0.0),
        })
    }

    /// Build a table on the standard grid directly from coefficient functions.
    /// Path tangents are recorded as zero.
    pub fn tabulate<F>(ndof: usize, length: f64, step: f64, coefficients: F) -> Result<Self, ConstraintError>
    where
        F: Fn(f64) -> Coefficients,
    {
        let grid = sample_grid(length, step)?;
        let mut data = Vec::with_capacity(grid.len() * COMPONENTS * ndof);
        for &s in &grid {
            let row = coefficients(s);
            if row.a.len() != ndof || row.b.len() != ndof || row.c.len() != ndof {
                return Err(ConstraintError::InvalidParameters(format!(
                    "Coefficient function returned {} joints at s = {}, expected {}",
                    row.dof(),
                    s,
                    ndof
                )));
            }
            data.extend_from_slice(&row.a);
            data.extend_from_slice(&row.b);
            data.extend_from_slice(&row.c);
            data.extend(std::iter::repeat_n(0.0, ndof));
        }
        Self::from_rows(ndof, grid, data, Vec::new(), 1e-9)
    }

    pub fn ndof(&self) -> usize {
        self.ndof
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.s[0]
    }

    pub fn end(&self) -> f64 {
        self.s[self.s.len() - 1]
    }

    pub fn s_values(&self) -> &[f64] {
        &self.s
    }

    /// Interior path discontinuities recorded at sampling time, ascending.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn max_spacing(&self) -> f64 {
        self.s.windows(2).map(|w| w[1] - w[0]).fold(0.0, f64::max)
    }

    pub fn row(&self, k: usize) -> SampleRow<'_> {
        let n = self.ndof;
        let base = k * COMPONENTS * n;
        SampleRow {
            s: self.s[k],
            a: &self.data[base..base + n],
            b: &self.data[base + n..base + 2 * n],
            c: &self.data[base + 2 * n..base + 3 * n],
            tangent: &self.data[base + 3 * n..base + 4 * n],
        }
    }

    /// Coefficients stored at sample k.
    pub fn sample(&self, k: usize) -> Coefficients {
        let row = self.row(k);
        Coefficients::new(row.a.to_vec(), row.b.to_vec(), row.c.to_vec())
    }

    /// Bracketing interval index k (s_k <= s <= s_{k+1}) and the local fraction t.
    fn locate(&self, s: f64) -> Result<(usize, f64), ConstraintError> {
        let (start, end) = (self.start(), self.end());
        if !s.is_finite() || s < start - self.domain_tolerance || s > end + self.domain_tolerance {
            return Err(ConstraintError::OutOfRange { s, start, end });
        }
        let s = s.clamp(start, end);
        let k = self
            .s
            .partition_point(|&x| x <= s)
            .saturating_sub(1)
            .min(self.s.len() - 2);
        let t = (s - self.s[k]) / (self.s[k + 1] - self.s[k]);
        Ok((k, t))
    }

    fn lerp_component(&self, k: usize, t: f64, component: usize) -> Vec<f64> {
        let n = self.ndof;
        let lo = k * COMPONENTS * n + component * n;
        let hi = lo + COMPONENTS * n;
        (0..n)
            .map(|i| (1.0 - t) * self.data[lo + i] + t * self.data[hi + i])
            .collect()
    }

    fn slope_component(&self, k: usize, component: usize) -> Vec<f64> {
        let n = self.ndof;
        let lo = k * COMPONENTS * n + component * n;
        let hi = lo + COMPONENTS * n;
        let ds = self.s[k + 1] - self.s[k];
        (0..n).map(|i| (self.data[hi + i] - self.data[lo + i]) / ds).collect()
    }

    /// Linearly interpolated coefficients at s. Exact at the samples.
    pub fn interpolate(&self, s: f64) -> Result<Coefficients, ConstraintError> {
        let (k, t) = self.locate(s)?;
        Ok(Coefficients::new(
            self.lerp_component(k, t, 0),
            self.lerp_component(k, t, 1),
            self.lerp_component(k, t, 2),
        ))
    }

    /// Interpolated `a` coefficient of a single joint.
    pub fn interpolate_a(&self, joint: usize, s: f64) -> Result<f64, ConstraintError> {
        let (k, t) = self.locate(s)?;
        let n = self.ndof;
        let lo = k * COMPONENTS * n + joint;
        Ok((1.0 - t) * self.data[lo] + t * self.data[lo + COMPONENTS * n])
    }

    /// d/ds of the interpolated coefficients: the slope of the interval
    /// starting at s (of the last interval at the end of the table).
    pub fn derivative(&self, s: f64) -> Result<Coefficients, ConstraintError> {
        let (k, _) = self.locate(s)?;
        Ok(Coefficients::new(
            self.slope_component(k, 0),
            self.slope_component(k, 1),
            self.slope_component(k, 2),
        ))
    }

    /// Interpolated path tangent dq/ds.
    pub fn interpolate_tangent(&self, s: f64) -> Result<Vec<f64>, ConstraintError> {
        let (k, t) = self.locate(s)?;
        Ok(self.lerp_component(k, t, 3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_table() -> DynamicsTable {
        // a = 1 + s², b = 2s, c = -s on [0, 1]
        DynamicsTable::tabulate(1, 1.0, 0.1, |s| {
            Coefficients::new(vec![1.0 + s * s], vec![2.0 * s], vec![-s])
        })
        .unwrap()
    }

    #[test]
    fn test_reproduces_samples_exactly() {
        let table = linear_table();
        for k in 0..table.len() {
            let row = table.row(k);
            let interpolated = table.interpolate(row.s).unwrap();
            assert_eq!(interpolated.a[0], row.a[0]);
            assert_eq!(interpolated.b[0], row.b[0]);
            assert_eq!(interpolated.c[0], row.c[0]);
            assert_eq!(table.sample(k), interpolated);
        }
    }

    #[test]
    fn test_linear_between_samples() {
        let table = linear_table();
        let (s0, s1) = (table.s_values()[3], table.s_values()[4]);
        let (lo, hi) = (table.sample(3), table.sample(4));
        for t in [0.1, 0.25, 0.5, 0.9] {
            let s = s0 + t * (s1 - s0);
            let value = table.interpolate(s).unwrap();
            let expected = lo.a[0] + t * (hi.a[0] - lo.a[0]);
            assert!((value.a[0] - expected).abs() < 1e-12);
            assert!((table.interpolate_a(0, s).unwrap() - expected).abs() < 1e-12);
        }
        // Slope of the bracketing interval
        let slope = table.derivative(0.35).unwrap();
        assert!((slope.a[0] - (hi.a[0] - lo.a[0]) / (s1 - s0)).abs() < 1e-9);
        assert!((slope.b[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_queries() {
        let table = linear_table();
        assert!(table.interpolate(1.0 + 1e-12).is_ok());
        assert!(table.interpolate(-1e-12).is_ok());
        assert!(matches!(table.interpolate(1.01), Err(ConstraintError::OutOfRange { .. })));
        assert!(matches!(table.interpolate(-0.5), Err(ConstraintError::OutOfRange { .. })));
        assert!(matches!(table.derivative(f64::NAN), Err(ConstraintError::OutOfRange { .. })));
    }

    #[test]
    fn test_end_of_table_uses_last_interval() {
        let table = linear_table();
        let n = table.len();
        let last = table.interpolate(table.end()).unwrap();
        assert_eq!(last, table.sample(n - 1));
        let slope = table.derivative(table.end()).unwrap();
        let expected = (table.row(n - 1).a[0] - table.row(n - 2).a[0])
            / (table.s_values()[n - 1] - table.s_values()[n - 2]);
        assert!((slope.a[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_from_rows_validation() {
        assert!(DynamicsTable::from_rows(1, vec![0.0, 1.0], vec![0.0; 8], Vec::new(), 0.0).is_ok());
        // Not strictly increasing
        assert!(DynamicsTable::from_rows(1, vec![0.0, 0.0], vec![0.0; 8], Vec::new(), 0.0).is_err());
        // Wrong buffer size
        assert!(DynamicsTable::from_rows(1, vec![0.0, 1.0], vec![0.0; 7], Vec::new(), 0.0).is_err());
        // Non-finite coefficient
        let mut data = vec![0.0; 8];
        data[5] = f64::NAN;
        assert!(matches!(
            DynamicsTable::from_rows(1, vec![0.0, 1.0], data, Vec::new(), 0.0),
            Err(ConstraintError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_boundaries_filtered_and_sorted() {
        let table =
            DynamicsTable::from_rows(1, vec![0.0, 0.5, 1.0], vec![0.0; 12], vec![0.7, 0.0, 0.3, 1.0], 0.0).unwrap();
        assert_eq!(table.boundaries(), &[0.3, 0.7]);
    }
}
