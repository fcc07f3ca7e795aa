// src/dynamics/planar.rs - Two-link planar arm inverse dynamics
use super::InverseDynamics;

/// Two-link planar arm with point masses at the link tips, moving in a
/// vertical plane with gravity along -y. Joint angles are measured from
/// the x axis (first joint) and relative to the first link (second joint).
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarArm {
    link_lengths: [f64; 2],
    masses: [f64; 2],
    gravity: f64,
}

impl PlanarArm {
    pub fn new(link_lengths: [f64; 2], masses: [f64; 2], gravity: f64) -> Self {
        Self {
            link_lengths,
            masses,
            gravity,
        }
    }

    /// Joint-space mass matrix M(q).
    pub fn mass_matrix(&self, q: &[f64]) -> [[f64; 2]; 2] {
        let [l1, l2] = self.link_lengths;
        let [m1, m2] = self.masses;
        let cos2 = q[1].cos();
        let m22 = m2 * l2 * l2;
        let m12 = m22 + m2 * l1 * l2 * cos2;
        let m11 = (m1 + m2) * l1 * l1 + m22 + 2.0 * m2 * l1 * l2 * cos2;
        [[m11, m12], [m12, m22]]
    }

    /// Gravity torques G(q).
    pub fn gravity_torques(&self, q: &[f64]) -> [f64; 2] {
        let [l1, l2] = self.link_lengths;
        let [m1, m2] = self.masses;
        let g = self.gravity;
        let outer = m2 * g * l2 * (q[0] + q[1]).cos();
        [(m1 + m2) * g * l1 * q[0].cos() + outer, outer]
    }
}

impl InverseDynamics for PlanarArm {
    fn dof(&self) -> usize {
        2
    }

    fn inverse_dynamics(&self, q: &[f64], qd: &[f64], qdd: &[f64]) -> Vec<f64> {
        let [l1, l2] = self.link_lengths;
        let m2 = self.masses[1];
        let mass = self.mass_matrix(q);
        let gravity = self.gravity_torques(q);
        // Coriolis and centrifugal terms
        let h = m2 * l1 * l2 * q[1].sin();
        let coriolis = [-h * (2.0 * qd[0] * qd[1] + qd[1] * qd[1]), h * qd[0] * qd[0]];
        (0..2)
            .map(|i| mass[i][0] * qdd[0] + mass[i][1] * qdd[1] + coriolis[i] + gravity[i])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_arm_holds_gravity() {
        let arm = PlanarArm::new([1.0, 0.5], [2.0, 1.0], 9.81);
        // Stretched out horizontally: both links contribute full moment arms
        let tau = arm.inverse_dynamics(&[0.0, 0.0], &[0.0, 0.0], &[0.0, 0.0]);
        assert!((tau[0] - (3.0 * 9.81 * 1.0 + 1.0 * 9.81 * 0.5)).abs() < 1e-12);
        assert!((tau[1] - 9.81 * 0.5).abs() < 1e-12);
        // Pointing straight up: no gravity torque
        let tau = arm.inverse_dynamics(&[std::f64::consts::FRAC_PI_2, 0.0], &[0.0, 0.0], &[0.0, 0.0]);
        assert!(tau[0].abs() < 1e-12);
        assert!(tau[1].abs() < 1e-12);
    }

    #[test]
    fn test_mass_matrix_symmetric_positive() {
        let arm = PlanarArm::new([1.0, 0.8], [2.0, 1.0], 0.0);
        for q2 in [-2.0, -0.3, 0.0, 1.1, 3.0] {
            let m = arm.mass_matrix(&[0.4, q2]);
            assert_eq!(m[0][1], m[1][0]);
            assert!(m[0][0] > 0.0);
            assert!(m[0][0] * m[1][1] - m[0][1] * m[1][0] > 0.0);
        }
    }

    #[test]
    fn test_velocity_terms_are_quadratic() {
        let arm = PlanarArm::new([1.0, 0.8], [2.0, 1.0], 0.0);
        let q = [0.3, 0.7];
        let qd = [0.5, -1.2];
        let tau1 = arm.inverse_dynamics(&q, &qd, &[0.0, 0.0]);
        let tau2 = arm.inverse_dynamics(&q, &[2.0 * qd[0], 2.0 * qd[1]], &[0.0, 0.0]);
        for i in 0..2 {
            assert!((tau2[i] - 4.0 * tau1[i]).abs() < 1e-12);
        }
    }
}
