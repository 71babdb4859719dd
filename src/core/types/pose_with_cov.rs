//! Rigid transform paired with its uncertainty.
//!
//! Covariance propagation is first-order (Jacobian based), computed in f64
//! over explicit transform+covariance pairs. No hidden global frames:
//! chaining odometry means repeated [`PoseWithCovariance::compose`] calls.

use serde::{Deserialize, Serialize};

use super::{Covariance2D, Pose2D};

/// A 2D rigid transform with an associated 3x3 covariance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseWithCovariance {
    /// The transform.
    pub pose: Pose2D,
    /// Uncertainty of the transform, over (x, y, theta).
    pub covariance: Covariance2D,
}

impl PoseWithCovariance {
    /// Create a new transform+covariance pair.
    #[inline]
    pub fn new(pose: Pose2D, covariance: Covariance2D) -> Self {
        Self { pose, covariance }
    }

    /// Identity transform with zero uncertainty.
    #[inline]
    pub fn identity() -> Self {
        Self {
            pose: Pose2D::identity(),
            covariance: Covariance2D::zero(),
        }
    }

    /// Compose two uncertain transforms: self ⊕ other.
    ///
    /// The resulting covariance is
    /// ```text
    /// Σ_C = J_A Σ_A J_Aᵀ + J_B Σ_B J_Bᵀ
    /// ```
    /// with the standard SE(2) composition Jacobians. The two inputs are
    /// assumed independent.
    pub fn compose(&self, other: &PoseWithCovariance) -> PoseWithCovariance {
        let theta = self.pose.theta as f64;
        let (sin_t, cos_t) = theta.sin_cos();
        let bx = other.pose.x as f64;
        let by = other.pose.y as f64;

        // Jacobian w.r.t. self (3x3, row-major)
        let ja = [
            1.0,
            0.0,
            -bx * sin_t - by * cos_t,
            0.0,
            1.0,
            bx * cos_t - by * sin_t,
            0.0,
            0.0,
            1.0,
        ];

        // Jacobian w.r.t. other: rotation of self
        let jb = [
            cos_t, -sin_t, 0.0, //
            sin_t, cos_t, 0.0, //
            0.0, 0.0, 1.0,
        ];

        let sigma_a = propagate(&ja, &self.covariance.as_f64());
        let sigma_b = propagate(&jb, &other.covariance.as_f64());

        let mut sum = [0.0; 9];
        for (i, v) in sum.iter_mut().enumerate() {
            *v = sigma_a[i] + sigma_b[i];
        }

        PoseWithCovariance {
            pose: self.pose.compose(&other.pose),
            covariance: Covariance2D::from_f64(sum),
        }
    }

    /// Inverse of this uncertain transform.
    ///
    /// Covariance is mapped through the Jacobian of SE(2) inversion.
    pub fn inverse(&self) -> PoseWithCovariance {
        let x = self.pose.x as f64;
        let y = self.pose.y as f64;
        let theta = self.pose.theta as f64;
        let (sin_t, cos_t) = theta.sin_cos();

        let j = [
            -cos_t,
            -sin_t,
            x * sin_t - y * cos_t,
            sin_t,
            -cos_t,
            x * cos_t + y * sin_t,
            0.0,
            0.0,
            -1.0,
        ];

        PoseWithCovariance {
            pose: self.pose.inverse(),
            covariance: Covariance2D::from_f64(propagate(&j, &self.covariance.as_f64())),
        }
    }

    /// Relative uncertain transform from `self` to `other`: self⁻¹ ⊕ other.
    #[inline]
    pub fn between(&self, other: &PoseWithCovariance) -> PoseWithCovariance {
        self.inverse().compose(other)
    }
}

/// Compute J * S * Jᵀ for row-major 3x3 matrices.
fn propagate(j: &[f64; 9], s: &[f64; 9]) -> [f64; 9] {
    let js = mat3_mul(j, s);
    mat3_mul_transposed(&js, j)
}

/// Multiply two 3x3 matrices (row-major).
fn mat3_mul(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut c = [0.0; 9];
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                c[i * 3 + j] += a[i * 3 + k] * b[k * 3 + j];
            }
        }
    }
    c
}

/// Multiply first matrix with transpose of second: A * Bᵀ.
fn mat3_mul_transposed(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut c = [0.0; 9];
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                c[i * 3 + j] += a[i * 3 + k] * b[j * 3 + k];
            }
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_compose_with_identity_keeps_covariance() {
        let a = PoseWithCovariance::new(
            Pose2D::new(1.0, 2.0, 0.3),
            Covariance2D::diagonal(0.1, 0.2, 0.05),
        );

        let c = a.compose(&PoseWithCovariance::identity());

        assert_relative_eq!(c.pose.x, a.pose.x, epsilon = 1e-6);
        for (got, want) in c
            .covariance
            .as_slice()
            .iter()
            .zip(a.covariance.as_slice().iter())
        {
            assert_relative_eq!(got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_compose_rotates_lever_arm_into_position() {
        // Heading uncertainty turns into lateral position uncertainty
        // after moving forward: yy' = yy + tt * dx².
        let a = PoseWithCovariance::new(
            Pose2D::identity(),
            Covariance2D::diagonal(0.01, 0.01, 0.04),
        );
        let step = PoseWithCovariance::new(Pose2D::new(2.0, 0.0, 0.0), Covariance2D::zero());

        let c = a.compose(&step);
        let cov = c.covariance.as_slice();

        assert_relative_eq!(cov[0], 0.01, epsilon = 1e-6); // xx unchanged
        assert_relative_eq!(cov[4], 0.01 + 0.04 * 4.0, epsilon = 1e-6); // yy grows
        assert_relative_eq!(cov[8], 0.04, epsilon = 1e-6); // tt unchanged
    }

    #[test]
    fn test_covariance_accumulates_along_chain() {
        let step = PoseWithCovariance::new(
            Pose2D::new(1.0, 0.0, 0.0),
            Covariance2D::diagonal(0.01, 0.01, 0.001),
        );

        let mut acc = PoseWithCovariance::identity();
        for _ in 0..10 {
            acc = acc.compose(&step);
        }

        assert_relative_eq!(acc.pose.x, 10.0, epsilon = 1e-4);
        // x variance is a straight sum for a straight-line chain
        assert_relative_eq!(acc.covariance.as_slice()[0], 0.1, epsilon = 1e-4);
        // y variance picks up the heading lever arm, so it exceeds the sum
        assert!(acc.covariance.as_slice()[4] > 0.1);
    }

    #[test]
    fn test_inverse_roundtrip_restores_covariance() {
        let a = PoseWithCovariance::new(
            Pose2D::new(1.5, -0.5, FRAC_PI_2),
            Covariance2D::diagonal(0.1, 0.2, 0.05),
        );

        let back = a.inverse().inverse();

        assert_relative_eq!(back.pose.x, a.pose.x, epsilon = 1e-5);
        assert_relative_eq!(back.pose.y, a.pose.y, epsilon = 1e-5);
        for (got, want) in back
            .covariance
            .as_slice()
            .iter()
            .zip(a.covariance.as_slice().iter())
        {
            assert_relative_eq!(got, want, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_between_of_equal_transforms_is_identity() {
        let a = PoseWithCovariance::new(
            Pose2D::new(3.0, 1.0, 0.7),
            Covariance2D::diagonal(0.1, 0.1, 0.01),
        );

        let rel = a.between(&a);

        assert_relative_eq!(rel.pose.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(rel.pose.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(rel.pose.theta, 0.0, epsilon = 1e-5);
        // Uncertainty does not cancel: both operands contribute.
        assert!(rel.covariance.as_slice()[0] > 0.1);
    }
}
