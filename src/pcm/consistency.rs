//! Statistical consistency tests for loop-closure candidates.
//!
//! Two gates, both squared-Mahalanobis hypothesis tests:
//!
//! 1. **Odometry gate**: the candidate's transform is compared against
//!    the odometry-chain-implied relative transform between its
//!    endpoints. Cheap, filters gross outliers individually.
//! 2. **Pairwise gate**: two candidates are chained with the odometry
//!    between their endpoints into a loop that must close to identity.
//!    Two individually plausible but mutually contradictory closures
//!    cannot both pass, which is what the clique selection exploits.

use crate::core::math::normalize_angle_f64;
use crate::core::types::PoseWithCovariance;
use crate::graph::{Measurement, PoseGraphStore};

/// Consistency checker with fixed decision thresholds.
///
/// Thresholds are squared Mahalanobis distances. Both comparisons are
/// strict, so a threshold of exactly 0.0 rejects every candidate; that is
/// the calibration mode that keeps only odometry and priors in the graph.
#[derive(Debug, Clone, Copy)]
pub struct ConsistencyChecker {
    odom_threshold: f64,
    lc_threshold: f64,
}

impl ConsistencyChecker {
    /// Create a checker with the given thresholds.
    pub fn new(odom_threshold: f64, lc_threshold: f64) -> Self {
        Self {
            odom_threshold,
            lc_threshold,
        }
    }

    /// Whether `m` agrees with the odometry chain between its endpoints.
    pub fn odometry_consistent(&self, store: &PoseGraphStore, m: &Measurement) -> bool {
        let Some(chain) = store.chain_between(m.from, m.to) else {
            log::debug!(
                "no odometry chain between {} and {}, candidate not testable",
                m.from,
                m.to
            );
            return false;
        };

        let delta = chain.pose.between(&m.transform);
        let residual = [
            delta.x as f64,
            delta.y as f64,
            normalize_angle_f64(delta.theta as f64),
        ];
        let combined = chain.covariance.add(&m.covariance);

        match mahalanobis_squared(&residual, &combined.as_f64()) {
            Some(d2) => d2 < self.odom_threshold,
            None => {
                log::warn!(
                    "degenerate covariance testing {} -> {}, rejecting candidate",
                    m.from,
                    m.to
                );
                false
            }
        }
    }

    /// Whether two candidates are mutually consistent.
    ///
    /// Chains `a`, the odometry between the candidates' endpoints, and
    /// the inverse of `b` into a loop and tests its residual against
    /// identity.
    pub fn pairwise_consistent(
        &self,
        store: &PoseGraphStore,
        a: &Measurement,
        b: &Measurement,
    ) -> bool {
        let Some(top) = store.chain_between(a.to, b.to) else {
            return false;
        };
        let Some(bottom) = store.chain_between(b.from, a.from) else {
            return false;
        };

        let a_t = PoseWithCovariance::new(a.transform, a.covariance);
        let b_inv = PoseWithCovariance::new(b.transform, b.covariance).inverse();
        let loop_residual = a_t.compose(&top).compose(&b_inv).compose(&bottom);

        let residual = [
            loop_residual.pose.x as f64,
            loop_residual.pose.y as f64,
            normalize_angle_f64(loop_residual.pose.theta as f64),
        ];

        match mahalanobis_squared(&residual, &loop_residual.covariance.as_f64()) {
            Some(d2) => d2 < self.lc_threshold,
            None => false,
        }
    }
}

/// Squared Mahalanobis norm eᵀ Σ⁻¹ e, via a 3x3 Cholesky solve.
///
/// Returns `None` when Σ is not positive definite.
fn mahalanobis_squared(e: &[f64; 3], sigma: &[f64; 9]) -> Option<f64> {
    let x = solve_spd3(sigma, e)?;
    Some(e[0] * x[0] + e[1] * x[1] + e[2] * x[2])
}

/// Solve A x = b for symmetric positive definite 3x3 A.
fn solve_spd3(a: &[f64; 9], b: &[f64; 3]) -> Option<[f64; 3]> {
    // Cholesky decomposition: A = L * Lᵀ
    let mut l = [0.0f64; 9];
    for i in 0..3 {
        for j in 0..=i {
            let mut sum = a[i * 3 + j];
            for k in 0..j {
                sum -= l[i * 3 + k] * l[j * 3 + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i * 3 + j] = sum.sqrt();
            } else {
                l[i * 3 + j] = sum / l[j * 3 + j];
            }
        }
    }

    // Forward substitution: L y = b
    let mut y = [0.0f64; 3];
    for i in 0..3 {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * 3 + j] * y[j];
        }
        y[i] = sum / l[i * 3 + i];
    }

    // Backward substitution: Lᵀ x = y
    let mut x = [0.0f64; 3];
    for i in (0..3).rev() {
        let mut sum = y[i];
        for j in (i + 1)..3 {
            sum -= l[j * 3 + i] * x[j];
        }
        x[i] = sum / l[i * 3 + i];
    }

    Some(x)
}
