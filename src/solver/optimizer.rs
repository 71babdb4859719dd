//! Nonlinear least-squares optimization of the pose graph.
//!
//! Minimizes the weighted constraint error
//!
//! ```text
//! F(x) = Σ e(xi, xj, zij)ᵀ * Ωij * e(xi, xj, zij)
//! ```
//!
//! with Gauss-Newton / Levenberg-Marquardt iterations over the normal
//! equations `H Δx = -b`, solved by dense Cholesky. Priors contribute
//! unary terms; every relative factor contributes the standard SE(2)
//! between-error and its Jacobians.

use std::collections::BTreeMap;

use crate::core::math::normalize_angle_f64;
use crate::core::types::{Pose2D, PoseKey, Values};
use crate::error::{PgoError, Result};
use crate::graph::{Factor, FactorKind};

use super::Optimizer;

/// Configuration for graph optimization.
#[derive(Debug, Clone)]
pub struct GraphOptimizerConfig {
    /// Maximum number of iterations.
    pub max_iterations: u32,

    /// Convergence threshold for relative error change.
    pub convergence_threshold: f64,

    /// Levenberg-Marquardt damping factor.
    pub damping_factor: f64,

    /// Whether to use Levenberg-Marquardt (vs pure Gauss-Newton).
    pub use_levenberg_marquardt: bool,

    /// Minimum error improvement to continue.
    pub min_improvement: f64,
}

impl Default for GraphOptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold: 1e-6,
            damping_factor: 1e-3,
            use_levenberg_marquardt: true,
            min_improvement: 1e-9,
        }
    }
}

/// Graph optimizer using Gauss-Newton or Levenberg-Marquardt.
#[derive(Debug, Default)]
pub struct GraphOptimizer {
    config: GraphOptimizerConfig,
}

impl GraphOptimizer {
    /// Create a new graph optimizer.
    pub fn new(config: GraphOptimizerConfig) -> Self {
        Self { config }
    }
}

impl Optimizer for GraphOptimizer {
    fn optimize(&self, factors: &[Factor], initial: &Values) -> Result<Values> {
        if factors.is_empty() || initial.is_empty() {
            return Ok(initial.clone());
        }

        let keys: Vec<PoseKey> = initial.keys().copied().collect();
        let index: BTreeMap<PoseKey, usize> =
            keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();
        let mut poses: Vec<Pose2D> = initial.values().copied().collect();

        // Information matrices are fixed across iterations.
        let mut omegas = Vec::with_capacity(factors.len());
        for f in factors {
            let omega = invert_sym3(&f.covariance.as_f64()).ok_or(PgoError::IllConditioned)?;
            omegas.push(omega);
        }

        let dim = keys.len() * 3;
        let initial_error = chi_squared(factors, &omegas, &poses, &index);
        let mut current_error = initial_error;
        let mut lambda = self.config.damping_factor;
        let mut iterations = 0;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;

            let (h, b) = build_linear_system(factors, &omegas, &poses, &index, dim);

            let h_damped = if self.config.use_levenberg_marquardt {
                apply_damping(&h, lambda, dim)
            } else {
                h
            };

            let dx = match solve_linear_system(&h_damped, &b, dim) {
                Some(dx) => dx,
                None => return Err(PgoError::IllConditioned),
            };

            apply_update(&mut poses, &dx);
            let new_error = chi_squared(factors, &omegas, &poses, &index);

            if new_error > current_error * 1.1 {
                // Revert the update.
                let neg: Vec<f64> = dx.iter().map(|x| -x).collect();
                apply_update(&mut poses, &neg);

                if self.config.use_levenberg_marquardt {
                    lambda *= 10.0;
                    if lambda > 1e10 {
                        return Err(PgoError::SolverDiverged { iterations });
                    }
                    continue;
                } else {
                    return Err(PgoError::SolverDiverged { iterations });
                }
            }

            if self.config.use_levenberg_marquardt {
                lambda *= 0.1;
                lambda = lambda.max(1e-10);
            }

            let relative_change = (current_error - new_error).abs() / current_error.max(1e-10);
            current_error = new_error;

            if relative_change < self.config.convergence_threshold
                || relative_change < self.config.min_improvement
            {
                break;
            }
        }

        log::debug!(
            "optimization finished after {} iterations, error {:.6} -> {:.6}",
            iterations,
            initial_error,
            current_error
        );

        Ok(keys.into_iter().zip(poses).collect())
    }
}

/// Compute the chi-squared error of the graph.
fn chi_squared(
    factors: &[Factor],
    omegas: &[[f64; 9]],
    poses: &[Pose2D],
    index: &BTreeMap<PoseKey, usize>,
) -> f64 {
    let mut chi2 = 0.0;

    for (f, omega) in factors.iter().zip(omegas) {
        let Some(error) = factor_error(f, poses, index) else {
            continue;
        };
        let weighted = mat3_apply(omega, &error);
        chi2 += error[0] * weighted[0] + error[1] * weighted[1] + error[2] * weighted[2];
    }

    chi2
}

/// Error vector of one factor, `None` when an endpoint has no value.
fn factor_error(
    f: &Factor,
    poses: &[Pose2D],
    index: &BTreeMap<PoseKey, usize>,
) -> Option<[f64; 3]> {
    if f.kind == FactorKind::Prior {
        let x = poses[*index.get(&f.from)?];
        return Some([
            (x.x - f.measurement.x) as f64,
            (x.y - f.measurement.y) as f64,
            normalize_angle_f64((x.theta - f.measurement.theta) as f64),
        ]);
    }

    let xi = poses[*index.get(&f.from)?];
    let xj = poses[*index.get(&f.to)?];
    let predicted = xi.inverse().compose(&xj);
    Some([
        (predicted.x - f.measurement.x) as f64,
        (predicted.y - f.measurement.y) as f64,
        normalize_angle_f64((predicted.theta - f.measurement.theta) as f64),
    ])
}

/// Build the linear system H * dx = -b.
fn build_linear_system(
    factors: &[Factor],
    omegas: &[[f64; 9]],
    poses: &[Pose2D],
    index: &BTreeMap<PoseKey, usize>,
    dim: usize,
) -> (Vec<f64>, Vec<f64>) {
    let mut h = vec![0.0; dim * dim];
    let mut b = vec![0.0; dim];

    for (f, omega) in factors.iter().zip(omegas) {
        let Some(error) = factor_error(f, poses, index) else {
            continue;
        };
        let omega_e = mat3_apply(omega, &error);

        if f.kind == FactorKind::Prior {
            // Unary anchor: J = I, so H_ii += Ω and b_i += Ω e.
            let base = index[&f.from] * 3;
            for r in 0..3 {
                for c in 0..3 {
                    h[(base + r) * dim + base + c] += omega[r * 3 + c];
                }
                b[base + r] += omega_e[r];
            }
            continue;
        }

        let idx_i = index[&f.from];
        let idx_j = index[&f.to];
        let (ji, jj) = between_jacobians(&poses[idx_i], &poses[idx_j]);

        let base_i = idx_i * 3;
        let base_j = idx_j * 3;

        let omega_ji = mat3_mul(omega, &ji);
        let omega_jj = mat3_mul(omega, &jj);

        // H_ii = Jiᵀ Ω Ji, H_ij = Jiᵀ Ω Jj, H_jj = Jjᵀ Ω Jj
        let h_ii = mat3_transpose_mul(&ji, &omega_ji);
        let h_ij = mat3_transpose_mul(&ji, &omega_jj);
        let h_jj = mat3_transpose_mul(&jj, &omega_jj);

        for r in 0..3 {
            for c in 0..3 {
                h[(base_i + r) * dim + base_i + c] += h_ii[r * 3 + c];
                h[(base_i + r) * dim + base_j + c] += h_ij[r * 3 + c];
                h[(base_j + r) * dim + base_i + c] += h_ij[c * 3 + r]; // H_ji = H_ijᵀ
                h[(base_j + r) * dim + base_j + c] += h_jj[r * 3 + c];
            }
        }

        for r in 0..3 {
            b[base_i + r] +=
                ji[r] * omega_e[0] + ji[3 + r] * omega_e[1] + ji[6 + r] * omega_e[2];
            b[base_j + r] +=
                jj[r] * omega_e[0] + jj[3 + r] * omega_e[1] + jj[6 + r] * omega_e[2];
        }
    }

    (h, b)
}

/// Jacobians of the between-error w.r.t. both endpoint poses.
///
/// Returns (Ji, Jj) as row-major 3x3 arrays.
fn between_jacobians(xi: &Pose2D, xj: &Pose2D) -> ([f64; 9], [f64; 9]) {
    let cos_i = (xi.theta as f64).cos();
    let sin_i = (xi.theta as f64).sin();

    let dx = (xj.x - xi.x) as f64;
    let dy = (xj.y - xi.y) as f64;

    let ji = [
        -cos_i,
        -sin_i,
        -sin_i * dx + cos_i * dy,
        sin_i,
        -cos_i,
        -cos_i * dx - sin_i * dy,
        0.0,
        0.0,
        -1.0,
    ];

    let jj = [
        cos_i, sin_i, 0.0, //
        -sin_i, cos_i, 0.0, //
        0.0, 0.0, 1.0,
    ];

    (ji, jj)
}

/// Apply Levenberg-Marquardt damping.
fn apply_damping(h: &[f64], lambda: f64, dim: usize) -> Vec<f64> {
    let mut h_damped = h.to_vec();
    for i in 0..dim {
        h_damped[i * dim + i] += lambda * h_damped[i * dim + i].max(1.0);
    }
    h_damped
}

/// Solve the linear system using dense Cholesky decomposition.
fn solve_linear_system(h: &[f64], b: &[f64], dim: usize) -> Option<Vec<f64>> {
    // Cholesky decomposition: H = L * Lᵀ
    let mut l = vec![0.0; dim * dim];

    for i in 0..dim {
        for j in 0..=i {
            let mut sum = h[i * dim + j];
            for k in 0..j {
                sum -= l[i * dim + k] * l[j * dim + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i * dim + j] = sum.sqrt();
            } else {
                l[i * dim + j] = sum / l[j * dim + j];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = vec![0.0; dim];
    for i in 0..dim {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * dim + j] * y[j];
        }
        y[i] = sum / l[i * dim + i];
    }

    // Backward substitution: Lᵀ * x = y
    let mut x = vec![0.0; dim];
    for i in (0..dim).rev() {
        let mut sum = y[i];
        for j in (i + 1)..dim {
            sum -= l[j * dim + i] * x[j];
        }
        x[i] = sum / l[i * dim + i];
    }

    // H * dx = -b => dx = -H⁻¹ * b
    Some(x.iter().map(|v| -v).collect())
}

/// Apply update to all poses.
fn apply_update(poses: &mut [Pose2D], dx: &[f64]) {
    for (idx, pose) in poses.iter_mut().enumerate() {
        let base = idx * 3;
        if base + 2 >= dx.len() {
            continue;
        }
        pose.x += dx[base] as f32;
        pose.y += dx[base + 1] as f32;
        *pose = Pose2D::new(pose.x, pose.y, pose.theta + dx[base + 2] as f32);
    }
}

/// Multiply a 3x3 matrix with a vector.
fn mat3_apply(m: &[f64; 9], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
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

/// Multiply transpose of first matrix with second: Aᵀ * B.
fn mat3_transpose_mul(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut c = [0.0; 9];
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                c[i * 3 + j] += a[k * 3 + i] * b[k * 3 + j];
            }
        }
    }
    c
}

/// Invert a symmetric 3x3 matrix via its adjugate.
fn invert_sym3(m: &[f64; 9]) -> Option<[f64; 9]> {
    let det = m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
        + m[2] * (m[3] * m[7] - m[4] * m[6]);

    if det.abs() < 1e-15 {
        return None;
    }

    let inv_det = 1.0 / det;
    Some([
        (m[4] * m[8] - m[5] * m[7]) * inv_det,
        (m[2] * m[7] - m[1] * m[8]) * inv_det,
        (m[1] * m[5] - m[2] * m[4]) * inv_det,
        (m[5] * m[6] - m[3] * m[8]) * inv_det,
        (m[0] * m[8] - m[2] * m[6]) * inv_det,
        (m[2] * m[3] - m[0] * m[5]) * inv_det,
        (m[3] * m[7] - m[4] * m[6]) * inv_det,
        (m[1] * m[6] - m[0] * m[7]) * inv_det,
        (m[0] * m[4] - m[1] * m[3]) * inv_det,
    ])
}
