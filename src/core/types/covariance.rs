//! Pose uncertainty types.

use serde::{Deserialize, Serialize};

/// 3x3 covariance matrix for 2D pose uncertainty (x, y, theta).
///
/// Stored as row-major array: [xx, xy, xt, yx, yy, yt, tx, ty, tt]
/// where t = theta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Covariance2D {
    /// Row-major 3x3 matrix data
    data: [f32; 9],
}

impl Covariance2D {
    /// Create a zero covariance matrix.
    #[inline]
    pub fn zero() -> Self {
        Self { data: [0.0; 9] }
    }

    /// Create a diagonal covariance matrix.
    ///
    /// Parameters are variances: xx = σ²_x, yy = σ²_y, tt = σ²_θ
    #[inline]
    pub fn diagonal(xx: f32, yy: f32, tt: f32) -> Self {
        Self {
            data: [xx, 0.0, 0.0, 0.0, yy, 0.0, 0.0, 0.0, tt],
        }
    }

    /// Create an isotropic covariance: same variance on every axis.
    #[inline]
    pub fn isotropic(variance: f32) -> Self {
        Self::diagonal(variance, variance, variance)
    }

    /// Create from row-major array.
    #[inline]
    pub fn from_array(data: [f32; 9]) -> Self {
        Self { data }
    }

    /// Element-wise sum, the combined uncertainty of two independent
    /// measurements of the same quantity.
    #[inline]
    pub fn add(&self, other: &Covariance2D) -> Covariance2D {
        let mut data = [0.0; 9];
        for (i, v) in data.iter_mut().enumerate() {
            *v = self.data[i] + other.data[i];
        }
        Self { data }
    }

    /// Get raw data as slice.
    #[inline]
    pub fn as_slice(&self) -> &[f32; 9] {
        &self.data
    }

    /// Row-major f64 copy for the numeric core.
    #[inline]
    pub fn as_f64(&self) -> [f64; 9] {
        let mut out = [0.0; 9];
        for (o, v) in out.iter_mut().zip(self.data.iter()) {
            *o = *v as f64;
        }
        out
    }

    /// Create from a row-major f64 array.
    #[inline]
    pub fn from_f64(data: [f64; 9]) -> Self {
        let mut out = [0.0f32; 9];
        for (o, v) in out.iter_mut().zip(data.iter()) {
            *o = *v as f32;
        }
        Self { data: out }
    }
}

impl Default for Covariance2D {
    fn default() -> Self {
        Self::zero()
    }
}
