//! Measurement and factor types for the multi-robot pose graph.
//!
//! Callers hand in raw [`Measurement`]s; the store classifies them by key
//! structure and materializes the trusted and accepted ones as
//! [`Factor`]s.

use serde::{Deserialize, Serialize};

use crate::core::types::{Covariance2D, Pose2D, PoseKey};

/// Role of a constraint in the pose graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorKind {
    /// Sequential constraint between consecutive poses of one robot.
    /// Always trusted.
    Odometry,
    /// Absolute anchor for a single pose. Always trusted.
    Prior,
    /// Constraint between non-consecutive poses of one robot. Vetted.
    LoopClosure,
    /// Constraint between poses of two different robots. Vetted, except
    /// for the anchor bridge that first connects a robot to the graph.
    Bridge,
}

/// A relative rigid-transform measurement between two pose keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Source key.
    pub from: PoseKey,
    /// Target key.
    pub to: PoseKey,
    /// Measured relative transform from `from` to `to`.
    pub transform: Pose2D,
    /// Measurement covariance.
    pub covariance: Covariance2D,
}

impl Measurement {
    /// Create a new relative measurement.
    pub fn new(from: PoseKey, to: PoseKey, transform: Pose2D, covariance: Covariance2D) -> Self {
        Self {
            from,
            to,
            transform,
            covariance,
        }
    }

    /// Classify this measurement by the structure of its keys.
    ///
    /// Consecutive keys of one robot are odometry; non-consecutive keys
    /// of one robot are a loop closure; keys of two robots are a bridge.
    pub fn kind(&self) -> FactorKind {
        if self.from.robot == self.to.robot {
            if self.from.is_consecutive(&self.to) {
                FactorKind::Odometry
            } else {
                FactorKind::LoopClosure
            }
        } else {
            FactorKind::Bridge
        }
    }
}

/// An absolute pose anchor for one key.
///
/// Exactly one prior fixes the global frame of the first robot; further
/// robots are attached through bridges instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    /// Anchored key.
    pub key: PoseKey,
    /// Absolute pose of the key.
    pub pose: Pose2D,
    /// Anchor covariance.
    pub covariance: Covariance2D,
}

impl Prior {
    /// Create a new prior.
    pub fn new(key: PoseKey, pose: Pose2D, covariance: Covariance2D) -> Self {
        Self {
            key,
            pose,
            covariance,
        }
    }
}

/// A materialized constraint in the optimized pose graph.
///
/// For relative kinds `measurement` is the transform from `from` to `to`;
/// for priors `from == to` and `measurement` is the absolute pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    /// Constraint role.
    pub kind: FactorKind,
    /// Source key.
    pub from: PoseKey,
    /// Target key (equal to `from` for priors).
    pub to: PoseKey,
    /// Relative transform, or absolute pose for priors.
    pub measurement: Pose2D,
    /// Constraint covariance.
    pub covariance: Covariance2D,
}

impl Factor {
    /// Materialize a relative measurement with the given role.
    pub fn from_measurement(m: &Measurement, kind: FactorKind) -> Self {
        Self {
            kind,
            from: m.from,
            to: m.to,
            measurement: m.transform,
            covariance: m.covariance,
        }
    }

    /// Materialize a prior anchor.
    pub fn from_prior(p: &Prior) -> Self {
        Self {
            kind: FactorKind::Prior,
            from: p.key,
            to: p.key,
            measurement: p.pose,
            covariance: p.covariance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RobotId;

    fn key(robot: char, index: u64) -> PoseKey {
        PoseKey::new(RobotId::new(robot), index)
    }

    #[test]
    fn test_measurement_classification() {
        let cov = Covariance2D::isotropic(0.01);
        let step = Pose2D::new(1.0, 0.0, 0.0);

        let odom = Measurement::new(key('a', 3), key('a', 4), step, cov);
        let lc = Measurement::new(key('a', 10), key('a', 2), step, cov);
        let bridge = Measurement::new(key('a', 0), key('b', 0), step, cov);

        assert_eq!(odom.kind(), FactorKind::Odometry);
        assert_eq!(lc.kind(), FactorKind::LoopClosure);
        assert_eq!(bridge.kind(), FactorKind::Bridge);
    }

    #[test]
    fn test_reversed_odometry_still_classifies_as_odometry() {
        let m = Measurement::new(
            key('a', 4),
            key('a', 3),
            Pose2D::new(-1.0, 0.0, 0.0),
            Covariance2D::isotropic(0.01),
        );
        assert_eq!(m.kind(), FactorKind::Odometry);
    }

    #[test]
    fn test_prior_factor_keys_coincide() {
        let prior = Prior::new(
            key('a', 0),
            Pose2D::new(1.0, 2.0, 0.0),
            Covariance2D::isotropic(0.01),
        );
        let factor = Factor::from_prior(&prior);

        assert_eq!(factor.kind, FactorKind::Prior);
        assert_eq!(factor.from, factor.to);
        assert_eq!(factor.measurement, prior.pose);
    }
}
