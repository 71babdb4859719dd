//! Test utilities for the robust solver integration suite.
//!
//! Builds a deterministic synthetic two-robot dataset: robot a drives a
//! 50-pose loop with 3 exact loop closures, robot b drives a 42-pose
//! loop next to it with 2 further candidates, attached through one
//! bridge. All measurements are synthesized from the ground truth, so
//! every candidate is mutually consistent by construction.

#![allow(dead_code)]

use std::f32::consts::{FRAC_PI_2, PI};

use samyak_pgo::{Covariance2D, Measurement, Pose2D, PoseKey, Prior, RobotId, Values};

/// Poses on robot a's trajectory.
pub const ROBOT_A_POSES: usize = 50;

/// Poses on robot b's trajectory.
pub const ROBOT_B_POSES: usize = 42;

/// Key pairs of robot a's loop closures.
pub const ROBOT_A_CLOSURES: [(u64, u64); 3] = [(40, 4), (41, 5), (42, 6)];

pub fn key(robot: char, index: u64) -> PoseKey {
    PoseKey::new(RobotId::new(robot), index)
}

pub fn meas_cov() -> Covariance2D {
    Covariance2D::diagonal(0.01, 0.01, 1e-4)
}

fn circle_pose(radius: f32, n: usize, i: usize, cx: f32, cy: f32) -> Pose2D {
    let angle = 2.0 * PI * i as f32 / n as f32;
    Pose2D::new(
        cx + radius * angle.cos(),
        cy + radius * angle.sin(),
        angle + FRAC_PI_2,
    )
}

/// Ground-truth pose i of robot a: a loop around the origin.
pub fn ground_truth_a(i: usize) -> Pose2D {
    circle_pose(8.0, ROBOT_A_POSES, i, 0.0, 0.0)
}

/// Ground-truth pose k of robot b in the global frame: a loop overlapping
/// robot a's.
pub fn ground_truth_b(k: usize) -> Pose2D {
    circle_pose(7.0, ROBOT_B_POSES, k, 3.0, 1.0)
}

fn exact(from: PoseKey, to: PoseKey, gt_from: Pose2D, gt_to: Pose2D) -> Measurement {
    Measurement::new(from, to, gt_from.between(&gt_to), meas_cov())
}

/// Robot a's batch: 49 odometry edges plus 3 exact loop closures.
pub fn robot_a_measurements() -> Vec<Measurement> {
    let mut measurements = Vec::new();
    for i in 0..ROBOT_A_POSES - 1 {
        measurements.push(exact(
            key('a', i as u64),
            key('a', i as u64 + 1),
            ground_truth_a(i),
            ground_truth_a(i + 1),
        ));
    }
    for (i, j) in ROBOT_A_CLOSURES {
        measurements.push(exact(
            key('a', i),
            key('a', j),
            ground_truth_a(i as usize),
            ground_truth_a(j as usize),
        ));
    }
    measurements
}

/// Robot a's initial values: the ground truth.
pub fn robot_a_values() -> Values {
    (0..ROBOT_A_POSES)
        .map(|i| (key('a', i as u64), ground_truth_a(i)))
        .collect()
}

/// Prior anchoring a0 at its ground-truth pose.
pub fn robot_a_prior() -> Prior {
    Prior::new(key('a', 0), ground_truth_a(0), meas_cov())
}

/// Robot b's batch: 41 odometry edges plus 2 exact candidates, one
/// intra-b loop closure and one inter-robot closure.
pub fn robot_b_measurements() -> Vec<Measurement> {
    let mut measurements = Vec::new();
    for k in 0..ROBOT_B_POSES - 1 {
        measurements.push(exact(
            key('b', k as u64),
            key('b', k as u64 + 1),
            ground_truth_b(k),
            ground_truth_b(k + 1),
        ));
    }
    measurements.push(exact(
        key('b', 35),
        key('b', 3),
        ground_truth_b(35),
        ground_truth_b(3),
    ));
    measurements.push(exact(
        key('a', 10),
        key('b', 2),
        ground_truth_a(10),
        ground_truth_b(2),
    ));
    measurements
}

/// Robot b's initial values, in b's local frame (b0 at identity).
pub fn robot_b_values() -> Values {
    let origin = ground_truth_b(0);
    (0..ROBOT_B_POSES)
        .map(|k| (key('b', k as u64), origin.between(&ground_truth_b(k))))
        .collect()
}

/// The connecting measurement from a0 to b0.
pub fn bridge_a_to_b() -> Measurement {
    exact(key('a', 0), key('b', 0), ground_truth_a(0), ground_truth_b(0))
}

/// A spurious closure over the same segment as the real ones: plausible
/// against drifting odometry but 3m off sideways, so it contradicts
/// every exact closure.
pub fn spurious_closure() -> Measurement {
    let truth = ground_truth_a(43).between(&ground_truth_a(7));
    let offset = truth.compose(&Pose2D::new(0.0, 3.0, 0.0));
    Measurement::new(key('a', 43), key('a', 7), offset, meas_cov())
}
