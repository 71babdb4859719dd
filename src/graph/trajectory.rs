//! Per-robot odometry chains.
//!
//! A trajectory is the ordered pose sequence of one robot together with
//! the odometry step (transform + covariance) between each consecutive
//! pair. It answers the central reference query of the consistency
//! checker: the odometry-implied relative transform between any two of
//! its keys, with the uncertainty accumulated along the chain.

use serde::{Deserialize, Serialize};

use crate::core::types::{PoseKey, PoseWithCovariance, RobotId};

/// Ordered odometry chain of a single robot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Robot this chain belongs to.
    robot: RobotId,
    /// Index of the first pose.
    start_index: u64,
    /// Step k is the measured transform from pose `start_index + k` to
    /// pose `start_index + k + 1`.
    steps: Vec<PoseWithCovariance>,
}

impl Trajectory {
    /// Create a chain holding a single pose and no steps yet.
    pub fn new(robot: RobotId, start_index: u64) -> Self {
        Self {
            robot,
            start_index,
            steps: Vec::new(),
        }
    }

    /// Robot identifier.
    pub fn robot(&self) -> RobotId {
        self.robot
    }

    /// Index of the first pose.
    pub fn first_index(&self) -> u64 {
        self.start_index
    }

    /// Index of the last pose.
    pub fn last_index(&self) -> u64 {
        self.start_index + self.steps.len() as u64
    }

    /// Number of poses on the chain.
    pub fn num_poses(&self) -> usize {
        self.steps.len() + 1
    }

    /// Append the odometry step from the current last pose to the next.
    pub fn push_step(&mut self, step: PoseWithCovariance) {
        self.steps.push(step);
    }

    /// Whether the chain covers the given pose index.
    pub fn contains(&self, index: u64) -> bool {
        index >= self.start_index && index <= self.last_index()
    }

    /// Whether the chain covers the given key.
    pub fn contains_key(&self, key: &PoseKey) -> bool {
        key.robot == self.robot && self.contains(key.index)
    }

    /// Odometry-implied relative transform from pose `from` to pose `to`,
    /// with covariance accumulated over the chain.
    ///
    /// O(chain length). Returns `None` if either index is off the chain.
    pub fn between(&self, from: u64, to: u64) -> Option<PoseWithCovariance> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }

        let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
        let mut acc = PoseWithCovariance::identity();
        for i in lo..hi {
            let step = &self.steps[(i - self.start_index) as usize];
            acc = acc.compose(step);
        }

        if from <= to {
            Some(acc)
        } else {
            Some(acc.inverse())
        }
    }
}
