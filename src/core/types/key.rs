//! Pose identity types for multi-robot graphs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a single robot.
///
/// Robots are named by a single letter ('a', 'b', ...), following the
/// usual multi-robot dataset convention.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RobotId(u8);

impl RobotId {
    /// Create a robot identifier from its letter.
    #[inline]
    pub fn new(letter: char) -> Self {
        Self(letter as u8)
    }

    /// The robot's letter.
    #[inline]
    pub fn as_char(&self) -> char {
        self.0 as char
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Identifies one robot pose at a discrete trajectory index.
///
/// Keys are immutable once created; no two nodes in the graph share a key.
/// Ordering is by robot first, then index, which gives per-robot
/// trajectories a contiguous, sorted key range.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PoseKey {
    /// Robot this pose belongs to.
    pub robot: RobotId,
    /// Sequence index along the robot's trajectory.
    pub index: u64,
}

impl PoseKey {
    /// Create a new pose key.
    #[inline]
    pub fn new(robot: RobotId, index: u64) -> Self {
        Self { robot, index }
    }

    /// Key of the next pose in the same trajectory.
    #[inline]
    pub fn next(&self) -> PoseKey {
        PoseKey::new(self.robot, self.index + 1)
    }

    /// Whether `other` is the temporally adjacent pose of the same robot.
    #[inline]
    pub fn is_consecutive(&self, other: &PoseKey) -> bool {
        self.robot == other.robot && self.index.abs_diff(other.index) == 1
    }
}

impl fmt::Display for PoseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.robot, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robot_id_display() {
        assert_eq!(RobotId::new('a').to_string(), "a");
        assert_eq!(RobotId::new('b').as_char(), 'b');
    }

    #[test]
    fn test_pose_key_display() {
        let key = PoseKey::new(RobotId::new('a'), 12);
        assert_eq!(key.to_string(), "a12");
    }

    #[test]
    fn test_pose_key_ordering() {
        let a0 = PoseKey::new(RobotId::new('a'), 0);
        let a1 = PoseKey::new(RobotId::new('a'), 1);
        let b0 = PoseKey::new(RobotId::new('b'), 0);

        assert!(a0 < a1);
        assert!(a1 < b0);
    }

    #[test]
    fn test_pose_key_consecutive() {
        let a3 = PoseKey::new(RobotId::new('a'), 3);
        let a4 = PoseKey::new(RobotId::new('a'), 4);
        let a5 = PoseKey::new(RobotId::new('a'), 5);
        let b4 = PoseKey::new(RobotId::new('b'), 4);

        assert!(a3.is_consecutive(&a4));
        assert!(a4.is_consecutive(&a3));
        assert!(!a3.is_consecutive(&a5));
        assert!(!a3.is_consecutive(&b4));
        assert_eq!(a3.next(), a4);
    }
}
