//! Core data types for the multi-robot pose graph backend.

mod covariance;
mod key;
mod pose;
mod pose_with_cov;

pub use covariance::Covariance2D;
pub use key::{PoseKey, RobotId};
pub use pose::Pose2D;
pub use pose_with_cov::PoseWithCovariance;

use std::collections::BTreeMap;

/// Assignment of absolute poses to keys.
///
/// Used both for caller-supplied initial values and for the optimizer's
/// returned estimate. A BTreeMap keeps iteration order deterministic,
/// which the incremental selection and the optimizer's variable ordering
/// rely on.
pub type Values = BTreeMap<PoseKey, Pose2D>;
