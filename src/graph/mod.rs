//! Pose graph storage layer.
//!
//! # Contents
//!
//! - [`factor`]: measurement and factor types
//! - [`trajectory`]: per-robot odometry chains
//! - [`store`]: the owning store and its batch ingestion

mod factor;
mod store;
mod trajectory;

pub use factor::{Factor, FactorKind, Measurement, Prior};
pub use store::{Candidate, PoseGraphStore};
pub use trajectory::Trajectory;
