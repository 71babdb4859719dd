//! Error types for the pose graph backend.

use crate::core::types::PoseKey;
use thiserror::Error;

/// Pose graph backend error type.
///
/// Ingestion errors are raised before any state mutation: a rejected
/// batch leaves the solver exactly as it was. A measurement failing a
/// consistency check is not an error.
#[derive(Error, Debug)]
pub enum PgoError {
    /// Malformed input batch: duplicate keys, broken odometry chain,
    /// references to keys the batch neither contains nor the store knows.
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// The connecting measurement of `add_graph` does not attach to any
    /// key already present in the store.
    #[error("Bridge does not connect to a known key: {0}")]
    UnknownAnchor(PoseKey),

    /// `load_graph` called on a solver that already holds a graph.
    #[error("Solver already loaded")]
    AlreadyLoaded,

    /// The nonlinear solve diverged and damping could not recover it.
    #[error("Optimization diverged after {iterations} iterations")]
    SolverDiverged {
        /// Iterations performed before giving up.
        iterations: u32,
    },

    /// The normal equations are not positive definite.
    #[error("Linear system is ill-conditioned")]
    IllConditioned,
}

/// Result alias for backend operations.
pub type Result<T> = std::result::Result<T, PgoError>;
