//! SamyakPGO - Outlier-robust multi-robot pose graph backend
//!
//! Robots produce trusted incremental odometry and untrusted loop-closure
//! measurements; some closures are spurious (perceptual aliasing,
//! mismatched place recognition) and would corrupt the trajectory
//! estimate if optimized. This crate implements pairwise consistent
//! measurement selection: every candidate closure is hypothesis-tested
//! against the odometry chain and against every other candidate, and
//! only the largest mutually consistent subset (the maximum clique of
//! the consistency graph) is handed to the optimizer.
//!
//! # Architecture
//!
//! The crate is organized into 4 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    solver/                          │  ← Orchestration
//! │        (robust façade, nonlinear optimizer)         │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     pcm/                            │  ← Outlier rejection
//! │     (consistency checks, max-clique selection)      │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    graph/                           │  ← Storage
//! │       (factors, trajectories, batch ingestion)      │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                 (types, math)                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use samyak_pgo::{
//!     Covariance2D, Measurement, Pose2D, PoseKey, Prior, RobotId, RobustSolver,
//!     RobustSolverConfig, Values,
//! };
//!
//! let key = |i| PoseKey::new(RobotId::new('a'), i);
//! let cov = Covariance2D::diagonal(0.01, 0.01, 0.001);
//!
//! // Three-pose trajectory with one exact loop closure back to the start.
//! let measurements = vec![
//!     Measurement::new(key(0), key(1), Pose2D::new(1.0, 0.0, 0.0), cov),
//!     Measurement::new(key(1), key(2), Pose2D::new(1.0, 0.0, 0.0), cov),
//!     Measurement::new(key(2), key(0), Pose2D::new(-2.0, 0.0, 0.0), cov),
//! ];
//! let prior = Prior::new(key(0), Pose2D::identity(), cov);
//!
//! let mut solver = RobustSolver::new(RobustSolverConfig::new(10.0, 10.0));
//! solver.load_graph(&measurements, &Values::new(), &prior).unwrap();
//!
//! // 2 odometry + 1 prior + 1 accepted loop closure
//! assert_eq!(solver.factors_unsafe().len(), 4);
//! let estimate = solver.calculate_estimate().unwrap();
//! assert_eq!(estimate.len(), 3);
//! ```

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Graph storage (depends on core)
// ============================================================================
pub mod graph;

// ============================================================================
// Layer 3: Consistency machinery (depends on core, graph)
// ============================================================================
pub mod pcm;

// ============================================================================
// Layer 4: Solver façade (depends on all layers)
// ============================================================================
pub mod solver;

pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use crate::core::types::{Covariance2D, Pose2D, PoseKey, PoseWithCovariance, RobotId, Values};

// Graph storage
pub use graph::{Candidate, Factor, FactorKind, Measurement, PoseGraphStore, Prior, Trajectory};

// Consistency machinery
pub use pcm::{ConsistencyChecker, ConsistencyGraph};

// Solver
pub use solver::{
    GraphOptimizer, GraphOptimizerConfig, Optimizer, RobustSolver, RobustSolverConfig,
    SolverState, SolverStatus, Verbosity,
};

// Errors
pub use error::{PgoError, Result};
