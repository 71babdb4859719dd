//! Robust solver façade.
//!
//! The single owned, mutable entry point of the backend. Each batch call
//! fully ingests its measurements, runs all consistency checks, reselects
//! the accepted set, and rebuilds the materialized pose graph before
//! returning; there is no background work and no partial state between
//! calls.

use serde::{Deserialize, Serialize};

use crate::core::types::Values;
use crate::error::{PgoError, Result};
use crate::graph::{Factor, Measurement, PoseGraphStore, Prior};
use crate::pcm::{ConsistencyChecker, ConsistencyGraph};

use super::optimizer::{GraphOptimizer, GraphOptimizerConfig};
use super::Optimizer;

/// How chatty the solver is on the `log` facade.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Verbosity {
    /// No output.
    Quiet,
    /// Batch-level summaries.
    Info,
    /// Per-candidate decisions.
    Debug,
}

/// Configuration for the robust solver. Set once, before the first load.
#[derive(Debug, Clone)]
pub struct RobustSolverConfig {
    /// Squared Mahalanobis threshold of the odometry gate. Zero rejects
    /// every loop-closure and bridge candidate.
    pub odom_threshold: f64,

    /// Squared Mahalanobis threshold of the pairwise gate.
    pub lc_threshold: f64,

    /// Logging verbosity.
    pub verbosity: Verbosity,

    /// Configuration of the built-in optimizer.
    pub optimizer: GraphOptimizerConfig,
}

impl RobustSolverConfig {
    /// Config with the given gate thresholds and default optimization.
    pub fn new(odom_threshold: f64, lc_threshold: f64) -> Self {
        Self {
            odom_threshold,
            lc_threshold,
            ..Default::default()
        }
    }
}

impl Default for RobustSolverConfig {
    fn default() -> Self {
        Self {
            odom_threshold: 10.0,
            lc_threshold: 10.0,
            verbosity: Verbosity::Info,
            optimizer: GraphOptimizerConfig::default(),
        }
    }
}

/// Lifecycle of the façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// Nothing ingested yet; only `load_graph` is valid.
    Empty,
    /// First robot loaded.
    Loaded,
    /// At least one further robot attached.
    Ready,
}

/// Snapshot of solver counters.
#[derive(Debug, Clone)]
pub struct SolverStatus {
    /// Current lifecycle state.
    pub state: SolverState,
    /// Robots with an ingested trajectory.
    pub num_robots: usize,
    /// Keys with a value.
    pub num_poses: usize,
    /// Factors in the materialized pose graph.
    pub num_factors: usize,
    /// Loop-closure and bridge candidates seen so far.
    pub num_candidates: usize,
    /// Candidates that passed the odometry gate.
    pub num_consistent: usize,
    /// Pairwise-consistency edges established.
    pub num_consistency_edges: usize,
    /// Candidates in the current accepted set.
    pub num_accepted: usize,
}

/// Outlier-robust multi-robot pose graph solver.
///
/// Odometry and priors are trusted and enter the graph unconditionally.
/// Loop closures and bridges are vetted by the pairwise consistency
/// machinery, and only the current maximum clique of mutually consistent
/// candidates is materialized for optimization.
pub struct RobustSolver {
    config: RobustSolverConfig,
    state: SolverState,
    store: PoseGraphStore,
    checker: ConsistencyChecker,
    graph: ConsistencyGraph,
    optimizer: Box<dyn Optimizer>,
}

impl RobustSolver {
    /// Create a solver with the built-in optimizer.
    pub fn new(config: RobustSolverConfig) -> Self {
        let optimizer = Box::new(GraphOptimizer::new(config.optimizer.clone()));
        Self::with_optimizer(config, optimizer)
    }

    /// Create a solver delegating optimization to `optimizer`.
    pub fn with_optimizer(config: RobustSolverConfig, optimizer: Box<dyn Optimizer>) -> Self {
        let checker = ConsistencyChecker::new(config.odom_threshold, config.lc_threshold);
        Self {
            config,
            state: SolverState::Empty,
            store: PoseGraphStore::new(),
            checker,
            graph: ConsistencyGraph::new(),
            optimizer,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Ingest the first robot: its odometry, an anchoring prior, and any
    /// loop-closure candidates in `measurements`.
    ///
    /// Fails with [`PgoError::AlreadyLoaded`] if a graph is already
    /// loaded, and with [`PgoError::InvalidGraph`] for malformed batches;
    /// either way the solver is left unchanged.
    pub fn load_graph(
        &mut self,
        measurements: &[Measurement],
        initial: &Values,
        prior: &Prior,
    ) -> Result<()> {
        if self.state != SolverState::Empty {
            return Err(PgoError::AlreadyLoaded);
        }

        let candidates = self.store.load_batch(measurements, initial, prior)?;
        if self.config.verbosity >= Verbosity::Info {
            log::info!(
                "loaded robot {} with {} poses, {} candidates",
                prior.key.robot,
                self.store.values().len(),
                candidates.len()
            );
        }

        self.process_candidates(candidates);
        self.state = SolverState::Loaded;
        Ok(())
    }

    /// Attach a further robot through `bridge` and ingest its batch.
    ///
    /// The bridge anchors the new robot's frame; all other non-odometry
    /// measurements in the batch become vetted candidates. Fails with
    /// [`PgoError::UnknownAnchor`] when the bridge does not connect to a
    /// known key, leaving the solver unchanged.
    pub fn add_graph(
        &mut self,
        measurements: &[Measurement],
        initial: &Values,
        bridge: &Measurement,
    ) -> Result<()> {
        if self.state == SolverState::Empty {
            return Err(PgoError::UnknownAnchor(bridge.from));
        }

        let candidates = self.store.add_batch(measurements, initial, bridge)?;
        if self.config.verbosity >= Verbosity::Info {
            log::info!(
                "attached robot graph via {} -> {}, {} poses total, {} new candidates",
                bridge.from,
                bridge.to,
                self.store.values().len(),
                candidates.len()
            );
        }

        self.process_candidates(candidates);
        self.state = SolverState::Ready;
        Ok(())
    }

    /// The materialized pose graph: trusted factors plus the accepted
    /// set, in deterministic order.
    ///
    /// The view reflects state at call time; the next `load_graph` or
    /// `add_graph` rebuilds it, which the borrow checker surfaces as a
    /// lifetime conflict rather than stale data.
    pub fn factors_unsafe(&self) -> &[Factor] {
        self.store.factors()
    }

    /// Optimize the current pose graph and return the estimate.
    ///
    /// Delegates to the configured optimizer with the stored initial
    /// values (odometry-propagated where the caller supplied none).
    /// Mutates nothing, so repeated calls without intervening ingestion
    /// return identical results. Solver failures propagate verbatim.
    pub fn calculate_estimate(&self) -> Result<Values> {
        self.optimizer
            .optimize(self.store.factors(), self.store.values())
    }

    /// Counter snapshot for diagnostics.
    pub fn status(&self) -> SolverStatus {
        SolverStatus {
            state: self.state,
            num_robots: self.store.num_robots(),
            num_poses: self.store.values().len(),
            num_factors: self.store.factors().len(),
            num_candidates: self.store.candidates().len(),
            num_consistent: self
                .store
                .candidates()
                .iter()
                .filter(|c| c.odom_consistent)
                .count(),
            num_consistency_edges: self.graph.num_edges(),
            num_accepted: self.graph.accepted().len(),
        }
    }

    /// Drop all state and return to `Empty` for full reinitialization.
    pub fn reset(&mut self) {
        self.store.clear();
        self.graph.clear();
        self.state = SolverState::Empty;
    }

    /// Gate each candidate, extend the consistency graph, reselect the
    /// accepted set, and rebuild the materialized pose graph.
    fn process_candidates(&mut self, candidates: Vec<Measurement>) {
        for m in candidates {
            let consistent = self.checker.odometry_consistent(&self.store, &m);
            if self.config.verbosity >= Verbosity::Debug {
                log::debug!(
                    "candidate {} -> {}: odometry gate {}",
                    m.from,
                    m.to,
                    if consistent { "passed" } else { "failed" }
                );
            }

            let id = self.store.push_candidate(m, consistent);
            if !consistent {
                continue;
            }

            let node = self.graph.add_node(id);
            for other in 0..node {
                let other_id = self.graph.candidate_id(other);
                let other_m = self.store.candidate(other_id).measurement;
                if self.checker.pairwise_consistent(&self.store, &m, &other_m) {
                    self.graph.add_edge(node, other);
                }
            }
        }

        let accepted = self.graph.recompute_accepted();
        if self.config.verbosity >= Verbosity::Info {
            log::info!(
                "accepted {} of {} candidates ({} consistency edges)",
                accepted.len(),
                self.store.candidates().len(),
                self.graph.num_edges()
            );
        }
        self.store.materialize(&accepted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Covariance2D, Pose2D, PoseKey, RobotId};

    fn key(robot: char, index: u64) -> PoseKey {
        PoseKey::new(RobotId::new(robot), index)
    }

    fn cov() -> Covariance2D {
        Covariance2D::diagonal(0.01, 0.01, 0.001)
    }

    fn straight_odometry(robot: char, n_poses: usize) -> Vec<Measurement> {
        (0..n_poses - 1)
            .map(|i| {
                Measurement::new(
                    key(robot, i as u64),
                    key(robot, i as u64 + 1),
                    Pose2D::new(1.0, 0.0, 0.0),
                    cov(),
                )
            })
            .collect()
    }

    fn prior_at_origin(robot: char) -> Prior {
        Prior::new(key(robot, 0), Pose2D::identity(), cov())
    }

    #[test]
    fn test_load_twice_is_fatal() {
        let mut solver = RobustSolver::new(RobustSolverConfig::new(10.0, 10.0));
        let odometry = straight_odometry('a', 5);

        solver
            .load_graph(&odometry, &Values::new(), &prior_at_origin('a'))
            .unwrap();
        let err = solver
            .load_graph(&odometry, &Values::new(), &prior_at_origin('a'))
            .unwrap_err();

        assert!(matches!(err, PgoError::AlreadyLoaded));
    }

    #[test]
    fn test_add_before_load_is_unknown_anchor() {
        let mut solver = RobustSolver::new(RobustSolverConfig::new(10.0, 10.0));
        let bridge = Measurement::new(key('a', 0), key('b', 0), Pose2D::identity(), cov());

        let err = solver
            .add_graph(&straight_odometry('b', 4), &Values::new(), &bridge)
            .unwrap_err();

        assert!(matches!(err, PgoError::UnknownAnchor(_)));
        assert_eq!(solver.state(), SolverState::Empty);
    }

    #[test]
    fn test_state_progression() {
        let mut solver = RobustSolver::new(RobustSolverConfig::new(10.0, 10.0));
        assert_eq!(solver.state(), SolverState::Empty);

        solver
            .load_graph(
                &straight_odometry('a', 5),
                &Values::new(),
                &prior_at_origin('a'),
            )
            .unwrap();
        assert_eq!(solver.state(), SolverState::Loaded);

        let bridge = Measurement::new(key('a', 0), key('b', 0), Pose2D::new(0.0, 1.0, 0.0), cov());
        solver
            .add_graph(&straight_odometry('b', 3), &Values::new(), &bridge)
            .unwrap();
        assert_eq!(solver.state(), SolverState::Ready);
    }

    #[test]
    fn test_exact_loop_closure_accepted_with_permissive_gates() {
        let mut solver = RobustSolver::new(RobustSolverConfig::new(100.0, 100.0));

        let mut measurements = straight_odometry('a', 10);
        measurements.push(Measurement::new(
            key('a', 8),
            key('a', 2),
            Pose2D::new(-6.0, 0.0, 0.0),
            cov(),
        ));

        solver
            .load_graph(&measurements, &Values::new(), &prior_at_origin('a'))
            .unwrap();

        // 9 odometry + 1 prior + 1 accepted loop closure
        assert_eq!(solver.factors_unsafe().len(), 11);
        assert_eq!(solver.status().num_accepted, 1);
    }

    #[test]
    fn test_zero_odometry_gate_rejects_candidates() {
        let mut solver = RobustSolver::new(RobustSolverConfig::new(0.0, 100.0));

        let mut measurements = straight_odometry('a', 10);
        measurements.push(Measurement::new(
            key('a', 8),
            key('a', 2),
            Pose2D::new(-6.0, 0.0, 0.0),
            cov(),
        ));

        solver
            .load_graph(&measurements, &Values::new(), &prior_at_origin('a'))
            .unwrap();

        assert_eq!(solver.factors_unsafe().len(), 10);
        assert_eq!(solver.status().num_candidates, 1);
        assert_eq!(solver.status().num_accepted, 0);
    }

    #[test]
    fn test_reset_allows_fresh_load() {
        let mut solver = RobustSolver::new(RobustSolverConfig::new(10.0, 10.0));

        solver
            .load_graph(
                &straight_odometry('a', 5),
                &Values::new(),
                &prior_at_origin('a'),
            )
            .unwrap();
        solver.reset();

        assert_eq!(solver.state(), SolverState::Empty);
        assert!(solver.factors_unsafe().is_empty());
        solver
            .load_graph(
                &straight_odometry('a', 5),
                &Values::new(),
                &prior_at_origin('a'),
            )
            .unwrap();
        assert_eq!(solver.factors_unsafe().len(), 5);
    }

    #[test]
    fn test_failed_batch_leaves_solver_unchanged() {
        let mut solver = RobustSolver::new(RobustSolverConfig::new(10.0, 10.0));
        solver
            .load_graph(
                &straight_odometry('a', 5),
                &Values::new(),
                &prior_at_origin('a'),
            )
            .unwrap();
        let before = solver.factors_unsafe().len();

        // Batch referencing a key that exists nowhere.
        let mut bad = straight_odometry('b', 3);
        bad.push(Measurement::new(
            key('b', 0),
            key('b', 50),
            Pose2D::identity(),
            cov(),
        ));
        let bridge = Measurement::new(key('a', 0), key('b', 0), Pose2D::identity(), cov());
        assert!(solver.add_graph(&bad, &Values::new(), &bridge).is_err());

        assert_eq!(solver.factors_unsafe().len(), before);
        assert_eq!(solver.state(), SolverState::Loaded);
        assert_eq!(solver.status().num_robots, 1);
    }
}
