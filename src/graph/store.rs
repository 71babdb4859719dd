//! Pose graph store.
//!
//! Owns every pose key, measurement, and trajectory, and assembles the
//! materialized factor list handed to the optimizer. Ingestion is
//! all-or-nothing: a batch is fully validated before the first mutation,
//! so a rejected batch leaves the store untouched.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::core::types::{Pose2D, PoseKey, PoseWithCovariance, RobotId, Values};
use crate::error::{PgoError, Result};

use super::factor::{Factor, FactorKind, Measurement, Prior};
use super::trajectory::Trajectory;

/// A vetted loop-closure or bridge measurement retained by the store.
///
/// Candidates are never discarded: a measurement that loses a clique
/// round stays here and can re-enter the accepted set as the graph grows.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The measurement itself.
    pub measurement: Measurement,
    /// LoopClosure or Bridge.
    pub kind: FactorKind,
    /// Whether the measurement passed the odometry gate on arrival.
    pub odom_consistent: bool,
}

/// Store for the accumulated multi-robot pose graph.
#[derive(Debug, Default)]
pub struct PoseGraphStore {
    /// Initial absolute pose per key, global frame.
    values: Values,

    /// Odometry chain per robot.
    trajectories: BTreeMap<RobotId, Trajectory>,

    /// Trusted factors in arrival order: odometry, priors, anchor bridges.
    trusted: Vec<Factor>,

    /// Anchor bridges only, the inter-robot connectivity links.
    anchors: Vec<Factor>,

    /// Arena of vetted measurements, insertion order = arrival order.
    candidates: Vec<Candidate>,

    /// Trusted factors plus the currently accepted candidates. Rebuilt
    /// after every batch.
    pose_graph: Vec<Factor>,
}

/// Validated but not yet applied batch content.
struct StagedBatch {
    robot: RobotId,
    start_index: u64,
    steps: Vec<PoseWithCovariance>,
    odometry: Vec<Measurement>,
    new_values: Vec<(PoseKey, Pose2D)>,
    candidates: Vec<Measurement>,
}

impl PoseGraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the store holds any poses.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of robots with a trajectory.
    pub fn num_robots(&self) -> usize {
        self.trajectories.len()
    }

    /// Initial values for all keys, global frame.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// The materialized pose graph: trusted factors plus the accepted set.
    ///
    /// The returned view reflects the state at call time; it is rebuilt
    /// by the next batch, so callers must not assume it outlives further
    /// mutation (the borrow checker enforces exactly that).
    pub fn factors(&self) -> &[Factor] {
        &self.pose_graph
    }

    /// The candidate arena.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Look up a candidate by its stable index.
    pub fn candidate(&self, id: usize) -> &Candidate {
        &self.candidates[id]
    }

    /// Record a vetted measurement and return its stable index.
    pub fn push_candidate(&mut self, measurement: Measurement, odom_consistent: bool) -> usize {
        let id = self.candidates.len();
        self.candidates.push(Candidate {
            kind: measurement.kind(),
            measurement,
            odom_consistent,
        });
        id
    }

    /// Drop all state, returning the store to its freshly built form.
    pub fn clear(&mut self) {
        self.values.clear();
        self.trajectories.clear();
        self.trusted.clear();
        self.anchors.clear();
        self.candidates.clear();
        self.pose_graph.clear();
    }

    /// Ingest the first robot's batch.
    ///
    /// Odometry and the prior become trusted factors; every other
    /// measurement is returned as a loop-closure candidate. Fails without
    /// mutating the store if the batch is malformed.
    pub fn load_batch(
        &mut self,
        measurements: &[Measurement],
        initial: &Values,
        prior: &Prior,
    ) -> Result<Vec<Measurement>> {
        if !self.is_empty() {
            return Err(PgoError::AlreadyLoaded);
        }

        let robot = prior.key.robot;
        let mut odometry = Vec::new();
        let mut loop_closures = Vec::new();

        for m in measurements {
            match m.kind() {
                FactorKind::Odometry => odometry.push(normalize_forward(m)),
                FactorKind::LoopClosure => loop_closures.push(*m),
                FactorKind::Bridge | FactorKind::Prior => {
                    return Err(PgoError::InvalidGraph(format!(
                        "initial load holds a single robot, got edge {} -> {}",
                        m.from, m.to
                    )));
                }
            }
        }

        let (start_index, steps) = validate_chain(robot, &mut odometry, prior.key.index)?;
        let last_index = start_index + steps.len() as u64;

        if prior.key.index < start_index || prior.key.index > last_index {
            return Err(PgoError::InvalidGraph(format!(
                "prior references unknown key {}",
                prior.key
            )));
        }

        for m in &loop_closures {
            for key in [m.from, m.to] {
                if key.robot != robot || key.index < start_index || key.index > last_index {
                    return Err(PgoError::InvalidGraph(format!(
                        "measurement references unknown key {}",
                        key
                    )));
                }
            }
        }

        let new_values = fill_chain_values(
            robot,
            start_index,
            &steps,
            initial,
            (prior.key.index, prior.pose),
        )?;

        let staged = StagedBatch {
            robot,
            start_index,
            steps,
            odometry,
            new_values,
            candidates: loop_closures,
        };

        let candidates = self.commit(staged);
        self.trusted.push(Factor::from_prior(prior));
        Ok(candidates)
    }

    /// Ingest a further robot's batch, attached through `bridge`.
    ///
    /// The bridge must join one key the store already holds to one key
    /// the batch introduces. It becomes the trusted frame anchor for the
    /// new robot; every other non-odometry measurement is returned as a
    /// candidate.
    pub fn add_batch(
        &mut self,
        measurements: &[Measurement],
        initial: &Values,
        bridge: &Measurement,
    ) -> Result<Vec<Measurement>> {
        if self.is_empty() {
            return Err(PgoError::UnknownAnchor(bridge.from));
        }
        if bridge.kind() != FactorKind::Bridge {
            return Err(PgoError::InvalidGraph(format!(
                "connection {} -> {} does not join two robots",
                bridge.from, bridge.to
            )));
        }

        // Orient the bridge: known side anchors, new side is introduced.
        let from_known = self.values.contains_key(&bridge.from);
        let to_known = self.values.contains_key(&bridge.to);
        let (known_key, new_key, known_to_new) = match (from_known, to_known) {
            (true, true) => {
                return Err(PgoError::InvalidGraph(format!(
                    "connection {} -> {} joins two known keys",
                    bridge.from, bridge.to
                )));
            }
            (true, false) => (
                bridge.from,
                bridge.to,
                PoseWithCovariance::new(bridge.transform, bridge.covariance),
            ),
            (false, true) => (
                bridge.to,
                bridge.from,
                PoseWithCovariance::new(bridge.transform, bridge.covariance).inverse(),
            ),
            (false, false) => return Err(PgoError::UnknownAnchor(bridge.from)),
        };

        let robot = new_key.robot;
        if self.trajectories.contains_key(&robot) {
            // The "new" side names a robot we already track, so its index
            // simply does not exist.
            return Err(PgoError::UnknownAnchor(new_key));
        }

        let mut odometry = Vec::new();
        let mut candidates = Vec::new();
        for m in measurements {
            match m.kind() {
                FactorKind::Odometry if m.from.robot == robot => {
                    odometry.push(normalize_forward(m))
                }
                FactorKind::Odometry => {
                    return Err(PgoError::InvalidGraph(format!(
                        "odometry {} -> {} does not belong to the new robot {}",
                        m.from, m.to, robot
                    )));
                }
                _ => candidates.push(*m),
            }
        }

        let (start_index, steps) = validate_chain(robot, &mut odometry, new_key.index)?;
        let last_index = start_index + steps.len() as u64;

        if new_key.index < start_index || new_key.index > last_index {
            return Err(PgoError::UnknownAnchor(new_key));
        }

        for m in &candidates {
            for key in [m.from, m.to] {
                let introduced =
                    key.robot == robot && key.index >= start_index && key.index <= last_index;
                if !introduced && !self.values.contains_key(&key) {
                    return Err(PgoError::InvalidGraph(format!(
                        "measurement references unknown key {}",
                        key
                    )));
                }
            }
        }

        // Local-frame fill first, then re-express everything in the
        // global frame through the anchor bridge.
        let local_values = fill_chain_values(
            robot,
            start_index,
            &steps,
            initial,
            (new_key.index, Pose2D::identity()),
        )?;

        let global_anchor = self.values[&known_key].compose(&known_to_new.pose);
        let local_anchor = local_values
            .iter()
            .find(|(k, _)| *k == new_key)
            .map(|(_, p)| *p)
            .unwrap_or_else(Pose2D::identity);
        let alignment = global_anchor.compose(&local_anchor.inverse());
        let new_values = local_values
            .into_iter()
            .map(|(k, p)| (k, alignment.compose(&p)))
            .collect();

        let staged = StagedBatch {
            robot,
            start_index,
            steps,
            odometry,
            new_values,
            candidates,
        };

        let candidates = self.commit(staged);
        let anchor = Factor::from_measurement(bridge, FactorKind::Bridge);
        self.trusted.push(anchor);
        self.anchors.push(anchor);
        Ok(candidates)
    }

    /// Apply a validated batch. Infallible by construction.
    fn commit(&mut self, staged: StagedBatch) -> Vec<Measurement> {
        let mut trajectory = Trajectory::new(staged.robot, staged.start_index);
        for step in staged.steps {
            trajectory.push_step(step);
        }
        self.trajectories.insert(staged.robot, trajectory);

        for m in &staged.odometry {
            self.trusted
                .push(Factor::from_measurement(m, FactorKind::Odometry));
        }
        for (key, pose) in staged.new_values {
            self.values.insert(key, pose);
        }

        staged.candidates
    }

    /// Rebuild the materialized pose graph from the trusted factors and
    /// the given accepted candidate indices.
    pub fn materialize(&mut self, accepted: &[usize]) {
        self.pose_graph.clear();
        self.pose_graph.extend_from_slice(&self.trusted);
        for &id in accepted {
            let c = &self.candidates[id];
            self.pose_graph
                .push(Factor::from_measurement(&c.measurement, c.kind));
        }
    }

    /// Odometry-chain relative transform between two keys, with
    /// accumulated covariance, crossing anchor bridges where needed.
    ///
    /// Returns `None` when no chain connects the keys.
    pub fn chain_between(&self, from: PoseKey, to: PoseKey) -> Option<PoseWithCovariance> {
        if from == to {
            return Some(PoseWithCovariance::identity());
        }
        if from.robot == to.robot {
            return self
                .trajectories
                .get(&from.robot)?
                .between(from.index, to.index);
        }

        let path = self.robot_path(from.robot, to.robot)?;
        let mut acc = PoseWithCovariance::identity();
        let mut cursor = from;
        for anchor in path {
            let link = PoseWithCovariance::new(anchor.measurement, anchor.covariance);
            let (near, far, link) = if anchor.from.robot == cursor.robot {
                (anchor.from, anchor.to, link)
            } else {
                (anchor.to, anchor.from, link.inverse())
            };
            let leg = self
                .trajectories
                .get(&cursor.robot)?
                .between(cursor.index, near.index)?;
            acc = acc.compose(&leg).compose(&link);
            cursor = far;
        }
        let last_leg = self
            .trajectories
            .get(&cursor.robot)?
            .between(cursor.index, to.index)?;
        Some(acc.compose(&last_leg))
    }

    /// Shortest anchor-bridge path between two robots (BFS, deterministic
    /// by anchor arrival order).
    fn robot_path(&self, from: RobotId, to: RobotId) -> Option<Vec<Factor>> {
        let mut visited = BTreeSet::new();
        let mut parent: BTreeMap<RobotId, (RobotId, Factor)> = BTreeMap::new();
        let mut queue = VecDeque::new();

        visited.insert(from);
        queue.push_back(from);

        while let Some(robot) = queue.pop_front() {
            if robot == to {
                let mut path = Vec::new();
                let mut cursor = robot;
                while cursor != from {
                    let (prev, anchor) = parent[&cursor];
                    path.push(anchor);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for anchor in &self.anchors {
                let neighbor = if anchor.from.robot == robot {
                    anchor.to.robot
                } else if anchor.to.robot == robot {
                    anchor.from.robot
                } else {
                    continue;
                };
                if visited.insert(neighbor) {
                    parent.insert(neighbor, (robot, *anchor));
                    queue.push_back(neighbor);
                }
            }
        }
        None
    }
}

/// Flip a measurement so that `from.index < to.index`.
fn normalize_forward(m: &Measurement) -> Measurement {
    if m.from.index < m.to.index {
        *m
    } else {
        let inv = PoseWithCovariance::new(m.transform, m.covariance).inverse();
        Measurement::new(m.to, m.from, inv.pose, inv.covariance)
    }
}

/// Check that forward-normalized odometry forms one contiguous chain and
/// return its start index plus the per-step transforms.
fn validate_chain(
    robot: RobotId,
    odometry: &mut [Measurement],
    fallback_index: u64,
) -> Result<(u64, Vec<PoseWithCovariance>)> {
    if odometry.is_empty() {
        return Ok((fallback_index, Vec::new()));
    }

    for m in odometry.iter() {
        if m.from.robot != robot {
            return Err(PgoError::InvalidGraph(format!(
                "odometry {} -> {} does not belong to robot {}",
                m.from, m.to, robot
            )));
        }
    }

    odometry.sort_by_key(|m| m.from.index);
    let start = odometry[0].from.index;
    for (offset, m) in odometry.iter().enumerate() {
        let expected = start + offset as u64;
        if m.from.index != expected {
            return Err(PgoError::InvalidGraph(format!(
                "odometry chain of robot {} is broken at index {}",
                robot, expected
            )));
        }
    }

    let steps = odometry
        .iter()
        .map(|m| PoseWithCovariance::new(m.transform, m.covariance))
        .collect();
    Ok((start, steps))
}

/// Complete the value assignment along one odometry chain.
///
/// Caller-supplied values win; missing keys get the odometry-propagated
/// pose, seeded from the first supplied value or from `fallback`.
fn fill_chain_values(
    robot: RobotId,
    start_index: u64,
    steps: &[PoseWithCovariance],
    initial: &Values,
    fallback: (u64, Pose2D),
) -> Result<Vec<(PoseKey, Pose2D)>> {
    let n = steps.len() + 1;
    let last_index = start_index + steps.len() as u64;
    let mut poses: Vec<Option<Pose2D>> = vec![None; n];

    for (key, pose) in initial {
        if key.robot != robot || key.index < start_index || key.index > last_index {
            return Err(PgoError::InvalidGraph(format!(
                "initial value for key {} outside the batch",
                key
            )));
        }
        poses[(key.index - start_index) as usize] = Some(*pose);
    }

    if poses.iter().all(Option::is_none) {
        let (index, pose) = fallback;
        poses[(index - start_index) as usize] = Some(pose);
    }

    // Forward then backward odometry propagation into the gaps.
    for i in 0..n - 1 {
        if poses[i + 1].is_none() {
            if let Some(p) = poses[i] {
                poses[i + 1] = Some(p.compose(&steps[i].pose));
            }
        }
    }
    for i in (0..n - 1).rev() {
        if poses[i].is_none() {
            if let Some(p) = poses[i + 1] {
                poses[i] = Some(p.compose(&steps[i].pose.inverse()));
            }
        }
    }

    Ok(poses
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            (
                PoseKey::new(robot, start_index + i as u64),
                p.unwrap_or_else(Pose2D::identity),
            )
        })
        .collect())
}
