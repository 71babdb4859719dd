//! Consistency graph and incremental maximum-clique selection.
//!
//! Nodes are odometry-consistent candidates (by stable candidate index),
//! edges are pairwise-consistency verdicts. The accepted set is the
//! maximum clique, recomputed after every batch with an exact
//! branch-and-bound search. The graph only ever grows, so the previous
//! accepted set is always still a clique and seeds the search as a warm
//! lower bound.
//!
//! Tie-breaking is deterministic: vertices are explored in insertion
//! order and only a strictly larger clique replaces the incumbent, so
//! among equal-size maxima the one discovered first is kept.

/// Undirected graph over loop-closure candidates.
#[derive(Debug, Default)]
pub struct ConsistencyGraph {
    /// Candidate id per node, in insertion order.
    nodes: Vec<usize>,

    /// Sorted neighbor lists, by node index.
    adjacency: Vec<Vec<usize>>,

    /// Node indices of the current maximum clique.
    accepted: Vec<usize>,

    /// Total number of undirected edges.
    num_edges: usize,
}

impl ConsistencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges.
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Node indices of the current accepted set.
    pub fn accepted(&self) -> &[usize] {
        &self.accepted
    }

    /// Add a node for the given candidate id, returning its node index.
    pub fn add_node(&mut self, candidate_id: usize) -> usize {
        let node = self.nodes.len();
        self.nodes.push(candidate_id);
        self.adjacency.push(Vec::new());
        node
    }

    /// Candidate id of a node.
    pub fn candidate_id(&self, node: usize) -> usize {
        self.nodes[node]
    }

    /// Mark two nodes as pairwise consistent.
    pub fn add_edge(&mut self, u: usize, v: usize) {
        if u == v {
            return;
        }
        if let Err(pos) = self.adjacency[u].binary_search(&v) {
            self.adjacency[u].insert(pos, v);
            let pos = self.adjacency[v].binary_search(&u).unwrap_err();
            self.adjacency[v].insert(pos, u);
            self.num_edges += 1;
        }
    }

    /// Whether two nodes are pairwise consistent.
    pub fn adjacent(&self, u: usize, v: usize) -> bool {
        self.adjacency[u].binary_search(&v).is_ok()
    }

    /// Drop all nodes and edges.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.adjacency.clear();
        self.accepted.clear();
        self.num_edges = 0;
    }

    /// Recompute the maximum clique and return the accepted candidate
    /// ids in insertion order.
    ///
    /// Exact branch and bound; the previous accepted set seeds the lower
    /// bound, which both prunes the search and keeps the selection stable
    /// when a new equal-size clique appears.
    pub fn recompute_accepted(&mut self) -> Vec<usize> {
        let mut best = self.accepted.clone();
        let vertices: Vec<usize> = (0..self.nodes.len()).collect();
        let mut current = Vec::new();
        self.expand(&mut current, vertices, &mut best);
        self.accepted = best;
        self.accepted.iter().map(|&n| self.nodes[n]).collect()
    }

    /// Branch-and-bound clique expansion over `candidates`, all adjacent
    /// to every node in `current`.
    fn expand(&self, current: &mut Vec<usize>, candidates: Vec<usize>, best: &mut Vec<usize>) {
        if candidates.is_empty() {
            if current.len() > best.len() {
                *best = current.clone();
            }
            return;
        }

        let mut rest = candidates;
        while !rest.is_empty() {
            // Even taking every remaining vertex cannot beat the incumbent.
            if current.len() + rest.len() <= best.len() {
                return;
            }
            let v = rest.remove(0);
            current.push(v);
            let next: Vec<usize> = rest
                .iter()
                .copied()
                .filter(|&u| self.adjacent(v, u))
                .collect();
            self.expand(current, next, best);
            current.pop();
        }
    }
}
