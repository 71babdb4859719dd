//! Pairwise consistent measurement selection.
//!
//! The outlier-rejection core: every loop-closure or bridge candidate is
//! first tested against the odometry chain between its endpoints, then
//! pairwise against every other surviving candidate. The accepted set is
//! the maximum clique of the resulting consistency graph, so only a
//! mutually consistent subset of closures ever reaches the optimizer.
//!
//! # Contents
//!
//! - [`ConsistencyChecker`]: the two Mahalanobis hypothesis tests
//! - [`ConsistencyGraph`]: candidate graph and exact max-clique selection

mod clique;
mod consistency;

pub use clique::ConsistencyGraph;
pub use consistency::ConsistencyChecker;
