//! Focused PCM Benchmarks
//!
//! Benchmarks for the outlier-rejection hot path:
//! - Batch ingestion with consistency checking
//! - Incremental max-clique recomputation
//! - Full estimate calculation
//!
//! Run with: `cargo bench`
//! View HTML reports in: `target/criterion/`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::f32::consts::{FRAC_PI_2, TAU};

use samyak_pgo::{
    ConsistencyGraph, Covariance2D, Measurement, Pose2D, PoseKey, Prior, RobotId, RobustSolver,
    RobustSolverConfig, Values, Verbosity,
};

// ============================================================================
// Test Fixtures
// ============================================================================

fn key(index: u64) -> PoseKey {
    PoseKey::new(RobotId::new('a'), index)
}

fn cov() -> Covariance2D {
    Covariance2D::diagonal(0.01, 0.01, 1e-4)
}

/// Ground-truth pose on a circular loop.
fn ground_truth(n: usize, i: usize) -> Pose2D {
    let angle = TAU * i as f32 / n as f32;
    Pose2D::new(10.0 * angle.cos(), 10.0 * angle.sin(), angle + FRAC_PI_2)
}

/// Loop trajectory with exact odometry and `n_closures` exact closures.
fn loop_batch(n_poses: usize, n_closures: usize) -> Vec<Measurement> {
    let mut measurements = Vec::new();
    for i in 0..n_poses - 1 {
        let rel = ground_truth(n_poses, i).between(&ground_truth(n_poses, i + 1));
        measurements.push(Measurement::new(key(i as u64), key(i as u64 + 1), rel, cov()));
    }
    for c in 0..n_closures {
        let i = n_poses - 10 + c % 8;
        let j = 2 + c;
        let rel = ground_truth(n_poses, i).between(&ground_truth(n_poses, j));
        measurements.push(Measurement::new(key(i as u64), key(j as u64), rel, cov()));
    }
    measurements
}

fn quiet_config(odom_threshold: f64, lc_threshold: f64) -> RobustSolverConfig {
    let mut config = RobustSolverConfig::new(odom_threshold, lc_threshold);
    config.verbosity = Verbosity::Quiet;
    config
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_load_graph(c: &mut Criterion) {
    let measurements = loop_batch(100, 8);
    let prior = Prior::new(key(0), ground_truth(100, 0), cov());

    c.bench_function("load_graph_100_poses_8_closures", |b| {
        b.iter(|| {
            let mut solver = RobustSolver::new(quiet_config(100.0, 100.0));
            solver
                .load_graph(black_box(&measurements), &Values::new(), &prior)
                .unwrap();
            black_box(solver.factors_unsafe().len())
        })
    });
}

fn bench_max_clique(c: &mut Criterion) {
    c.bench_function("max_clique_60_nodes", |b| {
        b.iter(|| {
            let mut graph = ConsistencyGraph::new();
            for i in 0..60 {
                graph.add_node(i);
            }
            // Two dense clusters with sparse cross edges, the typical
            // shape of spatially clustered closures.
            for u in 0..30 {
                for v in (u + 1)..30 {
                    graph.add_edge(u, v);
                }
            }
            for u in 30..60 {
                for v in (u + 1)..60 {
                    if (u + v) % 3 == 0 {
                        graph.add_edge(u, v);
                    }
                }
            }
            black_box(graph.recompute_accepted().len())
        })
    });
}

fn bench_calculate_estimate(c: &mut Criterion) {
    let measurements = loop_batch(80, 5);
    let prior = Prior::new(key(0), ground_truth(80, 0), cov());
    let mut solver = RobustSolver::new(quiet_config(100.0, 100.0));
    solver
        .load_graph(&measurements, &Values::new(), &prior)
        .unwrap();

    c.bench_function("calculate_estimate_80_poses", |b| {
        b.iter(|| black_box(solver.calculate_estimate().unwrap().len()))
    });
}

criterion_group!(
    benches,
    bench_load_graph,
    bench_max_clique,
    bench_calculate_estimate
);
criterion_main!(benches);
