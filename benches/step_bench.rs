//! Benchmarks for per-step assembly and solve.
//!
//! Run with: `cargo bench --bench step_bench`
//!
//! Times one implicit network step (assembly + sparse LU + commit) across
//! network sizes, and the cost of Picard re-linearization.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gravel_rs::{
    BaseLevel, ModelParameters, Network, SegmentInput, ThresholdWidth, Topology,
    UpstreamCondition,
};

const YEAR: f64 = 3.15e7;

/// A chain of `n_segments` reaches with `nodes_per_segment` nodes each,
/// initialized on a uniform 1% grade so every conductance is nonzero.
fn chain_network(n_segments: usize, nodes_per_segment: usize) -> Network<ThresholdWidth> {
    let dx = 1000.0;
    let slope = 0.01;
    let upstream: Vec<Vec<usize>> = (0..n_segments)
        .map(|i| if i == 0 { vec![] } else { vec![i - 1] })
        .collect();
    let downstream: Vec<Option<usize>> = (0..n_segments)
        .map(|i| if i + 1 < n_segments { Some(i + 1) } else { None })
        .collect();
    let topology = Topology::new(upstream, downstream).unwrap();

    let span = dx * (nodes_per_segment - 1) as f64;
    let total = span * n_segments as f64;
    let inputs: Vec<SegmentInput> = (0..n_segments)
        .map(|i| {
            let x0 = span * i as f64;
            let x: Vec<f64> = (0..nodes_per_segment).map(|j| x0 + dx * j as f64).collect();
            let z: Vec<f64> = x.iter().map(|&xi| slope * (total - xi)).collect();
            SegmentInput {
                x,
                z,
                discharge: vec![10.0 + i as f64; nodes_per_segment],
                width: vec![100.0; nodes_per_segment],
            }
        })
        .collect();
    let mut conditions: Vec<Option<UpstreamCondition>> = vec![None; n_segments];
    conditions[0] = Some(UpstreamCondition::Slope(slope));

    Network::initialize(
        topology,
        inputs,
        conditions,
        BaseLevel::new(total, 0.0),
        ModelParameters::default(),
        ThresholdWidth::default(),
    )
    .unwrap()
}

fn bench_advance_one_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance_one_step");

    for n_segments in [4, 16, 64] {
        let network = chain_network(n_segments, 20);
        let n_nodes = network.total_nodes();

        group.bench_with_input(
            BenchmarkId::new("chain", format!("{}_nodes", n_nodes)),
            &n_nodes,
            |b, _| {
                b.iter(|| {
                    let mut work = network.clone();
                    work.advance_one_step(black_box(10.0 * YEAR)).unwrap();
                    work
                });
            },
        );
    }

    group.finish();
}

fn bench_picard_iterations(c: &mut Criterion) {
    let mut group = c.benchmark_group("picard_iterations");
    group.sample_size(30);

    let network = chain_network(16, 20);
    for iterations in [1, 2, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &iterations,
            |b, &iterations| {
                b.iter(|| {
                    let mut work = network.clone();
                    work.advance_one_step_iterated(black_box(10.0 * YEAR), iterations)
                        .unwrap();
                    work
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_advance_one_step, bench_picard_iterations);
criterion_main!(benches);
