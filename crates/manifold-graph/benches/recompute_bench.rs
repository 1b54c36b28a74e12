//! Criterion benchmarks for graph recompute.
//!
//! Three benchmark groups:
//! - `initial_build`: a 64x64 grid of cross pipes recomputed from nothing
//! - `cut_and_heal`: a full column cut in a 64x64 grid, then restored
//! - `explosion`: a third of a 64x64 grid despawned in one batch

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use manifold_core::id::NodeId;
use manifold_graph::test_utils::World;
use manifold_spatial::DirectionMask;

const SIDE: i32 = 64;

// ===========================================================================
// Grid builders
// ===========================================================================

/// Place a `SIDE x SIDE` grid of four-way pipes without recomputing.
fn place_grid(world: &mut World) -> Vec<NodeId> {
    let mut nodes = Vec::with_capacity((SIDE * SIDE) as usize);
    for y in 0..SIDE {
        for x in 0..SIDE {
            nodes.push(world.pipe(x, y, DirectionMask::ALL));
        }
    }
    nodes
}

/// A grid that has already settled into one group.
fn build_settled_grid() -> (World, Vec<NodeId>) {
    let mut world = World::new();
    let nodes = place_grid(&mut world);
    world.recompute();
    (world, nodes)
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_initial_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_build");
    group.sample_size(20);

    group.bench_function("64x64_cross_pipes", |b| {
        b.iter_batched(
            || {
                let mut world = World::new();
                place_grid(&mut world);
                world
            },
            |mut world| {
                world.recompute();
                world
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_cut_and_heal(c: &mut Criterion) {
    let mut group = c.benchmark_group("cut_and_heal");
    group.sample_size(30);

    let (mut world, nodes) = build_settled_grid();
    let column: Vec<NodeId> = (0..SIDE)
        .map(|y| nodes[(y * SIDE + SIDE / 2) as usize])
        .collect();

    group.bench_function("64x64_middle_column", |b| {
        b.iter(|| {
            for &node in &column {
                world.graph.set_connections_enabled(node, false).unwrap();
            }
            world.recompute();
            for &node in &column {
                world.graph.set_connections_enabled(node, true).unwrap();
            }
            world.recompute();
        });
    });

    group.finish();
}

fn bench_explosion(c: &mut Criterion) {
    let mut group = c.benchmark_group("explosion");
    group.sample_size(20);

    group.bench_function("64x64_every_third_node", |b| {
        b.iter_batched(
            build_settled_grid,
            |(mut world, nodes)| {
                for node in nodes.into_iter().step_by(3) {
                    world.despawn(node);
                }
                world.recompute();
                world
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_initial_build,
    bench_cut_and_heal,
    bench_explosion,
);
criterion_main!(benches);
