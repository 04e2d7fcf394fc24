use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gridcast::{
    spatial::cells_in_radius, Channel, SpatialListenerHandle, SpatialListenerParams,
    SpatialRouter, WorldPoint,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// -----------------------------
/// Utils
/// -----------------------------

#[derive(Clone, Copy)]
struct Footstep;

fn random_point(rng: &mut StdRng) -> WorldPoint {
    WorldPoint::new(
        rng.gen_range(-50_000.0..50_000.0),
        rng.gen_range(-50_000.0..50_000.0),
        rng.gen_range(-500.0..500.0),
    )
}

fn populated_router(
    count: usize,
    radius: f64,
    seed: u64,
) -> (SpatialRouter, Vec<SpatialListenerHandle>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let router = SpatialRouter::new();
    let channel = Channel::new("World.Sound").unwrap();
    let handles = (0..count)
        .map(|_| {
            router.register_listener::<Footstep, _>(
                &channel,
                SpatialListenerParams::new(random_point(&mut rng), radius),
                |_| {},
            )
        })
        .collect();
    (router, handles)
}

/// -----------------------------
/// Spatial broadcast
/// -----------------------------

fn bench_spatial_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_broadcast");
    let channel = Channel::new("World.Sound").unwrap();
    for count in [100usize, 1_000, 10_000] {
        let (router, _handles) = populated_router(count, 2_000.0, 7);
        let mut rng = StdRng::seed_from_u64(11);
        let origins: Vec<WorldPoint> = (0..256).map(|_| random_point(&mut rng)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % origins.len();
                black_box(router.broadcast(&channel, &mut Footstep, origins[i]));
            })
        });
    }
    group.finish();
}

/// -----------------------------
/// Listener movement
/// -----------------------------

fn bench_update_location(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_listener_location");
    for (name, step) in [("within_cell", 5.0), ("cross_cell", 1_700.0)] {
        let (router, handles) = populated_router(1_000, 1_000.0, 3);
        let handle = &handles[0];
        let base = router.footprint(handle).unwrap().position;
        group.bench_function(name, |b| {
            let mut flip = false;
            b.iter(|| {
                flip = !flip;
                let x = if flip { base.x + step } else { base.x };
                black_box(router.update_listener_location(
                    handle,
                    WorldPoint::new(x, base.y, base.z),
                    None,
                ));
            })
        });
    }
    group.finish();
}

fn bench_cells_in_radius(c: &mut Criterion) {
    let mut group = c.benchmark_group("cells_in_radius");
    let center = WorldPoint::new(123.0, -456.0, 0.0);
    for radius in [100.0, 1_600.0, 10_000.0] {
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, &r| {
            b.iter(|| black_box(cells_in_radius(&center, r, 1_600.0)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_spatial_broadcast,
    bench_update_location,
    bench_cells_in_radius
);
criterion_main!(benches);
