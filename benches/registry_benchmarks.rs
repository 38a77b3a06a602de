//! Performance benchmarks for the window registry and surface lifecycle
//!
//! The map/unmap path runs on every buffer attach of every client, so it must
//! stay cheap as the number of windows grows.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use lipstick::{
    surface::SurfaceId,
    window::{Size, WindowRegistry},
    LipstickCompositor, LipstickConfig, SurfaceCommit,
};

/// Benchmark mapping and unmapping in a populated registry
fn bench_registry_map_unmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_map_unmap");

    for window_count in [10, 100, 1000].iter() {
        group.bench_with_input(
            format!("map_unmap_with_{}_windows", window_count),
            window_count,
            |b, &window_count| {
                b.iter_batched(
                    || {
                        let mut registry = WindowRegistry::new();
                        let ids: Vec<_> = (0..window_count)
                            .map(|i| registry.register_window(SurfaceId(i), 1))
                            .collect();
                        for id in &ids {
                            registry.mark_mapped(*id, Size::new(100, 100), "");
                        }
                        (registry, ids)
                    },
                    |(mut registry, ids)| {
                        for id in &ids {
                            black_box(registry.mark_unmapped(*id));
                        }
                        for id in &ids {
                            black_box(registry.mark_mapped(*id, Size::new(100, 100), ""));
                        }
                        black_box(registry.ghost_window_count());
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark raising windows through the stacking order
fn bench_registry_raise(c: &mut Criterion) {
    let mut registry = WindowRegistry::new();
    let ids: Vec<_> = (0..200)
        .map(|i| registry.register_window(SurfaceId(i), 1))
        .collect();
    for id in &ids {
        registry.mark_mapped(*id, Size::new(100, 100), "");
    }

    c.bench_function("registry_raise_200", |b| {
        b.iter(|| {
            for id in ids.iter().step_by(7) {
                black_box(registry.raise(*id));
            }
            black_box(registry.top_window());
        })
    });
}

/// Benchmark a full commit -> map -> null commit -> unmap cycle through the core
fn bench_compositor_commit_cycle(c: &mut Criterion) {
    let mut compositor =
        LipstickCompositor::try_new(&LipstickConfig::default()).expect("single instance");
    let client = compositor.client_connected(1);
    let surface = compositor.surface_created(client);

    c.bench_function("compositor_commit_cycle", |b| {
        b.iter(|| {
            compositor.surface_committed(
                surface,
                SurfaceCommit {
                    buffer: Some(Some(Size::new(720, 1280))),
                    damage: vec![(0, 0, 720, 1280)],
                },
            );
            compositor.surface_committed(
                surface,
                SurfaceCommit {
                    buffer: Some(None),
                    damage: Vec::new(),
                },
            );
            compositor.frame_rendered(0);
            black_box(compositor.ghost_window_count());
        })
    });
}

criterion_group!(
    benches,
    bench_registry_map_unmap,
    bench_registry_raise,
    bench_compositor_commit_cycle
);
criterion_main!(benches);
