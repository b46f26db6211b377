//! Benchmarks for the pose state store

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use posestream_core::{JointId, PoseSnapshot};
use posestream_state::PoseStateStore;

fn bench_update(c: &mut Criterion) {
    let store = PoseStateStore::default();
    let mut x = 0.0;

    c.bench_function("store_update_one_joint", |b| {
        b.iter(|| {
            x += 1.0;
            let partial = PoseSnapshot::new().with(JointId::LeftElbow, [x, 0.0, 0.0]);
            store.update(black_box(&partial)).unwrap()
        })
    });

    let names: Vec<(&str, [f64; 3])> = JointId::ALL
        .iter()
        .map(|j| (j.as_str(), [1.0, 2.0, 3.0]))
        .collect();
    c.bench_function("store_update_named_all", |b| {
        b.iter(|| store.update_named(black_box(&names)).unwrap())
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let store = PoseStateStore::default();

    c.bench_function("store_snapshot", |b| b.iter(|| black_box(store.snapshot())));
}

criterion_group!(benches, bench_update, bench_snapshot);
criterion_main!(benches);
