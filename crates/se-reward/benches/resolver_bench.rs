//! Wheel prize resolution benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use se_reward::geometry;
use se_reward::resolver;
use se_reward::{RewardCatalog, RewardCatalogEntry, RewardKind, UserStats};

fn bench_choose_standard_wheel(c: &mut Criterion) {
    let catalog = RewardCatalog::standard();
    let stats = UserStats::new(10, 5);
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    c.bench_function("choose_wheel_prize_8", |b| {
        b.iter(|| {
            let eligible = catalog.eligible_entries(RewardKind::WheelPrize, black_box(&stats));
            black_box(resolver::choose_wheel_prize(&eligible, &mut rng).ok());
        })
    });
}

fn bench_choose_large_wheel(c: &mut Criterion) {
    let prizes: Vec<RewardCatalogEntry> = (0..256)
        .map(|i| RewardCatalogEntry::wheel_prize(format!("p{}", i), "Prize", (i % 7 + 1) as f64))
        .collect();
    let entries: Vec<&RewardCatalogEntry> = prizes.iter().collect();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    c.bench_function("choose_wheel_prize_256", |b| {
        b.iter(|| black_box(resolver::choose_wheel_prize(black_box(&entries), &mut rng).ok()))
    });
}

fn bench_aligned_rotation(c: &mut Criterion) {
    let mut rotation = 0.0;
    c.bench_function("aligned_rotation", |b| {
        b.iter(|| {
            rotation = geometry::aligned_rotation(black_box(3), 8, rotation, 5).unwrap_or(0.0);
            black_box(rotation)
        })
    });
}

criterion_group!(
    benches,
    bench_choose_standard_wheel,
    bench_choose_large_wheel,
    bench_aligned_rotation
);
criterion_main!(benches);
