// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Affine, Point, Rect};
use understory_nav_map::{ContentType, ContentTypes, MapConfig, NavMemoryMap, Quad};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn config() -> MapConfig {
    MapConfig {
        min_cell_size: 0.02,
        initial_root_level: 8,
        max_root_level: 12,
        ..MapConfig::default()
    }
}

/// Field-of-view wedges swept along a straight drive, like a robot clearing floor ahead.
fn drive_quads(steps: usize) -> Vec<Quad> {
    (0..steps)
        .map(|i| {
            let x = i as f64 * 0.05;
            Quad::new(
                Point::new(x, -0.05),
                Point::new(x + 0.4, -0.25),
                Point::new(x + 0.4, 0.25),
                Point::new(x, 0.05),
            )
        })
        .collect()
}

fn scattered_obstacles(count: usize, seed: u64) -> Vec<Quad> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|_| {
            let x = rng.next_f64() * 2.0 - 1.0;
            let y = rng.next_f64() * 2.0 - 1.0;
            Quad::from_rect(Rect::new(x, y, x + 0.06, y + 0.06))
        })
        .collect()
}

fn populated_map(obstacles: usize) -> NavMemoryMap {
    let mut map = NavMemoryMap::new(config());
    map.add_quad(
        &Quad::from_rect(Rect::new(-1.2, -1.2, 1.2, 1.2)),
        ContentType::ClearOfObstacle,
    );
    for q in scattered_obstacles(obstacles, 7) {
        map.add_quad(&q, ContentType::ObstacleUnrecognized);
    }
    map
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &steps in &[16_usize, 64] {
        let quads = drive_quads(steps);
        group.throughput(Throughput::Elements(steps as u64));
        group.bench_function(format!("drive_sweep_{steps}"), |b| {
            b.iter_batched(
                || NavMemoryMap::new(config()),
                |mut map| {
                    for q in &quads {
                        map.add_quad(q, ContentType::ClearOfObstacle);
                    }
                    black_box(map.node_count())
                },
                BatchSize::SmallInput,
            );
        });
    }
    let obstacles = scattered_obstacles(64, 1);
    group.bench_function("scattered_obstacles_64", |b| {
        b.iter_batched(
            || populated_map(0),
            |mut map| {
                for q in &obstacles {
                    map.add_quad(q, ContentType::ObstacleCube);
                }
                black_box(map.node_count())
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn bench_borders(c: &mut Criterion) {
    let mut group = c.benchmark_group("borders");
    for &n in &[8_usize, 32] {
        group.bench_function(format!("recompute_{n}"), |b| {
            b.iter_batched(
                || populated_map(n),
                |mut map| {
                    black_box(
                        map.get_borders(ContentType::ObstacleUnrecognized, ContentTypes::CLEAR),
                    )
                },
                BatchSize::SmallInput,
            );
        });
    }
    let mut map = populated_map(32);
    let _ = map.get_borders(ContentType::ObstacleUnrecognized, ContentTypes::CLEAR);
    group.bench_function("cached_32", |b| {
        b.iter(|| {
            black_box(map.get_borders(ContentType::ObstacleUnrecognized, ContentTypes::CLEAR))
        });
    });
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");
    let map = populated_map(32);
    let mut rng = Rng::new(42);
    let rays: Vec<(Point, Point)> = (0..256)
        .map(|_| {
            let a = Point::new(rng.next_f64() * 2.0 - 1.0, rng.next_f64() * 2.0 - 1.0);
            let b = Point::new(rng.next_f64() * 2.0 - 1.0, rng.next_f64() * 2.0 - 1.0);
            (a, b)
        })
        .collect();
    group.throughput(Throughput::Elements(rays.len() as u64));
    group.bench_function("collision_rays_256", |b| {
        b.iter(|| {
            let mut hits = 0;
            for &(from, to) in &rays {
                if map.has_collision_ray_with_types(from, to, ContentTypes::OBSTACLES) {
                    hits += 1;
                }
            }
            black_box(hits)
        });
    });
    let other = populated_map(16);
    group.bench_function("merge_rotated_16", |b| {
        b.iter_batched(
            || NavMemoryMap::new(config()),
            |mut dst| black_box(dst.merge(&other, Affine::rotate(0.3))),
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_borders, bench_queries);
criterion_main!(benches);
