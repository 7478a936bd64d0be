use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use norn::prelude::*;

#[derive(Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy)]
struct Velocity {
    dx: f32,
    dy: f32,
}

struct Tagged;

const ENTITIES: usize = 10_000;

fn setup_world() -> World {
    let mut world = World::new();
    world.register_component::<Tagged>(StorageKind::SparseSet);
    for i in 0..ENTITIES {
        let builder = world
            .spawn()
            .insert(Position {
                x: i as f32,
                y: 0.0,
            })
            .insert(Velocity { dx: 1.0, dy: 0.5 });
        if i % 4 == 0 {
            builder.insert(Tagged);
        }
    }
    world
}

fn iterate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    group.bench_function("movement_10k", |b| {
        let mut world = setup_world();
        let mut query = world.query::<(&mut Position, &Velocity)>();
        b.iter(|| {
            query.for_each(&mut world, |_, _, (mut pos, vel)| {
                pos.x += vel.dx;
                pos.y += vel.dy;
            });
        })
    });

    group.bench_function("filtered_quarter_10k", |b| {
        let mut world = setup_world();
        let mut query = world.query::<(&Position,)>().with::<Tagged>();
        b.iter(|| {
            let mut sum = 0.0f32;
            query.for_each(&mut world, |_, _, (pos,)| sum += pos.x);
            black_box(sum)
        })
    });

    group.bench_function("changed_after_tick", |b| {
        let mut world = setup_world();
        let mut query = world.query::<(&Position,)>().changed::<Position>();
        b.iter(|| {
            world.increment_change_tick();
            black_box(query.count(&world))
        })
    });

    group.finish();
}

criterion_group!(benches, iterate_benchmark);
criterion_main!(benches);
