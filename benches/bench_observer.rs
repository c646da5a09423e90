use archetype_ecs::{EntityId, Observer, World};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

#[derive(Debug, Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Dead;

struct NoOpObserver;
impl Observer for NoOpObserver {
    fn on_add(&mut self, _world: &mut World, _entity: EntityId) {}
}

fn bench_spawn_no_observers(c: &mut Criterion) {
    c.bench_function("spawn_no_observers", |b| {
        b.iter(|| {
            let mut world = World::new();
            for _ in 0..100 {
                black_box(world.spawn((Position { x: 0.0, y: 0.0 },)));
            }
        })
    });
}

fn bench_add_component_with_noop_observer(c: &mut Criterion) {
    c.bench_function("add_component_with_noop_observer", |b| {
        b.iter(|| {
            let mut world = World::new();
            let dead = world.register_component::<Dead>();
            world.add_observer(vec![dead], vec![], Box::new(NoOpObserver));

            let entities: Vec<_> = (0..100).map(|_| world.spawn((Position { x: 0.0, y: 0.0 },))).collect();
            for e in entities {
                black_box(world.add_component(e, Dead));
            }
        })
    });
}

fn bench_add_component_without_observer(c: &mut Criterion) {
    c.bench_function("add_component_without_observer", |b| {
        b.iter(|| {
            let mut world = World::new();
            let entities: Vec<_> = (0..100).map(|_| world.spawn((Position { x: 0.0, y: 0.0 },))).collect();
            for e in entities {
                black_box(world.add_component(e, Dead));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_spawn_no_observers,
    bench_add_component_with_noop_observer,
    bench_add_component_without_observer
);
criterion_main!(benches);
