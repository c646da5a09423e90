// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Spawning, components, and a simple per-frame query.

use archetype_ecs::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Velocity {
    x: f32,
    y: f32,
}

fn main() {
    let mut world = World::new();

    let moving = world.spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 0.5 }));
    let still = world.spawn((Position { x: 10.0, y: 10.0 },));

    let pos = world.registry().id_of::<Position>().unwrap();
    let vel = world.registry().id_of::<Velocity>().unwrap();

    for _ in 0..3 {
        world.for_each_mut(all(vec![with(pos), with(vel)]), |world, entity| {
            let delta = *world.get_component::<Velocity>(entity).unwrap();
            let position = world.get_component_mut::<Position>(entity).unwrap();
            position.x += delta.x;
            position.y += delta.y;
        });
    }

    let final_position = world.get_component::<Position>(moving).unwrap();
    println!("moving entity ended up at {final_position:?}");
    assert!((final_position.x - 3.0).abs() < f32::EPSILON);

    assert_eq!(world.query(with(vel)), vec![moving]);
    assert!(world.has_component::<Position>(still));
    assert!(!world.has_component::<Velocity>(still));

    world.remove_component::<Velocity>(moving);
    assert!(world.query(with(vel)).is_empty());

    world.destroy_entity(still);
    assert!(!world.is_alive(still));
}
