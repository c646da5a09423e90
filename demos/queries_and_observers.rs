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

//! Combinator queries (`all`/`any`/`none`), the `Disabled` marker, and an
//! `Observer` that reacts to a component being added.

use archetype_ecs::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Stunned;

struct LogOnStun {
    fired: usize,
}

impl Observer for LogOnStun {
    fn on_add(&mut self, _world: &mut World, entity: EntityId) {
        self.fired += 1;
        println!("entity {entity:?} was stunned");
    }
}

fn main() {
    let mut world = World::new();
    let stunned = world.register_component::<Stunned>();

    world.add_observer(vec![stunned], vec![], Box::new(LogOnStun { fired: 0 }));

    let a = world.spawn((Position { x: 0.0, y: 0.0 },));
    let b = world.spawn((Position { x: 1.0, y: 1.0 },));
    let c = world.spawn_empty();

    let pos = world.registry().id_of::<Position>().unwrap();

    // any(): matches entities carrying at least one of the listed components.
    let mut with_pos_or_stun = world.query(any(vec![with(pos), with(stunned)]));
    with_pos_or_stun.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(with_pos_or_stun, expected);

    world.add_component(a, Stunned);

    // none(): excludes anything matching the inner term.
    let unstunned_with_pos = world.query(all(vec![with(pos), none(vec![with(stunned)])]));
    assert_eq!(unstunned_with_pos, vec![b]);

    world.disable(b);
    assert_eq!(world.query(with(pos)), vec![a]);
    assert_eq!(world.query_including_disabled(with(pos)), {
        let mut both = vec![a, b];
        both.sort();
        both
    });

    world.destroy_entity(c);
    println!("queries and observers demo completed");
}
