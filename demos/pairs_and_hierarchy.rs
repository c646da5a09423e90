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

//! Relation pairs, the `ChildOf` hierarchy built on top of them, and the
//! cascading destroy that `Exclusive` + `Cascade` relation traits give for
//! free.

use archetype_ecs::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Likes;

fn main() {
    let mut world = World::new();
    let likes = world.register_component::<Likes>();

    let alice = world.spawn_empty();
    let bob = world.spawn_empty();
    let cake = world.spawn_empty();

    world.add_pair(alice, likes, TermTarget::Entity(bob));
    world.add_pair(alice, likes, TermTarget::Entity(cake));
    assert_eq!(world.relation_targets(alice, likes).len(), 2);

    let wildcard_matches = world.query(pair(likes, TermTarget::Wildcard));
    assert_eq!(wildcard_matches, vec![alice]);

    // `ChildOf` is just a relation with Exclusive + Cascade traits already
    // registered on first use, not a separate subsystem.
    let root = world.spawn_empty();
    let child_a = world.spawn_empty();
    let child_b = world.spawn_empty();
    let grandchild = world.spawn_empty();

    world.set_parent(child_a, root);
    world.set_parent(child_b, root);
    world.set_parent(grandchild, child_a);

    assert_eq!(world.parent_of(child_a), Some(root));

    // Exclusive: reparenting drops the old ChildOf pair instead of adding a
    // second one.
    let other_root = world.spawn_empty();
    world.set_parent(child_a, other_root);
    assert_eq!(world.parent_of(child_a), Some(other_root));

    // Cascade: destroying a parent destroys every descendant transitively.
    world.destroy_entity(root);
    assert!(!world.is_alive(child_b));
    // child_a was reparented away from root, so it and its own child survive.
    assert!(world.is_alive(child_a));
    assert!(world.is_alive(grandchild));

    world.destroy_entity(other_root);
    assert!(!world.is_alive(child_a));
    assert!(!world.is_alive(grandchild));

    println!("pairs and hierarchy demo completed");
}
