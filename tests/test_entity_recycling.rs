use archetype_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Marker;

#[test]
fn recycling_a_slot_never_resurrects_a_stale_handle() {
    let mut world = World::new();
    let mut first_round = Vec::new();
    for _ in 0..64 {
        first_round.push(world.spawn((Marker,)));
    }
    for &e in &first_round {
        world.destroy_entity(e);
    }

    let mut second_round = Vec::new();
    for _ in 0..64 {
        second_round.push(world.spawn((Marker,)));
    }

    for &old in &first_round {
        assert!(!world.is_alive(old));
    }
    for &new in &second_round {
        assert!(world.is_alive(new));
    }
}

#[test]
fn destroy_twice_is_harmless() {
    let mut world = World::new();
    let e = world.spawn_empty();
    assert!(world.destroy_entity(e));
    assert!(!world.destroy_entity(e));
}

#[test]
fn entity_count_tracks_live_entities_only() {
    let mut world = World::new();
    assert_eq!(world.entity_count(), 0);
    let a = world.spawn_empty();
    let _b = world.spawn_empty();
    assert_eq!(world.entity_count(), 2);
    world.destroy_entity(a);
    assert_eq!(world.entity_count(), 1);
}
