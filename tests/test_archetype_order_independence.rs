use archetype_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct A(i32);
#[derive(Debug, Clone, Copy, PartialEq)]
struct B(i32);
#[derive(Debug, Clone, Copy, PartialEq)]
struct C(i32);

#[test]
fn same_component_set_lands_in_the_same_archetype_regardless_of_build_order() {
    let mut world = World::new();

    let e1 = world.spawn((A(1), B(2), C(3)));
    let count_after_e1 = world.archetype_count();

    // Spawning the same component set in a different declaration order must
    // not allocate a second archetype.
    let e2 = world.spawn((C(3), A(1), B(2)));
    assert_eq!(world.archetype_count(), count_after_e1);

    assert!(world.has_component::<A>(e1) && world.has_component::<B>(e1) && world.has_component::<C>(e1));
    assert!(world.has_component::<A>(e2) && world.has_component::<B>(e2) && world.has_component::<C>(e2));
}

#[test]
fn removing_and_readding_a_component_returns_to_the_same_archetype_shape() {
    let mut world = World::new();
    let e = world.spawn((A(1), B(2)));

    world.remove_component::<B>(e);
    let count_after_remove = world.archetype_count();

    // Re-adding B lands back on the {A, B} archetype created by the initial
    // spawn rather than allocating a new one.
    world.add_component(e, B(99));
    assert_eq!(world.archetype_count(), count_after_remove);
    assert_eq!(world.get_component::<B>(e), Some(&B(99)));
}
