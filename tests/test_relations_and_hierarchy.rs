use archetype_ecs::prelude::*;

struct Likes;
struct Owns;

#[test]
fn wildcard_query_finds_every_subject_of_a_relation_regardless_of_target() {
    let mut world = World::new();
    let hub = world.spawn_empty();
    let subjects: Vec<_> = (0..5).map(|_| world.spawn_empty()).collect();
    let likes = world.register_component::<Likes>();
    for &s in &subjects {
        world.add_pair(s, likes, TermTarget::Entity(hub));
    }

    let mut matched = world.query(pair(likes, TermTarget::Wildcard));
    matched.sort();
    let mut expected = subjects.clone();
    expected.sort();
    assert_eq!(matched, expected);
}

#[test]
fn an_ordinary_relation_may_carry_several_distinct_pairs_per_subject() {
    let mut world = World::new();
    let subject = world.spawn_empty();
    let item_a = world.spawn_empty();
    let item_b = world.spawn_empty();
    let owns = world.register_component::<Owns>();

    world.add_pair(subject, owns, TermTarget::Entity(item_a));
    world.add_pair(subject, owns, TermTarget::Entity(item_b));

    let mut targets = world.relation_targets(subject, owns.raw());
    targets.sort();
    let mut expected = vec![item_a, item_b];
    expected.sort();
    assert_eq!(targets, expected);
}

#[test]
fn exclusive_relation_never_accumulates_more_than_one_target() {
    let mut world = World::new();
    let subject = world.spawn_empty();
    let targets: Vec<_> = (0..4).map(|_| world.spawn_empty()).collect();
    let owns = world.register_component::<Owns>();
    world.mark_exclusive(owns);

    for &t in &targets {
        world.add_pair(subject, owns, TermTarget::Entity(t));
    }

    let held = world.relation_targets(subject, owns.raw());
    assert_eq!(held, vec![*targets.last().unwrap()]);
}

#[test]
fn deep_hierarchy_cascades_fully_on_root_destruction() {
    let mut world = World::new();
    let mut chain = vec![world.spawn_empty()];
    for _ in 0..20 {
        let parent = *chain.last().unwrap();
        let child = world.spawn_empty();
        world.set_parent(child, parent);
        chain.push(child);
    }

    world.destroy_entity(chain[0]);

    for &e in &chain {
        assert!(!world.is_alive(e));
    }
}

#[test]
fn reparenting_does_not_cascade_the_old_parent() {
    let mut world = World::new();
    let old_parent = world.spawn_empty();
    let new_parent = world.spawn_empty();
    let child = world.spawn_empty();

    world.set_parent(child, old_parent);
    world.set_parent(child, new_parent);
    world.destroy_entity(old_parent);

    assert!(world.is_alive(child));
    assert_eq!(world.parent_of(child), Some(new_parent));
}

#[test]
fn cascade_iteration_visits_every_generation_in_parent_before_child_order() {
    let mut world = World::new();
    let root = world.spawn_empty();
    let children: Vec<_> = (0..3).map(|_| world.spawn_empty()).collect();
    for &c in &children {
        world.set_parent(c, root);
    }
    let grandchildren: Vec<_> = children
        .iter()
        .map(|&c| {
            let g = world.spawn_empty();
            world.set_parent(g, c);
            g
        })
        .collect();

    let relation = world.child_of_relation();
    let ordered = world.query(all(vec![cascade(relation)]));
    let pos = |e: EntityId| ordered.iter().position(|&x| x == e).unwrap();

    assert!(pos(root) < pos(children[0]));
    for (&child, &grandchild) in children.iter().zip(grandchildren.iter()) {
        assert!(pos(child) < pos(grandchild));
    }
}
