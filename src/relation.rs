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

//! Relation traits: behavior attached to a *relation itself* rather than to
//! any one pair using it.
//!
//! A relation (the left half of a pair, e.g. `ChildOf`) can be marked
//! [`Exclusive`] (an entity may hold at most one pair for that relation at a
//! time — adding a new target atomically drops the old one) or
//! [`Cascade`] (destroying the target of such a pair destroys every entity
//! still holding that pair). Traits are attached to a lazily-created
//! "type-entity" that anchors the relation's identity by adding the marker
//! component to that type-entity — the marker itself is just an ordinary
//! component, no parallel trait-registration API. [`ExclusiveTraitObserver`]
//! and [`CascadeTraitObserver`] watch for the markers landing on (or leaving)
//! a type-entity and mirror that into [`RelationTraitCache`], which is what
//! the hot add/remove-pair paths actually consult.

use rustc_hash::FxHashMap;

use crate::entity::EntityId;
use crate::observer::Observer;
use crate::world::World;

/// Marker component: the relation anchored by the type-entity this is
/// attached to allows at most one target per subject.
pub struct Exclusive;

/// Marker component: destroying the target of a pair under the relation
/// anchored by the type-entity this is attached to cascades into destroying
/// every entity still holding that pair.
pub struct Cascade;

/// Installed as a `World`-wide observer on [`Exclusive`]; mirrors the
/// presence of the marker on a type-entity into [`RelationTraitCache`] so
/// `World::add_pair` can check a flag instead of doing a component lookup on
/// every call.
pub struct ExclusiveTraitObserver;

impl Observer for ExclusiveTraitObserver {
    fn on_add(&mut self, world: &mut World, entity: EntityId) {
        if let Some(relation) = world.type_entity_relation(entity) {
            world.set_relation_exclusive_flag(relation, true);
        }
    }

    fn on_remove(&mut self, world: &mut World, entity: EntityId) {
        if let Some(relation) = world.type_entity_relation(entity) {
            world.set_relation_exclusive_flag(relation, false);
        }
    }
}

/// Installed as a `World`-wide observer on [`Cascade`]; mirrors the presence
/// of the marker on a type-entity into [`RelationTraitCache`], the same way
/// [`ExclusiveTraitObserver`] does for [`Exclusive`].
pub struct CascadeTraitObserver;

impl Observer for CascadeTraitObserver {
    fn on_add(&mut self, world: &mut World, entity: EntityId) {
        if let Some(relation) = world.type_entity_relation(entity) {
            world.set_relation_cascade_flag(relation, true);
        }
    }

    fn on_remove(&mut self, world: &mut World, entity: EntityId) {
        if let Some(relation) = world.type_entity_relation(entity) {
            world.set_relation_cascade_flag(relation, false);
        }
    }
}

/// Maps a relation (identified by its `ComponentId`'s raw value) to the
/// shadow entity anchoring its trait markers, and back.
#[derive(Default)]
pub struct TypeEntityRegistry {
    by_relation: FxHashMap<u32, EntityId>,
    by_entity: FxHashMap<EntityId, u32>,
}

impl TypeEntityRegistry {
    pub fn new() -> Self {
        TypeEntityRegistry::default()
    }

    pub fn type_entity_of(&self, relation: u32) -> Option<EntityId> {
        self.by_relation.get(&relation).copied()
    }

    pub fn relation_of(&self, entity: EntityId) -> Option<u32> {
        self.by_entity.get(&entity).copied()
    }

    pub fn register(&mut self, relation: u32, entity: EntityId) {
        self.by_relation.insert(relation, entity);
        self.by_entity.insert(entity, relation);
    }

    pub fn unregister(&mut self, relation: u32) {
        if let Some(entity) = self.by_relation.remove(&relation) {
            self.by_entity.remove(&entity);
        }
    }
}

/// Resolved trait flags for one relation, cached so `World::add_pair` can
/// check them without a component lookup on every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationFlags {
    pub exclusive: bool,
    pub cascade: bool,
}

/// Cache of [`RelationFlags`] per relation, kept in sync by `World` whenever
/// an `Exclusive`/`Cascade` marker is added to or removed from a
/// type-entity.
#[derive(Default)]
pub struct RelationTraitCache {
    flags: FxHashMap<u32, RelationFlags>,
}

impl RelationTraitCache {
    pub fn new() -> Self {
        RelationTraitCache::default()
    }

    pub fn get(&self, relation: u32) -> RelationFlags {
        self.flags.get(&relation).copied().unwrap_or_default()
    }

    pub fn set_exclusive(&mut self, relation: u32, value: bool) {
        self.flags.entry(relation).or_default().exclusive = value;
    }

    pub fn set_cascade(&mut self, relation: u32, value: bool) {
        self.flags.entry(relation).or_default().cascade = value;
    }

    pub fn clear(&mut self, relation: u32) {
        self.flags.remove(&relation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(i: u32) -> EntityId {
        EntityId::from_bits((1u64 << 48) | i as u64)
    }

    #[test]
    fn type_entity_registry_roundtrips() {
        let mut registry = TypeEntityRegistry::new();
        let e = entity(3);
        registry.register(7, e);
        assert_eq!(registry.type_entity_of(7), Some(e));
        assert_eq!(registry.relation_of(e), Some(7));
    }

    #[test]
    fn trait_cache_defaults_to_no_traits() {
        let cache = RelationTraitCache::new();
        assert_eq!(cache.get(42), RelationFlags::default());
    }

    #[test]
    fn trait_cache_tracks_flags_independently() {
        let mut cache = RelationTraitCache::new();
        cache.set_exclusive(1, true);
        cache.set_cascade(1, true);
        let flags = cache.get(1);
        assert!(flags.exclusive);
        assert!(flags.cascade);
        cache.set_exclusive(1, false);
        assert!(!cache.get(1).exclusive);
        assert!(cache.get(1).cascade);
    }
}
