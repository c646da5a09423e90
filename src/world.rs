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

//! `World`: the public entry point tying together the entity index,
//! archetype store, component registry, query cache, deferred mutation
//! queue, relation traits, and observer dispatcher.

use ahash::AHashMap;

use crate::archetype::{compute_shared_columns, Archetype, ArchetypeId, Column, TransitionEdge};
use crate::bitset::BitSet;
use crate::component::{Bundle, Component, ComponentId, ComponentRegistry};
use crate::deferred::DeferredQueue;
use crate::entity::{EntityId, EntityIndex, EntityLocation};
use crate::observer::{dispatch_transition, Observer, ObserverEntry, ObserverEvent};
use crate::pair::{is_pair, make_pair_id};
use crate::query::{cascade_order, find_pair_target_index, QueryCache};
use crate::relation::{Cascade, CascadeTraitObserver, Exclusive, ExclusiveTraitObserver, RelationTraitCache, TypeEntityRegistry};
use crate::term::{resolve, Term, TermTarget};

unsafe fn noop_drop(_: *mut u8) {}

fn split_two_mut(archetypes: &mut [Archetype], a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
    debug_assert_ne!(a, b, "cannot split the same archetype index mutably twice");
    if a < b {
        let (left, right) = archetypes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = archetypes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Diagnostic snapshot of the world's storage footprint.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    pub entity_index_bytes: usize,
    pub archetype_bytes: usize,
}

/// A built-in marker component. An entity carrying it is skipped by queries
/// unless a query explicitly asks for it via `with(Disabled)`.
pub struct Disabled;

pub struct World {
    registry: ComponentRegistry,
    entities: EntityIndex,
    archetypes: Vec<Archetype>,
    signature_lookup: AHashMap<Vec<u32>, ArchetypeId>,
    archetype_generation: u64,
    pub(crate) deferred: DeferredQueue,
    observers: Vec<ObserverEntry>,
    query_cache: QueryCache,
    type_entities: TypeEntityRegistry,
    relation_traits: RelationTraitCache,
    /// Per-entity-index disabled flag, mirrored from the `Disabled`
    /// component so a hot-path check doesn't need a column lookup.
    disabled: BitSet,
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}

impl World {
    pub fn new() -> Self {
        let mut world = World {
            registry: ComponentRegistry::new(),
            entities: EntityIndex::new(),
            archetypes: Vec::new(),
            signature_lookup: AHashMap::default(),
            archetype_generation: 0,
            deferred: DeferredQueue::new(),
            observers: Vec::new(),
            query_cache: QueryCache::new(),
            type_entities: TypeEntityRegistry::new(),
            relation_traits: RelationTraitCache::new(),
            disabled: BitSet::with_capacity(256),
        };
        world.get_or_create_archetype(Vec::new());
        // Registered eagerly (rather than on first `disable()` call) so
        // `query` can always exclude it by id, even before any entity has
        // ever been disabled.
        world.registry.register::<Disabled>();

        // Exclusive/Cascade are ordinary marker components attached to a
        // relation's type-entity (see `relation.rs`); these observers mirror
        // their presence into `RelationTraitCache` so the hot add/remove-pair
        // paths can check a flag instead of doing a component lookup.
        let exclusive = world.registry.register::<Exclusive>();
        let cascade = world.registry.register::<Cascade>();
        world.add_observer(vec![exclusive], Vec::new(), Box::new(ExclusiveTraitObserver));
        world.add_observer(vec![cascade], Vec::new(), Box::new(CascadeTraitObserver));
        world
    }

    pub fn with_capacity(entities: usize, archetypes: usize) -> Self {
        let mut world = World::new();
        world.entities = EntityIndex::with_capacity(entities);
        world.archetypes.reserve(archetypes);
        world.get_or_create_archetype(Vec::new());
        world
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn register_component<T: Component>(&mut self) -> ComponentId {
        self.registry.register::<T>()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats {
            entity_index_bytes: self.entities.memory_bytes(),
            archetype_bytes: self.archetypes.iter().map(Archetype::memory_bytes).sum(),
        }
    }

    fn get_or_create_archetype(&mut self, mut signature: Vec<u32>) -> ArchetypeId {
        signature.sort_unstable();
        signature.dedup();
        if let Some(&id) = self.signature_lookup.get(&signature) {
            return id;
        }
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("archetype_create", component_count = signature.len()).entered();

        let id = ArchetypeId(self.archetypes.len() as u32);
        let registry = &self.registry;
        let archetype = Archetype::new(id, signature.clone(), |component| {
            if is_pair(component) {
                Column::new(0, 1, noop_drop)
            } else {
                let info = registry
                    .info(ComponentId(component))
                    .expect("component must be registered before it can appear in an archetype signature");
                Column::new(info.layout.size(), info.layout.align(), info.drop_fn)
            }
        });
        self.archetypes.push(archetype);
        self.signature_lookup.insert(signature, id);
        self.archetype_generation += 1;
        id
    }

    fn transition_add(&mut self, from_id: ArchetypeId, component: u32) -> ArchetypeId {
        if let Some(edge) = self.archetypes[from_id.0 as usize].add_edges.get(&component) {
            return edge.to;
        }
        let mut new_signature = self.archetypes[from_id.0 as usize].signature.clone();
        new_signature.push(component);
        let to_id = self.get_or_create_archetype(new_signature);
        let shared = compute_shared_columns(&self.archetypes[from_id.0 as usize], &self.archetypes[to_id.0 as usize]);
        self.archetypes[from_id.0 as usize]
            .add_edges
            .insert(component, TransitionEdge { to: to_id, shared_columns: shared });
        to_id
    }

    fn transition_remove(&mut self, from_id: ArchetypeId, component: u32) -> ArchetypeId {
        if let Some(edge) = self.archetypes[from_id.0 as usize].remove_edges.get(&component) {
            return edge.to;
        }
        let new_signature: Vec<u32> = self.archetypes[from_id.0 as usize]
            .signature
            .iter()
            .copied()
            .filter(|&c| c != component)
            .collect();
        let to_id = self.get_or_create_archetype(new_signature);
        let shared = compute_shared_columns(&self.archetypes[from_id.0 as usize], &self.archetypes[to_id.0 as usize]);
        self.archetypes[from_id.0 as usize]
            .remove_edges
            .insert(component, TransitionEdge { to: to_id, shared_columns: shared });
        to_id
    }

    fn move_entity_adding(&mut self, entity: EntityId, component: u32, write: impl FnOnce(*mut u8)) {
        let loc = self.entities.location(entity).expect("entity must be alive");
        let from_id = ArchetypeId(loc.archetype_id);
        let to_id = self.transition_add(from_id, component);
        let row = loc.row as usize;
        let shared = self.archetypes[from_id.0 as usize].add_edges[&component].shared_columns.clone();
        let (from_arch, to_arch) = split_two_mut(&mut self.archetypes, from_id.0 as usize, to_id.0 as usize);
        for (src_idx, dst_idx) in &shared {
            from_arch.column_at_mut(*src_idx).move_row_to(row, to_arch.column_at_mut(*dst_idx));
        }
        let new_col = to_arch.column_index_of(component).expect("new component must have a column in the target archetype");
        let ptr = to_arch.column_at_mut(new_col).reserve_row();
        write(ptr);
        if let Some(swapped_entity) = from_arch.swap_remove_entity_record(row) {
            self.entities.set_location(swapped_entity, EntityLocation { archetype_id: from_id.0, row: row as u32 });
        }
        let new_row = self.archetypes[to_id.0 as usize].push_entity(entity);
        self.entities.set_location(entity, EntityLocation { archetype_id: to_id.0, row: new_row as u32 });

        let from_sig = self.archetypes[from_id.0 as usize].signature.clone();
        let to_sig = self.archetypes[to_id.0 as usize].signature.clone();
        self.raise_transition(entity, Some(from_sig), Some(to_sig));
    }

    fn move_entity_removing(&mut self, entity: EntityId, component: u32) {
        let loc = self.entities.location(entity).expect("entity must be alive");
        let from_id = ArchetypeId(loc.archetype_id);
        let to_id = self.transition_remove(from_id, component);
        let row = loc.row as usize;
        let shared = self.archetypes[from_id.0 as usize].remove_edges[&component].shared_columns.clone();
        let (from_arch, to_arch) = split_two_mut(&mut self.archetypes, from_id.0 as usize, to_id.0 as usize);
        for (src_idx, dst_idx) in &shared {
            from_arch.column_at_mut(*src_idx).move_row_to(row, to_arch.column_at_mut(*dst_idx));
        }
        if let Some(removed_idx) = from_arch.column_index_of(component) {
            from_arch.column_at_mut(removed_idx).swap_remove_drop(row);
        }
        if let Some(swapped_entity) = from_arch.swap_remove_entity_record(row) {
            self.entities.set_location(swapped_entity, EntityLocation { archetype_id: from_id.0, row: row as u32 });
        }
        let new_row = self.archetypes[to_id.0 as usize].push_entity(entity);
        self.entities.set_location(entity, EntityLocation { archetype_id: to_id.0, row: new_row as u32 });

        let from_sig = self.archetypes[from_id.0 as usize].signature.clone();
        let to_sig = self.archetypes[to_id.0 as usize].signature.clone();
        self.raise_transition(entity, Some(from_sig), Some(to_sig));
    }

    fn raise_transition(&mut self, entity: EntityId, from: Option<Vec<u32>>, to: Option<Vec<u32>>) {
        let fired = dispatch_transition(&self.observers, from.as_deref(), to.as_deref());
        for (index, event) in fired {
            self.deferred.push(Box::new(move |world: &mut World| {
                let mut observers = std::mem::take(&mut world.observers);
                match event {
                    ObserverEvent::OnAdd => observers[index].observer.on_add(world, entity),
                    ObserverEvent::OnRemove => observers[index].observer.on_remove(world, entity),
                }
                world.observers = observers;
            }));
        }
    }

    /// Spawns an entity carrying no components.
    pub fn spawn_empty(&mut self) -> EntityId {
        let archetype_id = self.get_or_create_archetype(Vec::new());
        let entity = self.entities.create(EntityLocation { archetype_id: archetype_id.0, row: 0 });
        let row = self.archetypes[archetype_id.0 as usize].push_entity(entity);
        self.entities.set_location(entity, EntityLocation { archetype_id: archetype_id.0, row: row as u32 });
        let sig = self.archetypes[archetype_id.0 as usize].signature.clone();
        self.raise_transition(entity, None, Some(sig));
        DeferredQueue::flush(self);
        entity
    }

    /// Spawns an entity carrying every component in `bundle`.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> EntityId {
        let ids = B::register_components(&mut self.registry);
        let signature: Vec<u32> = ids.iter().map(|c| c.raw()).collect();
        let archetype_id = self.get_or_create_archetype(signature);

        let mut ptrs: Vec<*mut u8> = Vec::with_capacity(ids.len());
        {
            let archetype = &mut self.archetypes[archetype_id.0 as usize];
            for id in &ids {
                let col_idx = archetype
                    .column_index_of(id.raw())
                    .expect("bundle component must be part of the archetype it was registered into");
                ptrs.push(archetype.column_at_mut(col_idx).reserve_row());
            }
        }
        let entity = self.entities.create(EntityLocation { archetype_id: archetype_id.0, row: 0 });
        let row = self.archetypes[archetype_id.0 as usize].push_entity(entity);
        self.entities.set_location(entity, EntityLocation { archetype_id: archetype_id.0, row: row as u32 });
        unsafe {
            bundle.write_components(&ptrs);
        }
        let sig = self.archetypes[archetype_id.0 as usize].signature.clone();
        self.raise_transition(entity, None, Some(sig));
        DeferredQueue::flush(self);
        entity
    }

    fn destroy_entity_immediate(&mut self, entity: EntityId) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        let incoming: Vec<(u32, EntityId)> = self.entities.incoming_pairs(entity).to_vec();
        for (pair_component, subject) in incoming {
            let relation = crate::pair::pair_relation(pair_component);
            if self.relation_traits.get(relation).cascade {
                self.destroy_entity(subject);
            } else {
                self.entities.remove_incoming_pair(entity, pair_component, subject);
            }
        }

        let loc = self.entities.location(entity).expect("checked alive above");
        let archetype_id = ArchetypeId(loc.archetype_id);
        let from_sig = self.archetypes[archetype_id.0 as usize].signature.clone();
        let row = loc.row as usize;
        if let Some(swapped_entity) = self.archetypes[archetype_id.0 as usize].remove_row(row) {
            self.entities.set_location(swapped_entity, EntityLocation { archetype_id: archetype_id.0, row: row as u32 });
        }
        self.entities.destroy(entity);
        self.raise_transition(entity, Some(from_sig), None);
        true
    }

    /// Destroys `entity`. Cascades into every dependent held via a
    /// `Cascade`-trait relation. Deferred if called while a query iteration
    /// is in progress.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if self.deferred.is_deferring() {
            self.deferred.push(Box::new(move |world: &mut World| {
                world.destroy_entity_immediate(entity);
            }));
            return true;
        }
        let result = self.destroy_entity_immediate(entity);
        DeferredQueue::flush(self);
        result
    }

    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let component = self.registry.id_of::<T>()?;
        let loc = self.entities.location(entity)?;
        let archetype = &self.archetypes[loc.archetype_id as usize];
        let col = archetype.column(component.raw())?;
        let ptr = col.get_raw(loc.row as usize)?;
        Some(unsafe { &*(ptr as *const T) })
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let component = self.registry.id_of::<T>()?;
        let loc = self.entities.location(entity)?;
        let archetype = &mut self.archetypes[loc.archetype_id as usize];
        let col = archetype.column_mut(component.raw())?;
        let ptr = col.get_raw_mut(loc.row as usize)?;
        Some(unsafe { &mut *(ptr as *mut T) })
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        let Some(component) = self.registry.id_of::<T>() else {
            return false;
        };
        self.entities
            .location(entity)
            .map(|loc| self.archetypes[loc.archetype_id as usize].has_component(component.raw()))
            .unwrap_or(false)
    }

    /// Adds `value`, moving `entity` to the archetype with this component
    /// added (or overwriting it in place if already present). Deferred if
    /// called mid-iteration.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, value: T) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        if self.deferred.is_deferring() {
            self.deferred.push(Box::new(move |world: &mut World| {
                world.add_component(entity, value);
            }));
            return true;
        }
        let component = self.registry.register::<T>();
        let loc = self.entities.location(entity).expect("checked alive above");
        if self.archetypes[loc.archetype_id as usize].has_component(component.raw()) {
            let col = self.archetypes[loc.archetype_id as usize].column_mut(component.raw()).unwrap();
            let ptr = col.get_raw_mut(loc.row as usize).unwrap();
            unsafe {
                std::ptr::drop_in_place(ptr as *mut T);
                std::ptr::write(ptr as *mut T, value);
            }
            return true;
        }
        self.move_entity_adding(entity, component.raw(), move |ptr| unsafe {
            std::ptr::write(ptr as *mut T, value);
        });
        DeferredQueue::flush(self);
        true
    }

    /// Removes `T` from `entity`, if present. Deferred if called
    /// mid-iteration.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        if self.deferred.is_deferring() {
            self.deferred.push(Box::new(move |world: &mut World| {
                world.remove_component::<T>(entity);
            }));
            return true;
        }
        let Some(component) = self.registry.id_of::<T>() else {
            return false;
        };
        let loc = self.entities.location(entity).expect("checked alive above");
        if !self.archetypes[loc.archetype_id as usize].has_component(component.raw()) {
            return false;
        }
        self.move_entity_removing(entity, component.raw());
        DeferredQueue::flush(self);
        true
    }

    /// Disables `entity`: present in no query unless it explicitly asks for
    /// `with(Disabled)`. Implemented as an ordinary marker component.
    pub fn disable(&mut self, entity: EntityId) -> bool {
        let ok = self.add_component(entity, Disabled);
        if ok {
            self.disabled.set(entity.index() as usize);
        }
        ok
    }

    pub fn enable(&mut self, entity: EntityId) -> bool {
        let ok = self.remove_component::<Disabled>(entity);
        if ok {
            self.disabled.unset(entity.index() as usize);
        }
        ok
    }

    pub fn is_disabled(&self, entity: EntityId) -> bool {
        self.disabled.contains(entity.index() as usize)
    }

    fn relation_traits(&self) -> &RelationTraitCache {
        &self.relation_traits
    }

    /// The relation a type-entity anchors, if `entity` is one. Used by
    /// [`crate::relation::ExclusiveTraitObserver`]/[`crate::relation::CascadeTraitObserver`]
    /// to recover which relation a newly (un)marked type-entity belongs to.
    pub(crate) fn type_entity_relation(&self, entity: EntityId) -> Option<u32> {
        self.type_entities.relation_of(entity)
    }

    pub(crate) fn set_relation_exclusive_flag(&mut self, relation: u32, value: bool) {
        self.relation_traits.set_exclusive(relation, value);
    }

    pub(crate) fn set_relation_cascade_flag(&mut self, relation: u32, value: bool) {
        self.relation_traits.set_cascade(relation, value);
    }

    /// Marks `relation` `Exclusive` by attaching the [`Exclusive`] marker to
    /// its type-entity (creating it if needed); an entity may then hold at
    /// most one pair under `relation` at a time.
    pub fn mark_exclusive(&mut self, relation: ComponentId) {
        let type_entity = self.ensure_type_entity(relation);
        self.add_component(type_entity, Exclusive);
    }

    /// Marks `relation` `Cascade` by attaching the [`Cascade`] marker to its
    /// type-entity (creating it if needed); destroying the target of a pair
    /// under `relation` then destroys every entity still holding that pair.
    pub fn mark_cascade(&mut self, relation: ComponentId) {
        let type_entity = self.ensure_type_entity(relation);
        self.add_component(type_entity, Cascade);
    }

    fn ensure_type_entity(&mut self, relation: ComponentId) -> EntityId {
        if let Some(e) = self.type_entities.type_entity_of(relation.raw()) {
            return e;
        }
        let e = self.spawn_empty();
        self.type_entities.register(relation.raw(), e);
        e
    }

    fn add_pair_immediate(&mut self, subject: EntityId, relation: ComponentId, target_entity: EntityId) -> bool {
        let flags = self.relation_traits().get(relation.raw());
        if flags.exclusive {
            if let Some(existing) = self.pair_target_entity(subject, relation.raw()) {
                if existing == target_entity {
                    return true;
                }
                self.remove_pair_immediate(subject, relation.raw());
            }
        }
        let target_index = target_entity.index() & 0xFFFF;
        let pair_id = match make_pair_id(relation.raw(), target_index) {
            Ok(id) => id,
            Err(_) => return false,
        };
        self.move_entity_adding(subject, pair_id, |_ptr| {});
        self.entities.record_incoming_pair(target_entity, pair_id, subject);
        DeferredQueue::flush(self);
        true
    }

    /// Adds a pair `(relation, target)` to `subject`. If `relation` is
    /// marked `Exclusive`, any previous pair under the same relation is
    /// dropped first, applied immediately even if this call itself was
    /// deferred until iteration ended.
    pub fn add_pair(&mut self, subject: EntityId, relation: ComponentId, target: TermTarget) -> bool {
        let target_entity = match target {
            TermTarget::Entity(e) => e,
            _ => return false,
        };
        if !self.entities.is_alive(subject) || !self.entities.is_alive(target_entity) {
            return false;
        }
        if self.deferred.is_deferring() {
            self.deferred.push(Box::new(move |world: &mut World| {
                world.add_pair(subject, relation, TermTarget::Entity(target_entity));
            }));
            return true;
        }
        self.add_pair_immediate(subject, relation, target_entity)
    }

    fn remove_pair_immediate(&mut self, subject: EntityId, relation: u32) -> bool {
        let loc = match self.entities.location(subject) {
            Some(l) => l,
            None => return false,
        };
        let signature = self.archetypes[loc.archetype_id as usize].signature.clone();
        let pair_id = match find_pair_target_index(&signature, relation) {
            Some(target_idx) => match make_pair_id(relation, target_idx) {
                Ok(id) => id,
                Err(_) => return false,
            },
            None => return false,
        };
        if let Some(target_entity) = self.pair_target_entity(subject, relation) {
            self.entities.remove_incoming_pair(target_entity, pair_id, subject);
        }
        self.move_entity_removing(subject, pair_id);
        DeferredQueue::flush(self);
        true
    }

    /// Removes `subject`'s pair under `relation`, if any.
    pub fn remove_pair(&mut self, subject: EntityId, relation: ComponentId) -> bool {
        if !self.entities.is_alive(subject) {
            return false;
        }
        if self.deferred.is_deferring() {
            self.deferred.push(Box::new(move |world: &mut World| {
                world.remove_pair(subject, relation);
            }));
            return true;
        }
        self.remove_pair_immediate(subject, relation.raw())
    }

    /// The entity `subject` holds a `relation` pair pointing at, if any. If
    /// `subject` carries more than one pair under `relation`, the first one
    /// encountered in signature order is returned; use
    /// [`World::relation_targets`] to retrieve all of them.
    pub fn pair_target_entity(&self, subject: EntityId, relation: u32) -> Option<EntityId> {
        let loc = self.entities.location(subject)?;
        let archetype = &self.archetypes[loc.archetype_id as usize];
        let target_index = find_pair_target_index(&archetype.signature, relation)?;
        self.entities.entity_by_index(target_index)
    }

    /// Every entity `subject` holds a `relation` pair pointing at. A relation
    /// with the `Exclusive` trait never has more than one, but an ordinary
    /// relation may carry several distinct pairs (distinct targets encode
    /// distinct `ComponentId`s, so nothing stops them coexisting on one
    /// archetype signature).
    pub fn relation_targets(&self, subject: EntityId, relation: u32) -> Vec<EntityId> {
        let Some(loc) = self.entities.location(subject) else {
            return Vec::new();
        };
        let archetype = &self.archetypes[loc.archetype_id as usize];
        archetype
            .signature
            .iter()
            .filter(|&&id| is_pair(id) && crate::pair::pair_relation(id) == relation)
            .filter_map(|&id| self.entities.entity_by_index(crate::pair::pair_target(id)))
            .collect()
    }

    fn resolve_query(&mut self, term: Term, include_disabled: bool) -> Option<(crate::term::QueryContext, Vec<ArchetypeId>)> {
        let term = if include_disabled {
            term
        } else {
            let disabled = self.registry.id_of::<Disabled>().expect("Disabled is registered eagerly in World::new");
            crate::term::all(vec![term, crate::term::without(disabled)])
        };
        let arena = bumpalo::Bump::new();
        let ctx = resolve(&term, &arena).ok()?;
        let generation = self.archetype_generation;
        let matched = self.query_cache.matches(&ctx, self.archetypes.iter(), generation).to_vec();
        Some((ctx, matched))
    }

    /// Resolves and runs `term`, returning matched entities. Cascade terms
    /// are ordered parent-before-child. Entities disabled via
    /// [`World::disable`] are excluded unless the term explicitly asks for
    /// `Disabled`; see [`World::query_including_disabled`] to include them.
    pub fn query(&mut self, term: Term) -> Vec<EntityId> {
        self.query_with_flags(term, false)
    }

    /// Like [`World::query`], but matches entities regardless of whether
    /// they are disabled (the `Include_Disabled` flag in the spec's query
    /// API).
    pub fn query_including_disabled(&mut self, term: Term) -> Vec<EntityId> {
        self.query_with_flags(term, true)
    }

    fn query_with_flags(&mut self, term: Term, include_disabled: bool) -> Vec<EntityId> {
        let Some((ctx, matched_ids)) = self.resolve_query(term, include_disabled) else {
            return Vec::new();
        };
        let mut entities = Vec::new();
        for id in &matched_ids {
            entities.extend(self.archetypes[id.0 as usize].entities.iter().copied());
        }
        if let Some(relation) = ctx.cascade_relation {
            entities = cascade_order(&entities, |e| self.pair_target_entity(e, relation));
        }
        entities
    }

    /// Runs `term` and returns, per matched entity, the entities bound to
    /// each of its wildcard-pair capture slots (see [`crate::term::Capture`]).
    /// A slot an entity's archetype has no matching pair for is `None`.
    pub fn query_captures(&mut self, term: Term) -> Vec<(EntityId, [Option<EntityId>; crate::term::MAX_QUERY_BINDINGS])> {
        let Some((ctx, matched_ids)) = self.resolve_query(term, false) else {
            return Vec::new();
        };
        let mut results = Vec::new();
        for id in &matched_ids {
            let signature = self.archetypes[id.0 as usize].signature.clone();
            for &entity in &self.archetypes[id.0 as usize].entities {
                let mut bindings: [Option<EntityId>; crate::term::MAX_QUERY_BINDINGS] = Default::default();
                for capture in &ctx.captures {
                    if let Some(target_idx) = find_pair_target_index(&signature, capture.component) {
                        bindings[capture.slot as usize] = self.entities.entity_by_index(target_idx);
                    }
                }
                results.push((entity, bindings));
            }
        }
        results
    }

    /// Like [`World::query`], but runs `f` for each matched entity with
    /// full `&mut World` access. Structural mutations made inside `f` are
    /// deferred until every entity in this call has been visited, since the
    /// entity list was snapshotted up front and a structural move could
    /// otherwise invalidate it mid-walk.
    pub fn for_each_mut(&mut self, term: Term, mut f: impl FnMut(&mut World, EntityId)) {
        let entities = self.query(term);
        self.deferred.enter_iteration();
        for entity in entities {
            if self.entities.is_alive(entity) {
                f(self, entity);
            }
        }
        if self.deferred.exit_iteration() == 0 {
            DeferredQueue::flush(self);
        }
    }

    pub fn add_observer(&mut self, required: Vec<ComponentId>, excluded: Vec<ComponentId>, observer: Box<dyn Observer>) {
        self.observers.push(ObserverEntry {
            required: required.into_iter().map(|c| c.raw()).collect(),
            excluded: excluded.into_iter().map(|c| c.raw()).collect(),
            observer,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }

    #[test]
    fn spawn_and_get_component() {
        let mut world = World::new();
        let e = world.spawn((Position { x: 1.0, y: 2.0 },));
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
    }

    #[test]
    fn add_component_moves_to_new_archetype() {
        let mut world = World::new();
        let e = world.spawn((Position { x: 0.0, y: 0.0 },));
        assert!(world.add_component(e, Velocity { x: 1.0, y: 1.0 }));
        assert_eq!(world.get_component::<Velocity>(e), Some(&Velocity { x: 1.0, y: 1.0 }));
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn remove_component_moves_back() {
        let mut world = World::new();
        let e = world.spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 1.0 }));
        assert!(world.remove_component::<Velocity>(e));
        assert!(!world.has_component::<Velocity>(e));
        assert!(world.has_component::<Position>(e));
    }

    #[test]
    fn destroy_entity_frees_slot_and_fixes_swap() {
        let mut world = World::new();
        let a = world.spawn((Position { x: 0.0, y: 0.0 },));
        let b = world.spawn((Position { x: 9.0, y: 9.0 },));
        assert!(world.destroy_entity(a));
        assert!(!world.is_alive(a));
        assert_eq!(world.get_component::<Position>(b), Some(&Position { x: 9.0, y: 9.0 }));
    }

    #[test]
    fn query_with_component_finds_spawned_entities() {
        let mut world = World::new();
        let e1 = world.spawn((Position { x: 0.0, y: 0.0 },));
        let e2 = world.spawn((Position { x: 1.0, y: 1.0 }, Velocity { x: 0.0, y: 0.0 }));
        let comp = world.registry().id_of::<Position>().unwrap();
        let mut results = world.query(crate::term::with(comp));
        results.sort();
        let mut expected = vec![e1, e2];
        expected.sort();
        assert_eq!(results, expected);
    }

    #[test]
    fn for_each_mut_defers_structural_changes_until_done() {
        let mut world = World::new();
        let e1 = world.spawn((Position { x: 0.0, y: 0.0 },));
        let e2 = world.spawn((Position { x: 1.0, y: 1.0 },));
        let comp = world.registry().id_of::<Position>().unwrap();
        let mut visited = 0;
        world.for_each_mut(crate::term::with(comp), |world, entity| {
            visited += 1;
            world.add_component(entity, Velocity { x: 0.0, y: 0.0 });
        });
        assert_eq!(visited, 2);
        assert!(world.has_component::<Velocity>(e1));
        assert!(world.has_component::<Velocity>(e2));
    }

    #[test]
    fn add_pair_and_lookup_roundtrip() {
        let mut world = World::new();
        let parent = world.spawn_empty();
        let child = world.spawn_empty();
        let relation = world.register_component::<crate::hierarchy::ChildOf>();
        assert!(world.add_pair(child, relation, TermTarget::Entity(parent)));
        assert_eq!(world.pair_target_entity(child, relation.raw()), Some(parent));
    }

    #[test]
    fn exclusive_relation_replaces_previous_target() {
        let mut world = World::new();
        let a = world.spawn_empty();
        let b = world.spawn_empty();
        let child = world.spawn_empty();
        let relation = world.register_component::<crate::hierarchy::ChildOf>();
        world.mark_exclusive(relation);
        world.add_pair(child, relation, TermTarget::Entity(a));
        world.add_pair(child, relation, TermTarget::Entity(b));
        assert_eq!(world.pair_target_entity(child, relation.raw()), Some(b));
    }

    #[test]
    fn cascade_relation_destroys_dependents() {
        let mut world = World::new();
        let parent = world.spawn_empty();
        let child = world.spawn_empty();
        let relation = world.register_component::<crate::hierarchy::ChildOf>();
        world.mark_cascade(relation);
        world.add_pair(child, relation, TermTarget::Entity(parent));
        world.destroy_entity(parent);
        assert!(!world.is_alive(child));
    }

    #[test]
    fn disabling_an_entity_is_reversible() {
        let mut world = World::new();
        let e = world.spawn_empty();
        assert!(world.disable(e));
        assert!(world.is_disabled(e));
        assert!(world.enable(e));
        assert!(!world.is_disabled(e));
    }
}
