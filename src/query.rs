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

//! Archetype matching against a resolved [`QueryContext`], the query cache,
//! and cascade (parent-before-child) iteration ordering.

use ahash::AHashMap;

use crate::archetype::{Archetype, ArchetypeId};
use crate::entity::EntityId;
use crate::pair::{is_pair, pair_relation, pair_target};
use crate::term::{archetype_has_wildcard, QueryContext};

/// Maximum cascade depth before a potential cycle is assumed and iteration
/// stops rather than looping forever.
pub const MAX_CASCADE_DEPTH: u32 = 1024;

/// Whether `archetype` satisfies every clause of a resolved query.
pub fn archetype_matches(ctx: &QueryContext, archetype: &Archetype) -> bool {
    if !archetype.matches(&ctx.required, &ctx.excluded) {
        return false;
    }
    for w in &ctx.wildcard_required {
        if !archetype_has_wildcard(&archetype.signature, w.relation) {
            return false;
        }
    }
    for w in &ctx.wildcard_excluded {
        if archetype_has_wildcard(&archetype.signature, w.relation) {
            return false;
        }
    }
    for group in &ctx.any_groups {
        if !group.iter().any(|&id| archetype.has_component(id)) {
            return false;
        }
    }
    for group in &ctx.none_groups {
        if group.iter().any(|&id| archetype.has_component(id)) {
            return false;
        }
    }
    true
}

/// One cached query's matched archetype set, tagged with the world
/// generation it was computed against.
#[derive(Debug, Clone, Default)]
struct CachedMatch {
    archetypes: Vec<ArchetypeId>,
    generation: u64,
}

/// Caches resolved archetype matches keyed by a query context's FNV-1a hash,
/// invalidated wholesale whenever the world's archetype generation advances
/// (a new archetype was created since the cache entry was built). This is
/// coarser than per-archetype incremental tracking but correct and O(1) to
/// invalidate: a new archetype can only ever add matches, never remove them,
/// so a stale entry is detected purely by generation mismatch.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: AHashMap<u64, CachedMatch>,
}

impl QueryCache {
    pub fn new() -> Self {
        QueryCache::default()
    }

    /// Returns the matched archetype ids for `ctx`, rebuilding from scratch
    /// against `archetypes` if this is the first lookup or the cache is
    /// stale relative to `current_generation`.
    pub fn matches<'a>(
        &mut self,
        ctx: &QueryContext,
        archetypes: impl Iterator<Item = &'a Archetype>,
        current_generation: u64,
    ) -> &[ArchetypeId] {
        let key = ctx.cache_key();
        let stale = self
            .entries
            .get(&key)
            .map(|cached| cached.generation != current_generation)
            .unwrap_or(true);
        if stale {
            #[cfg(feature = "profiling")]
            let _span = tracing::info_span!("query_cache_rebuild", key).entered();

            let matched: Vec<ArchetypeId> = archetypes.filter(|a| archetype_matches(ctx, a)).map(|a| a.id).collect();
            self.entries.insert(
                key,
                CachedMatch {
                    archetypes: matched,
                    generation: current_generation,
                },
            );
        }
        &self.entries[&key].archetypes
    }

    /// Drops every cached entry. Used by tests and by `World::clear`.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Orders `entities` parent-before-child along `relation`, for cascade
/// iteration. `parent_of` should return the entity an entity's `relation`
/// pair points at (if any); entities with no such pair are depth-0 roots.
/// A chain longer than [`MAX_CASCADE_DEPTH`] is assumed cyclic and clamped
/// rather than looped forever.
pub fn cascade_order(entities: &[EntityId], parent_of: impl Fn(EntityId) -> Option<EntityId>) -> Vec<EntityId> {
    let mut resolved: AHashMap<EntityId, u32> = AHashMap::default();
    for &entity in entities {
        resolve_depth(entity, &parent_of, &mut resolved, 0);
    }
    let mut ordered: Vec<(u32, EntityId)> = entities.iter().map(|&e| (*resolved.get(&e).unwrap_or(&0), e)).collect();
    ordered.sort_by_key(|&(depth, _)| depth);
    ordered.into_iter().map(|(_, e)| e).collect()
}

fn resolve_depth(
    entity: EntityId,
    parent_of: &impl Fn(EntityId) -> Option<EntityId>,
    resolved: &mut AHashMap<EntityId, u32>,
    guard: u32,
) -> u32 {
    if let Some(&d) = resolved.get(&entity) {
        return d;
    }
    if guard >= MAX_CASCADE_DEPTH {
        resolved.insert(entity, MAX_CASCADE_DEPTH);
        return MAX_CASCADE_DEPTH;
    }
    let depth = match parent_of(entity) {
        Some(parent) if parent != entity => 1 + resolve_depth(parent, parent_of, resolved, guard + 1),
        _ => 0,
    };
    resolved.insert(entity, depth);
    depth
}

/// Extracts the pair-encoded target index for `relation` out of an
/// archetype signature, if present. The index still needs resolving to a
/// live `EntityId` via the entity index (the pair only stores the low 16
/// bits of the target's index).
pub fn find_pair_target_index(signature: &[u32], relation: u32) -> Option<u32> {
    signature
        .iter()
        .find(|&&id| is_pair(id) && pair_relation(id) == relation)
        .map(|&id| pair_target(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::Archetype;

    unsafe fn noop_drop(_: *mut u8) {}

    fn make_archetype(id: u32, signature: Vec<u32>) -> Archetype {
        Archetype::new(ArchetypeId(id), signature, |_| crate::archetype::Column::new(4, 4, noop_drop))
    }

    #[test]
    fn matches_respects_required_and_excluded() {
        let ctx = QueryContext {
            required: smallvec::smallvec![1],
            excluded: smallvec::smallvec![2],
            ..Default::default()
        };
        let a = make_archetype(0, vec![1, 3]);
        let b = make_archetype(1, vec![1, 2]);
        assert!(archetype_matches(&ctx, &a));
        assert!(!archetype_matches(&ctx, &b));
    }

    #[test]
    fn cache_rebuilds_on_generation_bump() {
        let ctx = QueryContext {
            required: smallvec::smallvec![1],
            ..Default::default()
        };
        let mut cache = QueryCache::new();
        let a0 = make_archetype(0, vec![1]);
        let archetypes = vec![a0];
        let result = cache.matches(&ctx, archetypes.iter(), 0).to_vec();
        assert_eq!(result, vec![ArchetypeId(0)]);

        let a1 = make_archetype(1, vec![1]);
        let archetypes2 = vec![archetypes.into_iter().next().unwrap(), a1];
        let result2 = cache.matches(&ctx, archetypes2.iter(), 1).to_vec();
        assert_eq!(result2.len(), 2);
    }

    #[test]
    fn cascade_order_places_parents_before_children() {
        fn e(i: u32) -> EntityId {
            EntityId::from_bits((1u64 << 48) | i as u64)
        }
        let root = e(1);
        let child = e(2);
        let grandchild = e(3);
        let parents: AHashMap<EntityId, EntityId> =
            [(child, root), (grandchild, child)].into_iter().collect();
        let ordered = cascade_order(&[grandchild, root, child], |ent| parents.get(&ent).copied());
        assert_eq!(ordered, vec![root, child, grandchild]);
    }

    #[test]
    fn cascade_order_clamps_cycles() {
        fn e(i: u32) -> EntityId {
            EntityId::from_bits((1u64 << 48) | i as u64)
        }
        let a = e(1);
        let b = e(2);
        let parents: AHashMap<EntityId, EntityId> = [(a, b), (b, a)].into_iter().collect();
        let ordered = cascade_order(&[a, b], |ent| parents.get(&ent).copied());
        assert_eq!(ordered.len(), 2);
    }
}
