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

//! Entity identifiers and the sparse-dense entity index.
//!
//! An [`EntityId`] packs a 48-bit index and a 16-bit generation into a single
//! `u64`. The index selects a slot in [`EntityIndex`]; the generation detects
//! use of a handle after its slot has been recycled. Index `0` is reserved
//! (never handed out by `create`) so that `EntityId`s can be compared against
//! a zero value without colliding with a live entity.

use smallvec::SmallVec;

/// Number of bits reserved for the index portion of an [`EntityId`].
pub const INDEX_BITS: u32 = 48;
/// Number of bits reserved for the generation portion of an [`EntityId`].
pub const GENERATION_BITS: u32 = 16;

const INDEX_MASK: u64 = (1u64 << INDEX_BITS) - 1;

/// Raw slot index, reserved so that `0` never names a live entity.
pub const RESERVED_SLOT: u32 = 0;

/// Unique entity identifier: 48-bit index + 16-bit generation packed into a
/// `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Builds an id from its index/generation parts. Does not consult any
    /// [`EntityIndex`], so it can hand back a stale or never-allocated id;
    /// callers that need a *live* entity should obtain one from
    /// [`EntityIndex::create`] instead. Exposed for the round-trip with
    /// [`EntityId::index`]/[`EntityId::generation`] (see the free function
    /// [`make_entity_id`], its public-API equivalent).
    #[inline]
    pub fn from_parts(index: u32, generation: u16) -> Self {
        debug_assert!((index as u64) <= INDEX_MASK, "entity index overflowed 48 bits");
        EntityId(((index as u64) & INDEX_MASK) | ((generation as u64) << INDEX_BITS))
    }

    /// The index (slot) portion of this id.
    #[inline]
    pub fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// The generation portion of this id.
    #[inline]
    pub fn generation(self) -> u16 {
        (self.0 >> INDEX_BITS) as u16
    }

    /// The raw packed bits, for hashing/storage outside the crate.
    #[inline]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Reconstructs an id from raw packed bits previously obtained from
    /// [`EntityId::to_bits`].
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        EntityId(bits)
    }
}

/// Builds an id from its index/generation parts, mirroring [`EntityId::index`]
/// and [`EntityId::generation`]: `make_entity_id(e.index(), e.generation()) ==
/// e` for any `e`. Free-function counterpart to [`EntityId::from_parts`], for
/// parity with [`crate::pair::make_pair_id`].
#[inline]
pub fn make_entity_id(index: u32, generation: u16) -> EntityId {
    EntityId::from_parts(index, generation)
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.generation())
    }
}

/// Where a live entity's components live: which archetype, and which row
/// within that archetype's columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_id: u32,
    pub row: u32,
}

/// A slot in the entity index: either a live record pointing at an
/// archetype/row, or a dead slot holding the generation to hand out on next
/// recycle and the relations (as target) pointing at it, kept so cascade
/// deletes can find dependents without a reverse scan.
#[derive(Debug, Clone)]
struct Slot {
    generation: u16,
    alive: bool,
    location: EntityLocation,
    /// Components of form (relation_component_id, subject) pointing *at*
    /// this entity as a pair target, used by the cascade relation trait to
    /// find dependents in O(targets) rather than O(entities).
    incoming_pairs: SmallVec<[(u32, EntityId); 4]>,
}

impl Default for Slot {
    fn default() -> Self {
        Slot {
            generation: 0,
            alive: false,
            location: EntityLocation {
                archetype_id: 0,
                row: 0,
            },
            incoming_pairs: SmallVec::new(),
        }
    }
}

/// Sparse-dense index mapping entity indices to archetype locations, with a
/// free list for O(1) amortized recycle.
#[derive(Debug, Default)]
pub struct EntityIndex {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    alive_count: usize,
}

impl EntityIndex {
    pub fn new() -> Self {
        let mut index = EntityIndex {
            slots: Vec::new(),
            free_list: Vec::new(),
            alive_count: 0,
        };
        // Burn slot 0 so it is never allocated; its generation starts at 1
        // so EntityId::from_bits(0) never equals a live entity either.
        index.slots.push(Slot {
            generation: 1,
            alive: false,
            location: EntityLocation {
                archetype_id: 0,
                row: 0,
            },
            incoming_pairs: SmallVec::new(),
        });
        index
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut index = Self::new();
        index.slots.reserve(capacity);
        index.free_list.reserve(capacity);
        index
    }

    /// Creates a new entity at `location`, reusing a recycled slot if one is
    /// available. Returns the fresh [`EntityId`].
    pub fn create(&mut self, location: EntityLocation) -> EntityId {
        self.alive_count += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(!slot.alive, "recycled slot was still marked alive");
            slot.alive = true;
            slot.location = location;
            return EntityId::from_parts(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        debug_assert!(index != RESERVED_SLOT, "slot 0 must stay reserved");
        self.slots.push(Slot {
            generation: 0,
            alive: true,
            location,
            incoming_pairs: SmallVec::new(),
        });
        EntityId::from_parts(index, 0)
    }

    /// Destroys `entity`, bumping its slot's generation so stale handles are
    /// caught by [`EntityIndex::is_alive`]. No-op (returns `false`) if the
    /// handle is already stale or out of range.
    pub fn destroy(&mut self, entity: EntityId) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.index() as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.incoming_pairs.clear();
        self.free_list.push(entity.index());
        self.alive_count -= 1;
        true
    }

    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        entity.index() != RESERVED_SLOT
            && (entity.index() as usize) < self.slots.len()
            && {
                let slot = &self.slots[entity.index() as usize];
                slot.alive && slot.generation == entity.generation()
            }
    }

    pub fn location(&self, entity: EntityId) -> Option<EntityLocation> {
        if self.is_alive(entity) {
            Some(self.slots[entity.index() as usize].location)
        } else {
            None
        }
    }

    pub fn set_location(&mut self, entity: EntityId, location: EntityLocation) {
        debug_assert!(self.is_alive(entity), "set_location on a dead entity");
        self.slots[entity.index() as usize].location = location;
    }

    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Reconstructs the live `EntityId` currently occupying slot `index`, if
    /// that slot is alive. Used to turn a pair's 16-bit target index back
    /// into a full entity handle.
    pub fn entity_by_index(&self, index: u32) -> Option<EntityId> {
        let slot = self.slots.get(index as usize)?;
        if slot.alive {
            Some(EntityId::from_parts(index, slot.generation))
        } else {
            None
        }
    }

    /// Records that `pair_component` (a pair id whose target is `entity`)
    /// was added on `subject`, so a later cascade delete of `entity` can
    /// enumerate dependents.
    pub fn record_incoming_pair(&mut self, entity: EntityId, pair_component: u32, subject: EntityId) {
        if let Some(slot) = self.slots.get_mut(entity.index() as usize) {
            if slot.alive {
                slot.incoming_pairs.push((pair_component, subject));
            }
        }
    }

    pub fn remove_incoming_pair(&mut self, entity: EntityId, pair_component: u32, subject: EntityId) {
        if let Some(slot) = self.slots.get_mut(entity.index() as usize) {
            slot.incoming_pairs.retain(|&(c, s)| !(c == pair_component && s == subject));
        }
    }

    /// Entities with a pair whose target is `entity`, paired with the pair
    /// component id they hold it under. Used by cascade-trait destroy.
    pub fn incoming_pairs(&self, entity: EntityId) -> &[(u32, EntityId)] {
        self.slots
            .get(entity.index() as usize)
            .map(|slot| slot.incoming_pairs.as_slice())
            .unwrap_or(&[])
    }

    /// Byte footprint of the index's backing storage, for diagnostics.
    pub fn memory_bytes(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Slot>()
            + self.free_list.capacity() * std::mem::size_of::<u32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(archetype_id: u32) -> EntityLocation {
        EntityLocation {
            archetype_id,
            row: 0,
        }
    }

    #[test]
    fn create_and_destroy_roundtrip() {
        let mut index = EntityIndex::new();
        let e = index.create(loc(0));
        assert!(index.is_alive(e));
        assert!(index.destroy(e));
        assert!(!index.is_alive(e));
    }

    #[test]
    fn recycled_slot_bumps_generation() {
        let mut index = EntityIndex::new();
        let e1 = index.create(loc(0));
        index.destroy(e1);
        let e2 = index.create(loc(0));
        assert_eq!(e1.index(), e2.index());
        assert_ne!(e1.generation(), e2.generation());
        assert!(!index.is_alive(e1));
        assert!(index.is_alive(e2));
    }

    #[test]
    fn slot_zero_never_allocated() {
        let mut index = EntityIndex::new();
        let e = index.create(loc(0));
        assert_ne!(e.index(), RESERVED_SLOT);
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut index = EntityIndex::new();
        let e = index.create(loc(0));
        assert!(index.destroy(e));
        assert!(!index.destroy(e));
    }

    #[test]
    fn entity_by_index_resolves_live_slot_only() {
        let mut index = EntityIndex::new();
        let e = index.create(loc(0));
        assert_eq!(index.entity_by_index(e.index()), Some(e));
        index.destroy(e);
        assert_eq!(index.entity_by_index(e.index()), None);
    }

    #[test]
    fn make_entity_id_roundtrips_through_index_and_generation() {
        let mut index = EntityIndex::new();
        let e = index.create(loc(0));
        index.destroy(e);
        let e2 = index.create(loc(0));
        assert_eq!(make_entity_id(e2.index(), e2.generation()), e2);
        assert_ne!(make_entity_id(e.index(), e.generation()), e2);
    }

    #[test]
    fn incoming_pairs_tracks_and_clears_on_destroy() {
        let mut index = EntityIndex::new();
        let target = index.create(loc(0));
        let subject = index.create(loc(0));
        index.record_incoming_pair(target, 7, subject);
        assert_eq!(index.incoming_pairs(target), &[(7, subject)]);
        index.destroy(target);
        let target2 = index.create(loc(0));
        assert!(index.incoming_pairs(target2).is_empty());
    }
}
