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

//! Archetypes: column-major (SoA) storage for every entity sharing an exact
//! set of component kinds, and the transition graph between them.

use rustc_hash::FxHashMap;

use crate::entity::EntityId;

/// Identifies an archetype within a `World`. Indexes into `World`'s
/// archetype `Vec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(pub u32);

/// One column of raw component bytes, laid out contiguously (SoA), plus
/// enough type information to grow, move, and drop elements without the
/// compile-time type.
pub struct Column {
    data: Vec<u8>,
    elem_size: usize,
    elem_align: usize,
    drop_fn: unsafe fn(*mut u8),
    len: usize,
}

impl Column {
    pub fn new(elem_size: usize, elem_align: usize, drop_fn: unsafe fn(*mut u8)) -> Self {
        Column {
            data: Vec::new(),
            elem_size,
            elem_align,
            drop_fn,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    fn byte_offset(&self, row: usize) -> usize {
        row * self.elem_size
    }

    fn reserve_one(&mut self) {
        let needed = (self.len + 1) * self.elem_size;
        if needed > self.data.len() {
            self.data.resize(needed, 0);
        }
    }

    /// Appends one element by copying `self.elem_size` bytes from `src`.
    /// Takes ownership of those bytes: the caller must not drop the source.
    ///
    /// # Safety
    /// `src` must be valid to read `self.elem_size` bytes from, matching the
    /// layout this column was constructed with.
    pub unsafe fn push_raw(&mut self, src: *const u8) {
        self.reserve_one();
        let offset = self.byte_offset(self.len);
        std::ptr::copy_nonoverlapping(src, self.data.as_mut_ptr().add(offset), self.elem_size);
        self.len += 1;
    }

    /// Removes the element at `row`, running its destructor, and fills the
    /// hole by moving the last element into place (swap-remove). No-op if
    /// `row` is out of range.
    pub fn swap_remove_drop(&mut self, row: usize) {
        if row >= self.len {
            return;
        }
        unsafe {
            let row_ptr = self.data.as_mut_ptr().add(self.byte_offset(row));
            (self.drop_fn)(row_ptr);
            let last = self.len - 1;
            if row != last {
                let last_ptr = self.data.as_ptr().add(self.byte_offset(last));
                std::ptr::copy_nonoverlapping(last_ptr, row_ptr, self.elem_size);
            }
        }
        self.len -= 1;
    }

    /// Removes the element at `row` *without* running its destructor
    /// (ownership is assumed to have already moved elsewhere, e.g. into
    /// another archetype's column), filling the hole via swap-remove.
    pub fn swap_remove_forget(&mut self, row: usize) {
        if row >= self.len {
            return;
        }
        let last = self.len - 1;
        if row != last {
            unsafe {
                let row_ptr = self.data.as_mut_ptr().add(self.byte_offset(row));
                let last_ptr = self.data.as_ptr().add(self.byte_offset(last));
                std::ptr::copy_nonoverlapping(last_ptr, row_ptr, self.elem_size);
            }
        }
        self.len -= 1;
    }

    /// Grows the column by one uninitialized element and returns a pointer to
    /// it, for callers that write the new value directly (e.g. a freshly
    /// written component) rather than copying it in via `push_raw`.
    pub fn reserve_row(&mut self) -> *mut u8 {
        self.reserve_one();
        let offset = self.byte_offset(self.len);
        self.len += 1;
        unsafe { self.data.as_mut_ptr().add(offset) }
    }

    /// Raw pointer to the element at `row`. Caller must respect `elem_size`
    /// and the column's declared alignment.
    pub fn get_raw(&self, row: usize) -> Option<*const u8> {
        if row < self.len {
            Some(unsafe { self.data.as_ptr().add(self.byte_offset(row)) })
        } else {
            None
        }
    }

    pub fn get_raw_mut(&mut self, row: usize) -> Option<*mut u8> {
        if row < self.len {
            Some(unsafe { self.data.as_mut_ptr().add(self.byte_offset(row)) })
        } else {
            None
        }
    }

    /// Moves the element at `row` into `dst`, appending it there, then
    /// removes it here without dropping (the bytes now live in `dst`).
    /// `dst` must have been constructed with the same layout as `self`.
    pub fn move_row_to(&mut self, row: usize, dst: &mut Column) {
        debug_assert_eq!(self.elem_size, dst.elem_size, "moving between mismatched columns");
        if let Some(src) = self.get_raw(row) {
            unsafe {
                dst.push_raw(src);
            }
            self.swap_remove_forget(row);
        }
    }

    pub fn memory_bytes(&self) -> usize {
        self.data.capacity()
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        for row in 0..self.len {
            unsafe {
                let ptr = self.data.as_mut_ptr().add(self.byte_offset(row));
                (self.drop_fn)(ptr);
            }
        }
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("elem_size", &self.elem_size)
            .field("elem_align", &self.elem_align)
            .field("len", &self.len)
            .finish()
    }
}

/// A cached transition: the archetype reached by adding/removing one
/// component, plus the column index mapping so a move doesn't need to
/// re-diff the two signatures on every entity transition.
#[derive(Debug, Clone)]
pub struct TransitionEdge {
    pub to: ArchetypeId,
    /// `(source_column_index, dest_column_index)` for every component shared
    /// between the two archetypes, in source order.
    pub shared_columns: Vec<(usize, usize)>,
}

/// A set of entities sharing an exact component signature, stored
/// column-major.
pub struct Archetype {
    pub id: ArchetypeId,
    /// Sorted component ids (plain and pair ids share the space; see
    /// [`crate::pair`]). This is the archetype's signature.
    pub signature: Vec<u32>,
    columns: Vec<Column>,
    /// Maps a component id to its index in `columns`/`signature`.
    column_index: FxHashMap<u32, usize>,
    /// Dense row -> entity, kept in lockstep with every column.
    pub entities: Vec<EntityId>,
    pub add_edges: FxHashMap<u32, TransitionEdge>,
    pub remove_edges: FxHashMap<u32, TransitionEdge>,
}

impl Archetype {
    pub fn empty(id: ArchetypeId) -> Self {
        Archetype {
            id,
            signature: Vec::new(),
            columns: Vec::new(),
            column_index: FxHashMap::default(),
            entities: Vec::new(),
            add_edges: FxHashMap::default(),
            remove_edges: FxHashMap::default(),
        }
    }

    /// Builds an archetype for `signature` (must already be sorted) given a
    /// way to construct a fresh column for each component id.
    pub fn new(id: ArchetypeId, signature: Vec<u32>, mut make_column: impl FnMut(u32) -> Column) -> Self {
        debug_assert!(
            signature.windows(2).all(|w| w[0] < w[1]),
            "archetype signature must be sorted and deduplicated"
        );
        let mut column_index = FxHashMap::default();
        let mut columns = Vec::with_capacity(signature.len());
        for (i, &component) in signature.iter().enumerate() {
            columns.push(make_column(component));
            column_index.insert(component, i);
        }
        Archetype {
            id,
            signature,
            columns,
            column_index,
            entities: Vec::new(),
            add_edges: FxHashMap::default(),
            remove_edges: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn has_component(&self, component: u32) -> bool {
        self.column_index.contains_key(&component)
    }

    pub fn column_index_of(&self, component: u32) -> Option<usize> {
        self.column_index.get(&component).copied()
    }

    pub fn column(&self, component: u32) -> Option<&Column> {
        self.column_index.get(&component).map(|&i| &self.columns[i])
    }

    pub fn column_mut(&mut self, component: u32) -> Option<&mut Column> {
        self.column_index
            .get(&component)
            .copied()
            .map(move |i| &mut self.columns[i])
    }

    pub fn column_at(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn column_at_mut(&mut self, index: usize) -> &mut Column {
        &mut self.columns[index]
    }

    /// `required ⊆ signature ∧ excluded ∩ signature = ∅`, the archetype
    /// matcher's core predicate, shared by query resolution and observer
    /// transition matching.
    pub fn matches(&self, required: &[u32], excluded: &[u32]) -> bool {
        required.iter().all(|c| self.has_component(*c))
            && excluded.iter().all(|c| !self.has_component(*c))
    }

    /// Appends a new, empty row for `entity` at the end of every column;
    /// callers must immediately write every column's new slot via
    /// `column_at_mut(..).push_raw` or `move_row_to`. Returns the new row
    /// index.
    pub fn push_entity(&mut self, entity: EntityId) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Removes row `row`, running destructors on every column, and returns
    /// the entity that was swapped into `row` (if any), so the caller can
    /// fix up that entity's `EntityLocation`.
    pub fn remove_row(&mut self, row: usize) -> Option<EntityId> {
        for column in &mut self.columns {
            column.swap_remove_drop(row);
        }
        let last = self.entities.len() - 1;
        self.entities.swap_remove(row);
        if row != last {
            Some(self.entities[row])
        } else {
            None
        }
    }

    /// Removes row `row` from the `entities` bookkeeping only, without
    /// touching any column. Used by add/remove transitions, where every
    /// column has already had its row moved out (or dropped) individually as
    /// part of the transition's column map; only the entity list itself
    /// still needs the swap-remove applied. Returns the entity swapped into
    /// `row`, if any, so the caller can fix up its `EntityLocation`.
    pub fn swap_remove_entity_record(&mut self, row: usize) -> Option<EntityId> {
        let last = self.entities.len() - 1;
        self.entities.swap_remove(row);
        if row != last {
            Some(self.entities[row])
        } else {
            None
        }
    }

    pub fn memory_bytes(&self) -> usize {
        self.columns.iter().map(Column::memory_bytes).sum::<usize>()
            + self.entities.capacity() * std::mem::size_of::<EntityId>()
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .field("len", &self.len())
            .finish()
    }
}

/// Computes the column-index mapping used by a [`TransitionEdge`] between
/// two archetype signatures. Both signatures must already be sorted; the
/// result maps every component present in both to `(from_idx, to_idx)`.
pub fn compute_shared_columns(from: &Archetype, to: &Archetype) -> Vec<(usize, usize)> {
    let mut mapping = Vec::with_capacity(from.signature.len().min(to.signature.len()));
    let (mut i, mut j) = (0, 0);
    while i < from.signature.len() && j < to.signature.len() {
        match from.signature[i].cmp(&to.signature[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                mapping.push((i, j));
                i += 1;
                j += 1;
            }
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn drop_u32(ptr: *mut u8) {
        std::ptr::drop_in_place(ptr as *mut u32);
    }

    fn make_u32_column() -> Column {
        Column::new(4, 4, drop_u32)
    }

    fn entity(i: u32) -> EntityId {
        // index 0 is reserved in the real entity index; tests here only
        // care about distinctness, not liveness.
        crate::entity::EntityId::from_bits(((1u64) << 48) | (i as u64 + 1))
    }

    #[test]
    fn push_and_read_back() {
        let mut col = make_u32_column();
        let value: u32 = 42;
        unsafe {
            col.push_raw(&value as *const u32 as *const u8);
        }
        assert_eq!(col.len(), 1);
        let ptr = col.get_raw(0).unwrap() as *const u32;
        assert_eq!(unsafe { *ptr }, 42);
    }

    #[test]
    fn swap_remove_moves_last_into_hole() {
        let mut col = make_u32_column();
        for v in [1u32, 2, 3] {
            unsafe { col.push_raw(&v as *const u32 as *const u8) };
        }
        col.swap_remove_drop(0);
        assert_eq!(col.len(), 2);
        let first = unsafe { *(col.get_raw(0).unwrap() as *const u32) };
        assert_eq!(first, 3);
    }

    #[test]
    fn archetype_matches_required_and_excluded() {
        let a = Archetype::new(ArchetypeId(0), vec![1, 2], |_| make_u32_column());
        assert!(a.matches(&[1], &[3]));
        assert!(!a.matches(&[1, 3], &[]));
        assert!(!a.matches(&[1], &[2]));
    }

    #[test]
    fn push_and_remove_row_keeps_entities_in_sync() {
        let mut a = Archetype::new(ArchetypeId(0), vec![1], |_| make_u32_column());
        let e0 = entity(0);
        let e1 = entity(1);
        let row0 = a.push_entity(e0);
        let v0: u32 = 10;
        unsafe {
            a.column_at_mut(0).push_raw(&v0 as *const u32 as *const u8);
        }
        let row1 = a.push_entity(e1);
        let v1: u32 = 20;
        unsafe {
            a.column_at_mut(0).push_raw(&v1 as *const u32 as *const u8);
        }
        assert_eq!((row0, row1), (0, 1));
        let moved = a.remove_row(0);
        assert_eq!(moved, Some(e1));
        assert_eq!(a.len(), 1);
        assert_eq!(a.entities[0], e1);
    }

    #[test]
    fn compute_shared_columns_finds_common_components() {
        let from = Archetype::new(ArchetypeId(0), vec![1, 2, 3], |_| make_u32_column());
        let to = Archetype::new(ArchetypeId(1), vec![2, 3, 4], |_| make_u32_column());
        let shared = compute_shared_columns(&from, &to);
        assert_eq!(shared, vec![(1, 0), (2, 1)]);
    }
}
