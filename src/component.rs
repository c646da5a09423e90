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

//! Component identity, layout, and the two-way component registry.
//!
//! A [`ComponentId`] is a plain `u32` ordinal (the pair-tagged half of the
//! id space is handled by [`crate::pair`]). [`ComponentRegistry`] maps each
//! registered Rust type to its id and back, so archetype signatures and
//! columns can be keyed by a cheap integer instead of a `TypeId` everywhere.

use std::any::TypeId;

use ahash::AHashMap;
use smallvec::{smallvec, SmallVec};

/// Maximum number of components supported directly by a `Bundle` tuple impl.
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for component types. Components must be `'static` (no
/// borrowed data) and satisfy `Send + Sync` so a `World` can be moved across
/// threads even though it is used from one at a time.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

/// Per-type metadata the registry keeps for every registered component:
/// enough to allocate, move, and drop raw bytes without the compile-time
/// type.
#[derive(Clone)]
pub struct ComponentInfo {
    pub id: ComponentId,
    pub type_id: TypeId,
    pub name: &'static str,
    pub layout: std::alloc::Layout,
    pub drop_fn: unsafe fn(*mut u8),
}

impl std::fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("layout", &self.layout)
            .finish()
    }
}

impl ComponentInfo {
    fn of<T: Component>(id: ComponentId) -> Self {
        unsafe fn drop_in_place<T>(ptr: *mut u8) {
            std::ptr::drop_in_place(ptr as *mut T);
        }
        ComponentInfo {
            id,
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            layout: std::alloc::Layout::new::<T>(),
            drop_fn: drop_in_place::<T>,
        }
    }
}

/// Plain component id: a monotonic ordinal. See [`crate::pair`] for the
/// pair-tagged half of the id space that shares this `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u32);

impl ComponentId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Two-way registry between Rust types and their `ComponentId`, mirroring
/// the teacher's `TypeId -> id` map but adding the reverse lookup the term
/// resolver and observer dispatcher need to report a failure by name.
#[derive(Default)]
pub struct ComponentRegistry {
    by_type: AHashMap<TypeId, ComponentId>,
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        ComponentRegistry::default()
    }

    /// Registers `T` if it hasn't been seen before and returns its id.
    /// Idempotent: registering the same type twice returns the same id.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        if let Some(&id) = self.by_type.get(&TypeId::of::<T>()) {
            return id;
        }
        // Ordinals start at 1, matching the reserved-zero convention used
        // throughout the id space (entity index 0, component ordinal 0 are
        // both kept out of circulation so a default-initialized id can never
        // alias a real one).
        let id = ComponentId(self.infos.len() as u32 + 1);
        self.infos.push(ComponentInfo::of::<T>(id));
        self.by_type.insert(TypeId::of::<T>(), id);
        id
    }

    pub fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        id.0.checked_sub(1).and_then(|i| self.infos.get(i as usize))
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

/// Groups multiple components for a single spawn call. Rust has no variadic
/// argument lists, so this is implemented for tuples up to
/// [`MAX_BUNDLE_COMPONENTS`] elements via [`impl_bundle`].
pub trait Bundle: Send + Sync + 'static {
    /// Type ids of every component in the bundle, in declaration order.
    fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Registers every component type in `registry`, returning their ids in
    /// declaration order.
    fn register_components(registry: &mut ComponentRegistry) -> SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Writes each component to its destination pointer. `ptrs[i]` must
    /// point at storage laid out for the component at index `i` in
    /// declaration order.
    ///
    /// # Safety
    /// Every pointer in `ptrs` must be valid, writable, and aligned for its
    /// corresponding component type, and must not alias any other pointer.
    unsafe fn write_components(self, ptrs: &[*mut u8]);
}

macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(TypeId::of::<$T>()),*]
            }

            fn register_components(registry: &mut ComponentRegistry) -> SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(registry.register::<$T>()),*]
            }

            #[allow(non_snake_case)]
            unsafe fn write_components(self, ptrs: &[*mut u8]) {
                let ($($T,)*) = self;
                let mut i = 0;
                $(
                    std::ptr::write(ptrs[i] as *mut $T, $T);
                    i += 1;
                )*
                let _ = i;
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
