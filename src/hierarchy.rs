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

//! A conventional `ChildOf` relation, built entirely out of pairs and
//! relation traits rather than a dedicated `Parent`/`Children` component
//! pair. `ChildOf` is registered `Exclusive` (a child has one parent at a
//! time — reparenting just overwrites the pair) and `Cascade` (destroying a
//! parent destroys its children), so the hierarchy falls out of the general
//! relation machinery instead of a separate subsystem.

use crate::component::ComponentId;
use crate::entity::EntityId;
use crate::term::{pair, TermTarget};
use crate::world::World;

/// Marker type whose `ComponentId` is used as the `ChildOf` relation.
pub struct ChildOf;

impl World {
    /// Registers (if not already present) and returns the `ComponentId`
    /// used as the `ChildOf` relation, marking it `Exclusive` and `Cascade`
    /// on first registration.
    pub fn child_of_relation(&mut self) -> ComponentId {
        let already_registered = self.registry().id_of::<ChildOf>().is_some();
        let relation = self.register_component::<ChildOf>();
        if !already_registered {
            self.mark_exclusive(relation);
            self.mark_cascade(relation);
        }
        relation
    }

    /// Sets `child`'s parent to `parent`, replacing any existing parent
    /// (the `ChildOf` relation is `Exclusive`).
    pub fn set_parent(&mut self, child: EntityId, parent: EntityId) {
        let relation = self.child_of_relation();
        self.add_pair(child, relation, TermTarget::Entity(parent));
    }

    /// Removes `child`'s parent pair, if any.
    pub fn clear_parent(&mut self, child: EntityId) {
        let relation = self.child_of_relation();
        self.remove_pair(child, relation);
    }

    /// The entity `child` is parented to, if any.
    pub fn parent_of(&self, child: EntityId) -> Option<EntityId> {
        let relation = self.registry().id_of::<ChildOf>()?;
        self.pair_target_entity(child, relation.raw())
    }

    /// A term matching entities whose `ChildOf` parent is `parent`.
    pub fn children_of_term(&mut self, parent: EntityId) -> crate::term::Term {
        let relation = self.child_of_relation();
        pair(relation, TermTarget::Entity(parent))
    }
}
