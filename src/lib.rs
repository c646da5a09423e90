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

//! Archetype ECS - an in-memory, single-threaded archetype-based
//! entity-component-system data engine.
//!
//! A [`World`] owns every entity, archetype, and component column. Entities
//! move between archetypes along a cached transition graph as components are
//! added or removed; relationships between entities (or between an entity
//! and a component type) are encoded as *pairs* sharing the same id space as
//! plain components. Queries are declarative [`term`] trees resolved once
//! into a flat context and matched against the archetype list through a
//! generation-invalidated cache. Structural mutation made while a query is
//! being iterated is deferred and flushed once iteration unwinds back to
//! depth zero, so observers and query bodies can freely add, remove, or
//! destroy without invalidating the row they are currently visiting.

pub mod archetype;
pub mod bitset;
pub mod component;
pub mod deferred;
pub mod entity;
pub mod error;
pub mod hierarchy;
pub mod observer;
pub mod pair;
pub mod prelude;
pub mod query;
pub mod relation;
pub mod term;
pub mod utils;
pub mod world;

// Re-exports for convenience
pub use archetype::{Archetype, ArchetypeId, Column};
pub use component::{Bundle, Component, ComponentId, ComponentRegistry};
pub use entity::{make_entity_id, EntityId};
pub use error::{EcsError, Result};
pub use observer::Observer;
pub use pair::{is_pair, make_pair_id, pair_relation, pair_target};
pub use query::QueryCache;
pub use term::{all, any, cascade, none, pair, with, without, without_pair, Term, TermTarget};
pub use world::{MemoryStats, World};
