//! Convenient re-exports of the commonly used types.
//!
//! ```
//! use archetype_ecs::prelude::*;
//! ```

pub use crate::component::{Bundle, Component, ComponentId};
pub use crate::entity::{make_entity_id, EntityId};
pub use crate::error::{EcsError, Result};
pub use crate::observer::Observer;
pub use crate::term::{all, any, cascade, none, pair, with, without, without_pair, Term, TermTarget};
pub use crate::world::World;
