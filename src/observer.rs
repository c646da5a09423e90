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

//! Observer dispatch: `OnAdd`/`OnRemove` events fired by comparing an
//! entity's archetype signature before and after a structural transition
//! (including the degenerate create/destroy transitions, where the missing
//! side is treated as the empty signature) against each observer's
//! required/excluded component set.
//!
//! Dispatch itself only computes *which* observers fired; it never calls
//! into a live `&mut World` while holding a borrow of the observer list.
//! `World` drives the actual callback (see `World::dispatch_transition`) by
//! temporarily taking its observer `Vec` out of itself, invoking the
//! callback with full `&mut World` access, and putting the `Vec` back —
//! never an unsafe pointer-aliasing trick.

use crate::entity::EntityId;

/// Which side of a transition an observer fired on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverEvent {
    /// The entity just gained a component set it previously lacked.
    OnAdd,
    /// The entity just lost a component set it previously had.
    OnRemove,
}

/// Implemented by anything that wants to react to entities entering or
/// leaving its matched component set.
pub trait Observer: Send + Sync {
    fn on_add(&mut self, world: &mut crate::world::World, entity: EntityId) {
        let _ = (world, entity);
    }

    fn on_remove(&mut self, world: &mut crate::world::World, entity: EntityId) {
        let _ = (world, entity);
    }
}

/// An installed observer plus the flattened required/excluded component set
/// it matches against, computed once at registration time.
pub struct ObserverEntry {
    pub required: Vec<u32>,
    pub excluded: Vec<u32>,
    pub observer: Box<dyn Observer>,
}

fn signature_matches(required: &[u32], excluded: &[u32], signature: &[u32]) -> bool {
    required.iter().all(|c| signature.contains(c)) && excluded.iter().all(|c| !signature.contains(c))
}

/// Computes which observers fire, and with which event, for a transition
/// from `from` (`None` for a freshly created entity) to `to` (`None` for a
/// destroyed entity).
pub fn dispatch_transition(
    observers: &[ObserverEntry],
    from: Option<&[u32]>,
    to: Option<&[u32]>,
) -> Vec<(usize, ObserverEvent)> {
    let mut fired = Vec::new();
    for (index, entry) in observers.iter().enumerate() {
        let from_matches = from.map(|sig| signature_matches(&entry.required, &entry.excluded, sig)).unwrap_or(false);
        let to_matches = to.map(|sig| signature_matches(&entry.required, &entry.excluded, sig)).unwrap_or(false);
        if !from_matches && to_matches {
            fired.push((index, ObserverEvent::OnAdd));
        } else if from_matches && !to_matches {
            fired.push((index, ObserverEvent::OnRemove));
        }
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        adds: u32,
        removes: u32,
    }

    impl Observer for Counting {
        fn on_add(&mut self, _world: &mut crate::world::World, _entity: EntityId) {
            self.adds += 1;
        }
        fn on_remove(&mut self, _world: &mut crate::world::World, _entity: EntityId) {
            self.removes += 1;
        }
    }

    fn entry(required: Vec<u32>, excluded: Vec<u32>) -> ObserverEntry {
        ObserverEntry {
            required,
            excluded,
            observer: Box::new(Counting { adds: 0, removes: 0 }),
        }
    }

    #[test]
    fn create_fires_on_add_when_new_signature_matches() {
        let observers = vec![entry(vec![1], vec![])];
        let fired = dispatch_transition(&observers, None, Some(&[1, 2]));
        assert_eq!(fired, vec![(0, ObserverEvent::OnAdd)]);
    }

    #[test]
    fn destroy_fires_on_remove_when_old_signature_matched() {
        let observers = vec![entry(vec![1], vec![])];
        let fired = dispatch_transition(&observers, Some(&[1]), None);
        assert_eq!(fired, vec![(0, ObserverEvent::OnRemove)]);
    }

    #[test]
    fn transition_that_keeps_matching_does_not_refire() {
        let observers = vec![entry(vec![1], vec![])];
        let fired = dispatch_transition(&observers, Some(&[1, 2]), Some(&[1, 3]));
        assert!(fired.is_empty());
    }

    #[test]
    fn excluded_component_suppresses_match() {
        let observers = vec![entry(vec![1], vec![2])];
        let fired = dispatch_transition(&observers, Some(&[1]), Some(&[1, 2]));
        assert_eq!(fired, vec![(0, ObserverEvent::OnRemove)]);
    }
}
