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

//! Deferred structural mutation.
//!
//! Structural changes (adding/removing a component, destroying an entity)
//! move rows between archetypes and can invalidate the row index an active
//! query iterator is walking. Rather than letting a system or observer
//! mutate the world reentrantly mid-iteration, every such call made while
//! `iteration_depth > 0` is queued as a boxed closure here and applied, in
//! FIFO order, once iteration unwinds back to depth zero.

use std::collections::VecDeque;

use crate::world::World;

/// One queued structural mutation, closed over the data it needs to apply
/// itself. Closures are used (rather than a fixed enum of ops) the same way
/// the teacher's command buffer does: it keeps every deferred call site
/// free to capture whatever it needs without growing a shared op enum.
pub type DeferredOp = Box<dyn FnOnce(&mut World) + Send>;

/// FIFO queue of deferred ops plus the iteration-depth gate that decides
/// whether a mutation must be queued at all.
#[derive(Default)]
pub struct DeferredQueue {
    ops: VecDeque<DeferredOp>,
    iteration_depth: u32,
    is_flushing: bool,
}

impl DeferredQueue {
    pub fn new() -> Self {
        DeferredQueue::default()
    }

    /// Called when a query iterator starts walking archetypes.
    pub fn enter_iteration(&mut self) {
        self.iteration_depth += 1;
    }

    /// Called when a query iterator finishes. Returns the depth after
    /// exiting, so the caller knows whether it just reached zero.
    pub fn exit_iteration(&mut self) -> u32 {
        debug_assert!(self.iteration_depth > 0, "exit_iteration without a matching enter");
        self.iteration_depth -= 1;
        self.iteration_depth
    }

    pub fn iteration_depth(&self) -> u32 {
        self.iteration_depth
    }

    /// True while mutations must be deferred rather than applied directly.
    pub fn is_deferring(&self) -> bool {
        self.iteration_depth > 0
    }

    pub fn is_flushing(&self) -> bool {
        self.is_flushing
    }

    pub fn push(&mut self, op: DeferredOp) {
        self.ops.push_back(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Drains the queue, applying each op to `world` in FIFO order. Ops
    /// enqueued by an op while it runs (e.g. an observer reacting to the
    /// mutation just applied) are appended to the back and processed in the
    /// same pass, since we keep popping until the queue is empty rather than
    /// snapshotting its length up front.
    ///
    /// No-op if iteration is still active or a flush is already in
    /// progress (the latter guards against a mutation helper calling back
    /// into `flush` directly instead of just pushing).
    pub fn flush(world: &mut World) {
        if world.deferred.iteration_depth > 0 || world.deferred.is_flushing {
            return;
        }
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("deferred_flush", ops = world.deferred.ops.len()).entered();

        world.deferred.is_flushing = true;
        while let Some(op) = world.deferred.ops.pop_front() {
            op(world);
        }
        world.deferred.is_flushing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_tracks_nesting() {
        let mut q = DeferredQueue::new();
        assert!(!q.is_deferring());
        q.enter_iteration();
        q.enter_iteration();
        assert!(q.is_deferring());
        assert_eq!(q.exit_iteration(), 1);
        assert!(q.is_deferring());
        assert_eq!(q.exit_iteration(), 0);
        assert!(!q.is_deferring());
    }

    #[test]
    fn push_increases_len() {
        let mut q = DeferredQueue::new();
        assert!(q.is_empty());
        q.push(Box::new(|_: &mut World| {}));
        assert_eq!(q.len(), 1);
    }
}
