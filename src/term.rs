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

//! Declarative query terms and their resolution into a [`QueryContext`].
//!
//! A query is built as a small tree of [`Term`]s (components, pairs, and
//! grouping combinators) and resolved once, at query-build time, into a flat
//! [`QueryContext`] the archetype matcher and iterator can evaluate without
//! re-walking the term tree per archetype. Resolution happens in a per-call
//! `bumpalo::Bump` arena rather than a shared table, so building many
//! independent queries concurrently never contends on a single allocator.

use bumpalo::Bump;
use smallvec::SmallVec;

use crate::component::ComponentId;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::pair::{is_pair, make_pair_id, make_wildcard_relation, pair_relation};

/// Maximum number of named capture bindings a single query may declare.
pub const MAX_QUERY_BINDINGS: usize = 8;

/// Sentinel target meaning "the entity currently being iterated" in a pair
/// term, e.g. `pair(ChildOf, This)` used from the parent side of a cascade.
pub const VAR_THIS: u8 = 254;
/// Sentinel target meaning "no binding" — a placeholder capture slot.
pub const VAR_NONE: u8 = 255;

/// The target half of a pair term before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermTarget {
    /// A concrete entity, e.g. `pair(ChildOf, root)`.
    Entity(EntityId),
    /// Matches any target sharing `relation`, e.g. `pair(ChildOf, Wildcard)`.
    Wildcard,
    /// Binds the matched target into query-result capture slot `0..MAX_QUERY_BINDINGS`.
    Capture(u8),
    /// The entity currently being iterated (see [`VAR_THIS`]).
    This,
}

/// A single declarative query term. Built with the free functions below and
/// combined into `All`/`Any`/`None` groups; resolved once per query build via
/// [`resolve`].
#[derive(Debug, Clone)]
pub enum Term {
    /// Entity must carry this component.
    With(ComponentId),
    /// Entity must not carry this component.
    Without(ComponentId),
    /// Entity must carry a pair `(relation, target)`.
    WithPair { relation: ComponentId, target: TermTarget },
    /// Entity must not carry a pair `(relation, target)`.
    WithoutPair { relation: ComponentId, target: TermTarget },
    /// Every sub-term must match (conjunction; the implicit top-level mode).
    All(Vec<Term>),
    /// At least one sub-term must match (disjunction).
    Any(Vec<Term>),
    /// No sub-term may match (a grouped negation).
    None(Vec<Term>),
    /// Iterate matches in parent-before-child order along this relation.
    Cascade(ComponentId),
}

pub fn with(component: ComponentId) -> Term {
    Term::With(component)
}

pub fn without(component: ComponentId) -> Term {
    Term::Without(component)
}

pub fn pair(relation: ComponentId, target: TermTarget) -> Term {
    Term::WithPair { relation, target }
}

pub fn without_pair(relation: ComponentId, target: TermTarget) -> Term {
    Term::WithoutPair { relation, target }
}

pub fn all(terms: Vec<Term>) -> Term {
    Term::All(terms)
}

pub fn any(terms: Vec<Term>) -> Term {
    Term::Any(terms)
}

pub fn none(terms: Vec<Term>) -> Term {
    Term::None(terms)
}

pub fn cascade(relation: ComponentId) -> Term {
    Term::Cascade(relation)
}

/// A relation whose target is left as a wildcard: the matcher must scan an
/// archetype's signature for any pair id sharing this relation prefix
/// (exploiting the fact that signatures are kept sorted).
#[derive(Debug, Clone, Copy)]
pub struct WildcardTerm {
    pub relation: u32,
    pub wildcard_key: u32,
    pub capture_slot: Option<u8>,
}

/// Which capture slot a concrete (non-wildcard) pair binds its target or
/// relation partner to, for reporting back in query results.
#[derive(Debug, Clone, Copy)]
pub struct Capture {
    pub slot: u8,
    pub component: u32,
}

/// The flattened result of resolving a [`Term`] tree: everything the
/// archetype matcher and iterator need, with no further tree-walking.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub required: SmallVec<[u32; 8]>,
    pub excluded: SmallVec<[u32; 8]>,
    pub wildcard_required: SmallVec<[WildcardTerm; 4]>,
    pub wildcard_excluded: SmallVec<[WildcardTerm; 4]>,
    /// Each inner list is an "any-of" group: an archetype must carry at
    /// least one id from each group.
    pub any_groups: Vec<SmallVec<[u32; 4]>>,
    /// Each inner list is a "none-of" group: an archetype must carry none of
    /// the ids in any single group (groups are independent).
    pub none_groups: Vec<SmallVec<[u32; 4]>>,
    pub captures: SmallVec<[Capture; MAX_QUERY_BINDINGS]>,
    /// At most one relation may be marked for cascade iteration per query.
    pub cascade_relation: Option<u32>,
}

impl QueryContext {
    /// Stable hash over the resolved context, used as the query cache key.
    /// Order-independent fields are sorted before hashing so logically
    /// identical contexts built in a different term order still collide.
    pub fn cache_key(&self) -> u64 {
        let mut required: Vec<u32> = self.required.iter().copied().collect();
        let mut excluded: Vec<u32> = self.excluded.iter().copied().collect();
        required.sort_unstable();
        excluded.sort_unstable();
        let mut values: Vec<u32> = Vec::with_capacity(required.len() + excluded.len() + 8);
        values.push(required.len() as u32);
        values.extend(required);
        values.push(0xFFFF_0001);
        values.push(excluded.len() as u32);
        values.extend(excluded);
        values.push(0xFFFF_0002);
        for group in &self.any_groups {
            let mut g: Vec<u32> = group.iter().copied().collect();
            g.sort_unstable();
            values.push(0xFFFF_0003);
            values.extend(g);
        }
        for group in &self.none_groups {
            let mut g: Vec<u32> = group.iter().copied().collect();
            g.sort_unstable();
            values.push(0xFFFF_0004);
            values.extend(g);
        }
        for w in &self.wildcard_required {
            values.push(0xFFFF_0005);
            values.push(w.relation);
        }
        for w in &self.wildcard_excluded {
            values.push(0xFFFF_0006);
            values.push(w.relation);
        }
        if let Some(r) = self.cascade_relation {
            values.push(0xFFFF_0007);
            values.push(r);
        }
        crate::utils::fnv1a_hash_u32s(values)
    }
}

/// Resolves a fully-built term tree into a [`QueryContext`]. `arena` backs
/// the scratch allocations made while walking the tree (the groups
/// themselves are flattened into the returned, arena-independent
/// `QueryContext`, so the arena can be dropped immediately after this call
/// returns).
pub fn resolve(root: &Term, arena: &Bump) -> Result<QueryContext> {
    let mut ctx = QueryContext::default();
    let mut next_capture_slot: u8 = 0;
    let _ = arena; // reserved for future nested-group scratch use
    resolve_into(root, &mut ctx, &mut next_capture_slot, true)?;
    Ok(ctx)
}

fn bind_capture(ctx: &mut QueryContext, next_slot: &mut u8, component: u32, requested: Option<u8>) -> Result<()> {
    let slot = requested.unwrap_or(*next_slot);
    if slot as usize >= MAX_QUERY_BINDINGS {
        return Err(EcsError::ContractViolation("query capture slot exceeds MAX_QUERY_BINDINGS"));
    }
    ctx.captures.push(Capture { slot, component });
    if requested.is_none() {
        *next_slot += 1;
    }
    Ok(())
}

fn resolve_pair_id(relation: ComponentId, target: TermTarget) -> (u32, Option<u32>, Option<u8>) {
    match target {
        TermTarget::Entity(e) => {
            let id = make_pair_id(relation.raw(), e.index()).unwrap_or_else(|_| make_wildcard_relation(relation.raw()));
            (id, None, None)
        }
        TermTarget::This => {
            // "This" resolves per-entity during iteration, not at build
            // time; the matcher treats it like a wildcard over the relation
            // and the iterator re-checks the concrete target per row.
            (make_wildcard_relation(relation.raw()), None, None)
        }
        TermTarget::Wildcard => (make_wildcard_relation(relation.raw()), None, None),
        TermTarget::Capture(slot) => (make_wildcard_relation(relation.raw()), None, Some(slot)),
    }
}

fn resolve_into(term: &Term, ctx: &mut QueryContext, next_slot: &mut u8, top_level: bool) -> Result<()> {
    match term {
        Term::With(c) => ctx.required.push(c.raw()),
        Term::Without(c) => ctx.excluded.push(c.raw()),
        Term::WithPair { relation, target } => {
            let (id, _, capture) = resolve_pair_id(*relation, *target);
            if matches!(target, TermTarget::Wildcard | TermTarget::This | TermTarget::Capture(_)) {
                ctx.wildcard_required.push(WildcardTerm {
                    relation: relation.raw(),
                    wildcard_key: id,
                    capture_slot: capture,
                });
                if let Some(slot) = capture {
                    bind_capture(ctx, next_slot, relation.raw(), Some(slot))?;
                }
            } else {
                ctx.required.push(id);
            }
        }
        Term::WithoutPair { relation, target } => {
            let (id, _, _) = resolve_pair_id(*relation, *target);
            if matches!(target, TermTarget::Wildcard | TermTarget::This) {
                ctx.wildcard_excluded.push(WildcardTerm {
                    relation: relation.raw(),
                    wildcard_key: id,
                    capture_slot: None,
                });
            } else {
                ctx.excluded.push(id);
            }
        }
        Term::All(terms) => {
            for t in terms {
                resolve_into(t, ctx, next_slot, false)?;
            }
        }
        Term::Any(terms) => {
            let mut group = SmallVec::new();
            for t in terms {
                collect_plain_ids(t, &mut group)?;
            }
            ctx.any_groups.push(group);
        }
        Term::None(terms) => {
            let mut group = SmallVec::new();
            for t in terms {
                collect_plain_ids(t, &mut group)?;
            }
            ctx.none_groups.push(group);
        }
        Term::Cascade(relation) => {
            // At most one cascade term governs a query; later ones are
            // silently ignored rather than rejected, matching the
            // single-cascade behavior this term language was modeled on.
            if ctx.cascade_relation.is_none() {
                ctx.cascade_relation = Some(relation.raw());
            }
        }
    }
    let _ = top_level;
    Ok(())
}

fn collect_plain_ids(term: &Term, out: &mut SmallVec<[u32; 4]>) -> Result<()> {
    match term {
        Term::With(c) => {
            out.push(c.raw());
            Ok(())
        }
        Term::WithPair { relation, target } => {
            let (id, _, _) = resolve_pair_id(*relation, *target);
            out.push(id);
            Ok(())
        }
        _ => Err(EcsError::ContractViolation("any/none groups may only contain plain With/WithPair terms")),
    }
}

/// Returns true if `id` matches a wildcard term's relation prefix, exploiting
/// the sorted-signature property: any concrete pair sharing the relation
/// compares equal to the wildcard key once the target bits are masked off.
pub fn archetype_has_wildcard(signature: &[u32], relation: u32) -> bool {
    signature.iter().any(|&id| is_pair(id) && pair_relation(id) == relation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_with_without_populate_required_excluded() {
        let arena = Bump::new();
        let term = all(vec![with(ComponentId(1)), without(ComponentId(2))]);
        let ctx = resolve(&term, &arena).unwrap();
        assert_eq!(ctx.required.as_slice(), &[1]);
        assert_eq!(ctx.excluded.as_slice(), &[2]);
    }

    #[test]
    fn wildcard_pair_is_tracked_separately_from_required() {
        let arena = Bump::new();
        let term = pair(ComponentId(5), TermTarget::Wildcard);
        let ctx = resolve(&term, &arena).unwrap();
        assert!(ctx.required.is_empty());
        assert_eq!(ctx.wildcard_required.len(), 1);
        assert_eq!(ctx.wildcard_required[0].relation, 5);
    }

    #[test]
    fn concrete_pair_target_resolves_to_required() {
        let arena = Bump::new();
        let target = crate::entity::EntityId::from_bits((1u64 << 48) | 7);
        let term = pair(ComponentId(5), TermTarget::Entity(target));
        let ctx = resolve(&term, &arena).unwrap();
        assert_eq!(ctx.required.len(), 1);
        assert!(is_pair(ctx.required[0]));
    }

    #[test]
    fn second_cascade_term_is_ignored_in_favor_of_the_first() {
        let arena = Bump::new();
        let term = all(vec![cascade(ComponentId(1)), cascade(ComponentId(2))]);
        let ctx = resolve(&term, &arena).unwrap();
        assert_eq!(ctx.cascade_relation, Some(1));
    }

    #[test]
    fn cache_key_is_order_independent_for_required_set() {
        let arena = Bump::new();
        let a = resolve(&all(vec![with(ComponentId(1)), with(ComponentId(2))]), &arena).unwrap();
        let b = resolve(&all(vec![with(ComponentId(2)), with(ComponentId(1))]), &arena).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn any_group_rejects_nested_groups() {
        let arena = Bump::new();
        let term = any(vec![all(vec![with(ComponentId(1))])]);
        assert!(resolve(&term, &arena).is_err());
    }
}
