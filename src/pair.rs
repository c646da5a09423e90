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

//! Pair (relation, target) encoding.
//!
//! A plain `ComponentId` is a monotonic ordinal handed out by the component
//! registry. A pair id packs a relation and a target into the same 32-bit
//! space, tagged by the high bit, so archetypes can carry relationship edges
//! ("likes", "child_of") as ordinary columns without a parallel storage path.
//!
//! Layout (bit 31 is the most significant):
//!
//! ```text
//! [ 31: pair flag | 30..16: relation (15 bits) | 15..0: target (16 bits) ]
//! ```

use crate::error::{EcsError, Result};

const PAIR_FLAG: u32 = 1 << 31;
const RELATION_BITS: u32 = 15;
const TARGET_BITS: u32 = 16;
const RELATION_MASK: u32 = (1 << RELATION_BITS) - 1;
const TARGET_MASK: u32 = (1 << TARGET_BITS) - 1;

/// Sentinel relation/target value meaning "match any" when building a
/// wildcard query term. Not a valid value for `make_pair_id`.
pub const WILDCARD: u32 = u32::MAX;

/// Encodes a `(relation, target)` pair into a single component id.
///
/// `relation` must fit 15 bits and `target` must fit 16 bits; both are
/// themselves component/entity index values, not full `ComponentId`s, so
/// they are far smaller than the registries they index into.
pub fn make_pair_id(relation: u32, target: u32) -> Result<u32> {
    if relation > RELATION_MASK || target > TARGET_MASK {
        return Err(EcsError::EncodingOverflow { relation, target });
    }
    Ok(PAIR_FLAG | (relation << TARGET_BITS) | target)
}

/// Whether `id` is a pair id (high bit set) as opposed to a plain component.
#[inline]
pub fn is_pair(id: u32) -> bool {
    id & PAIR_FLAG != 0
}

/// Extracts the relation half of a pair id. Meaningless if `!is_pair(id)`.
#[inline]
pub fn pair_relation(id: u32) -> u32 {
    (id >> TARGET_BITS) & RELATION_MASK
}

/// Extracts the target half of a pair id. Meaningless if `!is_pair(id)`.
#[inline]
pub fn pair_target(id: u32) -> u32 {
    id & TARGET_MASK
}

/// Builds a pair id that matches any target for `relation`, for use as a
/// wildcard query key. Archetype signatures are kept sorted, so a scan for
/// `(relation, *)` can binary-search to the first id with this relation and
/// walk forward while the relation bits stay constant.
#[inline]
pub fn make_wildcard_relation(relation: u32) -> u32 {
    PAIR_FLAG | (relation << TARGET_BITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let id = make_pair_id(12, 4000).unwrap();
        assert!(is_pair(id));
        assert_eq!(pair_relation(id), 12);
        assert_eq!(pair_target(id), 4000);
    }

    #[test]
    fn relation_overflow_is_fatal() {
        let err = make_pair_id(1 << 15, 0).unwrap_err();
        assert_eq!(
            err,
            EcsError::EncodingOverflow {
                relation: 1 << 15,
                target: 0
            }
        );
    }

    #[test]
    fn target_overflow_is_fatal() {
        assert!(make_pair_id(0, 1 << 16).is_err());
    }

    #[test]
    fn plain_component_is_not_a_pair() {
        assert!(!is_pair(42));
    }

    #[test]
    fn wildcard_shares_relation_prefix_with_concrete_pairs() {
        let wildcard = make_wildcard_relation(9);
        let concrete = make_pair_id(9, 123).unwrap();
        assert_eq!(wildcard & !TARGET_MASK, concrete & !TARGET_MASK);
    }
}
