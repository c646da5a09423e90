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

//! Error types.
//!
//! Most operations that can fail do so softly: a dead entity handle, an
//! unregistered component, or a miss on a query binding returns `None`,
//! `false`, or an empty iterator rather than an `Err`. `EcsError` is reserved
//! for the small set of conditions where the caller genuinely needs to stop
//! and handle a failure: an encoding that has run out of bits, a contract
//! violated at a public entry point, an internal invariant breach caught by a
//! debug check, or an allocator failure.

use std::fmt;

/// Fatal error type. See the module docs for the soft/fatal split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A pair's relation or target id does not fit the reserved bit width
    /// (15 bits for relation, 16 for target; see `pair` module).
    EncodingOverflow { relation: u32, target: u32 },

    /// A public entry point was called in a way its contract forbids, e.g.
    /// building a term list past `MAX_QUERY_BINDINGS` or requesting a
    /// cascade over more than one relation.
    ContractViolation(&'static str),

    /// An internal invariant was found broken. Reachable only from
    /// `debug_assert!`-guarded paths; a release build never raises this
    /// variant itself but the enum carries it so callers who enable checked
    /// builds can match on it uniformly.
    InvariantBreach(&'static str),

    /// A backing `Vec`/column allocation failed to grow.
    AllocatorFailure,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EncodingOverflow { relation, target } => write!(
                f,
                "pair encoding overflow: relation={relation} target={target}"
            ),
            EcsError::ContractViolation(msg) => write!(f, "contract violation: {msg}"),
            EcsError::InvariantBreach(msg) => write!(f, "invariant breach: {msg}"),
            EcsError::AllocatorFailure => write!(f, "allocator failure"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offending_ids() {
        let err = EcsError::EncodingOverflow {
            relation: 40000,
            target: 7,
        };
        assert!(err.to_string().contains("40000"));
    }

    #[test]
    fn is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&EcsError::AllocatorFailure);
    }
}
