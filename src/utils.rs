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

//! Utility functions shared across modules: the FNV-1a hash used to key
//! archetype signatures and query contexts.

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a hash over a sequence of `u32`s (archetype signatures, query term
/// ids), run byte-wise over each element's little-endian encoding so the
/// result is stable across platforms.
pub fn fnv1a_hash_u32s(values: impl IntoIterator<Item = u32>) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for value in values {
        for byte in value.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv_hash_is_order_sensitive() {
        let a = fnv1a_hash_u32s([1u32, 2, 3]);
        let b = fnv1a_hash_u32s([3u32, 2, 1]);
        assert_ne!(a, b);
    }

    #[test]
    fn fnv_hash_is_deterministic() {
        let a = fnv1a_hash_u32s([10u32, 20, 30]);
        let b = fnv1a_hash_u32s([10u32, 20, 30]);
        assert_eq!(a, b);
    }
}
