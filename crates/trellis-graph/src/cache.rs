// Dweve Trellis - Markup Object Graph Compiler
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Small most-recently-used cache of keys known to be absent.
//!
//! Lookups that miss every scope of a dictionary are remembered here so a
//! repeated miss does not walk merged dictionaries and themes again. Any
//! mutation that could make a key visible must invalidate it.

use crate::runtime::ResourceKey;
use std::collections::VecDeque;

/// Negative lookup cache with a fixed number of slots.
///
/// # Example
///
/// ```
/// use trellis_graph::{NegativeLookupCache, ResourceKey};
///
/// let mut cache = NegativeLookupCache::new();
/// cache.insert(ResourceKey::name("missing"));
/// assert!(cache.contains(&ResourceKey::name("missing")));
/// cache.invalidate(&ResourceKey::name("missing"));
/// assert!(!cache.contains(&ResourceKey::name("missing")));
/// ```
#[derive(Debug, Clone)]
pub struct NegativeLookupCache {
    slots: VecDeque<ResourceKey>,
    hits: u64,
}

impl Default for NegativeLookupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NegativeLookupCache {
    pub const CAPACITY: usize = 8;

    pub fn new() -> Self {
        Self {
            slots: VecDeque::with_capacity(Self::CAPACITY),
            hits: 0,
        }
    }

    /// Checks for `key`, promoting it to most recent on a hit.
    pub fn contains(&mut self, key: &ResourceKey) -> bool {
        match self.slots.iter().position(|k| k == key) {
            Some(index) => {
                if index > 0 {
                    if let Some(k) = self.slots.remove(index) {
                        self.slots.push_front(k);
                    }
                }
                self.hits += 1;
                true
            }
            None => false,
        }
    }

    /// Records a miss, evicting the least recently used key when full.
    pub fn insert(&mut self, key: ResourceKey) {
        if self.contains(&key) {
            return;
        }
        if self.slots.len() == Self::CAPACITY {
            self.slots.pop_back();
        }
        self.slots.push_front(key);
    }

    pub fn invalidate(&mut self, key: &ResourceKey) {
        self.slots.retain(|k| k != key);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: usize) -> ResourceKey {
        ResourceKey::name(format!("k{}", i))
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = NegativeLookupCache::new();
        for i in 0..NegativeLookupCache::CAPACITY {
            cache.insert(key(i));
        }
        // Touch the oldest so k1 becomes the eviction candidate.
        assert!(cache.contains(&key(0)));
        cache.insert(key(100));
        assert_eq!(cache.len(), NegativeLookupCache::CAPACITY);
        assert!(cache.contains(&key(0)));
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(100)));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut cache = NegativeLookupCache::new();
        cache.insert(key(1));
        cache.insert(key(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache = NegativeLookupCache::new();
        cache.insert(key(1));
        cache.insert(key(2));
        cache.invalidate(&key(1));
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hits_are_counted() {
        let mut cache = NegativeLookupCache::new();
        cache.insert(key(1));
        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert_eq!(cache.hits(), 1);
    }
}
