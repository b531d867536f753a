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

//! Per-stream intern tables.
//!
//! Each distinct value is stored once and referenced by its index. Small
//! tables are searched linearly; a hash index is built lazily once a table
//! grows past [`LINEAR_THRESHOLD`] entries.

use std::collections::HashMap;
use std::hash::Hash;

/// Entry count above which lookups switch to a hash index.
pub const LINEAR_THRESHOLD: usize = 32;

/// An append-only value to index mapping.
#[derive(Debug, Clone)]
pub struct InternTable<T> {
    entries: Vec<T>,
    index: Option<HashMap<T, u32>>,
}

impl<T> Default for InternTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: None,
        }
    }
}

impl<T: Eq + Hash + Clone> InternTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `value`, if already interned.
    pub fn lookup(&self, value: &T) -> Option<u32> {
        match &self.index {
            Some(map) => map.get(value).copied(),
            None => self
                .entries
                .iter()
                .position(|e| e == value)
                .map(|i| i as u32),
        }
    }

    /// Interns `value` and returns its index. Idempotent.
    pub fn intern(&mut self, value: &T) -> u32 {
        if let Some(existing) = self.lookup(value) {
            return existing;
        }
        let id = self.entries.len() as u32;
        match &mut self.index {
            Some(map) => {
                map.insert(value.clone(), id);
            }
            None if self.entries.len() + 1 > LINEAR_THRESHOLD => {
                let mut map: HashMap<T, u32> = self
                    .entries
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (e.clone(), i as u32))
                    .collect();
                map.insert(value.clone(), id);
                self.index = Some(map);
            }
            None => {}
        }
        self.entries.push(value.clone());
        id
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.entries.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = InternTable::new();
        let a = table.intern(&Rc::<str>::from("Red"));
        let b = table.intern(&Rc::<str>::from("Blue"));
        assert_eq!(table.intern(&Rc::<str>::from("Red")), a);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_get_returns_interned_value() {
        let mut table = InternTable::new();
        let id = table.intern(&7u32);
        assert_eq!(table.get(id), Some(&7));
        assert_eq!(table.get(id + 1), None);
    }

    #[test]
    fn test_hash_index_takes_over_past_threshold() {
        let mut table = InternTable::new();
        for i in 0..(LINEAR_THRESHOLD as u32 * 3) {
            assert_eq!(table.intern(&i), i);
        }
        assert!(table.index.is_some());
        for i in 0..(LINEAR_THRESHOLD as u32 * 3) {
            assert_eq!(table.lookup(&i), Some(i));
        }
        assert_eq!(table.intern(&5), 5);
    }

    #[test]
    fn test_empty_table() {
        let table: InternTable<u32> = InternTable::new();
        assert!(table.is_empty());
        assert_eq!(table.lookup(&1), None);
    }
}
