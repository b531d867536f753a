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

//! Keyed resource collections.

use crate::cache::NegativeLookupCache;
use crate::deferred::{DeferredMaterializer, Lookup};
use crate::runtime::{Collaborators, LookupScope, ResourceKey, ResourceResolver};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};
use trellis_core::{SourcePos, TrellisError, TrellisResult, Value};

/// A keyed collection of resources with merged and theme dictionaries.
///
/// Entries are either materialized values or still recorded in an attached
/// [`DeferredMaterializer`]. Lookups search, as permitted by
/// [`LookupScope`]: own entries, deferred entries, merged dictionaries (last
/// added first) and finally the active theme dictionary.
#[derive(Debug, Default)]
pub struct ResourceDictionary {
    entries: RefCell<HashMap<ResourceKey, Value>>,
    order: RefCell<Vec<ResourceKey>>,
    deferred: RefCell<Option<Rc<DeferredMaterializer>>>,
    merged: RefCell<Vec<Rc<ResourceDictionary>>>,
    themes: RefCell<Vec<(Rc<str>, Rc<ResourceDictionary>)>>,
    active_theme: RefCell<Option<Rc<str>>>,
    negative: RefCell<NegativeLookupCache>,
    parent: RefCell<Weak<ResourceDictionary>>,
}

impl ResourceDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Structure =====

    /// Adds `child` as a merged dictionary of `self`.
    pub fn add_merged(self: &Rc<Self>, child: Rc<ResourceDictionary>) {
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.merged.borrow_mut().push(child);
        self.invalidate_all();
    }

    pub fn merged(&self) -> Vec<Rc<ResourceDictionary>> {
        self.merged.borrow().clone()
    }

    /// Registers a theme dictionary under `name`, replacing any previous one.
    pub fn add_theme(self: &Rc<Self>, name: impl AsRef<str>, theme: Rc<ResourceDictionary>) {
        let name: Rc<str> = Rc::from(name.as_ref());
        *theme.parent.borrow_mut() = Rc::downgrade(self);
        let mut themes = self.themes.borrow_mut();
        themes.retain(|(n, _)| *n != name);
        themes.push((name, theme));
        drop(themes);
        self.invalidate_all();
    }

    pub fn set_active_theme(&self, name: Option<&str>) {
        *self.active_theme.borrow_mut() = name.map(Rc::from);
        self.invalidate_all();
    }

    pub fn active_theme(&self) -> Option<Rc<ResourceDictionary>> {
        let active = self.active_theme.borrow();
        let name = active.as_ref()?;
        self.themes
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.clone())
    }

    pub fn parent(&self) -> Option<Rc<ResourceDictionary>> {
        self.parent.borrow().upgrade()
    }

    /// Attaches recorded content. Keys already present are rejected.
    pub fn attach_deferred(
        &self,
        materializer: Rc<DeferredMaterializer>,
        pos: SourcePos,
    ) -> TrellisResult<()> {
        if let Some(key) = self
            .order
            .borrow()
            .iter()
            .find(|k| materializer.contains(k))
        {
            return Err(TrellisError::duplicate(
                format!("resource key '{}' is defined twice", key),
                pos,
            ));
        }
        if self.deferred.borrow().is_some() {
            return Err(TrellisError::runtime(
                "dictionary already has deferred content",
                pos,
            ));
        }
        debug!(pending = materializer.pending_count(), "attached deferred content");
        *self.deferred.borrow_mut() = Some(materializer);
        self.invalidate_all();
        Ok(())
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.borrow().is_some()
    }

    pub fn deferred(&self) -> Option<Rc<DeferredMaterializer>> {
        self.deferred.borrow().clone()
    }

    // ===== Entries =====

    /// Adds an entry. Duplicate keys, materialized or deferred, are rejected.
    pub fn add(&self, key: ResourceKey, value: Value, pos: SourcePos) -> TrellisResult<()> {
        if self.contains_key(&key) {
            return Err(TrellisError::duplicate(
                format!("resource key '{}' is defined twice", key),
                pos,
            ));
        }
        trace!(%key, "added resource");
        self.invalidate_key(&key);
        self.order.borrow_mut().push(key.clone());
        self.entries.borrow_mut().insert(key, value);
        Ok(())
    }

    /// Whether `key` is defined here, materialized or deferred. Merged and
    /// theme dictionaries are not consulted.
    pub fn contains_key(&self, key: &ResourceKey) -> bool {
        self.entries.borrow().contains_key(key)
            || self
                .deferred
                .borrow()
                .as_ref()
                .is_some_and(|m| m.contains(key))
    }

    /// Materialized value of `key`, without expanding anything.
    pub fn get(&self, key: &ResourceKey) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    /// Removes `key` after loading every deferred entry.
    pub fn remove(&self, key: &ResourceKey, cx: &Collaborators<'_>) -> TrellisResult<Option<Value>> {
        self.load_all(cx)?;
        let removed = self.entries.borrow_mut().remove(key);
        if removed.is_some() {
            self.order.borrow_mut().retain(|k| k != key);
            self.invalidate_key(key);
        }
        Ok(removed)
    }

    /// Removes every entry after loading every deferred entry.
    pub fn clear(&self, cx: &Collaborators<'_>) -> TrellisResult<()> {
        self.load_all(cx)?;
        self.entries.borrow_mut().clear();
        self.order.borrow_mut().clear();
        self.invalidate_all();
        Ok(())
    }

    /// Materialized and pending entries.
    pub fn len(&self) -> usize {
        let pending = self
            .deferred
            .borrow()
            .as_ref()
            .map_or(0, |m| m.pending_count());
        self.entries.borrow().len() + pending
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialized keys in insertion order, then pending keys in stream
    /// order.
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys = self.order.borrow().clone();
        if let Some(m) = self.deferred.borrow().as_ref() {
            keys.extend(m.pending_keys());
        }
        keys
    }

    /// Expands every deferred entry.
    pub fn load_all(&self, cx: &Collaborators<'_>) -> TrellisResult<()> {
        let Some(materializer) = self.deferred() else {
            return Ok(());
        };
        for (key, value) in materializer.load_all(self, cx)? {
            self.store_materialized(key, value);
        }
        self.release_drained();
        Ok(())
    }

    // ===== Lookup =====

    /// Looks `key` up within `scope`.
    pub fn lookup(
        &self,
        key: &ResourceKey,
        scope: LookupScope,
        cx: &Collaborators<'_>,
    ) -> TrellisResult<Option<Value>> {
        Ok(self.resolve(key, scope, cx)?.into_value())
    }

    /// Like [`lookup`](Self::lookup) but tells an absent key from a refused one.
    pub fn resolve(
        &self,
        key: &ResourceKey,
        scope: LookupScope,
        cx: &Collaborators<'_>,
    ) -> TrellisResult<Lookup> {
        if let Some(value) = self.get(key) {
            return Ok(Lookup::Found(value));
        }
        if self.negative.borrow_mut().contains(key) {
            trace!(%key, "negative cache hit");
            return Ok(Lookup::Absent);
        }

        let mut refused = false;
        if let Some(materializer) = self.deferred() {
            match materializer.resolve(key, self, cx)? {
                Lookup::Found(value) => {
                    self.store_materialized(key.clone(), value.clone());
                    self.release_drained();
                    return Ok(Lookup::Found(value));
                }
                Lookup::Refused => refused = true,
                Lookup::Absent => {}
            }
        }

        if scope.includes_merged() {
            for merged in self.merged().iter().rev() {
                match merged.resolve(key, scope, cx)? {
                    Lookup::Found(value) => return Ok(Lookup::Found(value)),
                    Lookup::Refused => refused = true,
                    Lookup::Absent => {}
                }
            }
        }

        if scope.includes_themes() {
            if let Some(theme) = self.active_theme() {
                match theme.resolve(key, scope, cx)? {
                    Lookup::Found(value) => return Ok(Lookup::Found(value)),
                    Lookup::Refused => refused = true,
                    Lookup::Absent => {}
                }
            }
        }

        if refused {
            return Ok(Lookup::Refused);
        }
        // Only a miss over the widest scope says anything about narrower ones.
        if scope == LookupScope::All {
            self.negative.borrow_mut().insert(key.clone());
        }
        Ok(Lookup::Absent)
    }

    pub fn negative_cache_len(&self) -> usize {
        self.negative.borrow().len()
    }

    fn store_materialized(&self, key: ResourceKey, value: Value) {
        let mut entries = self.entries.borrow_mut();
        if !entries.contains_key(&key) {
            self.order.borrow_mut().push(key.clone());
        }
        entries.insert(key, value);
    }

    /// Drops the materializer once nothing is left to expand.
    fn release_drained(&self) {
        let drained = self
            .deferred
            .borrow()
            .as_ref()
            .is_some_and(|m| m.pending_count() == 0 && !m.has_in_progress());
        if drained {
            debug!("all deferred entries materialized, releasing recording");
            *self.deferred.borrow_mut() = None;
        }
    }

    /// Invalidates `key` here and in every ancestor.
    fn invalidate_key(&self, key: &ResourceKey) {
        self.negative.borrow_mut().invalidate(key);
        let mut parent = self.parent();
        while let Some(dict) = parent {
            dict.negative.borrow_mut().invalidate(key);
            parent = dict.parent();
        }
        trace!(%key, "invalidated negative lookups");
    }

    fn invalidate_all(&self) {
        self.negative.borrow_mut().clear();
        let mut parent = self.parent();
        while let Some(dict) = parent {
            dict.negative.borrow_mut().clear();
            parent = dict.parent();
        }
    }
}

impl ResourceResolver for ResourceDictionary {
    fn lookup(
        &self,
        key: &ResourceKey,
        scope: LookupScope,
        cx: &Collaborators<'_>,
    ) -> TrellisResult<Option<Value>> {
        ResourceDictionary::lookup(self, key, scope, cx)
    }
}
