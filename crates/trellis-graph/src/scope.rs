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

//! Ordered chains of resource scopes.

use crate::dictionary::ResourceDictionary;
use crate::runtime::{Collaborators, LookupScope, ResourceKey, ResourceResolver};
use smallvec::SmallVec;
use trellis_core::{TrellisResult, Value};

/// Searches a list of dictionaries in order, then an optional outer resolver.
///
/// Deferred expansions run with a chain whose first scope is the dictionary
/// that owns the recording, so an entry can reference its earlier siblings
/// before falling back to application-level resources.
#[derive(Default)]
pub struct ScopeChain<'a> {
    scopes: SmallVec<[&'a ResourceDictionary; 4]>,
    outer: Option<&'a dyn ResourceResolver>,
}

impl<'a> ScopeChain<'a> {
    pub fn new() -> Self {
        Self {
            scopes: SmallVec::new(),
            outer: None,
        }
    }

    /// Appends a scope searched after the ones already in the chain.
    pub fn with_scope(mut self, dictionary: &'a ResourceDictionary) -> Self {
        self.scopes.push(dictionary);
        self
    }

    pub fn with_outer(mut self, outer: &'a dyn ResourceResolver) -> Self {
        self.outer = Some(outer);
        self
    }

    pub fn push(&mut self, dictionary: &'a ResourceDictionary) {
        self.scopes.push(dictionary);
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty() && self.outer.is_none()
    }
}

impl ResourceResolver for ScopeChain<'_> {
    fn lookup(
        &self,
        key: &ResourceKey,
        scope: LookupScope,
        cx: &Collaborators<'_>,
    ) -> TrellisResult<Option<Value>> {
        for dictionary in &self.scopes {
            if let Some(value) = dictionary.lookup(key, scope, cx)? {
                return Ok(Some(value));
            }
        }
        match self.outer {
            Some(outer) => outer.lookup(key, scope, cx),
            None => Ok(None),
        }
    }
}
