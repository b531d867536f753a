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

//! On-demand materialization of recorded dictionary entries.
//!
//! A [`DeferredMaterializer`] owns the [`NodeStream`] recorded for a
//! dictionary's content. A single pre-scan splits the top-level entries
//! into a key map (key to the offset of the entry's `StartObject`) and a
//! list of entries that must be built eagerly.
//!
//! # Lookup boundary
//!
//! A key whose expansion is in progress is always refused, which stops an
//! entry from resolving to itself directly or through a cycle. Expanding a
//! key on demand may pull in any other pending sibling, earlier or later.
//!
//! The writer replays the eagerly built entries under a boundary: while the
//! entry at offset `O` is replayed, still-deferred keys recorded at or after
//! `O` are refused, as they would not exist yet in an eager build. The
//! boundary stays in force for expansions triggered from inside that
//! replay. A refused lookup is not a miss: the caller continues with outer
//! scopes.

use crate::dictionary::ResourceDictionary;
use crate::runtime::{Collaborators, ResourceKey};
use crate::scope::ScopeChain;
use crate::settings::WriterSettings;
use crate::writer::GraphWriter;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, trace};
use trellis_core::{
    Directive, ErrorCode, EventKind, MemberRef, PropertyId, SourcePos, TrellisError,
    TrellisResult, TypeRegistry, Value,
};
use trellis_stream::{NodeStream, StreamOffset};

/// Outcome of resolving a key against a materializer.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Value),
    /// The key is not (or no longer) recorded here.
    Absent,
    /// The key exists but is being expanded, or lies behind the boundary
    /// of an eager replay.
    Refused,
}

impl Lookup {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Pre-scan state for one top-level entry.
#[derive(Debug)]
struct EntryScan {
    start: StreamOffset,
    object: Option<StreamOffset>,
    info: Option<(Option<PropertyId>, Option<PropertyId>)>,
    conditional: bool,
    pinned: bool,
    key: Option<ResourceKey>,
    implicit_key: Option<ResourceKey>,
    member: Option<MemberRef>,
}

impl EntryScan {
    fn new(start: StreamOffset) -> Self {
        Self {
            start,
            object: None,
            info: None,
            conditional: false,
            pinned: false,
            key: None,
            implicit_key: None,
            member: None,
        }
    }
}

/// Lazily expands keyed entries of a recorded dictionary.
#[derive(Debug)]
pub struct DeferredMaterializer {
    stream: Rc<NodeStream>,
    settings: WriterSettings,
    keys: RefCell<HashMap<ResourceKey, StreamOffset>>,
    non_deferred: Vec<StreamOffset>,
    entry_count: usize,
    deferred_count: usize,
    materialized: RefCell<HashMap<ResourceKey, Value>>,
    in_progress: RefCell<HashSet<ResourceKey>>,
    boundary: Cell<Option<StreamOffset>>,
}

impl DeferredMaterializer {
    /// Pre-scans `stream` in one forward pass.
    pub fn build(
        stream: Rc<NodeStream>,
        types: &dyn TypeRegistry,
        settings: WriterSettings,
    ) -> TrellisResult<Self> {
        let mut keys = HashMap::new();
        let mut non_deferred = Vec::new();
        let mut entry_count = 0;
        let mut depth = 0usize;
        // Open conditional scopes; they do not count towards `level`.
        let mut conditionals = 0usize;
        let mut scan: Option<EntryScan> = None;

        let mut cursor = stream.read_cursor();
        while let Some((offset, event)) = cursor.next_with_offset()? {
            let entry = scan.get_or_insert_with(|| EntryScan::new(offset));
            let level = depth - conditionals.min(depth);
            match &event.kind {
                // Around the entry or around one of its members.
                EventKind::StartConditionalScope(_) if level <= 1 => entry.conditional = true,
                EventKind::StartObject { ty, .. } if level == 0 => {
                    entry.object = Some(offset);
                    match types.type_info(*ty) {
                        Some(info) => {
                            entry.pinned |= info.is_dictionary || info.never_deferred;
                            entry.info =
                                Some((info.runtime_name_property, info.implicit_key_property));
                        }
                        None => entry.pinned = true,
                    }
                }
                EventKind::StartMember(member) if level == 1 && entry.object.is_some() => {
                    match member {
                        MemberRef::Directive(Directive::Name)
                        | MemberRef::Directive(Directive::ConnectionId) => entry.pinned = true,
                        MemberRef::Property(p) => {
                            if matches!(entry.info, Some((Some(name), _)) if name == *p) {
                                entry.pinned = true;
                            }
                        }
                        _ => {}
                    }
                    entry.member = Some(member.clone());
                }
                EventKind::Value(text) if level == 2 => match &entry.member {
                    Some(MemberRef::Directive(Directive::Key)) => {
                        entry.key = Some(ResourceKey::Name(text.clone()));
                    }
                    Some(MemberRef::Property(p))
                        if matches!(entry.info, Some((_, Some(implicit))) if implicit == *p) =>
                    {
                        entry.implicit_key = Some(ResourceKey::Type(text.clone()));
                    }
                    _ => {}
                },
                EventKind::EndMember if level == 2 => entry.member = None,
                _ => {}
            }

            match event.kind {
                EventKind::StartConditionalScope(_) => conditionals += 1,
                EventKind::EndConditionalScope => conditionals = conditionals.saturating_sub(1),
                _ => {}
            }
            if event.is_start() {
                depth += 1;
            } else if event.is_end() {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    TrellisError::structural(
                        ErrorCode::CorruptStream,
                        "recorded content closes more scopes than it opens",
                        event.pos,
                    )
                })?;
            }

            let closes_entry = depth == 0
                && (event.is_end() || matches!(event.kind, EventKind::Value(_)));
            if !closes_entry {
                continue;
            }
            if let Some(entry) = scan.take() {
                entry_count += 1;
                let key = entry.key.or(entry.implicit_key);
                match (entry.object, key) {
                    (Some(object), Some(key)) if !entry.pinned && !entry.conditional => {
                        if keys.insert(key.clone(), object).is_some() {
                            return Err(TrellisError::duplicate(
                                format!("resource key '{}' is defined twice", key),
                                event.pos,
                            ));
                        }
                    }
                    _ => non_deferred.push(entry.start),
                }
            }
        }

        drop(cursor);
        if depth != 0 {
            return Err(TrellisError::structural(
                ErrorCode::CorruptStream,
                "recorded content ends inside an entry",
                SourcePos::default(),
            ));
        }

        let deferred_count = keys.len();
        debug!(
            entries = entry_count,
            deferred = deferred_count,
            eager = non_deferred.len(),
            "pre-scanned dictionary content"
        );
        Ok(Self {
            stream,
            settings,
            keys: RefCell::new(keys),
            non_deferred,
            entry_count,
            deferred_count,
            materialized: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
            boundary: Cell::new(None),
        })
    }

    pub fn stream(&self) -> &Rc<NodeStream> {
        &self.stream
    }

    /// Number of top-level entries in the recording.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Number of entries that were deferred at build time.
    pub fn deferred_count(&self) -> usize {
        self.deferred_count
    }

    /// Keys still waiting to be materialized.
    pub fn pending_count(&self) -> usize {
        self.keys.borrow().len()
    }

    /// Start offsets of the entries built eagerly.
    pub fn non_deferred(&self) -> &[StreamOffset] {
        &self.non_deferred
    }

    /// Whether `key` is pending or was materialized here.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.keys.borrow().contains_key(key) || self.materialized.borrow().contains_key(key)
    }

    pub fn is_pending(&self, key: &ResourceKey) -> bool {
        self.keys.borrow().contains_key(key)
    }

    pub fn is_in_progress(&self, key: &ResourceKey) -> bool {
        self.in_progress.borrow().contains(key)
    }

    pub fn has_in_progress(&self) -> bool {
        !self.in_progress.borrow().is_empty()
    }

    /// Pending keys in stream order.
    pub fn pending_keys(&self) -> Vec<ResourceKey> {
        let keys = self.keys.borrow();
        let mut pending: Vec<_> = keys.iter().map(|(k, o)| (*o, k.clone())).collect();
        pending.sort_by_key(|(offset, _)| *offset);
        pending.into_iter().map(|(_, k)| k).collect()
    }

    pub fn boundary(&self) -> Option<StreamOffset> {
        self.boundary.get()
    }

    /// Runs `f` with the lookup boundary set to `offset`, restoring the
    /// previous boundary afterwards. Used while replaying eagerly built
    /// entries.
    pub fn with_boundary<T>(&self, offset: StreamOffset, f: impl FnOnce() -> T) -> T {
        let previous = self.boundary.replace(Some(offset));
        let result = f();
        self.boundary.set(previous);
        result
    }

    fn is_behind_boundary(&self, offset: StreamOffset) -> bool {
        matches!(self.boundary.get(), Some(boundary) if offset >= boundary)
    }

    /// Resolves `key`, expanding it if it is pending and visible.
    ///
    /// `owner` is the dictionary the recording belongs to; lookups made while
    /// expanding search it before the outer resolver in `cx`.
    pub fn resolve(
        &self,
        key: &ResourceKey,
        owner: &ResourceDictionary,
        cx: &Collaborators<'_>,
    ) -> TrellisResult<Lookup> {
        if let Some(value) = self.materialized.borrow().get(key) {
            return Ok(Lookup::Found(value.clone()));
        }
        if self.in_progress.borrow().contains(key) {
            trace!(%key, "refused: expansion in progress");
            return Ok(Lookup::Refused);
        }
        let Some(offset) = self.keys.borrow().get(key).copied() else {
            return Ok(Lookup::Absent);
        };
        if self.is_behind_boundary(offset) {
            trace!(%key, %offset, "refused: behind lookup boundary");
            return Ok(Lookup::Refused);
        }

        self.keys.borrow_mut().remove(key);
        self.in_progress.borrow_mut().insert(key.clone());
        let result = self.expand(offset, owner, cx);
        self.in_progress.borrow_mut().remove(key);

        match result {
            Ok(value) => {
                debug!(%key, %offset, "materialized deferred entry");
                self.materialized
                    .borrow_mut()
                    .insert(key.clone(), value.clone());
                Ok(Lookup::Found(value))
            }
            Err(err) => {
                self.keys.borrow_mut().insert(key.clone(), offset);
                Err(err.with_context(format!("while loading resource '{}'", key)))
            }
        }
    }

    /// Loads `key`; `None` when it is absent or refused.
    pub fn load(
        &self,
        key: &ResourceKey,
        owner: &ResourceDictionary,
        cx: &Collaborators<'_>,
    ) -> TrellisResult<Option<Value>> {
        Ok(self.resolve(key, owner, cx)?.into_value())
    }

    /// Expands every pending key in stream order.
    ///
    /// The map is queried again after each expansion since expanding one
    /// entry may materialize others. Keys refused under an active boundary
    /// are left pending.
    pub fn load_all(
        &self,
        owner: &ResourceDictionary,
        cx: &Collaborators<'_>,
    ) -> TrellisResult<Vec<(ResourceKey, Value)>> {
        let mut loaded = Vec::new();
        let mut refused = HashSet::new();
        loop {
            let next = {
                let keys = self.keys.borrow();
                keys.iter()
                    .filter(|(k, _)| !refused.contains(*k))
                    .min_by_key(|(_, offset)| **offset)
                    .map(|(k, _)| k.clone())
            };
            let Some(key) = next else { break };
            match self.resolve(&key, owner, cx)? {
                Lookup::Found(value) => loaded.push((key, value)),
                Lookup::Refused | Lookup::Absent => {
                    refused.insert(key);
                }
            }
        }
        debug!(loaded = loaded.len(), left = self.pending_count(), "loaded all deferred entries");
        Ok(loaded)
    }

    /// Replays one entry through a fresh writer.
    fn expand(
        &self,
        offset: StreamOffset,
        owner: &ResourceDictionary,
        cx: &Collaborators<'_>,
    ) -> TrellisResult<Value> {
        let chain = ScopeChain::new().with_scope(owner).with_outer(cx.resources);
        let scoped = cx.with_resources(&chain);
        let mut writer = GraphWriter::new(scoped, self.settings.clone());
        writer.replay(&self.stream, offset)?;
        writer.finish()
    }
}
