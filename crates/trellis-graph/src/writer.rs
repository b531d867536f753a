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

//! The graph writer: canonical events to live objects.
//!
//! The writer keeps one explicit frame per open object and member. Object
//! creation is lazy: an instance is created when its first real member
//! opens, or when the object closes. Objects that only receive text through
//! `Initialization` are never created at all; the converted value stands in
//! for them.
//!
//! # Dictionaries
//!
//! When the `Items` member of a dictionary backed by a
//! [`ResourceDictionary`] opens, the writer records the member's content
//! into a [`NodeStream`] instead of building it. When the member closes,
//! the recording is pre-scanned by a [`DeferredMaterializer`]; keyed
//! entries stay recorded until they are looked up and the rest is built
//! right away. A [`DeferralPolicy`](crate::DeferralPolicy) that rejects the
//! recording gets it replayed in full.

use crate::deferred::DeferredMaterializer;
use crate::dictionary::ResourceDictionary;
use crate::runtime::{Collaborators, ExtensionArgs, LookupScope, ResourceKey};
use crate::settings::WriterSettings;
use smallvec::SmallVec;
use std::rc::Rc;
use tracing::{debug, trace, warn};
use trellis_core::{
    CanonicalEvent, CollaboratorError, Directive, ErrorCode, EventBalance, EventKind,
    ExtensionKind, ImplicitMember, InstanceHandle, MemberRef, PropertyId, SourcePos,
    TrellisError, TrellisResult, TypeId, Value,
};
use trellis_stream::{NodeStream, StreamOffset};

#[derive(Debug)]
struct ObjectFrame {
    ty: TypeId,
    instance: Option<InstanceHandle>,
    /// Value produced by text initialization.
    initial: Option<Value>,
    retrieved: bool,
    extension: Option<(ExtensionKind, ExtensionArgs)>,
    key: Option<ResourceKey>,
    implicit_key: Option<ResourceKey>,
    assigned: SmallVec<[MemberRef; 8]>,
}

impl ObjectFrame {
    fn new(ty: TypeId) -> Self {
        Self {
            ty,
            instance: None,
            initial: None,
            retrieved: false,
            extension: None,
            key: None,
            implicit_key: None,
            assigned: SmallVec::new(),
        }
    }
}

#[derive(Debug)]
enum Frame {
    Object(ObjectFrame),
    Member(MemberRef),
}

/// A value arriving at the member on top of the stack.
#[derive(Debug)]
enum Incoming {
    /// Literal text, converted to the member's type on assignment.
    Text(Rc<str>),
    /// A finished object or an evaluated extension.
    Value(Value),
}

impl Incoming {
    fn into_value(self) -> Value {
        match self {
            Incoming::Text(text) => Value::String(text),
            Incoming::Value(value) => value,
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            Incoming::Text(text) => Some(text),
            Incoming::Value(value) => value.as_str(),
        }
    }
}

#[derive(Debug)]
struct Recording {
    stream: NodeStream,
    depth: usize,
    dictionary: Rc<ResourceDictionary>,
    pos: SourcePos,
}

fn runtime_error(err: CollaboratorError, pos: SourcePos, context: String) -> TrellisError {
    TrellisError::runtime(err.message, pos).with_context(context)
}

/// Builds an object graph from canonical events.
pub struct GraphWriter<'a> {
    cx: Collaborators<'a>,
    settings: WriterSettings,
    frames: Vec<Frame>,
    balance: EventBalance,
    skip_depth: usize,
    recording: Option<Recording>,
    result: Option<Value>,
    poisoned: bool,
    last_pos: SourcePos,
}

impl<'a> GraphWriter<'a> {
    pub fn new(cx: Collaborators<'a>, settings: WriterSettings) -> Self {
        Self {
            cx,
            settings,
            frames: Vec::new(),
            balance: EventBalance::new(),
            skip_depth: 0,
            recording: None,
            result: None,
            poisoned: false,
            last_pos: SourcePos::default(),
        }
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// Number of open objects and members.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// The root value, once the root object has closed.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Writes one event.
    ///
    /// Any failure poisons the writer; the partial graph is dropped and
    /// every later call fails.
    pub fn write(&mut self, event: &CanonicalEvent) -> TrellisResult<()> {
        self.ensure_usable(event.pos)?;
        self.last_pos = event.pos;
        let outcome = match self.balance.check(event) {
            Ok(()) => self.process(event),
            Err(err) => Err(err),
        };
        self.poison_on_error(outcome)
    }

    pub fn write_all<'e>(
        &mut self,
        events: impl IntoIterator<Item = &'e CanonicalEvent>,
    ) -> TrellisResult<()> {
        for event in events {
            self.write(event)?;
        }
        Ok(())
    }

    /// Replays the entry recorded at `offset` up to its matching end.
    pub fn replay(&mut self, stream: &NodeStream, offset: StreamOffset) -> TrellisResult<()> {
        self.ensure_usable(self.last_pos)?;
        let outcome = self.replay_entry(stream, offset);
        self.poison_on_error(outcome)
    }

    /// Returns the root value.
    pub fn finish(self) -> TrellisResult<Value> {
        self.ensure_usable(self.last_pos)?;
        if !self.frames.is_empty() || self.recording.is_some() {
            return Err(TrellisError::structural(
                ErrorCode::UnexpectedEof,
                format!("{} scopes left open", self.frames.len()),
                self.last_pos,
            ));
        }
        self.result.ok_or_else(|| {
            TrellisError::structural(
                ErrorCode::UnexpectedEof,
                "no root object was written",
                self.last_pos,
            )
        })
    }

    fn ensure_usable(&self, pos: SourcePos) -> TrellisResult<()> {
        if self.poisoned {
            return Err(TrellisError::structural(
                ErrorCode::WriterPoisoned,
                "writer failed earlier and cannot continue",
                pos,
            ));
        }
        Ok(())
    }

    fn poison_on_error(&mut self, outcome: TrellisResult<()>) -> TrellisResult<()> {
        if let Err(err) = &outcome {
            debug!(error = %err, depth = self.frames.len(), "write failed, discarding partial graph");
            self.poisoned = true;
            self.frames.clear();
            self.recording = None;
        }
        outcome
    }

    // ===== Dispatch =====

    fn process(&mut self, event: &CanonicalEvent) -> TrellisResult<()> {
        if self.recording.is_some() {
            return self.record(event);
        }
        if self.skip_depth > 0 {
            match event.kind {
                EventKind::StartConditionalScope(_) => self.skip_depth += 1,
                EventKind::EndConditionalScope => self.skip_depth -= 1,
                _ => {}
            }
            return Ok(());
        }

        let pos = event.pos;
        match &event.kind {
            EventKind::StartObject { ty, retrieved } => self.start_object(*ty, *retrieved, pos),
            EventKind::EndObject => self.end_object(pos),
            EventKind::StartMember(member) => self.start_member(member, pos),
            EventKind::EndMember => self.end_member(pos),
            EventKind::Namespace { prefix, namespace } => {
                trace!(%prefix, %namespace, "namespace declaration");
                Ok(())
            }
            EventKind::Value(text) => self.deliver(Incoming::Text(text.clone()), None, pos),
            EventKind::StartConditionalScope(predicate) => {
                let holds = self.cx.conditions.evaluate(predicate).map_err(|e| {
                    runtime_error(e, pos, format!("while evaluating {}", predicate))
                })?;
                if !holds {
                    trace!(%predicate, "predicate is false, skipping scope");
                    self.skip_depth = 1;
                }
                Ok(())
            }
            EventKind::EndConditionalScope => Ok(()),
        }
    }

    fn replay_entry(&mut self, stream: &NodeStream, offset: StreamOffset) -> TrellisResult<()> {
        let mut cursor = stream.read_cursor();
        cursor.seek(offset)?;
        let mut depth = 0usize;
        while let Some(event) = cursor.next_event()? {
            if event.is_start() {
                depth += 1;
            } else if event.is_end() {
                depth = depth.saturating_sub(1);
            }
            self.last_pos = event.pos;
            self.process(&event)?;
            if depth == 0 && (event.is_end() || matches!(event.kind, EventKind::Value(_))) {
                break;
            }
        }
        Ok(())
    }

    // ===== Recording =====

    fn record(&mut self, event: &CanonicalEvent) -> TrellisResult<()> {
        let Some(recording) = self.recording.as_mut() else {
            return Ok(());
        };
        if recording.depth == 0 && matches!(event.kind, EventKind::EndMember) {
            if let Some(recording) = self.recording.take() {
                self.finish_recording(recording)?;
            }
            return self.end_member(event.pos);
        }
        if event.is_start() {
            recording.depth += 1;
        } else if event.is_end() {
            recording.depth = recording.depth.saturating_sub(1);
        }
        recording.stream.encode(event)?;
        Ok(())
    }

    fn finish_recording(&mut self, recording: Recording) -> TrellisResult<()> {
        let Recording {
            stream,
            dictionary,
            pos,
            ..
        } = recording;
        let stream = Rc::new(stream);
        let materializer =
            DeferredMaterializer::build(stream.clone(), self.cx.types, self.settings.clone())?;

        let accepted = self.settings.deferral.accepts(
            stream.record_count(),
            materializer.entry_count(),
            materializer.deferred_count(),
        );
        if !accepted {
            debug!(
                records = stream.record_count(),
                "deferral declined, building dictionary content now"
            );
            let mut cursor = stream.read_cursor();
            while let Some(event) = cursor.next_event()? {
                self.last_pos = event.pos;
                self.process(&event)?;
            }
            return Ok(());
        }

        let materializer = Rc::new(materializer);
        dictionary.attach_deferred(materializer.clone(), pos)?;
        debug!(
            deferred = materializer.deferred_count(),
            eager = materializer.non_deferred().len(),
            "deferred dictionary content"
        );
        for &offset in materializer.non_deferred() {
            materializer.with_boundary(offset, || self.replay_entry(&stream, offset))?;
        }
        Ok(())
    }

    // ===== Objects and members =====

    fn object_mut(&mut self, index: usize, pos: SourcePos) -> TrellisResult<&mut ObjectFrame> {
        match self.frames.get_mut(index) {
            Some(Frame::Object(object)) => Ok(object),
            _ => Err(TrellisError::structural(
                ErrorCode::UnbalancedEvents,
                "expected an open object",
                pos,
            )),
        }
    }

    /// Index of the object owning the member on top of the stack.
    fn member_owner(&self, pos: SourcePos) -> TrellisResult<(usize, MemberRef)> {
        match self.frames.last() {
            Some(Frame::Member(member)) if self.frames.len() >= 2 => {
                Ok((self.frames.len() - 2, member.clone()))
            }
            _ => Err(TrellisError::structural(
                ErrorCode::UnbalancedEvents,
                "value outside a member",
                pos,
            )),
        }
    }

    fn ensure_instance(&mut self, index: usize, pos: SourcePos) -> TrellisResult<InstanceHandle> {
        let cx = self.cx;
        let object = self.object_mut(index, pos)?;
        if let Some(instance) = object.instance {
            return Ok(instance);
        }
        if let Some(initial) = object.initial.take() {
            let Some(instance) = initial.as_object() else {
                return Err(TrellisError::structural(
                    ErrorCode::InvalidContent,
                    format!(
                        "{} was initialized from text and cannot take members",
                        cx.type_name(object.ty)
                    ),
                    pos,
                ));
            };
            object.instance = Some(instance);
            return Ok(instance);
        }
        let ty = object.ty;
        let instance = cx.types.create(ty).map_err(|e| {
            runtime_error(e, pos, format!("while creating {}", cx.type_name(ty)))
        })?;
        trace!(%instance, ty = ty.0, "created instance");
        object.instance = Some(instance);
        Ok(instance)
    }

    fn start_object(&mut self, ty: TypeId, retrieved: bool, pos: SourcePos) -> TrellisResult<()> {
        let cx = self.cx;
        let info = cx.types.type_info(ty).ok_or_else(|| {
            TrellisError::unresolved(format!("type {} is not registered", ty.0), pos)
        })?;
        let mut frame = ObjectFrame::new(ty);
        if retrieved {
            let (owner, member) = self.member_owner(pos)?;
            let Some(property) = member.property() else {
                return Err(TrellisError::structural(
                    ErrorCode::UnexpectedNode,
                    format!("cannot retrieve an object from {}", member),
                    pos,
                ));
            };
            let instance = self.ensure_instance(owner, pos)?;
            let current = cx.runtime.get_value(instance, property).map_err(|e| {
                runtime_error(e, pos, format!("while reading {}", cx.member_name(&member)))
            })?;
            let handle = current.as_object().ok_or_else(|| {
                TrellisError::runtime(
                    format!("{} does not hold an object to add to", cx.member_name(&member)),
                    pos,
                )
            })?;
            trace!(%handle, "retrieved object from member");
            frame.instance = Some(handle);
            frame.retrieved = true;
        } else if let Some(kind) = info.extension {
            frame.extension = Some((kind, ExtensionArgs::new()));
        }
        self.frames.push(Frame::Object(frame));
        Ok(())
    }

    fn needs_instance(member: &MemberRef) -> bool {
        !matches!(
            member,
            MemberRef::Directive(Directive::Key)
                | MemberRef::Implicit(ImplicitMember::Initialization)
                | MemberRef::Implicit(ImplicitMember::PositionalParameters)
                | MemberRef::Implicit(ImplicitMember::UnknownContent)
                | MemberRef::Unknown(_)
        )
    }

    fn start_member(&mut self, member: &MemberRef, pos: SourcePos) -> TrellisResult<()> {
        let cx = self.cx;
        let check = self.settings.check_duplicate_members;
        let index = match self.frames.last() {
            Some(Frame::Object(_)) => self.frames.len() - 1,
            _ => {
                return Err(TrellisError::structural(
                    ErrorCode::UnbalancedEvents,
                    format!("{} outside an object", member),
                    pos,
                ))
            }
        };

        let object = self.object_mut(index, pos)?;
        if matches!(member, MemberRef::Property(_) | MemberRef::Directive(_)) {
            if check && object.assigned.contains(member) {
                return Err(TrellisError::duplicate(
                    format!(
                        "{} is set more than once on {}",
                        cx.member_name(member),
                        cx.type_name(object.ty)
                    ),
                    pos,
                ));
            }
            object.assigned.push(member.clone());
        }
        let is_extension = object.extension.is_some();

        if !is_extension && Self::needs_instance(member) {
            let instance = self.ensure_instance(index, pos)?;
            if member.is_items() && self.settings.deferral.enabled {
                if let Some(dictionary) = cx.runtime.resource_dictionary(instance) {
                    if !dictionary.has_deferred() {
                        debug!(%instance, "recording dictionary content");
                        self.frames.push(Frame::Member(member.clone()));
                        self.recording = Some(Recording {
                            stream: NodeStream::new(),
                            depth: 0,
                            dictionary,
                            pos,
                        });
                        return Ok(());
                    }
                }
            }
        }
        self.frames.push(Frame::Member(member.clone()));
        Ok(())
    }

    fn end_member(&mut self, pos: SourcePos) -> TrellisResult<()> {
        match self.frames.last() {
            Some(Frame::Member(_)) => {
                self.frames.pop();
                Ok(())
            }
            _ => Err(TrellisError::structural(
                ErrorCode::UnbalancedEvents,
                "EndMember without an open member",
                pos,
            )),
        }
    }

    fn end_object(&mut self, pos: SourcePos) -> TrellisResult<()> {
        let frame = match self.frames.pop() {
            Some(Frame::Object(frame)) => frame,
            other => {
                self.frames.extend(other);
                return Err(TrellisError::structural(
                    ErrorCode::UnbalancedEvents,
                    "EndObject without an open object",
                    pos,
                ));
            }
        };
        let ObjectFrame {
            ty,
            instance,
            initial,
            retrieved,
            extension,
            key,
            implicit_key,
            ..
        } = frame;

        if retrieved {
            // Already in place on its owner.
            if self.frames.is_empty() {
                self.result = instance.map(Value::Object);
            }
            return Ok(());
        }

        let value = if let Some((kind, args)) = extension {
            self.evaluate_extension(ty, kind, args, pos)?
        } else if let Some(instance) = instance {
            Value::Object(instance)
        } else if let Some(initial) = initial {
            initial
        } else {
            let cx = self.cx;
            let instance = cx.types.create(ty).map_err(|e| {
                runtime_error(e, pos, format!("while creating {}", cx.type_name(ty)))
            })?;
            trace!(%instance, ty = ty.0, "created instance");
            Value::Object(instance)
        };

        if self.frames.is_empty() {
            debug!(root = %value, "object graph complete");
            self.result = Some(value);
            return Ok(());
        }
        self.deliver(Incoming::Value(value), key.or(implicit_key), pos)
    }

    // ===== Assignment =====

    fn deliver(
        &mut self,
        incoming: Incoming,
        key: Option<ResourceKey>,
        pos: SourcePos,
    ) -> TrellisResult<()> {
        let (owner, member) = self.member_owner(pos)?;
        let object = self.object_mut(owner, pos)?;
        if let Some((_, args)) = object.extension.as_mut() {
            match member {
                MemberRef::Implicit(ImplicitMember::PositionalParameters) => {
                    args.positional.push(incoming.into_value())
                }
                MemberRef::Directive(Directive::Key) => object.key = Some(Self::key_of(&incoming, pos)?),
                other => args.named.push((other, incoming.into_value())),
            }
            return Ok(());
        }

        match member {
            MemberRef::Property(property) => self.set_property(owner, property, incoming, pos),
            MemberRef::Directive(directive) => {
                self.apply_directive(owner, directive, incoming, pos)
            }
            MemberRef::Implicit(ImplicitMember::Items) => self.add_item(owner, incoming, key, pos),
            MemberRef::Implicit(ImplicitMember::Initialization) => {
                self.initialize(owner, incoming, pos)
            }
            MemberRef::Implicit(ImplicitMember::PositionalParameters) => {
                Err(TrellisError::structural(
                    ErrorCode::InvalidContent,
                    "positional parameters outside a markup extension",
                    pos,
                ))
            }
            member @ (MemberRef::Implicit(ImplicitMember::UnknownContent)
            | MemberRef::Unknown(_)) => {
                if self.settings.tolerate_unknown_members {
                    warn!(%member, %pos, "dropping value of unknown member");
                    Ok(())
                } else {
                    Err(TrellisError::unresolved(format!("cannot assign {}", member), pos))
                }
            }
        }
    }

    fn key_of(incoming: &Incoming, pos: SourcePos) -> TrellisResult<ResourceKey> {
        incoming
            .text()
            .map(ResourceKey::name)
            .ok_or_else(|| TrellisError::conversion("x:Key must be text", pos))
    }

    fn set_property(
        &mut self,
        owner: usize,
        property: PropertyId,
        incoming: Incoming,
        pos: SourcePos,
    ) -> TrellisResult<()> {
        let cx = self.cx;
        let info = cx.properties.property_info(property).ok_or_else(|| {
            TrellisError::unresolved(format!("property {} is not registered", property.0), pos)
        })?;
        let instance = self.ensure_instance(owner, pos)?;
        let object = self.object_mut(owner, pos)?;
        let implicit_key_property = cx
            .types
            .type_info(object.ty)
            .and_then(|t| t.implicit_key_property);
        if implicit_key_property == Some(property) {
            object.implicit_key = match &incoming {
                Incoming::Value(Value::Type(ty)) => Some(ResourceKey::of_type(cx.type_name(*ty))),
                other => other.text().map(ResourceKey::of_type),
            };
        }

        let value = match incoming {
            Incoming::Text(text) => cx
                .converter
                .convert(&text, info.property_type)
                .map_err(|e| {
                    TrellisError::conversion(e.message, pos)
                        .with_context(format!("while converting '{}' for {}", text, info.name))
                })?,
            Incoming::Value(value) => value,
        };
        trace!(%instance, property = %info.name, "set member");
        cx.runtime
            .set_value(instance, property, value)
            .map_err(|e| runtime_error(e, pos, format!("while setting {}", info.name)))
    }

    fn apply_directive(
        &mut self,
        owner: usize,
        directive: Directive,
        incoming: Incoming,
        pos: SourcePos,
    ) -> TrellisResult<()> {
        let cx = self.cx;
        if directive == Directive::Key {
            let key = Self::key_of(&incoming, pos)?;
            self.object_mut(owner, pos)?.key = Some(key);
            return Ok(());
        }

        let instance = self.ensure_instance(owner, pos)?;
        let check = self.settings.check_duplicate_members;
        let object = self.object_mut(owner, pos)?;
        let runtime_name = cx
            .types
            .type_info(object.ty)
            .and_then(|t| t.runtime_name_property)
            .filter(|_| directive == Directive::Name);
        let value = incoming.into_value();

        if let Some(property) = runtime_name {
            let member = MemberRef::Property(property);
            if check && object.assigned.contains(&member) {
                return Err(TrellisError::duplicate(
                    format!("x:Name and {} are both set", cx.member_name(&member)),
                    pos,
                ));
            }
            object.assigned.push(member);
            cx.runtime
                .set_value(instance, property, value.clone())
                .map_err(|e| runtime_error(e, pos, "while applying x:Name".to_string()))?;
        }
        cx.runtime
            .apply_directive(instance, directive, &value)
            .map_err(|e| runtime_error(e, pos, format!("while applying x:{}", directive.name())))
    }

    fn add_item(
        &mut self,
        owner: usize,
        incoming: Incoming,
        key: Option<ResourceKey>,
        pos: SourcePos,
    ) -> TrellisResult<()> {
        let cx = self.cx;
        let instance = self.ensure_instance(owner, pos)?;
        let ty = self.object_mut(owner, pos)?.ty;
        let value = incoming.into_value();
        let is_dictionary = cx.types.type_info(ty).is_some_and(|t| t.is_dictionary);
        if !is_dictionary {
            return cx
                .runtime
                .add_item(instance, value)
                .map_err(|e| runtime_error(e, pos, format!("while adding to {}", cx.type_name(ty))));
        }

        let key = key.ok_or_else(|| {
            TrellisError::structural(
                ErrorCode::InvalidContent,
                format!("entry added to {} has no key", cx.type_name(ty)),
                pos,
            )
        })?;
        match cx.runtime.resource_dictionary(instance) {
            Some(dictionary) => dictionary.add(key, value, pos),
            None => cx.runtime.add_entry(instance, key, value).map_err(|e| {
                runtime_error(e, pos, format!("while adding to {}", cx.type_name(ty)))
            }),
        }
    }

    fn initialize(&mut self, owner: usize, incoming: Incoming, pos: SourcePos) -> TrellisResult<()> {
        let cx = self.cx;
        let object = self.object_mut(owner, pos)?;
        if object.instance.is_some() || object.initial.is_some() {
            return Err(TrellisError::structural(
                ErrorCode::InvalidContent,
                format!(
                    "{} cannot be initialized from text after it was built",
                    cx.type_name(object.ty)
                ),
                pos,
            ));
        }
        let ty = object.ty;
        object.initial = Some(match incoming {
            Incoming::Text(text) => cx.converter.convert(&text, ty).map_err(|e| {
                TrellisError::conversion(e.message, pos)
                    .with_context(format!("while converting '{}' to {}", text, cx.type_name(ty)))
            })?,
            Incoming::Value(value) => value,
        });
        Ok(())
    }

    // ===== Extensions and resources =====

    fn evaluate_extension(
        &self,
        ty: TypeId,
        kind: ExtensionKind,
        args: ExtensionArgs,
        pos: SourcePos,
    ) -> TrellisResult<Value> {
        let cx = self.cx;
        match kind {
            ExtensionKind::Null => Ok(Value::Null),
            ExtensionKind::StaticResource | ExtensionKind::ThemeResource => {
                let name = args.first().and_then(Value::as_str).ok_or_else(|| {
                    TrellisError::resource(
                        format!("{} needs a resource key", cx.type_name(ty)),
                        pos,
                    )
                })?;
                let key = ResourceKey::name(name);
                let scope = match kind {
                    ExtensionKind::ThemeResource => LookupScope::All,
                    _ => self.settings.resource_scope,
                };
                match self.resolve_resource(&key, scope)? {
                    Some(value) => {
                        trace!(%key, "resolved resource reference");
                        Ok(value)
                    }
                    None => Err(TrellisError::resource(
                        format!("resource '{}' was not found", key),
                        pos,
                    )),
                }
            }
            ExtensionKind::Custom => cx.evaluator.provide_value(ty, &args, &cx).map_err(|e| {
                runtime_error(e, pos, format!("while evaluating {}", cx.type_name(ty)))
            }),
        }
    }

    /// Searches dictionaries of open objects, innermost first, then the
    /// outer resolver.
    fn resolve_resource(
        &self,
        key: &ResourceKey,
        scope: LookupScope,
    ) -> TrellisResult<Option<Value>> {
        let cx = self.cx;
        for frame in self.frames.iter().rev() {
            let Frame::Object(object) = frame else {
                continue;
            };
            let Some(instance) = object.instance else {
                continue;
            };
            if let Some(dictionary) = cx.runtime.resource_dictionary(instance) {
                if let Some(value) = dictionary.lookup(key, scope, &cx)? {
                    return Ok(Some(value));
                }
            }
        }
        cx.resources.lookup(key, scope, &cx)
    }
}
