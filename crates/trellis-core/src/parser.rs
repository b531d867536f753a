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

//! Pull parser: lexical nodes to canonical events.
//!
//! The parser keeps an explicit frame stack that mirrors the events it has
//! opened. Frames that correspond to a source element are *lexical*; the
//! rest (implicit content members, objects retrieved from a member and
//! their `Items` member) are synthesized and closed automatically when
//! the enclosing element ends or a property element starts.
//!
//! Every emitted event passes through an [`EventBalance`], so a defect in
//! the translation surfaces as a `Structural` error instead of an
//! unbalanced stream.

use crate::error::{ErrorCode, TrellisError, TrellisResult};
use crate::event::{CanonicalEvent, EventBalance, EventKind};
use crate::lex::{
    unescape_literal, AttributeNode, DirectiveNode, ElementNode, LexicalNode, LexicalSource,
    MarkupText, NodeKind, NodeTag, PrefixNode, PropertyElementNode, SourcePos, XmlNamespace,
};
use crate::options::ParseOptions;
use crate::schema::{
    is_assignable, ImplicitMember, MemberRef, PropertyRegistry, TypeId, TypeInfo, TypeRegistry,
};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, trace};

/// Parser state, named after the last lexical node consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Start,
    Prefix,
    StartTag,
    Directive,
    Attribute,
    Text,
    EndTag,
    /// Absorbs every transition after a failure.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Object,
    Member,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Object type, or the declared type of a member's value. For `Items`
    /// this is the collection type.
    ty: Option<TypeId>,
    member: Option<MemberRef>,
    lexical: bool,
    conditional: bool,
    attributes_open: bool,
    seen_real_property: bool,
    retrieval_checked: bool,
    content_started: bool,
    previous_child: Option<TypeId>,
}

impl Frame {
    fn object(ty: TypeId, lexical: bool, conditional: bool) -> Self {
        Self {
            kind: FrameKind::Object,
            ty: Some(ty),
            member: None,
            lexical,
            conditional,
            attributes_open: lexical,
            seen_real_property: false,
            retrieval_checked: false,
            content_started: false,
            previous_child: None,
        }
    }

    fn member(member: MemberRef, ty: Option<TypeId>, lexical: bool, conditional: bool) -> Self {
        Self {
            kind: FrameKind::Member,
            ty,
            member: Some(member),
            lexical,
            conditional,
            attributes_open: false,
            seen_real_property: false,
            retrieval_checked: false,
            content_started: false,
            previous_child: None,
        }
    }

    fn is_implicit(&self, which: ImplicitMember) -> bool {
        self.member == Some(MemberRef::Implicit(which))
    }
}

/// What is about to be placed into the current content member.
#[derive(Debug, Clone, Copy)]
enum Incoming {
    Element { ty: TypeId, has_key: bool },
    Text,
}

/// Translates a [`LexicalSource`] into canonical events.
pub struct PullParser<'a, S> {
    source: S,
    types: &'a dyn TypeRegistry,
    properties: &'a dyn PropertyRegistry,
    options: &'a ParseOptions,
    state: ParserState,
    frames: Vec<Frame>,
    pending_prefixes: Vec<(PrefixNode, SourcePos)>,
    out: VecDeque<CanonicalEvent>,
    balance: EventBalance,
    emitted: usize,
    root_closed: bool,
    done: bool,
    error: Option<TrellisError>,
    last_pos: SourcePos,
}

impl<'a, S: LexicalSource> PullParser<'a, S> {
    pub fn new(
        source: S,
        types: &'a dyn TypeRegistry,
        properties: &'a dyn PropertyRegistry,
        options: &'a ParseOptions,
    ) -> Self {
        Self {
            source,
            types,
            properties,
            options,
            state: ParserState::Start,
            frames: Vec::new(),
            pending_prefixes: Vec::new(),
            out: VecDeque::new(),
            balance: EventBalance::new(),
            emitted: 0,
            root_closed: false,
            done: false,
            error: None,
            last_pos: SourcePos::new(1, 1),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Number of events emitted so far.
    pub fn event_count(&self) -> usize {
        self.emitted
    }

    /// Returns the next event, or `None` once the document is complete.
    ///
    /// After a failure every call returns the same error.
    pub fn next_event(&mut self) -> TrellisResult<Option<CanonicalEvent>> {
        loop {
            if let Some(event) = self.out.pop_front() {
                return Ok(Some(event));
            }
            if let Some(err) = &self.error {
                return Err(err.clone());
            }
            if self.done {
                return Ok(None);
            }
            if let Err(err) = self.step() {
                self.state = ParserState::Error;
                self.out.clear();
                self.error = Some(err.clone());
                return Err(err);
            }
        }
    }

    fn step(&mut self) -> TrellisResult<()> {
        let Some(node) = self.source.next_node()? else {
            return self.finish();
        };
        let pos = node.pos;
        self.last_pos = pos;
        match node.kind {
            NodeKind::PrefixDefinition(p) => self.on_prefix(p, pos),
            NodeKind::Element(e) | NodeKind::EmptyElement(e) => self.on_element(e, pos),
            NodeKind::PropertyElement(p) => self.on_property_element(p, pos),
            NodeKind::Attribute(a) => self.on_attribute(a, pos),
            NodeKind::Directive(d) => self.on_directive(d, pos),
            NodeKind::Text(t) => self.on_text(t, pos),
            NodeKind::EndTag => self.on_end_tag(pos),
        }
    }

    fn emit(&mut self, kind: EventKind, pos: SourcePos) -> TrellisResult<()> {
        let event = CanonicalEvent::new(kind, pos);
        self.balance.check(&event)?;
        self.emitted += 1;
        if self.emitted > self.options.limits.max_events {
            return Err(TrellisError::security(
                format!("event count exceeds {}", self.options.limits.max_events),
                pos,
            ));
        }
        self.out.push_back(event);
        Ok(())
    }

    fn unexpected(&self, what: &str, pos: SourcePos) -> TrellisError {
        TrellisError::structural(
            ErrorCode::UnexpectedNode,
            format!("unexpected {} in state {:?}", what, self.state),
            pos,
        )
    }

    fn type_info(&self, ty: TypeId) -> Option<&'a TypeInfo> {
        self.types.type_info(ty)
    }

    fn member_type(&self, member: &MemberRef) -> Option<TypeId> {
        member
            .property()
            .and_then(|p| self.properties.property_info(p))
            .map(|info| info.property_type)
    }

    fn close_attributes(&mut self) {
        if let Some(top) = self.frames.last_mut() {
            top.attributes_open = false;
        }
    }

    fn ensure_no_pending_prefixes(&self, pos: SourcePos) -> TrellisResult<()> {
        if self.pending_prefixes.is_empty() {
            Ok(())
        } else {
            Err(TrellisError::structural(
                ErrorCode::UnexpectedNode,
                "namespace declaration is not followed by an element",
                pos,
            ))
        }
    }

    fn flush_prefixes(&mut self) -> TrellisResult<()> {
        for (p, pos) in std::mem::take(&mut self.pending_prefixes) {
            self.emit(
                EventKind::Namespace {
                    prefix: p.prefix,
                    namespace: p.namespace,
                },
                pos,
            )?;
        }
        Ok(())
    }

    fn open_conditional(&mut self, namespace: &XmlNamespace, pos: SourcePos) -> TrellisResult<bool> {
        match namespace.shared_predicate() {
            Some(predicate) => {
                self.emit(EventKind::StartConditionalScope(predicate.clone()), pos)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ===== Node handlers =====

    fn on_prefix(&mut self, prefix: PrefixNode, pos: SourcePos) -> TrellisResult<()> {
        if self.root_closed {
            return Err(self.unexpected("namespace declaration after the root", pos));
        }
        self.close_attributes();
        self.pending_prefixes.push((prefix, pos));
        self.state = ParserState::Prefix;
        Ok(())
    }

    fn on_element(&mut self, element: ElementNode, pos: SourcePos) -> TrellisResult<()> {
        self.close_attributes();
        if self.frames.is_empty() {
            if self.root_closed {
                return Err(TrellisError::structural(
                    ErrorCode::MultipleRoots,
                    "document has more than one root element",
                    pos,
                ));
            }
        } else {
            self.prepare_content(
                Incoming::Element {
                    ty: element.ty,
                    has_key: element.has_key,
                },
                pos,
            )?;
        }
        let conditional = self.open_conditional(&element.namespace, pos)?;
        self.flush_prefixes()?;
        self.emit(
            EventKind::StartObject {
                ty: element.ty,
                retrieved: false,
            },
            pos,
        )?;
        self.frames.push(Frame::object(element.ty, true, conditional));
        self.state = ParserState::StartTag;
        Ok(())
    }

    fn on_property_element(&mut self, property: PropertyElementNode, pos: SourcePos) -> TrellisResult<()> {
        self.close_attributes();
        if self.frames.is_empty() {
            return Err(TrellisError::structural(
                ErrorCode::PropertyElementAtRoot,
                format!("property element '{}' has no owning object", property.local_name),
                pos,
            ));
        }
        self.pop_implicit_frames(pos)?;
        let Some(top) = self.frames.last_mut() else {
            return Err(self.unexpected("property element", pos));
        };
        if top.kind == FrameKind::Member {
            return Err(TrellisError::structural(
                ErrorCode::NestedPropertyElement,
                format!("property element '{}' cannot nest in another", property.local_name),
                pos,
            ));
        }
        if property.member.property().is_some() {
            top.seen_real_property = true;
        }
        let member_ty = self.member_type(&property.member);
        let conditional = self.open_conditional(&property.namespace, pos)?;
        self.emit(EventKind::StartMember(property.member.clone()), pos)?;
        self.flush_prefixes()?;
        self.frames
            .push(Frame::member(property.member, member_ty, true, conditional));
        self.state = ParserState::StartTag;
        Ok(())
    }

    fn check_attribute_position(&self, what: &str, pos: SourcePos) -> TrellisResult<()> {
        let in_start_tag = matches!(
            self.state,
            ParserState::StartTag | ParserState::Attribute | ParserState::Directive
        );
        let open = self
            .frames
            .last()
            .is_some_and(|f| f.kind == FrameKind::Object && f.attributes_open);
        if in_start_tag && open {
            Ok(())
        } else {
            Err(self.unexpected(what, pos))
        }
    }

    fn on_attribute(&mut self, attribute: AttributeNode, pos: SourcePos) -> TrellisResult<()> {
        self.check_attribute_position("attribute", pos)?;
        let conditional = match &attribute.namespace {
            Some(ns) => self.open_conditional(ns, pos)?,
            None => false,
        };
        let is_property = attribute.member.property().is_some();
        self.emit(EventKind::StartMember(attribute.member), pos)?;
        match attribute.expression {
            Some(nodes) => self.translate_expression(&nodes)?,
            None => self.emit(
                EventKind::Value(Rc::from(unescape_literal(&attribute.value))),
                pos,
            )?,
        }
        self.emit(EventKind::EndMember, pos)?;
        if conditional {
            self.emit(EventKind::EndConditionalScope, pos)?;
        }
        if is_property {
            if let Some(top) = self.frames.last_mut() {
                top.seen_real_property = true;
            }
        }
        self.state = ParserState::Attribute;
        Ok(())
    }

    fn on_directive(&mut self, directive: DirectiveNode, pos: SourcePos) -> TrellisResult<()> {
        self.check_attribute_position("directive", pos)?;
        self.emit(
            EventKind::StartMember(MemberRef::Directive(directive.directive)),
            pos,
        )?;
        match directive.expression {
            Some(nodes) => self.translate_expression(&nodes)?,
            None => self.emit(EventKind::Value(directive.value), pos)?,
        }
        self.emit(EventKind::EndMember, pos)?;
        self.state = ParserState::Directive;
        Ok(())
    }

    fn on_text(&mut self, mut text: MarkupText, pos: SourcePos) -> TrellisResult<()> {
        self.close_attributes();
        self.ensure_no_pending_prefixes(pos)?;
        let Some(top) = self.frames.last() else {
            return Err(TrellisError::structural(
                ErrorCode::InvalidContent,
                "text outside the root element",
                pos,
            ));
        };
        self.state = ParserState::Text;
        let next = self.source.peek_tag()?;
        let at_boundary = matches!(
            next,
            None | Some(NodeTag::EndTag) | Some(NodeTag::PropertyElement)
        );
        let preserved = text.is_preserved();

        if text.is_whitespace_only() && !self.keep_whitespace(top, next, preserved) {
            trace!(%pos, "discarding whitespace");
            return Ok(());
        }

        if !preserved {
            if at_boundary {
                text.trim_end();
            }
            let trim_leading = match top.kind {
                FrameKind::Object => true,
                FrameKind::Member => match top.previous_child {
                    Some(child) => self
                        .type_info(child)
                        .is_some_and(|info| info.trim_surrounding_whitespace),
                    None => true,
                },
            };
            if trim_leading {
                text.trim_start();
            }
            if text.is_empty() {
                return Ok(());
            }
        }

        self.prepare_content(Incoming::Text, pos)?;
        self.emit(EventKind::Value(Rc::from(text.as_str())), pos)?;
        if let Some(top) = self.frames.last_mut() {
            top.content_started = true;
        }
        Ok(())
    }

    fn keep_whitespace(&self, top: &Frame, next: Option<NodeTag>, preserved: bool) -> bool {
        let next_is_element = matches!(
            next,
            Some(NodeTag::Element | NodeTag::EmptyElement | NodeTag::PrefixDefinition)
        );
        match top.kind {
            FrameKind::Object => {
                preserved
                    && top
                        .ty
                        .and_then(|ty| self.type_info(ty))
                        .and_then(|info| info.content_property)
                        .and_then(|p| self.member_type(&MemberRef::Property(p)))
                        .and_then(|ty| self.type_info(ty))
                        .is_some_and(|info| info.is_string)
            }
            FrameKind::Member => {
                if top.is_implicit(ImplicitMember::UnknownContent) {
                    return true;
                }
                let info = top.ty.and_then(|ty| self.type_info(ty));
                let significant = info.is_some_and(|i| i.whitespace_significant);
                if significant && next_is_element {
                    return true;
                }
                preserved && next == Some(NodeTag::EndTag) && info.is_some_and(|i| i.is_string)
            }
        }
    }

    fn on_end_tag(&mut self, pos: SourcePos) -> TrellisResult<()> {
        self.close_attributes();
        self.ensure_no_pending_prefixes(pos)?;
        if self.frames.is_empty() {
            return Err(TrellisError::structural(
                ErrorCode::UnbalancedEvents,
                "end tag without an open element",
                pos,
            ));
        }
        self.pop_implicit_frames(pos)?;
        self.pop_frame(pos)?;
        if self.frames.is_empty() {
            self.root_closed = true;
        }
        self.state = ParserState::EndTag;
        Ok(())
    }

    fn finish(&mut self) -> TrellisResult<()> {
        self.ensure_no_pending_prefixes(self.last_pos)?;
        if !self.frames.is_empty() {
            return Err(TrellisError::structural(
                ErrorCode::UnexpectedEof,
                format!("input ended with {} open scopes", self.frames.len()),
                self.last_pos,
            ));
        }
        self.balance.finish(self.last_pos)?;
        debug!(events = self.emitted, "parse complete");
        self.done = true;
        Ok(())
    }

    // ===== Frame management =====

    /// Closes synthesized frames down to the innermost lexical one.
    fn pop_implicit_frames(&mut self, pos: SourcePos) -> TrellisResult<()> {
        while self.frames.last().is_some_and(|f| !f.lexical) {
            self.pop_frame(pos)?;
        }
        Ok(())
    }

    fn pop_frame(&mut self, pos: SourcePos) -> TrellisResult<()> {
        let Some(frame) = self.frames.pop() else {
            return Err(self.unexpected("end of scope", pos));
        };
        match frame.kind {
            FrameKind::Object => self.emit(EventKind::EndObject, pos)?,
            FrameKind::Member => self.emit(EventKind::EndMember, pos)?,
        }
        if frame.conditional {
            self.emit(EventKind::EndConditionalScope, pos)?;
        }
        if frame.kind == FrameKind::Object {
            if let Some(parent) = self.frames.last_mut() {
                parent.previous_child = frame.ty;
                parent.content_started = true;
            }
        }
        Ok(())
    }

    /// Makes the top frame a member able to receive `incoming`.
    fn prepare_content(&mut self, incoming: Incoming, pos: SourcePos) -> TrellisResult<()> {
        let Some(top) = self.frames.last() else {
            return Err(self.unexpected("content", pos));
        };
        if top.kind == FrameKind::Object {
            let ty = top.ty.ok_or_else(|| self.unexpected("content", pos))?;
            let (member, member_ty) = self.content_member(ty, incoming, top.seen_real_property, pos)?;
            self.emit(EventKind::StartMember(member.clone()), pos)?;
            self.frames.push(Frame::member(member, member_ty, false, false));
        }
        self.check_collection_from_member(incoming, pos)
    }

    /// Picks the implicit member that receives content of an object of `ty`.
    fn content_member(
        &self,
        ty: TypeId,
        incoming: Incoming,
        seen_real_property: bool,
        pos: SourcePos,
    ) -> TrellisResult<(MemberRef, Option<TypeId>)> {
        let Some(info) = self.type_info(ty) else {
            return Err(TrellisError::unresolved(
                format!("type {} is not registered", ty.0),
                pos,
            ));
        };
        let content = info
            .content_property
            .map(|p| (p, self.member_type(&MemberRef::Property(p))));
        let chosen = match incoming {
            Incoming::Element { .. } => match content {
                Some((p, pt)) => Some((MemberRef::Property(p), pt)),
                None if info.is_container() => {
                    Some((MemberRef::Implicit(ImplicitMember::Items), Some(ty)))
                }
                None => None,
            },
            Incoming::Text => {
                let text_content = content.filter(|(_, pt)| {
                    pt.and_then(|t| self.type_info(t))
                        .is_some_and(TypeInfo::accepts_text)
                });
                match text_content {
                    Some((p, pt)) => Some((MemberRef::Property(p), pt)),
                    None if !seen_real_property && info.text_syntax => {
                        Some((MemberRef::Implicit(ImplicitMember::Initialization), None))
                    }
                    None if info.is_container() => {
                        Some((MemberRef::Implicit(ImplicitMember::Items), Some(ty)))
                    }
                    None => None,
                }
            }
        };
        match chosen {
            Some(found) => Ok(found),
            None if self.options.tolerate_unknown_members => {
                tracing::warn!(ty = %info.name, %pos, "content routed to unknown content");
                Ok((MemberRef::Implicit(ImplicitMember::UnknownContent), None))
            }
            None => Err(TrellisError::structural(
                ErrorCode::InvalidContent,
                format!("type '{}' does not accept this content", info.name),
                pos,
            )),
        }
    }

    /// Opens a retrieved collection object plus its `Items` member when the
    /// current member's value is a collection that must be added to rather
    /// than assigned.
    fn check_collection_from_member(&mut self, incoming: Incoming, pos: SourcePos) -> TrellisResult<()> {
        let Some(top) = self.frames.last_mut() else {
            return Ok(());
        };
        if top.retrieval_checked {
            return Ok(());
        }
        top.retrieval_checked = true;
        let (Some(member), Some(collection)) = (top.member.clone(), top.ty) else {
            return Ok(());
        };
        if !matches!(member, MemberRef::Property(_)) {
            return Ok(());
        }
        if !self.type_info(collection).is_some_and(TypeInfo::is_container) {
            return Ok(());
        }
        let read_only = member
            .property()
            .and_then(|p| self.properties.property_info(p))
            .is_some_and(|info| info.read_only);
        let retrieve = read_only
            || match incoming {
                Incoming::Text => true,
                Incoming::Element { ty, has_key } => {
                    let bare_extension =
                        self.type_info(ty).is_some_and(TypeInfo::is_markup_extension) && !has_key;
                    !bare_extension && !is_assignable(self.types, collection, ty)
                }
            };
        if retrieve {
            trace!(%pos, member = %member, "retrieving collection from member");
            self.emit(
                EventKind::StartObject {
                    ty: collection,
                    retrieved: true,
                },
                pos,
            )?;
            self.frames.push(Frame::object(collection, false, false));
            let items = MemberRef::Implicit(ImplicitMember::Items);
            self.emit(EventKind::StartMember(items.clone()), pos)?;
            let mut frame = Frame::member(items, Some(collection), false, false);
            frame.retrieval_checked = true;
            self.frames.push(frame);
        }
        Ok(())
    }

    /// Emits the events of a parsed markup extension.
    fn translate_expression(&mut self, nodes: &[LexicalNode]) -> TrellisResult<()> {
        let mut open: SmallVec<[FrameKind; 8]> = SmallVec::new();
        for node in nodes {
            match &node.kind {
                NodeKind::Element(e) | NodeKind::EmptyElement(e) => {
                    self.emit(
                        EventKind::StartObject {
                            ty: e.ty,
                            retrieved: false,
                        },
                        node.pos,
                    )?;
                    open.push(FrameKind::Object);
                }
                NodeKind::PropertyElement(p) => {
                    self.emit(EventKind::StartMember(p.member.clone()), node.pos)?;
                    open.push(FrameKind::Member);
                }
                NodeKind::Text(t) => {
                    self.emit(EventKind::Value(Rc::from(t.as_str())), node.pos)?;
                }
                NodeKind::EndTag => match open.pop() {
                    Some(FrameKind::Object) => self.emit(EventKind::EndObject, node.pos)?,
                    Some(FrameKind::Member) => self.emit(EventKind::EndMember, node.pos)?,
                    None => return Err(self.unexpected("end of expression", node.pos)),
                },
                _ => return Err(self.unexpected("node in expression", node.pos)),
            }
        }
        if !open.is_empty() {
            return Err(TrellisError::structural(
                ErrorCode::UnbalancedEvents,
                "expression left scopes open",
                self.last_pos,
            ));
        }
        Ok(())
    }
}

impl<'a, S: LexicalSource> Iterator for PullParser<'a, S> {
    type Item = TrellisResult<CanonicalEvent>;

    /// Yields events until the document ends or the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ParserState::Error {
            return None;
        }
        self.next_event().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CollaboratorError, ErrorKind};
    use crate::lex::{NodeQueue, LANGUAGE_NAMESPACE};
    use crate::schema::{Directive, PropertyId, PropertyInfo};
    use crate::value::InstanceHandle;

    const PANEL: TypeId = TypeId(0);
    const CHILDREN: TypeId = TypeId(1);
    const LABEL: TypeId = TypeId(2);
    const STRING: TypeId = TypeId(3);
    const NUMBER: TypeId = TypeId(4);
    const DICT: TypeId = TypeId(5);

    const P_CHILDREN: PropertyId = PropertyId(0);
    const P_TEXT: PropertyId = PropertyId(1);
    const P_WIDTH: PropertyId = PropertyId(2);

    struct Schema {
        types: Vec<TypeInfo>,
        props: Vec<PropertyInfo>,
    }

    fn schema() -> Schema {
        let mut panel = TypeInfo::new(PANEL, "urn:ui", "Panel");
        panel.content_property = Some(P_CHILDREN);
        let mut children = TypeInfo::new(CHILDREN, "urn:ui", "ChildCollection");
        children.is_collection = true;
        let mut label = TypeInfo::new(LABEL, "urn:ui", "Label");
        label.content_property = Some(P_TEXT);
        let mut string = TypeInfo::new(STRING, "urn:ui", "String");
        string.is_string = true;
        let mut number = TypeInfo::new(NUMBER, "urn:ui", "Number");
        number.text_syntax = true;
        let mut dict = TypeInfo::new(DICT, "urn:ui", "Dict");
        dict.is_dictionary = true;

        let mut p_children = PropertyInfo::new(P_CHILDREN, PANEL, "Children", CHILDREN);
        p_children.read_only = true;
        Schema {
            types: vec![panel, children, label, string, number, dict],
            props: vec![
                p_children,
                PropertyInfo::new(P_TEXT, LABEL, "Text", STRING),
                PropertyInfo::new(P_WIDTH, PANEL, "Width", NUMBER),
            ],
        }
    }

    impl TypeRegistry for Schema {
        fn resolve_type(&self, _: &str, name: &str) -> Option<TypeId> {
            self.types.iter().find(|t| t.name == name).map(|t| t.id)
        }
        fn type_info(&self, ty: TypeId) -> Option<&TypeInfo> {
            self.types.get(ty.0 as usize)
        }
        fn knows_namespace(&self, ns: &str) -> bool {
            ns == "urn:ui"
        }
        fn create(&self, _: TypeId) -> Result<InstanceHandle, CollaboratorError> {
            Err("not supported".into())
        }
    }

    impl PropertyRegistry for Schema {
        fn resolve(&self, owner: TypeId, name: &str) -> Option<PropertyId> {
            self.props
                .iter()
                .find(|p| p.owner == owner && p.name == name)
                .map(|p| p.id)
        }
        fn property_info(&self, property: PropertyId) -> Option<&PropertyInfo> {
            self.props.get(property.0 as usize)
        }
    }

    fn at(col: usize) -> SourcePos {
        SourcePos::new(1, col)
    }

    fn element(ty: TypeId) -> LexicalNode {
        LexicalNode::new(
            NodeKind::Element(ElementNode {
                prefix: Rc::from(""),
                local_name: Rc::from("E"),
                namespace: XmlNamespace::parse("urn:ui"),
                ty,
                has_key: false,
            }),
            at(1),
        )
    }

    fn property_element(p: PropertyId) -> LexicalNode {
        LexicalNode::new(
            NodeKind::PropertyElement(PropertyElementNode {
                prefix: Rc::from(""),
                local_name: Rc::from("E.P"),
                namespace: XmlNamespace::parse("urn:ui"),
                member: MemberRef::Property(p),
            }),
            at(2),
        )
    }

    fn attribute(p: PropertyId, value: &str) -> LexicalNode {
        LexicalNode::new(
            NodeKind::Attribute(AttributeNode {
                prefix: Rc::from(""),
                local_name: Rc::from("P"),
                namespace: None,
                member: MemberRef::Property(p),
                value: Rc::from(value),
                expression: None,
            }),
            at(3),
        )
    }

    fn key(value: &str) -> LexicalNode {
        LexicalNode::new(
            NodeKind::Directive(DirectiveNode {
                prefix: Rc::from("x"),
                local_name: Rc::from("Key"),
                namespace: XmlNamespace::parse(LANGUAGE_NAMESPACE),
                directive: Directive::Key,
                value: Rc::from(value),
                expression: None,
            }),
            at(4),
        )
    }

    fn text(t: &str) -> LexicalNode {
        LexicalNode::new(NodeKind::Text(MarkupText::from_raw(t, false)), at(5))
    }

    fn end() -> LexicalNode {
        LexicalNode::end_tag(at(6))
    }

    fn run(nodes: Vec<LexicalNode>) -> TrellisResult<Vec<String>> {
        let schema = schema();
        let options = ParseOptions::default();
        let parser = PullParser::new(NodeQueue::new(nodes), &schema, &schema, &options);
        parser
            .map(|r| r.map(|e| e.to_string()))
            .collect::<TrellisResult<Vec<_>>>()
    }

    // ===== Member synthesis =====

    #[test]
    fn test_attribute_becomes_member_pair() {
        let events = run(vec![element(PANEL), attribute(P_WIDTH, "10"), end()]).unwrap();
        assert_eq!(
            events,
            vec![
                "StartObject(0)",
                "StartMember(property 2)",
                "Value(\"10\")",
                "EndMember",
                "EndObject"
            ]
        );
    }

    #[test]
    fn test_property_element_matches_attribute_form() {
        let events = run(vec![
            element(PANEL),
            property_element(P_WIDTH),
            text("10"),
            end(),
            end(),
        ])
        .unwrap();
        assert_eq!(
            events,
            run(vec![element(PANEL), attribute(P_WIDTH, "10"), end()]).unwrap()
        );
    }

    #[test]
    fn test_read_only_collection_content_is_retrieved() {
        let events = run(vec![element(PANEL), element(LABEL), end(), end()]).unwrap();
        assert_eq!(
            events,
            vec![
                "StartObject(0)",
                "StartMember(property 0)",
                "StartObject(1, retrieved)",
                "StartMember(_Items)",
                "StartObject(2)",
                "EndObject",
                "EndMember",
                "EndObject",
                "EndMember",
                "EndObject"
            ]
        );
    }

    #[test]
    fn test_text_goes_to_string_content_property() {
        let events = run(vec![element(LABEL), text("  Hello  "), end()]).unwrap();
        assert_eq!(
            events,
            vec![
                "StartObject(2)",
                "StartMember(property 1)",
                "Value(\"Hello\")",
                "EndMember",
                "EndObject"
            ]
        );
    }

    #[test]
    fn test_text_syntax_uses_initialization() {
        let events = run(vec![element(NUMBER), text("42"), end()]).unwrap();
        assert_eq!(events[1], "StartMember(_Initialization)");
    }

    #[test]
    fn test_dictionary_content_goes_to_items() {
        let events = run(vec![element(DICT), element(LABEL), key("a"), end(), end()]).unwrap();
        assert_eq!(events[1], "StartMember(_Items)");
        assert_eq!(events[3], "StartMember(x:Key)");
    }

    // ===== Whitespace =====

    #[test]
    fn test_whitespace_between_property_elements_is_dropped() {
        let events = run(vec![
            element(PANEL),
            text(" "),
            property_element(P_WIDTH),
            text("1"),
            end(),
            text(" "),
            end(),
        ])
        .unwrap();
        assert!(!events.iter().any(|e| e == "Value(\" \")"));
    }

    // ===== Errors =====

    #[test]
    fn test_nested_property_element() {
        let err = run(vec![
            element(PANEL),
            property_element(P_WIDTH),
            property_element(P_WIDTH),
        ])
        .unwrap_err();
        assert_eq!(err.code, Some(ErrorCode::NestedPropertyElement));
    }

    #[test]
    fn test_invalid_content() {
        let err = run(vec![element(NUMBER), element(LABEL), end(), end()]).unwrap_err();
        assert_eq!(err.code, Some(ErrorCode::InvalidContent));
    }

    #[test]
    fn test_multiple_roots() {
        let err = run(vec![element(LABEL), end(), element(LABEL), end()]).unwrap_err();
        assert_eq!(err.code, Some(ErrorCode::MultipleRoots));
    }

    #[test]
    fn test_unexpected_eof() {
        let err = run(vec![element(LABEL)]).unwrap_err();
        assert_eq!(err.code, Some(ErrorCode::UnexpectedEof));
    }

    #[test]
    fn test_attribute_after_content_rejected() {
        let err = run(vec![element(LABEL), text("a"), attribute(P_TEXT, "b"), end()]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
    }

    #[test]
    fn test_error_state_absorbs() {
        let schema = schema();
        let options = ParseOptions::default();
        let mut parser = PullParser::new(NodeQueue::new(vec![end()]), &schema, &schema, &options);
        assert!(parser.next_event().is_err());
        assert_eq!(parser.state(), ParserState::Error);
        assert!(parser.next_event().is_err());
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_event_limit() {
        let schema = schema();
        let options = ParseOptions::builder().max_events(2).build();
        let parser = PullParser::new(
            NodeQueue::new(vec![element(PANEL), attribute(P_WIDTH, "1"), end()]),
            &schema,
            &schema,
            &options,
        );
        let err = parser.collect::<TrellisResult<Vec<_>>>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Security);
    }
}
