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

//! Markup scanner: source text to lexical nodes.
//!
//! The scanner drives `quick_xml` and turns its events into [`LexicalNode`]s
//! with types, members and directives already resolved. When it reaches an
//! element start it processes every attribute of that element before
//! yielding anything, so namespace declarations and `mc:Ignorable` are in
//! effect for the element's own attributes. Nodes are queued and handed out
//! one at a time; the queue also provides the one node of lookahead the
//! pull parser needs.
//!
//! Per element the queue receives, in order: namespace declarations, the
//! element (or property element) node, the remaining attributes in
//! [`AttributeBucket`](super::classify::AttributeBucket) order.

use super::classify::SortedAttributes;
use super::expression::{looks_like_expression, parse_expression, ExpressionContext};
use super::namespace::{NamespaceScope, XmlNamespace};
use super::node::{
    AttributeNode, DirectiveNode, ElementNode, LexicalNode, LexicalSource, NodeKind, NodeTag,
    PrefixNode, PropertyElementNode,
};
use super::span::{LineIndex, SourcePos};
use super::text::MarkupText;
use crate::error::{ErrorCode, TrellisError, TrellisResult};
use crate::options::ParseOptions;
use crate::schema::{Directive, MemberRef, PropertyRegistry, TypeId, TypeRegistry};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use tracing::trace;

struct ScanFrame {
    /// `false` for property elements.
    is_object: bool,
    preserve: bool,
}

struct RawAttribute {
    prefix: Rc<str>,
    local: Rc<str>,
    value: Rc<str>,
    pos: SourcePos,
}

impl RawAttribute {
    fn is_namespace_declaration(&self) -> bool {
        (self.prefix.is_empty() && &*self.local == "xmlns") || &*self.prefix == "xmlns"
    }

    /// The prefix a namespace declaration binds.
    fn declared_prefix(&self) -> Rc<str> {
        if self.prefix.is_empty() {
            Rc::from("")
        } else {
            self.local.clone()
        }
    }
}

/// Forward-only scanner over one markup document.
pub struct Scanner<'s, 'a> {
    reader: Reader<&'s [u8]>,
    lines: LineIndex,
    types: &'a dyn TypeRegistry,
    properties: &'a dyn PropertyRegistry,
    options: &'a ParseOptions,
    scope: NamespaceScope,
    frames: Vec<ScanFrame>,
    queue: VecDeque<LexicalNode>,
    /// URIs named by `mc:Ignorable` on the root element.
    ignored: HashSet<String>,
    /// Open elements inside an ignored subtree.
    skip_depth: usize,
    seen_root: bool,
    pending_text: Option<(MarkupText, SourcePos)>,
    finished: bool,
}

impl<'s, 'a> Scanner<'s, 'a> {
    pub fn new(
        source: &'s str,
        types: &'a dyn TypeRegistry,
        properties: &'a dyn PropertyRegistry,
        options: &'a ParseOptions,
    ) -> TrellisResult<Self> {
        if source.len() > options.limits.max_source_size {
            return Err(TrellisError::security(
                format!(
                    "source of {} bytes exceeds limit of {}",
                    source.len(),
                    options.limits.max_source_size
                ),
                SourcePos::new(1, 1),
            ));
        }
        let mut reader = Reader::from_str(source);
        reader.trim_text(false);
        reader.check_end_names(true);
        Ok(Self {
            reader,
            lines: LineIndex::new(source),
            types,
            properties,
            options,
            scope: NamespaceScope::new(),
            frames: Vec::new(),
            queue: VecDeque::new(),
            ignored: HashSet::new(),
            skip_depth: 0,
            seen_root: false,
            pending_text: None,
            finished: false,
        })
    }

    /// Returns the next lexical node, or `None` at the end of the document.
    pub fn read(&mut self) -> TrellisResult<Option<LexicalNode>> {
        self.fill_guarded()?;
        Ok(self.queue.pop_front())
    }

    /// Returns the next lexical node without consuming it.
    pub fn peek(&mut self) -> TrellisResult<Option<&LexicalNode>> {
        self.fill_guarded()?;
        Ok(self.queue.front())
    }

    fn fill_guarded(&mut self) -> TrellisResult<()> {
        if let Err(err) = self.fill() {
            self.finished = true;
            self.queue.clear();
            return Err(err);
        }
        Ok(())
    }

    fn fill(&mut self) -> TrellisResult<()> {
        while self.queue.is_empty() && !self.finished {
            let offset = self.reader.buffer_position();
            let pos = self.lines.position(offset);
            let event = self.reader.read_event().map_err(|e| {
                TrellisError::scan(
                    ErrorCode::MalformedMarkup,
                    e.to_string(),
                    self.lines.position(self.reader.buffer_position()),
                )
            })?;
            match event {
                Event::Start(e) => {
                    self.flush_text()?;
                    if self.skip_depth > 0 {
                        self.skip_depth += 1;
                    } else {
                        self.start_element(&e, offset, pos, false)?;
                    }
                }
                Event::Empty(e) => {
                    self.flush_text()?;
                    if self.skip_depth == 0 {
                        self.start_element(&e, offset, pos, true)?;
                    }
                }
                Event::End(_) => {
                    if self.skip_depth > 0 {
                        self.skip_depth -= 1;
                    } else {
                        self.flush_text()?;
                        self.end_element(pos)?;
                    }
                }
                Event::Text(t) => {
                    if self.skip_depth == 0 {
                        let text = t.unescape().map_err(|e| {
                            TrellisError::scan(ErrorCode::MalformedMarkup, e.to_string(), pos)
                        })?;
                        self.append_text(&text, pos)?;
                    }
                }
                Event::CData(c) => {
                    if self.skip_depth == 0 {
                        let text = String::from_utf8_lossy(&c).into_owned();
                        self.append_text(&text, pos)?;
                    }
                }
                Event::DocType(_) => {
                    return Err(TrellisError::scan(
                        ErrorCode::DoctypeProhibited,
                        "document type declarations are not allowed",
                        pos,
                    ));
                }
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) => {}
                Event::Eof => {
                    self.flush_text()?;
                    if !self.frames.is_empty() {
                        return Err(TrellisError::scan(
                            ErrorCode::UnexpectedEof,
                            "unexpected end of document inside an element",
                            pos,
                        ));
                    }
                    if !self.seen_root {
                        return Err(TrellisError::scan(
                            ErrorCode::UnexpectedEof,
                            "document has no root element",
                            pos,
                        ));
                    }
                    self.finished = true;
                }
            }
        }
        Ok(())
    }

    fn append_text(&mut self, chunk: &str, pos: SourcePos) -> TrellisResult<()> {
        let preserve = self
            .frames
            .last()
            .map_or(self.options.preserve_whitespace, |f| f.preserve);
        let (text, _) = self
            .pending_text
            .get_or_insert_with(|| (MarkupText::new(preserve), pos));
        text.paste(chunk);
        if text.len() > self.options.limits.max_text_length {
            return Err(TrellisError::security(
                format!(
                    "text run exceeds limit of {} bytes",
                    self.options.limits.max_text_length
                ),
                pos,
            ));
        }
        Ok(())
    }

    fn flush_text(&mut self) -> TrellisResult<()> {
        let Some((text, pos)) = self.pending_text.take() else {
            return Ok(());
        };
        if self.frames.is_empty() {
            if text.is_whitespace_only() {
                return Ok(());
            }
            return Err(TrellisError::scan(
                ErrorCode::MalformedMarkup,
                "text outside the root element",
                pos,
            ));
        }
        self.queue.push_back(LexicalNode::new(NodeKind::Text(text), pos));
        Ok(())
    }

    fn is_ignorable(&self, namespace: &XmlNamespace) -> bool {
        self.ignored.contains(namespace.uri()) && !self.types.knows_namespace(namespace.uri())
    }

    fn resolve_prefix(&self, prefix: &str, pos: SourcePos) -> TrellisResult<XmlNamespace> {
        self.scope.resolve(prefix).cloned().ok_or_else(|| {
            TrellisError::unresolved(format!("undeclared namespace prefix '{}'", prefix), pos)
                .with_code(ErrorCode::UndeclaredPrefix)
        })
    }

    fn start_element(
        &mut self,
        e: &BytesStart<'_>,
        offset: usize,
        pos: SourcePos,
        is_empty: bool,
    ) -> TrellisResult<()> {
        if self.frames.len() >= self.options.limits.max_depth {
            return Err(TrellisError::security(
                format!("element nesting exceeds {}", self.options.limits.max_depth),
                pos,
            ));
        }
        let name = e.name();
        let prefix: Rc<str> = match name.prefix() {
            Some(p) => Rc::from(String::from_utf8_lossy(p.as_ref()).as_ref()),
            None => Rc::from(""),
        };
        let local: Rc<str> = Rc::from(String::from_utf8_lossy(name.local_name().as_ref()).as_ref());
        let raw = self.raw_attributes(e, name.as_ref().len(), offset, pos)?;

        self.scope.push();
        let mut nodes = Vec::new();
        for attr in raw.iter().filter(|a| a.is_namespace_declaration()) {
            let namespace = XmlNamespace::parse(&attr.value);
            let declared = attr.declared_prefix();
            self.scope.declare(declared.clone(), namespace.clone());
            nodes.push(LexicalNode::new(
                NodeKind::PrefixDefinition(PrefixNode {
                    prefix: declared,
                    namespace,
                }),
                attr.pos,
            ));
        }
        let is_root = !self.seen_root;
        self.seen_root = true;
        if is_root {
            for (p, uri) in &self.options.default_namespaces {
                if !self.scope.is_declared(p) {
                    let namespace = XmlNamespace::parse(uri);
                    let declared: Rc<str> = Rc::from(p.as_str());
                    self.scope.declare(declared.clone(), namespace.clone());
                    nodes.push(LexicalNode::new(
                        NodeKind::PrefixDefinition(PrefixNode {
                            prefix: declared,
                            namespace,
                        }),
                        pos,
                    ));
                }
            }
        }
        for attr in raw.iter().filter(|a| !a.is_namespace_declaration()) {
            if attr.prefix.is_empty() || &*attr.local != "Ignorable" {
                continue;
            }
            let ns = self.resolve_prefix(&attr.prefix, attr.pos)?;
            if !ns.is_compatibility() {
                continue;
            }
            if !is_root {
                trace!(%pos, "Ignorable is only honoured on the root element");
                continue;
            }
            for ignored_prefix in attr.value.split_whitespace() {
                let ignored = self.resolve_prefix(ignored_prefix, attr.pos)?;
                self.ignored.insert(ignored.uri().to_string());
            }
        }

        let namespace = self.resolve_prefix(&prefix, pos)?;
        if let Some((owner, member)) = local.split_once('.') {
            return self.start_property_element(
                &raw, nodes, prefix.clone(), local.clone(), owner, member, namespace, pos, is_empty,
            );
        }

        let ty = match self.types.resolve_type(namespace.uri(), &local) {
            Some(ty) => ty,
            None if self.is_ignorable(&namespace) => {
                trace!(element = %local, %pos, "skipping element in ignorable namespace");
                self.begin_skip(is_empty);
                return Ok(());
            }
            None => {
                return Err(TrellisError::unresolved(
                    format!("unknown type '{}' in namespace '{}'", local, namespace.uri()),
                    pos,
                ));
            }
        };

        let parent_preserve = self
            .frames
            .last()
            .map_or(self.options.preserve_whitespace, |f| f.preserve);
        let mut preserve = parent_preserve;
        let mut has_key = false;
        for attr in raw.iter().filter(|a| !a.is_namespace_declaration()) {
            if let Some(node) =
                self.attribute_node(attr, ty, &namespace, &mut preserve, &mut has_key)?
            {
                nodes.push(node);
            }
        }

        let mut sorted = SortedAttributes::classify(nodes, ty, self.types, self.properties)?;
        self.queue.extend(sorted.take_namespaces());
        let element = ElementNode {
            prefix,
            local_name: local,
            namespace,
            ty,
            has_key,
        };
        self.queue.push_back(LexicalNode::new(
            if is_empty {
                NodeKind::EmptyElement(element)
            } else {
                NodeKind::Element(element)
            },
            pos,
        ));
        self.queue.extend(sorted.into_nodes());

        self.frames.push(ScanFrame {
            is_object: true,
            preserve,
        });
        if is_empty {
            self.end_element(pos)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn start_property_element(
        &mut self,
        raw: &[RawAttribute],
        namespaces: Vec<LexicalNode>,
        prefix: Rc<str>,
        local: Rc<str>,
        owner: &str,
        member_name: &str,
        namespace: XmlNamespace,
        pos: SourcePos,
        is_empty: bool,
    ) -> TrellisResult<()> {
        if !self.frames.iter().any(|f| f.is_object) {
            return Err(TrellisError::scan(
                ErrorCode::PropertyElementAtRoot,
                format!("property element '{}' cannot be the root", local),
                pos,
            ));
        }
        for attr in raw.iter().filter(|a| !a.is_namespace_declaration()) {
            let namespace = if attr.prefix.is_empty() {
                None
            } else {
                Some(self.resolve_prefix(&attr.prefix, attr.pos)?)
            };
            if let Some(ns) = &namespace {
                if ns.is_compatibility() || self.is_ignorable(ns) {
                    trace!(attribute = %attr.local, "skipping attribute in ignorable namespace");
                    continue;
                }
            }
            let is_uid = &*attr.local == "Uid"
                && namespace.as_ref().is_some_and(XmlNamespace::is_language);
            if !is_uid {
                return Err(TrellisError::scan(
                    ErrorCode::PropertyOnPropertyElement,
                    format!(
                        "attribute '{}' is not allowed on property element '{}'",
                        attr.local, local
                    ),
                    attr.pos,
                ));
            }
        }

        let owner_ty = self.types.resolve_type(namespace.uri(), owner);
        if owner_ty.is_none() && self.is_ignorable(&namespace) {
            trace!(element = %local, %pos, "skipping property element in ignorable namespace");
            self.begin_skip(is_empty);
            return Ok(());
        }
        let member = match owner_ty.and_then(|t| self.properties.resolve(t, member_name)) {
            Some(p) => MemberRef::Property(p),
            None if self.options.tolerate_unknown_members => {
                tracing::warn!(member = %local, %pos, "unknown property element");
                MemberRef::Unknown(local.clone())
            }
            None => {
                return Err(TrellisError::unresolved(
                    format!("unknown property '{}'", local),
                    pos,
                ));
            }
        };

        self.queue.extend(namespaces);
        self.queue.push_back(LexicalNode::new(
            NodeKind::PropertyElement(PropertyElementNode {
                prefix,
                local_name: local,
                namespace,
                member,
            }),
            pos,
        ));
        let preserve = self
            .frames
            .last()
            .map_or(self.options.preserve_whitespace, |f| f.preserve);
        self.frames.push(ScanFrame {
            is_object: false,
            preserve,
        });
        if is_empty {
            self.end_element(pos)?;
        }
        Ok(())
    }

    fn begin_skip(&mut self, is_empty: bool) {
        self.scope.pop();
        if !is_empty {
            self.skip_depth = 1;
        }
    }

    fn end_element(&mut self, pos: SourcePos) -> TrellisResult<()> {
        if self.frames.pop().is_none() {
            return Err(TrellisError::scan(
                ErrorCode::MalformedMarkup,
                "end tag without matching start tag",
                pos,
            ));
        }
        self.scope.pop();
        self.queue.push_back(LexicalNode::end_tag(pos));
        Ok(())
    }

    fn raw_attributes(
        &self,
        e: &BytesStart<'_>,
        name_len: usize,
        offset: usize,
        pos: SourcePos,
    ) -> TrellisResult<Vec<RawAttribute>> {
        let tag: &[u8] = e;
        let mut raw = Vec::new();
        for attr in e.attributes() {
            let attr = attr
                .map_err(|err| TrellisError::scan(ErrorCode::MalformedMarkup, err.to_string(), pos))?;
            let key = attr.key;
            let value = attr
                .unescape_value()
                .map_err(|err| TrellisError::scan(ErrorCode::MalformedMarkup, err.to_string(), pos))?;
            let attr_pos = attribute_offset(tag, name_len, key.as_ref())
                .map_or(pos, |at| self.lines.position(offset + 1 + at));
            let (prefix, local) = match key.prefix() {
                Some(p) => (
                    Rc::from(String::from_utf8_lossy(p.as_ref()).as_ref()),
                    Rc::from(String::from_utf8_lossy(key.local_name().as_ref()).as_ref()),
                ),
                None => (
                    Rc::from(""),
                    Rc::from(String::from_utf8_lossy(key.as_ref()).as_ref()),
                ),
            };
            raw.push(RawAttribute {
                prefix,
                local,
                value: Rc::from(value.as_ref()),
                pos: attr_pos,
            });
        }
        if raw.len() > self.options.limits.max_attributes {
            return Err(TrellisError::security(
                format!(
                    "element has {} attributes, limit is {}",
                    raw.len(),
                    self.options.limits.max_attributes
                ),
                pos,
            ));
        }
        Ok(raw)
    }

    /// Builds the lexical node for one non-declaration attribute of an
    /// object element. Returns `None` for attributes that are consumed here.
    fn attribute_node(
        &self,
        attr: &RawAttribute,
        ty: TypeId,
        element_ns: &XmlNamespace,
        preserve: &mut bool,
        has_key: &mut bool,
    ) -> TrellisResult<Option<LexicalNode>> {
        let namespace = if attr.prefix.is_empty() {
            None
        } else {
            Some(self.resolve_prefix(&attr.prefix, attr.pos)?)
        };

        if let Some(ns) = &namespace {
            if ns.is_xml() {
                if &*attr.local != "space" {
                    trace!(attribute = %attr.local, "ignoring xml attribute");
                    return Ok(None);
                }
                *preserve = &*attr.value == "preserve";
                return Ok(Some(self.directive_node(attr, ns.clone(), Directive::XmlSpace)?));
            }
            if ns.is_compatibility() {
                return Ok(None);
            }
            if self.is_ignorable(ns) {
                trace!(attribute = %attr.local, "skipping attribute in ignorable namespace");
                return Ok(None);
            }
            if ns.is_language() {
                return match Directive::from_language_name(&attr.local) {
                    Some(directive) => {
                        if directive == Directive::Key {
                            *has_key = true;
                        }
                        Ok(Some(self.directive_node(attr, ns.clone(), directive)?))
                    }
                    None if self.options.tolerate_unknown_members => {
                        tracing::warn!(directive = %attr.local, pos = %attr.pos, "unknown directive");
                        Ok(None)
                    }
                    None => Err(TrellisError::unresolved(
                        format!("unknown directive 'x:{}'", attr.local),
                        attr.pos,
                    )
                    .with_code(ErrorCode::UnknownDirective)),
                };
            }
        }

        let resolved = match attr.local.split_once('.') {
            Some((owner, member)) => {
                let owner_ns = match &namespace {
                    Some(ns) => ns.clone(),
                    None => self.resolve_prefix("", attr.pos).unwrap_or_else(|_| element_ns.clone()),
                };
                self.types
                    .resolve_type(owner_ns.uri(), owner)
                    .and_then(|owner_ty| self.properties.resolve(owner_ty, member))
            }
            None => self.properties.resolve(ty, &attr.local),
        };
        let member = match resolved {
            Some(p) => MemberRef::Property(p),
            None if self.options.tolerate_unknown_members => {
                tracing::warn!(attribute = %attr.local, pos = %attr.pos, "unknown attribute");
                MemberRef::Unknown(attr.local.clone())
            }
            None => {
                return Err(TrellisError::unresolved(
                    format!("unknown property '{}'", attr.local),
                    attr.pos,
                ));
            }
        };
        Ok(Some(LexicalNode::new(
            NodeKind::Attribute(AttributeNode {
                prefix: attr.prefix.clone(),
                local_name: attr.local.clone(),
                namespace,
                member,
                value: attr.value.clone(),
                expression: self.expression_for(&attr.value, attr.pos)?,
            }),
            attr.pos,
        )))
    }

    fn directive_node(
        &self,
        attr: &RawAttribute,
        namespace: XmlNamespace,
        directive: Directive,
    ) -> TrellisResult<LexicalNode> {
        let expression = match directive {
            Directive::XmlSpace | Directive::Uid | Directive::Name | Directive::Class => None,
            _ => self.expression_for(&attr.value, attr.pos)?,
        };
        Ok(LexicalNode::new(
            NodeKind::Directive(DirectiveNode {
                prefix: attr.prefix.clone(),
                local_name: attr.local.clone(),
                namespace,
                directive,
                value: attr.value.clone(),
                expression,
            }),
            attr.pos,
        ))
    }

    fn expression_for(&self, value: &str, pos: SourcePos) -> TrellisResult<Option<Vec<LexicalNode>>> {
        if !looks_like_expression(value) {
            return Ok(None);
        }
        let cx = ExpressionContext {
            scope: &self.scope,
            types: self.types,
            properties: self.properties,
            tolerate_unknown_members: self.options.tolerate_unknown_members,
            max_depth: self.options.limits.max_expression_depth,
        };
        parse_expression(value, pos, &cx).map(Some)
    }
}

/// Finds the byte offset of attribute `key` within a start tag.
fn attribute_offset(tag: &[u8], name_len: usize, key: &[u8]) -> Option<usize> {
    let mut from = name_len.min(tag.len());
    while let Some(i) = memchr::memmem::find(&tag[from..], key) {
        let at = from + i;
        if at > 0 && tag[at - 1].is_ascii_whitespace() {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

impl<'s, 'a> LexicalSource for Scanner<'s, 'a> {
    fn next_node(&mut self) -> TrellisResult<Option<LexicalNode>> {
        self.read()
    }

    fn peek_tag(&mut self) -> TrellisResult<Option<NodeTag>> {
        Ok(self.peek()?.map(LexicalNode::tag))
    }
}

impl<'s, 'a> Iterator for Scanner<'s, 'a> {
    type Item = TrellisResult<LexicalNode>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_offset_skips_element_name() {
        let tag = b"Grid Grid.Row=\"1\" Width=\"2\"";
        assert_eq!(attribute_offset(tag, 4, b"Grid.Row"), Some(5));
        assert_eq!(attribute_offset(tag, 4, b"Width"), Some(18));
    }

    #[test]
    fn test_attribute_offset_requires_leading_whitespace() {
        let tag = b"A xWidth=\"1\" Width=\"2\"";
        assert_eq!(attribute_offset(tag, 1, b"Width"), Some(13));
        assert_eq!(attribute_offset(tag, 1, b"Height"), None);
    }
}
