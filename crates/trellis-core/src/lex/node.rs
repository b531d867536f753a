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

//! Lexical nodes produced by the scanner and the expression parser.

use super::namespace::XmlNamespace;
use super::span::SourcePos;
use super::text::MarkupText;
use crate::error::TrellisResult;
use crate::schema::{Directive, MemberRef, TypeId};
use std::collections::VecDeque;
use std::rc::Rc;

/// An object element (`<Button>` or `{Binding ...}`).
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub prefix: Rc<str>,
    pub local_name: Rc<str>,
    pub namespace: XmlNamespace,
    pub ty: TypeId,
    /// The element carries an `x:Key` directive.
    pub has_key: bool,
}

/// A property element (`<Grid.Children>`) or a named extension argument.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyElementNode {
    pub prefix: Rc<str>,
    pub local_name: Rc<str>,
    pub namespace: XmlNamespace,
    pub member: MemberRef,
}

/// A property attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeNode {
    pub prefix: Rc<str>,
    pub local_name: Rc<str>,
    /// Namespace of a prefixed attribute; `None` when unprefixed.
    pub namespace: Option<XmlNamespace>,
    pub member: MemberRef,
    /// The unparsed attribute text.
    pub value: Rc<str>,
    /// Lexical nodes of a `{...}` value, parsed in the element's scope.
    pub expression: Option<Vec<LexicalNode>>,
}

/// A language directive attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveNode {
    pub prefix: Rc<str>,
    pub local_name: Rc<str>,
    pub namespace: XmlNamespace,
    pub directive: Directive,
    pub value: Rc<str>,
    pub expression: Option<Vec<LexicalNode>>,
}

/// A namespace declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixNode {
    pub prefix: Rc<str>,
    pub namespace: XmlNamespace,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(ElementNode),
    EmptyElement(ElementNode),
    PropertyElement(PropertyElementNode),
    Attribute(AttributeNode),
    Directive(DirectiveNode),
    PrefixDefinition(PrefixNode),
    Text(MarkupText),
    EndTag,
}

/// Discriminant of [`NodeKind`], used for peeking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    Element,
    EmptyElement,
    PropertyElement,
    Attribute,
    Directive,
    PrefixDefinition,
    Text,
    EndTag,
}

/// One lexical unit of markup with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalNode {
    pub kind: NodeKind,
    pub pos: SourcePos,
}

impl LexicalNode {
    pub fn new(kind: NodeKind, pos: SourcePos) -> Self {
        Self { kind, pos }
    }

    pub fn end_tag(pos: SourcePos) -> Self {
        Self::new(NodeKind::EndTag, pos)
    }

    pub fn tag(&self) -> NodeTag {
        match &self.kind {
            NodeKind::Element(_) => NodeTag::Element,
            NodeKind::EmptyElement(_) => NodeTag::EmptyElement,
            NodeKind::PropertyElement(_) => NodeTag::PropertyElement,
            NodeKind::Attribute(_) => NodeTag::Attribute,
            NodeKind::Directive(_) => NodeTag::Directive,
            NodeKind::PrefixDefinition(_) => NodeTag::PrefixDefinition,
            NodeKind::Text(_) => NodeTag::Text,
            NodeKind::EndTag => NodeTag::EndTag,
        }
    }
}

/// A forward-only source of lexical nodes with one node of lookahead.
pub trait LexicalSource {
    fn next_node(&mut self) -> TrellisResult<Option<LexicalNode>>;

    fn peek_tag(&mut self) -> TrellisResult<Option<NodeTag>>;
}

/// A lexical source over an already materialized node sequence.
#[derive(Debug, Clone, Default)]
pub struct NodeQueue {
    nodes: VecDeque<LexicalNode>,
}

impl NodeQueue {
    pub fn new(nodes: impl IntoIterator<Item = LexicalNode>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }
}

impl LexicalSource for NodeQueue {
    fn next_node(&mut self) -> TrellisResult<Option<LexicalNode>> {
        Ok(self.nodes.pop_front())
    }

    fn peek_tag(&mut self) -> TrellisResult<Option<NodeTag>> {
        Ok(self.nodes.front().map(LexicalNode::tag))
    }
}
