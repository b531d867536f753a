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

//! Markup extension parser for `{Type arg, Name=value}` attribute values.
//!
//! An extension is lowered to the same lexical shapes element syntax uses,
//! so the pull parser needs no separate path for it:
//!
//! ```text
//! {StaticResource Red}         Element(StaticResource)
//!                                PropertyElement(_PositionalParameters)
//!                                  Text("Red")
//!                                EndTag
//!                              EndTag
//! ```
//!
//! # Grammar (informal):
//! ```text
//! extension  = "{" type-name [args] "}"
//! args       = arg ("," arg)*
//! arg        = member-name "=" value | value
//! value      = extension | quoted | bare
//! quoted     = "'" ... "'" | '"' ... '"'       (backslash escapes)
//! bare       = text up to "," or "}"           (backslash escapes)
//! ```
//!
//! Positional arguments must precede named ones. A value starting with `{}`
//! is a literal, not an extension.

use super::namespace::{NamespaceScope, XmlNamespace};
use super::node::{ElementNode, LexicalNode, NodeKind, PropertyElementNode};
use super::span::SourcePos;
use super::text::MarkupText;
use crate::error::{TrellisError, TrellisResult};
use crate::schema::{
    resolve_extension_type, ImplicitMember, MemberRef, PropertyRegistry, TypeId, TypeRegistry,
};
use std::rc::Rc;

/// Name resolution context of the element that owns the attribute.
pub struct ExpressionContext<'a> {
    pub scope: &'a NamespaceScope,
    pub types: &'a dyn TypeRegistry,
    pub properties: &'a dyn PropertyRegistry,
    pub tolerate_unknown_members: bool,
    pub max_depth: usize,
}

/// True when an attribute value is a markup extension.
pub fn looks_like_expression(text: &str) -> bool {
    text.starts_with('{') && !text.starts_with("{}")
}

/// Strips the `{}` literal escape.
pub fn unescape_literal(text: &str) -> &str {
    text.strip_prefix("{}").unwrap_or(text)
}

/// Parses a markup extension into lexical nodes.
///
/// `origin` is the position of the attribute that holds the text; node
/// positions are offset from it by character index.
pub fn parse_expression(
    text: &str,
    origin: SourcePos,
    cx: &ExpressionContext<'_>,
) -> TrellisResult<Vec<LexicalNode>> {
    let mut parser = ExprParser {
        chars: text.chars().collect(),
        pos: 0,
        origin,
        cx,
        out: Vec::new(),
        depth: 0,
    };
    parser.skip_whitespace();
    parser.parse_extension()?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected '{}' after markup extension", c)));
    }
    Ok(parser.out)
}

struct ExprParser<'c, 'a> {
    chars: Vec<char>,
    pos: usize,
    origin: SourcePos,
    cx: &'c ExpressionContext<'a>,
    out: Vec<LexicalNode>,
    depth: usize,
}

impl<'c, 'a> ExprParser<'c, 'a> {
    fn here(&self) -> SourcePos {
        self.origin.offset_columns(self.pos)
    }

    fn error(&self, message: impl Into<String>) -> TrellisError {
        TrellisError::expression(message, self.here())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn push(&mut self, kind: NodeKind, pos: SourcePos) {
        self.out.push(LexicalNode::new(kind, pos));
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_extension(&mut self) -> TrellisResult<()> {
        let start = self.here();
        if self.advance() != Some('{') {
            return Err(self.error("expected '{'"));
        }
        self.depth += 1;
        if self.depth > self.cx.max_depth {
            return Err(TrellisError::security(
                format!("markup extension nesting exceeds {}", self.cx.max_depth),
                start,
            ));
        }
        self.skip_whitespace();
        let qualified = self.read_name();
        if qualified.is_empty() {
            return Err(self.error("expected markup extension type name"));
        }
        let (prefix, local) = match qualified.split_once(':') {
            Some((p, l)) => (p.to_string(), l.to_string()),
            None => (String::new(), qualified.clone()),
        };
        let namespace = self.resolve_prefix(&prefix, start)?;
        let ty = resolve_extension_type(self.cx.types, namespace.uri(), &local).ok_or_else(|| {
            TrellisError::unresolved(
                format!("unknown markup extension '{}'", qualified),
                start,
            )
        })?;
        self.push(
            NodeKind::Element(ElementNode {
                prefix: Rc::from(prefix.as_str()),
                local_name: Rc::from(local.as_str()),
                namespace: namespace.clone(),
                ty,
                has_key: false,
            }),
            start,
        );

        self.skip_whitespace();
        if self.peek() == Some('}') {
            self.pos += 1;
        } else {
            self.parse_arguments(ty, &namespace)?;
        }
        self.push(NodeKind::EndTag, self.here());
        self.depth -= 1;
        Ok(())
    }

    fn parse_arguments(&mut self, ty: TypeId, namespace: &XmlNamespace) -> TrellisResult<()> {
        let mut positional_open = false;
        let mut named_seen = false;
        loop {
            self.skip_whitespace();
            let arg_pos = self.here();
            let save = self.pos;
            let name = self.read_name();
            self.skip_whitespace();
            if !name.is_empty() && self.peek() == Some('=') {
                self.pos += 1;
                if positional_open {
                    self.push(NodeKind::EndTag, arg_pos);
                    positional_open = false;
                }
                named_seen = true;
                let member = self.resolve_member(ty, &name, arg_pos)?;
                self.push(
                    NodeKind::PropertyElement(PropertyElementNode {
                        prefix: Rc::from(""),
                        local_name: Rc::from(name.as_str()),
                        namespace: namespace.clone(),
                        member,
                    }),
                    arg_pos,
                );
                self.parse_value()?;
                self.push(NodeKind::EndTag, self.here());
            } else {
                self.pos = save;
                self.skip_whitespace();
                if matches!(self.peek(), Some(',') | Some('}')) {
                    return Err(self.error("empty argument in markup extension"));
                }
                if named_seen {
                    return Err(self.error("positional argument after named argument"));
                }
                if !positional_open {
                    self.push(
                        NodeKind::PropertyElement(PropertyElementNode {
                            prefix: Rc::from(""),
                            local_name: Rc::from(ImplicitMember::PositionalParameters.name()),
                            namespace: namespace.clone(),
                            member: MemberRef::Implicit(ImplicitMember::PositionalParameters),
                        }),
                        arg_pos,
                    );
                    positional_open = true;
                }
                self.parse_value()?;
            }
            self.skip_whitespace();
            match self.advance() {
                Some(',') => continue,
                Some('}') => break,
                Some(c) => return Err(self.error(format!("unexpected '{}' in argument list", c))),
                None => return Err(self.error("unterminated markup extension")),
            }
        }
        if positional_open {
            self.push(NodeKind::EndTag, self.here());
        }
        Ok(())
    }

    fn parse_value(&mut self) -> TrellisResult<()> {
        self.skip_whitespace();
        let pos = self.here();
        match self.peek() {
            Some('{') if self.peek_at(1) == Some('}') => {
                self.pos += 2;
                let text = self.read_bare()?;
                self.push_text(text, pos);
                Ok(())
            }
            Some('{') => self.parse_extension(),
            Some(q @ ('\'' | '"')) => {
                self.pos += 1;
                let mut text = String::new();
                loop {
                    match self.advance() {
                        Some('\\') => match self.advance() {
                            Some(c) => text.push(c),
                            None => return Err(self.error("unterminated escape")),
                        },
                        Some(c) if c == q => break,
                        Some(c) => text.push(c),
                        None => return Err(self.error("unterminated quoted value")),
                    }
                }
                self.push_text(text, pos);
                Ok(())
            }
            _ => {
                let text = self.read_bare()?;
                self.push_text(text, pos);
                Ok(())
            }
        }
    }

    fn read_bare(&mut self) -> TrellisResult<String> {
        let mut text = String::new();
        let mut braces = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.pos += 1;
                    match self.advance() {
                        Some(escaped) => text.push(escaped),
                        None => return Err(self.error("unterminated escape")),
                    }
                    continue;
                }
                ',' if braces == 0 => break,
                '}' if braces == 0 => break,
                '{' => braces += 1,
                '}' => braces -= 1,
                _ => {}
            }
            text.push(c);
            self.pos += 1;
        }
        Ok(text.trim_end().to_string())
    }

    fn push_text(&mut self, text: String, pos: SourcePos) {
        self.push(NodeKind::Text(MarkupText::from_raw(text, true)), pos);
    }

    fn resolve_prefix(&self, prefix: &str, pos: SourcePos) -> TrellisResult<XmlNamespace> {
        self.cx.scope.resolve(prefix).cloned().ok_or_else(|| {
            TrellisError::unresolved(format!("undeclared namespace prefix '{}'", prefix), pos)
        })
    }

    fn resolve_member(&self, ty: TypeId, name: &str, pos: SourcePos) -> TrellisResult<MemberRef> {
        let resolved = match name.rsplit_once('.') {
            Some((owner, member)) => {
                let (prefix, owner_name) = owner.split_once(':').unwrap_or(("", owner));
                let ns = self.resolve_prefix(prefix, pos)?;
                self.cx
                    .types
                    .resolve_type(ns.uri(), owner_name)
                    .and_then(|owner_ty| self.cx.properties.resolve(owner_ty, member))
            }
            None => self.cx.properties.resolve(ty, name),
        };
        match resolved {
            Some(p) => Ok(MemberRef::Property(p)),
            None if self.cx.tolerate_unknown_members => {
                tracing::warn!(member = name, %pos, "unknown markup extension member");
                Ok(MemberRef::Unknown(Rc::from(name)))
            }
            None => Err(TrellisError::unresolved(
                format!("unknown markup extension member '{}'", name),
                pos,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CollaboratorError, ErrorKind};
    use crate::schema::{ExtensionKind, PropertyId, PropertyInfo, TypeInfo};
    use crate::value::InstanceHandle;

    const UI: &str = "urn:ui";

    struct Schema {
        types: Vec<TypeInfo>,
        props: Vec<PropertyInfo>,
    }

    fn schema() -> Schema {
        let mut resource = TypeInfo::new(TypeId(0), UI, "StaticResource");
        resource.extension = Some(ExtensionKind::StaticResource);
        let mut binding = TypeInfo::new(TypeId(1), UI, "BindingExtension");
        binding.extension = Some(ExtensionKind::Custom);
        let string = TypeInfo::new(TypeId(2), UI, "String");
        Schema {
            types: vec![resource, binding, string],
            props: vec![
                PropertyInfo::new(PropertyId(0), TypeId(0), "ResourceKey", TypeId(2)),
                PropertyInfo::new(PropertyId(1), TypeId(1), "Path", TypeId(2)),
                PropertyInfo::new(PropertyId(2), TypeId(1), "Converter", TypeId(2)),
            ],
        }
    }

    impl TypeRegistry for Schema {
        fn resolve_type(&self, namespace: &str, name: &str) -> Option<TypeId> {
            self.types
                .iter()
                .find(|t| t.namespace == namespace && t.name == name)
                .map(|t| t.id)
        }
        fn type_info(&self, ty: TypeId) -> Option<&TypeInfo> {
            self.types.get(ty.0 as usize)
        }
        fn knows_namespace(&self, namespace: &str) -> bool {
            namespace == UI
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

    fn parse(text: &str) -> TrellisResult<Vec<LexicalNode>> {
        parse_with(text, false)
    }

    fn parse_with(text: &str, tolerate: bool) -> TrellisResult<Vec<LexicalNode>> {
        let schema = schema();
        let mut scope = NamespaceScope::new();
        scope.push();
        scope.declare(Rc::from(""), XmlNamespace::parse(UI));
        let cx = ExpressionContext {
            scope: &scope,
            types: &schema,
            properties: &schema,
            tolerate_unknown_members: tolerate,
            max_depth: 4,
        };
        parse_expression(text, SourcePos::new(1, 10), &cx)
    }

    /// Compact rendering: E(ty) P(member) T(text) /
    fn shape(nodes: &[LexicalNode]) -> String {
        nodes
            .iter()
            .map(|n| match &n.kind {
                NodeKind::Element(e) => format!("E({})", e.ty.0),
                NodeKind::PropertyElement(p) => format!("P({})", p.member),
                NodeKind::Text(t) => format!("T({})", t.as_str()),
                NodeKind::EndTag => "/".to_string(),
                other => format!("{:?}", other),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    // ===== Detection =====

    #[test]
    fn test_looks_like_expression() {
        assert!(looks_like_expression("{Binding}"));
        assert!(!looks_like_expression("{}{literal}"));
        assert!(!looks_like_expression("plain"));
        assert_eq!(unescape_literal("{}{literal}"), "{literal}");
        assert_eq!(unescape_literal("plain"), "plain");
    }

    // ===== Shapes =====

    #[test]
    fn test_positional_argument() {
        let nodes = parse("{StaticResource Red}").unwrap();
        assert_eq!(shape(&nodes), "E(0) P(_PositionalParameters) T(Red) / /");
    }

    #[test]
    fn test_no_arguments() {
        let nodes = parse("{Binding}").unwrap();
        assert_eq!(shape(&nodes), "E(1) /");
    }

    #[test]
    fn test_named_arguments() {
        let nodes = parse("{Binding Path=Name, Converter='a, b'}").unwrap();
        assert_eq!(
            shape(&nodes),
            "E(1) P(property 1) T(Name) / P(property 2) T(a, b) / /"
        );
    }

    #[test]
    fn test_positional_then_named() {
        let nodes = parse("{Binding Title, Path=X}").unwrap();
        assert_eq!(
            shape(&nodes),
            "E(1) P(_PositionalParameters) T(Title) / P(property 1) T(X) / /"
        );
    }

    #[test]
    fn test_nested_extension() {
        let nodes = parse("{Binding Converter={StaticResource Conv}}").unwrap();
        assert_eq!(
            shape(&nodes),
            "E(1) P(property 2) E(0) P(_PositionalParameters) T(Conv) / / / /"
        );
    }

    #[test]
    fn test_escapes_in_bare_value() {
        let nodes = parse(r"{Binding Path=a\,b}").unwrap();
        assert_eq!(shape(&nodes), "E(1) P(property 1) T(a,b) / /");
    }

    #[test]
    fn test_literal_escape_in_value() {
        let nodes = parse("{Binding Path={}{x}}").unwrap();
        assert_eq!(shape(&nodes), "E(1) P(property 1) T({x}) / /");
    }

    #[test]
    fn test_extension_suffix_resolution() {
        let nodes = parse("{Binding}").unwrap();
        match &nodes[0].kind {
            NodeKind::Element(e) => assert_eq!(&*e.local_name, "Binding"),
            other => panic!("expected element, got {:?}", other),
        }
    }

    // ===== Errors =====

    #[test]
    fn test_unterminated() {
        let err = parse("{Binding Path=X").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExpressionSyntax);
    }

    #[test]
    fn test_unknown_type() {
        let err = parse("{Nope}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedName);
        assert_eq!(err.pos, SourcePos::new(1, 10));
    }

    #[test]
    fn test_unknown_member_strict_and_tolerant() {
        let err = parse("{Binding Mode=OneWay}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedName);
        let nodes = parse_with("{Binding Mode=OneWay}", true).unwrap();
        assert_eq!(shape(&nodes), "E(1) P(unknown member 'Mode') T(OneWay) / /");
    }

    #[test]
    fn test_positional_after_named() {
        let err = parse("{Binding Path=X, Y}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExpressionSyntax);
    }

    #[test]
    fn test_empty_argument_rejected() {
        for text in ["{Binding ,}", "{Binding a,,b}", "{Binding a,}", "{Binding Path=X,}"] {
            let err = parse(text).unwrap_err();
            assert_eq!(err.kind, ErrorKind::ExpressionSyntax, "{}", text);
        }
    }

    #[test]
    fn test_trailing_garbage() {
        let err = parse("{Binding} tail").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExpressionSyntax);
    }

    #[test]
    fn test_undeclared_prefix() {
        let err = parse("{q:Binding}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedName);
    }

    #[test]
    fn test_nesting_limit() {
        let err = parse("{Binding Path={Binding Path={Binding Path={Binding Path={Binding}}}}}")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Security);
    }
}
