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

//! Canonical events.
//!
//! The pull parser, the node stream and the graph writer all speak this
//! one normalized vocabulary. Events carry resolved types and members,
//! never raw names.

use crate::error::{ErrorCode, TrellisError, TrellisResult};
use crate::lex::{Predicate, SourcePos, XmlNamespace};
use crate::schema::{MemberRef, TypeId};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Opens an object. `retrieved` objects are read from the parent member
    /// instead of being created.
    StartObject { ty: TypeId, retrieved: bool },
    EndObject,
    StartMember(MemberRef),
    EndMember,
    Namespace { prefix: Rc<str>, namespace: XmlNamespace },
    /// Literal text; conversion happens in the writer.
    Value(Rc<str>),
    StartConditionalScope(Rc<Predicate>),
    EndConditionalScope,
}

/// A canonical event with the position of the markup that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    pub kind: EventKind,
    pub pos: SourcePos,
}

impl CanonicalEvent {
    pub fn new(kind: EventKind, pos: SourcePos) -> Self {
        Self { kind, pos }
    }

    pub fn start_object(ty: TypeId, pos: SourcePos) -> Self {
        Self::new(
            EventKind::StartObject {
                ty,
                retrieved: false,
            },
            pos,
        )
    }

    pub fn end_object(pos: SourcePos) -> Self {
        Self::new(EventKind::EndObject, pos)
    }

    pub fn start_member(member: MemberRef, pos: SourcePos) -> Self {
        Self::new(EventKind::StartMember(member), pos)
    }

    pub fn end_member(pos: SourcePos) -> Self {
        Self::new(EventKind::EndMember, pos)
    }

    pub fn value(text: impl AsRef<str>, pos: SourcePos) -> Self {
        Self::new(EventKind::Value(Rc::from(text.as_ref())), pos)
    }

    pub fn is_start(&self) -> bool {
        matches!(
            self.kind,
            EventKind::StartObject { .. }
                | EventKind::StartMember(_)
                | EventKind::StartConditionalScope(_)
        )
    }

    pub fn is_end(&self) -> bool {
        matches!(
            self.kind,
            EventKind::EndObject | EventKind::EndMember | EventKind::EndConditionalScope
        )
    }
}

impl fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::StartObject { ty, retrieved } => {
                write!(f, "StartObject({}{})", ty.0, if *retrieved { ", retrieved" } else { "" })
            }
            EventKind::EndObject => write!(f, "EndObject"),
            EventKind::StartMember(m) => write!(f, "StartMember({})", m),
            EventKind::EndMember => write!(f, "EndMember"),
            EventKind::Namespace { prefix, namespace } => {
                write!(f, "Namespace({}={})", prefix, namespace)
            }
            EventKind::Value(text) => write!(f, "Value({:?})", text),
            EventKind::StartConditionalScope(p) => write!(f, "StartConditionalScope({})", p),
            EventKind::EndConditionalScope => write!(f, "EndConditionalScope"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Object,
    Member,
    Conditional,
}

/// Incremental structural validator for event sequences.
///
/// Objects appear at the top level or inside members, members and values
/// only inside objects and members respectively. Conditional scopes are
/// transparent for these rules but must themselves nest.
#[derive(Debug, Clone, Default)]
pub struct EventBalance {
    stack: Vec<Open>,
    roots: usize,
}

impl EventBalance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open objects, members and conditional scopes.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// True when at least one root object was closed and nothing is open.
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty() && self.roots > 0
    }

    fn enclosing(&self) -> Option<Open> {
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|o| *o != Open::Conditional)
    }

    fn unbalanced(event: &CanonicalEvent, why: &str) -> TrellisError {
        TrellisError::structural(
            ErrorCode::UnbalancedEvents,
            format!("{} {}", event, why),
            event.pos,
        )
    }

    /// Validates the next event.
    pub fn check(&mut self, event: &CanonicalEvent) -> TrellisResult<()> {
        let enclosing = self.enclosing();
        match &event.kind {
            EventKind::StartObject { .. } => match enclosing {
                None if self.roots == 0 => {
                    self.roots += 1;
                    self.stack.push(Open::Object);
                }
                None => return Err(Self::unbalanced(event, "after the root object closed")),
                Some(Open::Member) => self.stack.push(Open::Object),
                Some(_) => return Err(Self::unbalanced(event, "outside a member")),
            },
            EventKind::StartMember(_) => match enclosing {
                Some(Open::Object) => self.stack.push(Open::Member),
                _ => return Err(Self::unbalanced(event, "outside an object")),
            },
            EventKind::Value(_) => {
                if enclosing != Some(Open::Member) {
                    return Err(Self::unbalanced(event, "outside a member"));
                }
            }
            EventKind::Namespace { .. } => {
                if enclosing == Some(Open::Object) {
                    return Err(Self::unbalanced(event, "directly inside an object"));
                }
            }
            EventKind::StartConditionalScope(_) => self.stack.push(Open::Conditional),
            EventKind::EndObject => self.close(event, Open::Object)?,
            EventKind::EndMember => self.close(event, Open::Member)?,
            EventKind::EndConditionalScope => self.close(event, Open::Conditional)?,
        }
        Ok(())
    }

    fn close(&mut self, event: &CanonicalEvent, expected: Open) -> TrellisResult<()> {
        match self.stack.last() {
            Some(open) if *open == expected => {
                self.stack.pop();
                Ok(())
            }
            _ => Err(Self::unbalanced(event, "does not close the innermost scope")),
        }
    }

    /// Checks that the sequence ended cleanly.
    pub fn finish(&self, pos: SourcePos) -> TrellisResult<()> {
        if !self.stack.is_empty() {
            return Err(TrellisError::structural(
                ErrorCode::UnbalancedEvents,
                format!("{} scopes left open", self.stack.len()),
                pos,
            ));
        }
        if self.roots == 0 {
            return Err(TrellisError::structural(
                ErrorCode::UnexpectedEof,
                "no root object",
                pos,
            ));
        }
        Ok(())
    }
}

/// Validates a complete event sequence.
pub fn validate_balance<'e>(events: impl IntoIterator<Item = &'e CanonicalEvent>) -> TrellisResult<()> {
    let mut balance = EventBalance::new();
    let mut last = SourcePos::default();
    for event in events {
        balance.check(event)?;
        last = event.pos;
    }
    balance.finish(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ImplicitMember, PropertyId};

    fn p() -> SourcePos {
        SourcePos::new(1, 1)
    }

    fn obj() -> CanonicalEvent {
        CanonicalEvent::start_object(TypeId(0), p())
    }

    fn member() -> CanonicalEvent {
        CanonicalEvent::start_member(MemberRef::Property(PropertyId(0)), p())
    }

    // ===== Accepted shapes =====

    #[test]
    fn test_simple_tree_is_balanced() {
        let events = vec![
            obj(),
            member(),
            CanonicalEvent::value("1", p()),
            CanonicalEvent::end_member(p()),
            CanonicalEvent::start_member(MemberRef::Implicit(ImplicitMember::Items), p()),
            obj(),
            CanonicalEvent::end_object(p()),
            CanonicalEvent::end_member(p()),
            CanonicalEvent::end_object(p()),
        ];
        assert!(validate_balance(&events).is_ok());
    }

    #[test]
    fn test_conditional_scope_is_transparent() {
        let pred = Rc::new(Predicate::new("IsApiPresent", vec!["A".to_string()]));
        let events = vec![
            obj(),
            CanonicalEvent::new(EventKind::StartConditionalScope(pred), p()),
            member(),
            CanonicalEvent::value("1", p()),
            CanonicalEvent::end_member(p()),
            CanonicalEvent::new(EventKind::EndConditionalScope, p()),
            CanonicalEvent::end_object(p()),
        ];
        assert!(validate_balance(&events).is_ok());
    }

    // ===== Rejected shapes =====

    #[test]
    fn test_value_outside_member() {
        let mut balance = EventBalance::new();
        balance.check(&obj()).unwrap();
        let err = balance.check(&CanonicalEvent::value("x", p())).unwrap_err();
        assert_eq!(err.code, Some(ErrorCode::UnbalancedEvents));
    }

    #[test]
    fn test_crossed_conditional_scope() {
        let pred = Rc::new(Predicate::new("P", Vec::new()));
        let mut balance = EventBalance::new();
        balance.check(&obj()).unwrap();
        balance
            .check(&CanonicalEvent::new(EventKind::StartConditionalScope(pred), p()))
            .unwrap();
        balance.check(&member()).unwrap();
        assert!(balance
            .check(&CanonicalEvent::new(EventKind::EndConditionalScope, p()))
            .is_err());
    }

    #[test]
    fn test_second_root_rejected() {
        let mut balance = EventBalance::new();
        balance.check(&obj()).unwrap();
        balance.check(&CanonicalEvent::end_object(p())).unwrap();
        assert!(balance.is_complete());
        assert!(balance.check(&obj()).is_err());
    }

    #[test]
    fn test_unfinished_sequence() {
        let mut balance = EventBalance::new();
        balance.check(&obj()).unwrap();
        assert!(balance.finish(p()).is_err());
        assert!(EventBalance::new().finish(p()).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(obj().to_string(), "StartObject(0)");
        assert_eq!(CanonicalEvent::value("a", p()).to_string(), "Value(\"a\")");
    }
}
