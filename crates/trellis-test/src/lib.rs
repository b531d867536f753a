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

//! Shared test fixtures and utilities for Trellis crates.
//!
//! This crate provides a small UI-like schema, an in-memory object runtime
//! that implements every collaborator trait, and canonical markup documents,
//! so the parser, stream and graph crates can test against the same world.
//!
//! # Quick Start
//!
//! ```rust
//! use trellis_test::{fixtures, load, TestRuntime};
//! use trellis_graph::WriterSettings;
//!
//! let rt = TestRuntime::ui();
//! let root = load(fixtures::button(), &rt, WriterSettings::default()).unwrap();
//! assert_eq!(rt.type_of(&root).as_deref(), Some("Button"));
//!
//! for case in fixtures::errors::parse_errors() {
//!     assert!(trellis_test::parse(case.markup, &rt).is_err(), "{}", case.name);
//! }
//! ```

pub mod fixtures;
mod runtime;
mod schema;

pub use runtime::{Snapshot, TestObject, TestRuntime};
pub use schema::{SchemaBuilder, TestSchema, UI_NAMESPACE};

use trellis_core::{
    parse_events, CanonicalEvent, EventKind, MemberRef, ParseOptions, TrellisResult, Value,
};
use trellis_graph::{GraphWriter, WriterSettings};
use trellis_stream::NodeStream;

/// Type alias for a list of fixture functions (name, markup).
pub type FixtureList = Vec<(&'static str, fn() -> &'static str)>;

/// Parse options used by every helper: strict, no default bindings.
pub fn ui_options() -> ParseOptions {
    ParseOptions::default()
}

/// Parses markup against the runtime's schema.
pub fn parse(markup: &str, rt: &TestRuntime) -> TrellisResult<Vec<CanonicalEvent>> {
    parse_events(markup, rt, rt, &ui_options())
}

/// Parses markup and encodes the events into a node stream.
pub fn record(markup: &str, rt: &TestRuntime) -> TrellisResult<NodeStream> {
    let events = parse(markup, rt)?;
    Ok(NodeStream::from_events(&events)?)
}

/// Parses markup and writes the object graph.
pub fn load(markup: &str, rt: &TestRuntime, settings: WriterSettings) -> TrellisResult<Value> {
    let events = parse(markup, rt)?;
    let mut writer = GraphWriter::new(rt.collaborators(), settings);
    writer.write_all(&events)?;
    writer.finish()
}

/// Renders events as a compact token string using schema names.
///
/// `+Type` opens an object (`+Type*` when retrieved), `-` closes it,
/// `[Member` and `]` bracket members, `'text'` is a value and `?Pred(..)`
/// and `?` bracket conditional scopes. Namespace events are left out.
pub fn render(events: &[CanonicalEvent], rt: &TestRuntime) -> String {
    let schema = rt.schema();
    let mut tokens = Vec::with_capacity(events.len());
    for event in events {
        let token = match &event.kind {
            EventKind::StartObject { ty, retrieved } => {
                format!("+{}{}", schema.type_name(*ty), if *retrieved { "*" } else { "" })
            }
            EventKind::EndObject => "-".to_string(),
            EventKind::StartMember(member) => format!("[{}", member_name(member, schema)),
            EventKind::EndMember => "]".to_string(),
            EventKind::Value(text) => format!("'{}'", text),
            EventKind::StartConditionalScope(predicate) => format!("?{}", predicate),
            EventKind::EndConditionalScope => "?".to_string(),
            EventKind::Namespace { .. } => continue,
        };
        tokens.push(token);
    }
    tokens.join(" ")
}

fn member_name(member: &MemberRef, schema: &TestSchema) -> String {
    match member {
        MemberRef::Property(p) => schema.property_name(*p).to_string(),
        MemberRef::Directive(d) => format!("x:{}", d.name()),
        MemberRef::Implicit(i) => i.name().to_string(),
        MemberRef::Unknown(name) => format!("!{}", name),
    }
}
