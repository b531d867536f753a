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

//! # Trellis - markup to object graph compiler
//!
//! Trellis reads XAML-style markup and builds live object graphs through a
//! set of collaborator traits. The pipeline has three stages:
//!
//! 1. **Front end** ([`trellis_core`]): a scanner and a pull parser turn
//!    markup into balanced [`CanonicalEvent`]s with every type and member
//!    resolved.
//! 2. **Node stream** ([`trellis_stream`]): events can be recorded into a
//!    compact [`NodeStream`] and replayed from any captured offset.
//! 3. **Graph writer** ([`trellis_graph`]): events become objects. Keyed
//!    resource dictionary entries are recorded and only built when first
//!    looked up.
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis::{load_markup, ParseOptions, Value, WriterSettings};
//! use trellis_test::TestRuntime;
//!
//! let rt = TestRuntime::ui();
//! let root = load_markup(
//!     r#"<Button xmlns="urn:trellis:ui" Width="120">OK</Button>"#,
//!     rt.collaborators(),
//!     &ParseOptions::default(),
//!     WriterSettings::default(),
//! )
//! .unwrap();
//! assert_eq!(rt.member(&root, "Width"), Some(Value::Float(120.0)));
//! ```
//!
//! ## Compile once, load many times
//!
//! ```rust
//! use trellis::{compile_stream, load_stream, ParseOptions, WriterSettings};
//! use trellis_test::{fixtures, TestRuntime};
//!
//! let rt = TestRuntime::ui();
//! let schema = rt.schema();
//! let stream = compile_stream(fixtures::nested_panels(), schema, schema, &ParseOptions::default())
//!     .unwrap();
//! let first = load_stream(&stream, rt.collaborators(), WriterSettings::default()).unwrap();
//! let second = load_stream(&stream, rt.collaborators(), WriterSettings::default()).unwrap();
//! assert_eq!(rt.snapshot(&first), rt.snapshot(&second));
//! ```
//!
//! ## Modules
//!
//! - [`lex`]: scanner, lexical nodes, namespaces and markup extension syntax
//! - [`stream`]: the node stream codec
//! - [`graph`]: the writer, resource dictionaries and runtime collaborator traits

pub use trellis_core::{
    is_assignable, parse_events, validate_balance, CanonicalEvent, CollaboratorError, Directive,
    ErrorCode, ErrorKind, EventBalance, EventKind, ExtensionKind, ImplicitMember, InstanceHandle,
    Limits, MemberRef, ParseOptions, ParseOptionsBuilder, PropertyId, PropertyInfo,
    PropertyRegistry, PullParser, Scanner, SourcePos, TrellisError, TrellisResult, TypeId,
    TypeInfo, TypeRegistry, Value,
};
pub use trellis_graph::{
    Collaborators, DeferralPolicy, GraphWriter, LookupScope, ResourceDictionary, ResourceKey,
    WriterSettings,
};
pub use trellis_stream::{NodeStream, StreamError, StreamOffset};

mod error_ext;
pub use error_ext::TrellisResultExt;

pub mod lex {
    //! Lexical analysis
    pub use trellis_core::lex::*;
}

pub mod stream {
    //! Node stream codec
    pub use trellis_stream::*;
}

pub mod graph {
    //! Object graph writer and resources
    pub use trellis_graph::*;
}

use tracing::debug;

/// Compiles markup into a node stream without building anything.
///
/// Events are encoded as the parser produces them; no intermediate event
/// list is kept.
pub fn compile_stream(
    source: &str,
    types: &dyn TypeRegistry,
    properties: &dyn PropertyRegistry,
    options: &ParseOptions,
) -> TrellisResult<NodeStream> {
    let scanner = Scanner::new(source, types, properties, options)?;
    let mut stream = NodeStream::new();
    for event in PullParser::new(scanner, types, properties, options) {
        stream.encode(&event?)?;
    }
    debug!(
        records = stream.record_count(),
        bytes = stream.len(),
        "compiled markup"
    );
    Ok(stream)
}

/// Parses markup and writes it straight into an object graph.
///
/// Types and members are resolved through `cx.types` and `cx.properties`.
pub fn load_markup(
    source: &str,
    cx: Collaborators<'_>,
    options: &ParseOptions,
    settings: WriterSettings,
) -> TrellisResult<Value> {
    let scanner = Scanner::new(source, cx.types, cx.properties, options)?;
    let mut writer = GraphWriter::new(cx, settings);
    for event in PullParser::new(scanner, cx.types, cx.properties, options) {
        writer.write(&event?)?;
    }
    writer.finish()
}

/// Builds an object graph from a compiled stream.
pub fn load_stream(
    stream: &NodeStream,
    cx: Collaborators<'_>,
    settings: WriterSettings,
) -> TrellisResult<Value> {
    let mut writer = GraphWriter::new(cx, settings);
    for event in stream.read_cursor() {
        writer.write(&event?)?;
    }
    writer.finish()
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
