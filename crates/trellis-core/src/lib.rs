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

//! Core front end for Trellis markup.
//!
//! This crate turns markup text into a stream of canonical events:
//!
//! - [`lex::Scanner`] reads markup and yields typed lexical nodes, with
//!   attributes classified and `{...}` values parsed;
//! - [`PullParser`] normalizes those nodes into balanced [`CanonicalEvent`]s,
//!   synthesizing implicit content, collection and initialization members.
//!
//! Types and members are resolved through the [`TypeRegistry`] and
//! [`PropertyRegistry`] collaborator traits; this crate never instantiates
//! anything itself.
//!
//! # Examples
//!
//! ```ignore
//! use trellis_core::{parse_events, ParseOptions};
//!
//! let options = ParseOptions::builder().default_namespace("", "urn:ui").build();
//! let events = parse_events("<Button Width=\"10\"/>", &types, &properties, &options)?;
//! ```

mod error;
pub mod event;
pub mod lex;
mod limits;
mod options;
pub mod parser;
pub mod schema;
mod value;

pub use error::{CollaboratorError, ErrorCode, ErrorKind, TrellisError, TrellisResult};
pub use event::{validate_balance, CanonicalEvent, EventBalance, EventKind};
pub use lex::{Scanner, SourcePos};
pub use limits::Limits;
pub use options::{ParseOptions, ParseOptionsBuilder};
pub use parser::{ParserState, PullParser};
pub use schema::{
    is_assignable, resolve_extension_type, Directive, ExtensionKind, ImplicitMember, MemberRef,
    PropertyId, PropertyInfo, PropertyRegistry, TypeId, TypeInfo, TypeRegistry,
};
pub use value::{InstanceHandle, Value};

/// Scans and parses a complete document into canonical events.
pub fn parse_events(
    source: &str,
    types: &dyn TypeRegistry,
    properties: &dyn PropertyRegistry,
    options: &ParseOptions,
) -> TrellisResult<Vec<CanonicalEvent>> {
    let scanner = Scanner::new(source, types, properties, options)?;
    PullParser::new(scanner, types, properties, options).collect()
}
