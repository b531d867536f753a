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

//! Lexical analysis for Trellis markup.
//!
//! # Module Structure
//!
//! - [`span`] - Source positions and line indexing
//! - [`text`] - Whitespace-aware text accumulation
//! - [`namespace`] - Namespace identities, conditional predicates and the prefix scope stack
//! - [`node`] - Lexical node model and the [`LexicalSource`] trait
//! - [`classify`] - Per-element attribute bucketing
//! - [`expression`] - The `{Type arg, name=value}` markup extension grammar
//! - [`scanner`] - Markup text to lexical nodes
//!
//! # Examples
//!
//! ```
//! use trellis_core::lex::{Predicate, XmlNamespace};
//!
//! let ns = XmlNamespace::parse("urn:ui?IsApiPresent(Widgets)");
//! assert_eq!(ns.uri(), "urn:ui");
//! assert_eq!(ns.predicate(), Some(&Predicate::new("IsApiPresent", vec!["Widgets".to_string()])));
//! ```

pub mod classify;
pub mod expression;
pub mod namespace;
pub mod node;
pub mod scanner;
pub mod span;
pub mod text;

pub use classify::{bucket_of, AttributeBucket, SortedAttributes};
pub use expression::{looks_like_expression, parse_expression, unescape_literal, ExpressionContext};
pub use namespace::{
    NamespaceScope, Predicate, XmlNamespace, CODE_NAMESPACE_SCHEME, COMPATIBILITY_NAMESPACE,
    LANGUAGE_NAMESPACE, XML_NAMESPACE,
};
pub use node::{
    AttributeNode, DirectiveNode, ElementNode, LexicalNode, LexicalSource, NodeKind, NodeQueue,
    NodeTag, PrefixNode, PropertyElementNode,
};
pub use scanner::Scanner;
pub use span::{LineIndex, SourcePos};
pub use text::{is_markup_whitespace, MarkupText};
