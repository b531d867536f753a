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

//! Options for scanning and parsing markup.
//!
//! ```
//! use trellis_core::ParseOptions;
//!
//! let opts = ParseOptions::builder()
//!     .max_depth(64)
//!     .tolerate_unknown_members(true)
//!     .default_namespace("", "urn:ui")
//!     .build();
//! assert!(opts.tolerate_unknown_members);
//! assert_eq!(opts.limits.max_depth, 64);
//! ```

use crate::limits::Limits;

/// Parsing options.
///
/// Direct field access and the fluent [`ParseOptionsBuilder`] are both
/// supported.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseOptions {
    /// Resource limits.
    pub limits: Limits,
    /// Emit unknown attributes and property elements as `MemberRef::Unknown`
    /// instead of failing.
    pub tolerate_unknown_members: bool,
    /// Prefix to URI bindings synthesized on the root element when the
    /// document does not declare them itself.
    pub default_namespaces: Vec<(String, String)>,
    /// Document-wide `xml:space="preserve"`.
    pub preserve_whitespace: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            tolerate_unknown_members: false,
            default_namespaces: Vec::new(),
            preserve_whitespace: false,
        }
    }
}

impl ParseOptions {
    /// Create a new builder for ParseOptions.
    pub fn builder() -> ParseOptionsBuilder {
        ParseOptionsBuilder::new()
    }
}

/// Builder for ergonomic construction of ParseOptions.
#[derive(Debug, Clone, Default)]
pub struct ParseOptionsBuilder {
    options: ParseOptions,
}

impl ParseOptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.options.limits = limits;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.limits.max_depth = depth;
        self
    }

    pub fn max_attributes(mut self, count: usize) -> Self {
        self.options.limits.max_attributes = count;
        self
    }

    pub fn max_text_length(mut self, len: usize) -> Self {
        self.options.limits.max_text_length = len;
        self
    }

    pub fn max_events(mut self, count: usize) -> Self {
        self.options.limits.max_events = count;
        self
    }

    pub fn tolerate_unknown_members(mut self, tolerate: bool) -> Self {
        self.options.tolerate_unknown_members = tolerate;
        self
    }

    /// Adds a default prefix binding (`""` for the default namespace).
    pub fn default_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.options
            .default_namespaces
            .push((prefix.into(), uri.into()));
        self
    }

    pub fn preserve_whitespace(mut self, preserve: bool) -> Self {
        self.options.preserve_whitespace = preserve;
        self
    }

    pub fn build(self) -> ParseOptions {
        self.options
    }
}
