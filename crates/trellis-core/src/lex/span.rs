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

//! Source positions and byte-offset to line/column mapping.
//!
//! # Examples
//!
//! ```
//! use trellis_core::lex::{LineIndex, SourcePos};
//!
//! let index = LineIndex::new("<Grid>\n  <Button/>\n</Grid>");
//! assert_eq!(index.position(9), SourcePos::new(2, 3));
//! ```

use std::fmt;

/// A position in markup source (line and column).
///
/// Both are 1-indexed. `SourcePos::default()` (0, 0) marks an unknown position,
/// e.g. for events synthesized without any source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourcePos {
    line: usize,
    column: usize,
}

impl SourcePos {
    /// Creates a new source position.
    #[inline]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Returns the line number.
    #[inline]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Returns the column number.
    #[inline]
    pub const fn column(&self) -> usize {
        self.column
    }

    /// True for the (0, 0) placeholder position.
    #[inline]
    pub const fn is_unknown(&self) -> bool {
        self.line == 0 && self.column == 0
    }

    /// Returns this position shifted right by `columns` on the same line.
    #[inline]
    pub const fn offset_columns(&self, columns: usize) -> Self {
        Self {
            line: self.line,
            column: self.column + columns,
        }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Maps byte offsets in a source text to [`SourcePos`] values.
///
/// Built once per document with a single `memchr` pass over the newlines.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first byte of every line.
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = Vec::with_capacity(source.len() / 32 + 1);
        starts.push(0);
        starts.extend(memchr::memchr_iter(b'\n', source.as_bytes()).map(|i| i + 1));
        Self { starts }
    }

    /// Number of lines in the indexed source.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Converts a byte offset into a 1-based line/column pair.
    pub fn position(&self, offset: usize) -> SourcePos {
        let line = match self.starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert) => insert.saturating_sub(1),
        };
        SourcePos::new(line + 1, offset - self.starts[line] + 1)
    }
}
