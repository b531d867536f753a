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

//! Accumulated element text and markup whitespace rules.

/// Markup whitespace: space, tab, carriage return and line feed.
#[inline]
pub fn is_markup_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Text content collected between two element boundaries.
///
/// Unless `preserve` is set (xml:space="preserve"), every run of whitespace is
/// collapsed to a single space as it is pasted in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkupText {
    text: String,
    preserve: bool,
}

impl MarkupText {
    pub fn new(preserve: bool) -> Self {
        Self {
            text: String::new(),
            preserve,
        }
    }

    /// Builds text verbatim, without collapsing.
    pub fn from_raw(text: impl Into<String>, preserve: bool) -> Self {
        Self {
            text: text.into(),
            preserve,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_preserved(&self) -> bool {
        self.preserve
    }

    pub fn is_whitespace_only(&self) -> bool {
        self.text.chars().all(is_markup_whitespace)
    }

    /// Appends a chunk, collapsing whitespace runs unless preserved.
    pub fn paste(&mut self, chunk: &str) {
        if self.preserve {
            self.text.push_str(chunk);
            return;
        }
        let mut in_space = self.text.ends_with(' ');
        for c in chunk.chars() {
            if is_markup_whitespace(c) {
                if !in_space {
                    self.text.push(' ');
                    in_space = true;
                }
            } else {
                self.text.push(c);
                in_space = false;
            }
        }
    }

    pub fn trim_start(&mut self) {
        let start = self.text.len() - self.text.trim_start_matches(is_markup_whitespace).len();
        self.text.drain(..start);
    }

    pub fn trim_end(&mut self) {
        let end = self.text.trim_end_matches(is_markup_whitespace).len();
        self.text.truncate(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paste_collapses_runs() {
        let mut text = MarkupText::new(false);
        text.paste("  hello \n\t world ");
        assert_eq!(text.as_str(), " hello world ");
    }

    #[test]
    fn test_paste_collapses_across_chunks() {
        let mut text = MarkupText::new(false);
        text.paste("a ");
        text.paste("\n b");
        assert_eq!(text.as_str(), "a b");
    }

    #[test]
    fn test_preserve_keeps_everything() {
        let mut text = MarkupText::new(true);
        text.paste("  a \n b  ");
        assert_eq!(text.as_str(), "  a \n b  ");
        assert!(text.is_preserved());
    }

    #[test]
    fn test_trims() {
        let mut text = MarkupText::from_raw(" \n x y \t", false);
        text.trim_start();
        assert_eq!(text.as_str(), "x y \t");
        text.trim_end();
        assert_eq!(text.as_str(), "x y");
    }

    #[test]
    fn test_whitespace_only() {
        assert!(MarkupText::from_raw(" \r\n\t", false).is_whitespace_only());
        assert!(!MarkupText::from_raw(" x ", false).is_whitespace_only());
        assert!(MarkupText::default().is_whitespace_only());
    }
}
