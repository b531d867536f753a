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

//! Resource limits for scanning and parsing.

/// Configurable limits bounding the work done for one document.
///
/// Exceeding any limit aborts the parse with a `Security` error.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Maximum source size in bytes (default: 64MB).
    pub max_source_size: usize,
    /// Maximum element nesting depth (default: 256).
    pub max_depth: usize,
    /// Maximum attributes on a single element (default: 1024).
    pub max_attributes: usize,
    /// Maximum length of a single text run in bytes (default: 16MB).
    pub max_text_length: usize,
    /// Maximum markup extension nesting (default: 64).
    pub max_expression_depth: usize,
    /// Maximum canonical events per document (default: 10M).
    pub max_events: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_source_size: 64 * 1024 * 1024,
            max_depth: 256,
            max_attributes: 1024,
            max_text_length: 16 * 1024 * 1024,
            max_expression_depth: 64,
            max_events: 10_000_000,
        }
    }
}

impl Limits {
    /// Create limits with no restrictions (for testing).
    pub fn unlimited() -> Self {
        Self {
            max_source_size: usize::MAX,
            max_depth: usize::MAX,
            max_attributes: usize::MAX,
            max_text_length: usize::MAX,
            max_expression_depth: usize::MAX,
            max_events: usize::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Default limits tests ====================

    #[test]
    fn test_default_depth_and_attributes() {
        let limits = Limits::default();
        assert_eq!(limits.max_depth, 256);
        assert_eq!(limits.max_attributes, 1024);
        assert_eq!(limits.max_expression_depth, 64);
    }

    #[test]
    fn test_default_sizes() {
        let limits = Limits::default();
        assert_eq!(limits.max_source_size, 64 * 1024 * 1024);
        assert_eq!(limits.max_text_length, 16 * 1024 * 1024);
        assert_eq!(limits.max_events, 10_000_000);
    }

    // ==================== Unlimited tests ====================

    #[test]
    fn test_unlimited() {
        let limits = Limits::unlimited();
        assert_eq!(limits.max_depth, usize::MAX);
        assert_eq!(limits.max_events, usize::MAX);
        assert_ne!(limits, Limits::default());
    }
}
