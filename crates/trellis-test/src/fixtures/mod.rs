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

//! Canonical markup documents over [`TestSchema::ui`](crate::TestSchema::ui).
//!
//! - **documents**: well-formed documents exercising one feature each
//! - **errors**: malformed or invalid documents with the error they raise

mod documents;
pub mod errors;

pub use documents::*;

use crate::FixtureList;

/// Every well-formed document, for tests that run over all of them.
pub fn all() -> FixtureList {
    vec![
        ("button", button),
        ("nested_panels", nested_panels),
        ("text_content", text_content),
        ("attached_properties", attached_properties),
        ("page_with_resources", page_with_resources),
        ("backward_reference", backward_reference),
        ("forward_reference", forward_reference),
        ("implicit_style", implicit_style),
        ("extensions", extensions),
        ("conditional", conditional),
        ("ignorable", ignorable),
        ("inline_whitespace", inline_whitespace),
        ("preserved_space", preserved_space),
        ("named_entries", named_entries),
    ]
}
