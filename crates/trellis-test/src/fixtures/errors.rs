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

//! Invalid documents and the error each one raises.

use trellis_core::{ErrorCode, ErrorKind};

/// An invalid document.
#[derive(Debug, Clone, Copy)]
pub struct ErrorCase {
    pub name: &'static str,
    pub markup: &'static str,
    pub kind: ErrorKind,
    pub code: Option<ErrorCode>,
}

const fn case(
    name: &'static str,
    markup: &'static str,
    kind: ErrorKind,
    code: Option<ErrorCode>,
) -> ErrorCase {
    ErrorCase {
        name,
        markup,
        kind,
        code,
    }
}

/// Documents rejected while scanning or parsing.
pub fn parse_errors() -> Vec<ErrorCase> {
    vec![
        case(
            "unclosed_element",
            r#"<StackPanel xmlns="urn:trellis:ui"><Button></StackPanel>"#,
            ErrorKind::Scan,
            Some(ErrorCode::MalformedMarkup),
        ),
        case(
            "doctype",
            r#"<!DOCTYPE x><Button xmlns="urn:trellis:ui"/>"#,
            ErrorKind::Scan,
            Some(ErrorCode::DoctypeProhibited),
        ),
        case(
            "undeclared_prefix",
            r#"<Button xmlns="urn:trellis:ui"><q:Button/></Button>"#,
            ErrorKind::UnresolvedName,
            Some(ErrorCode::UndeclaredPrefix),
        ),
        case(
            "unknown_type",
            r#"<Widget xmlns="urn:trellis:ui"/>"#,
            ErrorKind::UnresolvedName,
            None,
        ),
        case(
            "unknown_property",
            r#"<Button xmlns="urn:trellis:ui" Colour="Red"/>"#,
            ErrorKind::UnresolvedName,
            None,
        ),
        case(
            "unknown_directive",
            r#"<Button xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml" x:Frobnicate="1"/>"#,
            ErrorKind::UnresolvedName,
            Some(ErrorCode::UnknownDirective),
        ),
        case(
            "property_element_at_root",
            r#"<Button.Width xmlns="urn:trellis:ui">1</Button.Width>"#,
            ErrorKind::Scan,
            Some(ErrorCode::PropertyElementAtRoot),
        ),
        case(
            "attribute_on_property_element",
            r#"<Button xmlns="urn:trellis:ui"><Button.Background Color="Red">Red</Button.Background></Button>"#,
            ErrorKind::Scan,
            Some(ErrorCode::PropertyOnPropertyElement),
        ),
        case(
            "nested_property_element",
            r#"<Button xmlns="urn:trellis:ui"><Button.Background><Button.Width>1</Button.Width></Button.Background></Button>"#,
            ErrorKind::Structural,
            Some(ErrorCode::NestedPropertyElement),
        ),
        case(
            "content_without_content_property",
            r#"<Rect xmlns="urn:trellis:ui"><Button/></Rect>"#,
            ErrorKind::Structural,
            Some(ErrorCode::InvalidContent),
        ),
        case(
            "text_outside_root",
            r#"<Button xmlns="urn:trellis:ui"/>trailing"#,
            ErrorKind::Scan,
            Some(ErrorCode::MalformedMarkup),
        ),
        case(
            "unterminated_expression",
            r#"<Button xmlns="urn:trellis:ui" Tag="{StaticResource Red"/>"#,
            ErrorKind::ExpressionSyntax,
            None,
        ),
    ]
}

/// Documents that parse but fail while the graph is written.
pub fn write_errors() -> Vec<ErrorCase> {
    vec![
        case(
            "bad_conversion",
            r#"<Button xmlns="urn:trellis:ui" Width="wide"/>"#,
            ErrorKind::Conversion,
            None,
        ),
        case(
            "duplicate_member",
            r#"<Button xmlns="urn:trellis:ui" Width="1"><Button.Width>2</Button.Width></Button>"#,
            ErrorKind::DuplicateAssignment,
            None,
        ),
        case(
            "duplicate_key",
            r#"<ResourceDictionary xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml"><Brush x:Key="a">Red</Brush><Brush x:Key="a">Blue</Brush></ResourceDictionary>"#,
            ErrorKind::DuplicateAssignment,
            None,
        ),
        case(
            "entry_without_key",
            r#"<ResourceDictionary xmlns="urn:trellis:ui"><Brush>Red</Brush></ResourceDictionary>"#,
            ErrorKind::Structural,
            Some(ErrorCode::InvalidContent),
        ),
        case(
            "missing_resource",
            r#"<Button xmlns="urn:trellis:ui" Background="{StaticResource Nowhere}"/>"#,
            ErrorKind::Resource,
            None,
        ),
        case(
            "failing_extension",
            r#"<Button xmlns="urn:trellis:ui" Tag="{Fail broken}"/>"#,
            ErrorKind::Runtime,
            None,
        ),
    ]
}
