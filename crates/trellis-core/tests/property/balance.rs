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

//! Property-based tests for event balance.
//!
//! Random lexical node sequences are fed straight into the parser. Whatever
//! the input, every event it emits must keep the sequence balanced, and a
//! sequence it accepts in full must be a complete document.

use proptest::prelude::*;
use std::rc::Rc;
use trellis_core::lex::{
    AttributeNode, ElementNode, LexicalNode, MarkupText, NodeKind, NodeQueue,
    PropertyElementNode, XmlNamespace,
};
use trellis_core::{
    validate_balance, EventBalance, MemberRef, ParseOptions, PullParser, SourcePos,
};
use trellis_test::{TestRuntime, UI_NAMESPACE};

#[derive(Debug, Clone)]
enum Token {
    Element(&'static str),
    PropertyElement(&'static str, &'static str),
    Attribute(&'static str, &'static str),
    Text(&'static str),
    End,
}

fn token() -> impl Strategy<Value = Token> {
    prop_oneof![
        3 => prop::sample::select(vec!["StackPanel", "Button", "TextBlock", "Brush", "ResourceDictionary"])
            .prop_map(Token::Element),
        1 => prop::sample::select(vec![("Button", "Background"), ("UIElement", "Width"), ("Panel", "Children")])
            .prop_map(|(o, m)| Token::PropertyElement(o, m)),
        2 => prop::sample::select(vec![("UIElement", "Width"), ("UIElement", "Tag"), ("TextBlock", "Text")])
            .prop_map(|(o, m)| Token::Attribute(o, m)),
        2 => prop::sample::select(vec!["hello", "  ", "Red"]).prop_map(Token::Text),
        3 => Just(Token::End),
    ]
}

fn node(token: &Token, rt: &TestRuntime, col: usize) -> LexicalNode {
    let schema = rt.schema();
    let pos = SourcePos::new(1, col);
    let kind = match token {
        Token::Element(name) => NodeKind::Element(ElementNode {
            prefix: Rc::from(""),
            local_name: Rc::from(*name),
            namespace: XmlNamespace::parse(UI_NAMESPACE),
            ty: schema.type_id(name),
            has_key: false,
        }),
        Token::PropertyElement(owner, member) => NodeKind::PropertyElement(PropertyElementNode {
            prefix: Rc::from(""),
            local_name: Rc::from(format!("{}.{}", owner, member).as_str()),
            namespace: XmlNamespace::parse(UI_NAMESPACE),
            member: MemberRef::Property(schema.property_id(owner, member)),
        }),
        Token::Attribute(owner, member) => NodeKind::Attribute(AttributeNode {
            prefix: Rc::from(""),
            local_name: Rc::from(*member),
            namespace: None,
            member: MemberRef::Property(schema.property_id(owner, member)),
            value: Rc::from("1"),
            expression: None,
        }),
        Token::Text(text) => NodeKind::Text(MarkupText::from_raw(*text, false)),
        Token::End => NodeKind::EndTag,
    };
    LexicalNode::new(kind, pos)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Property: emitted events stay balanced until the first error.
    #[test]
    fn prop_emitted_prefix_is_balanced(tokens in prop::collection::vec(token(), 0..40)) {
        let rt = TestRuntime::ui();
        let options = ParseOptions::default();
        let nodes: Vec<_> = tokens.iter().enumerate().map(|(i, t)| node(t, &rt, i + 1)).collect();
        let parser = PullParser::new(NodeQueue::new(nodes), &rt, &rt, &options);

        let mut balance = EventBalance::new();
        let mut events = Vec::new();
        let mut failed = false;
        for item in parser {
            match item {
                Ok(event) => {
                    prop_assert!(balance.check(&event).is_ok(), "unbalanced at {}", event);
                    events.push(event);
                }
                Err(_) => {
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            prop_assert!(validate_balance(&events).is_ok());
        }
    }

    /// Property: the parser never accepts more closing tags than opening ones.
    #[test]
    fn prop_extra_end_tag_is_rejected(depth in 1_usize..6) {
        let rt = TestRuntime::ui();
        let options = ParseOptions::default();
        let mut tokens = vec![Token::Element("StackPanel"); depth];
        tokens.extend(std::iter::repeat(Token::End).take(depth + 1));
        let nodes: Vec<_> = tokens.iter().enumerate().map(|(i, t)| node(t, &rt, i + 1)).collect();
        let parser = PullParser::new(NodeQueue::new(nodes), &rt, &rt, &options);
        let result: Result<Vec<_>, _> = parser.collect();
        prop_assert!(result.is_err());
    }
}
