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

//! Property-based tests for attribute classification.

use proptest::prelude::*;
use trellis_test::{parse, render, TestRuntime};

const ATTRIBUTES: &[&str] = &[
    r#"Width="10""#,
    r#"Height="20""#,
    r#"Tag="t""#,
    r#"IsEnabled="true""#,
    r#"Click="go""#,
    r#"x:Name="n""#,
    r#"x:Uid="u""#,
    r#"Grid.Row="1""#,
    r#"Column="2""#,
    r#"Background="{StaticResource Accent}""#,
];

fn button_with(attributes: &[&str]) -> String {
    format!(
        r#"<Button xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml" {}/>"#,
        attributes.join(" ")
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: every permutation of an attribute set yields the same events.
    #[test]
    fn prop_attribute_order_is_irrelevant(shuffled in Just(ATTRIBUTES.to_vec()).prop_shuffle()) {
        let rt = TestRuntime::ui();
        let baseline = render(&parse(&button_with(ATTRIBUTES), &rt).unwrap(), &rt);
        let events = parse(&button_with(&shuffled), &rt);
        prop_assert!(events.is_ok(), "{:?}", events.err());
        prop_assert_eq!(render(&events.unwrap(), &rt), baseline);
    }

    /// Property: the runtime-name and uid directives always precede properties.
    #[test]
    fn prop_identity_attributes_come_first(
        subset in proptest::sample::subsequence(ATTRIBUTES.to_vec(), 1..ATTRIBUTES.len())
            .prop_shuffle()
    ) {
        let rt = TestRuntime::ui();
        let rendered = render(&parse(&button_with(&subset), &rt).unwrap(), &rt);
        let first_property = ["[Width", "[Height", "[Tag", "[IsEnabled", "[Row", "[Column", "[Background"]
            .iter()
            .filter_map(|m| rendered.find(m))
            .min();
        for identity in ["[x:Uid", "[x:Name"] {
            if let (Some(at), Some(first)) = (rendered.find(identity), first_property) {
                prop_assert!(at < first, "{} after a property in {}", identity, rendered);
            }
        }
    }
}

#[test]
fn test_bucket_order_for_full_set() {
    let rt = TestRuntime::ui();
    let rendered = render(&parse(&button_with(ATTRIBUTES), &rt).unwrap(), &rt);
    let uid = rendered.find("[x:Uid").unwrap();
    let name = rendered.find("[x:Name").unwrap();
    let click = rendered.find("[Click").unwrap();
    let width = rendered.find("[Width").unwrap();
    assert!(uid < name && name < click && click < width, "{}", rendered);
}
