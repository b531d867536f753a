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

//! Graph writer tests over the shared UI schema and runtime.

use trellis_core::{
    parse_events, CanonicalEvent, Directive, ErrorCode, ErrorKind, ParseOptions, SourcePos,
    Value,
};
use trellis_graph::{DeferralPolicy, GraphWriter, ResourceKey, WriterSettings};
use trellis_test::{fixtures, load, parse, TestRuntime};

fn eager() -> WriterSettings {
    WriterSettings::default().with_deferral(DeferralPolicy::never())
}

fn children(rt: &TestRuntime, panel: &Value) -> Vec<Value> {
    let collection = rt.member(panel, "Children").expect("panel has children");
    rt.items(&collection)
}

// =============================================================================
// Objects and members
// =============================================================================

#[test]
fn test_button() {
    let rt = TestRuntime::ui();
    let root = load(fixtures::button(), &rt, WriterSettings::default()).unwrap();
    assert_eq!(rt.type_of(&root).as_deref(), Some("Button"));
    assert_eq!(rt.member(&root, "Width"), Some(Value::Float(120.0)));
    assert_eq!(rt.member(&root, "Content"), Some(Value::string("OK")));
    // x:Name also sets the runtime-name property.
    assert_eq!(rt.member(&root, "Name"), Some(Value::string("ok")));
    assert_eq!(
        rt.directives(&root),
        vec![(Directive::Name, Value::string("ok"))]
    );
}

#[test]
fn test_nested_panels() {
    let rt = TestRuntime::ui();
    let root = load(fixtures::nested_panels(), &rt, WriterSettings::default()).unwrap();
    let items = children(&rt, &root);
    assert_eq!(items.len(), 3);
    assert_eq!(rt.member(&items[0], "Width"), Some(Value::Float(10.0)));
    assert_eq!(rt.type_of(&items[1]).as_deref(), Some("StackPanel"));
    let inner = children(&rt, &items[1]);
    assert_eq!(rt.member(&inner[0], "Text"), Some(Value::string("Inner")));
    assert_eq!(rt.created_count("StackPanel"), 2);
    assert_eq!(rt.created_count("Button"), 2);
}

#[test]
fn test_attached_properties_and_property_elements() {
    let rt = TestRuntime::ui();
    let root = load(fixtures::attached_properties(), &rt, WriterSettings::default()).unwrap();
    let button = &children(&rt, &root)[0];
    assert_eq!(rt.member(button, "Row"), None, "Row is owned by Grid");
    let schema = rt.schema();
    let row = schema.property_id("Grid", "Row");
    let handle = button.as_object().unwrap();
    assert_eq!(rt.object(handle).unwrap().members.get(&row), Some(&Value::Int(1)));
    assert_eq!(rt.member(button, "Column"), Some(Value::Int(2)));
    let background = rt.member(button, "Background").unwrap();
    assert_eq!(rt.type_of(&background).as_deref(), Some("Brush"));
    assert_eq!(rt.member(&background, "Color"), Some(Value::string("Blue")));
}

#[test]
fn test_text_initialized_objects_are_not_created() {
    let rt = TestRuntime::ui();
    load(
        r#"<Button xmlns="urn:trellis:ui"><Button.Background><Brush>Red</Brush></Button.Background></Button>"#,
        &rt,
        WriterSettings::default(),
    )
    .unwrap();
    assert_eq!(rt.created_count("Brush"), 0);
    assert_eq!(rt.created_count("Button"), 1);
    assert_eq!(rt.conversion_count(), 1);
}

#[test]
fn test_inline_items_keep_significant_space() {
    let rt = TestRuntime::ui();
    let root = load(fixtures::inline_whitespace(), &rt, WriterSettings::default()).unwrap();
    let inlines = rt.member(&root, "Inlines").unwrap();
    let items = rt.items(&inlines);
    assert_eq!(items.len(), 5);
    assert_eq!(items[1], Value::string(" "));
    assert_eq!(rt.type_of(&items[3]).as_deref(), Some("LineBreak"));
}

// =============================================================================
// Extensions
// =============================================================================

#[test]
fn test_custom_and_null_extensions() {
    let rt = TestRuntime::ui();
    let root = load(fixtures::extensions(), &rt, WriterSettings::default()).unwrap();
    let blocks = children(&rt, &root);
    assert_eq!(rt.member(&blocks[0], "Text"), Some(Value::string("binding:Title")));
    assert_eq!(rt.member(&blocks[0], "Tag"), Some(Value::Null));
    assert_eq!(rt.member(&blocks[1], "Text"), Some(Value::string("binding:Subtitle")));
    assert_eq!(rt.member(&blocks[2], "Text"), Some(Value::string("{literal}")));
    // Extension objects are evaluated, never created.
    assert_eq!(rt.created_count("BindingExtension"), 0);
}

#[test]
fn test_failing_extension_is_a_runtime_error() {
    let rt = TestRuntime::ui();
    let err = load(
        r#"<Button xmlns="urn:trellis:ui" Tag="{Fail broken}"/>"#,
        &rt,
        WriterSettings::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "broken");
}

#[test]
fn test_static_resource_from_application_resources() {
    let rt = TestRuntime::ui();
    rt.app_resources()
        .add(ResourceKey::name("Accent"), Value::string("gold"), SourcePos::default())
        .unwrap();
    let root = load(
        r#"<Button xmlns="urn:trellis:ui" Tag="{StaticResource Accent}"/>"#,
        &rt,
        WriterSettings::default(),
    )
    .unwrap();
    assert_eq!(rt.member(&root, "Tag"), Some(Value::string("gold")));
}

#[test]
fn test_page_resources_resolve_from_content() {
    let rt = TestRuntime::ui();
    let root = load(fixtures::page_with_resources(), &rt, WriterSettings::default()).unwrap();
    let button = rt.member(&root, "Content").unwrap();
    let background = rt.member(&button, "Background").unwrap();
    assert_eq!(rt.member(&background, "Color"), Some(Value::string("Orange")));
    let style = rt.member(&button, "Tag").unwrap();
    assert_eq!(rt.type_of(&style).as_deref(), Some("Style"));
    assert_eq!(rt.member(&style, "Background"), Some(background));
}

#[test]
fn test_resource_scope_setting_limits_static_resource() {
    let rt = TestRuntime::ui();
    let theme = std::rc::Rc::new(trellis_graph::ResourceDictionary::new());
    theme
        .add(ResourceKey::name("Accent"), Value::string("dark"), SourcePos::default())
        .unwrap();
    rt.app_resources().add_theme("Dark", theme);
    rt.app_resources().set_active_theme(Some("Dark"));

    let markup = r#"<Button xmlns="urn:trellis:ui" Tag="{StaticResource Accent}"/>"#;
    let root = load(markup, &rt, WriterSettings::default()).unwrap();
    assert_eq!(rt.member(&root, "Tag"), Some(Value::string("dark")));

    let local = WriterSettings::default().with_resource_scope(trellis_graph::LookupScope::Local);
    let err = load(markup, &rt, local.clone()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Resource);

    // ThemeResource always searches themes.
    let theme_markup = r#"<Button xmlns="urn:trellis:ui" Tag="{ThemeResource Accent}"/>"#;
    assert!(load(theme_markup, &rt, local).is_ok());
}

// =============================================================================
// Conditional content
// =============================================================================

#[test]
fn test_false_predicate_skips_content() {
    let rt = TestRuntime::ui();
    let root = load(fixtures::conditional(), &rt, WriterSettings::default()).unwrap();
    let buttons = children(&rt, &root);
    assert_eq!(buttons.len(), 2);
    assert_eq!(rt.member(&buttons[0], "Width"), Some(Value::Float(1.0)));
    assert_eq!(rt.member(&buttons[1], "Width"), None);
    assert_eq!(rt.created_count("Button"), 2);
}

#[test]
fn test_true_predicate_keeps_content() {
    let rt = TestRuntime::ui();
    rt.enable_predicate("IsApiPresent");
    let root = load(fixtures::conditional(), &rt, WriterSettings::default()).unwrap();
    let buttons = children(&rt, &root);
    assert_eq!(buttons.len(), 3);
    assert_eq!(rt.member(&buttons[1], "Width"), Some(Value::Float(2.0)));
    assert_eq!(rt.member(&buttons[2], "Width"), Some(Value::Float(3.0)));
}

#[test]
fn test_predicate_failure_is_a_runtime_error() {
    let rt = TestRuntime::ui();
    let markup = r#"<StackPanel xmlns="urn:trellis:ui" xmlns:b="urn:trellis:ui?Broken()"><b:Button/></StackPanel>"#;
    let err = load(markup, &rt, WriterSettings::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.context.unwrap().contains("Broken()"));
}

// =============================================================================
// Errors and poisoning
// =============================================================================

#[test]
fn test_write_error_fixtures() {
    for case in fixtures::errors::write_errors() {
        let rt = TestRuntime::ui();
        let all_settings = [
            WriterSettings::default(),
            eager(),
            WriterSettings::default().with_deferral(DeferralPolicy::always()),
        ];
        for settings in all_settings {
            let err = load(case.markup, &rt, settings).expect_err(case.name);
            assert_eq!(err.kind, case.kind, "{}: {}", case.name, err);
            if let Some(code) = case.code {
                assert_eq!(err.code, Some(code), "{}", case.name);
            }
        }
    }
}

#[test]
fn test_duplicate_check_can_be_disabled() {
    let rt = TestRuntime::ui();
    let markup = r#"<Button xmlns="urn:trellis:ui" Width="1"><Button.Width>2</Button.Width></Button>"#;
    let root = load(markup, &rt, WriterSettings::default().with_duplicate_check(false)).unwrap();
    assert_eq!(rt.member(&root, "Width"), Some(Value::Float(2.0)));
}

#[test]
fn test_name_directive_conflicts_with_runtime_name() {
    let rt = TestRuntime::ui();
    let markup = r#"<Button xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml" x:Name="a" Name="b"/>"#;
    let err = load(markup, &rt, WriterSettings::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateAssignment);
}

#[test]
fn test_creation_failure_carries_context() {
    let rt = TestRuntime::ui();
    rt.fail_creating("Button");
    let err = load(fixtures::button(), &rt, WriterSettings::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.context.as_deref(), Some("while creating Button"));
}

#[test]
fn test_failure_poisons_writer() {
    let rt = TestRuntime::ui();
    let events = parse(
        r#"<Button xmlns="urn:trellis:ui" Width="wide"/>"#,
        &rt,
    )
    .unwrap();
    let mut writer = GraphWriter::new(rt.collaborators(), WriterSettings::default());
    let err = writer.write_all(&events).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conversion);
    assert!(writer.is_poisoned());
    assert_eq!(writer.depth(), 0);

    let again = writer.write(&events[0]).unwrap_err();
    assert_eq!(again.code, Some(ErrorCode::WriterPoisoned));
    let finished = writer.finish().unwrap_err();
    assert_eq!(finished.code, Some(ErrorCode::WriterPoisoned));
}

#[test]
fn test_unbalanced_events_are_rejected() {
    let rt = TestRuntime::ui();
    let mut writer = GraphWriter::new(rt.collaborators(), WriterSettings::default());
    let err = writer
        .write(&CanonicalEvent::end_object(SourcePos::new(1, 1)))
        .unwrap_err();
    assert_eq!(err.code, Some(ErrorCode::UnbalancedEvents));
    assert!(writer.is_poisoned());
}

#[test]
fn test_finish_before_root_closes() {
    let rt = TestRuntime::ui();
    let events = parse(fixtures::button(), &rt).unwrap();
    let mut writer = GraphWriter::new(rt.collaborators(), WriterSettings::default());
    let open = events.len() - 1;
    writer.write_all(&events[..open]).unwrap();
    assert!(writer.result().is_none());
    let err = writer.finish().unwrap_err();
    assert_eq!(err.code, Some(ErrorCode::UnexpectedEof));

    let empty = GraphWriter::new(rt.collaborators(), WriterSettings::default());
    assert_eq!(empty.finish().unwrap_err().code, Some(ErrorCode::UnexpectedEof));
}

#[test]
fn test_unknown_members_dropped_when_tolerated() {
    let rt = TestRuntime::ui();
    let options = ParseOptions::builder().tolerate_unknown_members(true).build();
    let events = parse_events(
        r#"<Rect xmlns="urn:trellis:ui" Colour="Red" Width="4"/>"#,
        &rt,
        &rt,
        &options,
    )
    .unwrap();

    let mut strict = GraphWriter::new(rt.collaborators(), WriterSettings::default());
    assert_eq!(
        strict.write_all(&events).unwrap_err().kind,
        ErrorKind::UnresolvedName
    );

    let settings = WriterSettings::default().with_unknown_members_tolerated(true);
    let mut tolerant = GraphWriter::new(rt.collaborators(), settings);
    tolerant.write_all(&events).unwrap();
    let root = tolerant.finish().unwrap();
    assert_eq!(rt.member(&root, "Width"), Some(Value::Float(4.0)));
}

// =============================================================================
// Dictionaries
// =============================================================================

#[test]
fn test_implicit_key_from_target_type() {
    let rt = TestRuntime::ui();
    let root = load(fixtures::implicit_style(), &rt, eager()).unwrap();
    let dictionary = rt.dictionary(&root).unwrap();
    assert_eq!(
        dictionary.keys(),
        vec![ResourceKey::of_type("Button"), ResourceKey::name("Explicit")]
    );
}

#[test]
fn test_dictionary_without_backing_uses_add_entry() {
    let rt = TestRuntime::ui().without_dictionary_backing();
    let markup = r#"<ResourceDictionary xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml"><Brush x:Key="a">Red</Brush><Brush x:Key="b">Blue</Brush></ResourceDictionary>"#;
    let root = load(markup, &rt, WriterSettings::default()).unwrap();
    assert!(rt.dictionary(&root).is_none());
    let object = rt.object(root.as_object().unwrap()).unwrap();
    let keys: Vec<_> = object.entries.iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(keys, vec!["a", "b"]);
}
