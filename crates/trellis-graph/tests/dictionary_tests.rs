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

use std::rc::Rc;
use trellis_core::{ErrorKind, SourcePos, Value};
use trellis_graph::{
    LookupScope, NoResources, ResourceDictionary, ResourceKey, ResourceResolver, ScopeChain,
};
use trellis_test::TestRuntime;

fn key(name: &str) -> ResourceKey {
    ResourceKey::name(name)
}

fn dictionary(entries: &[(&str, &str)]) -> Rc<ResourceDictionary> {
    let dictionary = Rc::new(ResourceDictionary::new());
    for (k, v) in entries {
        dictionary
            .add(key(k), Value::string(v), SourcePos::default())
            .unwrap();
    }
    dictionary
}

// =============================================================================
// Entries
// =============================================================================

#[test]
fn test_keys_keep_insertion_order() {
    let d = dictionary(&[("b", "1"), ("a", "2"), ("c", "3")]);
    assert_eq!(d.keys(), vec![key("b"), key("a"), key("c")]);
    assert_eq!(d.len(), 3);
    assert!(ResourceDictionary::new().is_empty());
}

#[test]
fn test_duplicate_key_is_rejected() {
    let d = dictionary(&[("a", "1")]);
    let err = d
        .add(key("a"), Value::string("2"), SourcePos::new(3, 7))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateAssignment);
    assert_eq!(err.pos, SourcePos::new(3, 7));
    assert_eq!(d.get(&key("a")), Some(Value::string("1")));
}

#[test]
fn test_name_and_type_keys_are_distinct() {
    let d = dictionary(&[("Button", "named")]);
    d.add(ResourceKey::of_type("Button"), Value::string("implicit"), SourcePos::default())
        .unwrap();
    assert_eq!(d.len(), 2);
    assert_eq!(d.get(&ResourceKey::of_type("Button")), Some(Value::string("implicit")));
}

// =============================================================================
// Negative cache
// =============================================================================

#[test]
fn test_miss_is_cached_until_key_is_added() {
    let rt = TestRuntime::ui();
    let cx = rt.collaborators();
    let d = dictionary(&[]);
    assert_eq!(d.lookup(&key("k"), LookupScope::All, &cx).unwrap(), None);
    assert_eq!(d.lookup(&key("k"), LookupScope::All, &cx).unwrap(), None);
    assert_eq!(d.negative_cache_len(), 1);

    d.add(key("k"), Value::Int(1), SourcePos::default()).unwrap();
    assert_eq!(d.negative_cache_len(), 0);
    assert_eq!(d.lookup(&key("k"), LookupScope::All, &cx).unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_narrow_scope_miss_is_not_cached() {
    let rt = TestRuntime::ui();
    let cx = rt.collaborators();
    let d = dictionary(&[]);
    for scope in [LookupScope::SelfOnly, LookupScope::Local] {
        assert_eq!(d.lookup(&key("k"), scope, &cx).unwrap(), None);
    }
    assert_eq!(d.negative_cache_len(), 0);
}

#[test]
fn test_merged_add_invalidates_parent() {
    let rt = TestRuntime::ui();
    let cx = rt.collaborators();
    let parent = dictionary(&[]);
    let child = dictionary(&[]);
    parent.add_merged(child.clone());
    assert!(Rc::ptr_eq(&child.parent().unwrap(), &parent));

    assert_eq!(parent.lookup(&key("k"), LookupScope::All, &cx).unwrap(), None);
    assert_eq!(parent.negative_cache_len(), 1);

    child.add(key("k"), Value::string("v"), SourcePos::default()).unwrap();
    assert_eq!(parent.negative_cache_len(), 0);
    assert_eq!(
        parent.lookup(&key("k"), LookupScope::All, &cx).unwrap(),
        Some(Value::string("v"))
    );
}

// =============================================================================
// Merged and theme dictionaries
// =============================================================================

#[test]
fn test_last_merged_dictionary_wins() {
    let rt = TestRuntime::ui();
    let cx = rt.collaborators();
    let d = dictionary(&[("own", "self")]);
    d.add_merged(dictionary(&[("k", "first"), ("own", "merged")]));
    d.add_merged(dictionary(&[("k", "second")]));

    let get = |k: &str, scope| d.lookup(&key(k), scope, &cx).unwrap();
    assert_eq!(get("k", LookupScope::Local), Some(Value::string("second")));
    assert_eq!(get("own", LookupScope::All), Some(Value::string("self")));
    assert_eq!(get("k", LookupScope::SelfOnly), None);
    assert_eq!(d.merged().len(), 2);
}

#[test]
fn test_active_theme_is_searched_last() {
    let rt = TestRuntime::ui();
    let cx = rt.collaborators();
    let d = dictionary(&[("shared", "own")]);
    d.add_theme("Light", dictionary(&[("accent", "white"), ("shared", "light")]));
    d.add_theme("Dark", dictionary(&[("accent", "black")]));

    assert_eq!(d.lookup(&key("accent"), LookupScope::All, &cx).unwrap(), None);
    assert_eq!(d.negative_cache_len(), 1);

    d.set_active_theme(Some("Dark"));
    assert_eq!(d.negative_cache_len(), 0);
    assert_eq!(
        d.lookup(&key("accent"), LookupScope::All, &cx).unwrap(),
        Some(Value::string("black"))
    );
    assert_eq!(d.lookup(&key("accent"), LookupScope::Local, &cx).unwrap(), None);

    d.set_active_theme(Some("Light"));
    assert_eq!(
        d.lookup(&key("shared"), LookupScope::All, &cx).unwrap(),
        Some(Value::string("own"))
    );
}

#[test]
fn test_theme_with_same_name_is_replaced() {
    let rt = TestRuntime::ui();
    let cx = rt.collaborators();
    let d = dictionary(&[]);
    d.add_theme("Dark", dictionary(&[("accent", "old")]));
    d.add_theme("Dark", dictionary(&[("accent", "new")]));
    d.set_active_theme(Some("Dark"));
    assert_eq!(
        d.lookup(&key("accent"), LookupScope::All, &cx).unwrap(),
        Some(Value::string("new"))
    );
    d.set_active_theme(None);
    assert!(d.active_theme().is_none());
}

// =============================================================================
// Scope chains
// =============================================================================

#[test]
fn test_scope_chain_searches_in_order() {
    let rt = TestRuntime::ui();
    let cx = rt.collaborators();
    let inner = dictionary(&[("k", "inner")]);
    let outer = dictionary(&[("k", "outer"), ("only_outer", "o")]);
    let app = dictionary(&[("app", "a")]);

    let chain = ScopeChain::new()
        .with_scope(&inner)
        .with_scope(&outer)
        .with_outer(&*app);
    assert_eq!(chain.len(), 2);
    let get = |k: &str| chain.lookup(&key(k), LookupScope::All, &cx).unwrap();
    assert_eq!(get("k"), Some(Value::string("inner")));
    assert_eq!(get("only_outer"), Some(Value::string("o")));
    assert_eq!(get("app"), Some(Value::string("a")));
    assert_eq!(get("missing"), None);
}

#[test]
fn test_empty_scope_chain() {
    let rt = TestRuntime::ui();
    let cx = rt.collaborators();
    let chain = ScopeChain::new();
    assert!(chain.is_empty());
    assert_eq!(chain.lookup(&key("k"), LookupScope::All, &cx).unwrap(), None);

    let with_outer = ScopeChain::new().with_outer(&NoResources);
    assert!(!with_outer.is_empty());
    assert_eq!(
        NoResources.lookup(&key("k"), LookupScope::All, &cx).unwrap(),
        None
    );
}
