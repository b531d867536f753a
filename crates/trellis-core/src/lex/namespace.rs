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

//! XML namespaces, conditional predicates and the prefix scope stack.
//!
//! A namespace URI may carry a trailing predicate, `uri?Name(arg,...)`. Such a
//! namespace is *conditional*: content that uses its prefix is only built when
//! the predicate evaluates to true at write time.

use std::fmt;
use std::rc::Rc;

/// The markup language namespace (directives such as `x:Key`, `x:Name`).
pub const LANGUAGE_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2006/xaml";
/// The markup-compatibility namespace (`mc:Ignorable`).
pub const COMPATIBILITY_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/markup-compatibility/2006";
/// The reserved `xml` namespace (`xml:space`).
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// Prefix of code namespaces (`using:My.Controls`).
pub const CODE_NAMESPACE_SCHEME: &str = "using:";

/// A conditional predicate, `Name(arg,...)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub name: String,
    pub args: Vec<String>,
}

impl Predicate {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Parses `Name(arg, ...)`. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let open = text.find('(')?;
        let inner = text.strip_suffix(')')?.get(open + 1..)?;
        let name = text[..open].trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return None;
        }
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|a| a.trim().to_string()).collect()
        };
        Some(Self::new(name, args))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// A resolved namespace identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XmlNamespace {
    uri: Rc<str>,
    predicate: Option<Rc<Predicate>>,
}

impl XmlNamespace {
    /// Splits an optional `?Predicate(...)` suffix off a declared URI.
    pub fn parse(raw: &str) -> Self {
        if let Some((uri, suffix)) = raw.rsplit_once('?') {
            if let Some(predicate) = Predicate::parse(suffix) {
                return Self {
                    uri: Rc::from(uri),
                    predicate: Some(Rc::new(predicate)),
                };
            }
        }
        Self {
            uri: Rc::from(raw),
            predicate: None,
        }
    }

    /// Builds a namespace from an already split URI and predicate.
    pub fn from_parts(uri: Rc<str>, predicate: Option<Rc<Predicate>>) -> Self {
        Self { uri, predicate }
    }

    /// The namespace URI without any predicate.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn shared_uri(&self) -> &Rc<str> {
        &self.uri
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_deref()
    }

    pub fn shared_predicate(&self) -> Option<&Rc<Predicate>> {
        self.predicate.as_ref()
    }

    pub fn is_conditional(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn is_language(&self) -> bool {
        &*self.uri == LANGUAGE_NAMESPACE
    }

    pub fn is_compatibility(&self) -> bool {
        &*self.uri == COMPATIBILITY_NAMESPACE
    }

    pub fn is_xml(&self) -> bool {
        &*self.uri == XML_NAMESPACE
    }

    /// The CLR-style namespace of a `using:` URI.
    pub fn code_namespace(&self) -> Option<&str> {
        self.uri.strip_prefix(CODE_NAMESPACE_SCHEME)
    }
}

impl fmt::Display for XmlNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Some(p) => write!(f, "{}?{}", self.uri, p),
            None => write!(f, "{}", self.uri),
        }
    }
}

/// Stack of prefix bindings, one frame per open element.
#[derive(Debug, Clone)]
pub struct NamespaceScope {
    frames: Vec<Vec<(Rc<str>, XmlNamespace)>>,
}

impl Default for NamespaceScope {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceScope {
    /// A scope with only the reserved `xml` prefix bound.
    pub fn new() -> Self {
        Self {
            frames: vec![vec![(Rc::from("xml"), XmlNamespace::parse(XML_NAMESPACE))]],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Pops the innermost frame. The base frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of pushed element frames.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn declare(&mut self, prefix: Rc<str>, namespace: XmlNamespace) {
        if let Some(frame) = self.frames.last_mut() {
            frame.retain(|(p, _)| *p != prefix);
            frame.push((prefix, namespace));
        }
    }

    pub fn resolve(&self, prefix: &str) -> Option<&XmlNamespace> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| &**p == prefix)
            .map(|(_, ns)| ns)
    }

    pub fn is_declared(&self, prefix: &str) -> bool {
        self.resolve(prefix).is_some()
    }
}
