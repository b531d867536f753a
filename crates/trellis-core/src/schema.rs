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

//! Type and member identities, and the registries that resolve them.
//!
//! The concrete type system lives outside Trellis. The scanner and parser
//! only need to resolve names to ids and ask a handful of structural
//! questions about a type (is it a collection, what is its content member,
//! does it keep whitespace). Those questions are answered by [`TypeInfo`]
//! and [`PropertyInfo`] records supplied through [`TypeRegistry`] and
//! [`PropertyRegistry`].

use crate::error::CollaboratorError;
use crate::value::InstanceHandle;
use std::fmt;
use std::rc::Rc;

/// Identity of a type in the external registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeId(pub u32);

/// Identity of a property (or event) in the external registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyId(pub u32);

/// Reserved language-level attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Directive {
    Key,
    Name,
    Uid,
    Class,
    ClassModifier,
    FieldModifier,
    ConnectionId,
    DeferLoadStrategy,
    Load,
    Shared,
    /// `xml:space`, handled by the scanner.
    XmlSpace,
}

impl Directive {
    /// Resolves a local name in the language namespace.
    pub fn from_language_name(name: &str) -> Option<Self> {
        Some(match name {
            "Key" => Self::Key,
            "Name" => Self::Name,
            "Uid" => Self::Uid,
            "Class" => Self::Class,
            "ClassModifier" => Self::ClassModifier,
            "FieldModifier" => Self::FieldModifier,
            "ConnectionId" => Self::ConnectionId,
            "DeferLoadStrategy" => Self::DeferLoadStrategy,
            "Load" => Self::Load,
            "Shared" => Self::Shared,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Key => "Key",
            Self::Name => "Name",
            Self::Uid => "Uid",
            Self::Class => "Class",
            Self::ClassModifier => "ClassModifier",
            Self::FieldModifier => "FieldModifier",
            Self::ConnectionId => "ConnectionId",
            Self::DeferLoadStrategy => "DeferLoadStrategy",
            Self::Load => "Load",
            Self::Shared => "Shared",
            Self::XmlSpace => "space",
        }
    }
}

/// Members the parser synthesizes rather than reads from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImplicitMember {
    /// Items added to a collection or dictionary.
    Items,
    /// Text-syntax initialization (`<Int32>42</Int32>`).
    Initialization,
    /// Positional arguments of a markup extension.
    PositionalParameters,
    /// Content of a type that has nowhere to put it (tolerant mode only).
    UnknownContent,
}

impl ImplicitMember {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Items => "_Items",
            Self::Initialization => "_Initialization",
            Self::PositionalParameters => "_PositionalParameters",
            Self::UnknownContent => "_UnknownContent",
        }
    }
}

/// The target of a StartMember event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRef {
    Property(PropertyId),
    Directive(Directive),
    Implicit(ImplicitMember),
    /// A member the registry did not know; only produced when unknown
    /// members are tolerated.
    Unknown(Rc<str>),
}

impl MemberRef {
    pub fn property(&self) -> Option<PropertyId> {
        match self {
            Self::Property(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_items(&self) -> bool {
        matches!(self, Self::Implicit(ImplicitMember::Items))
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(p) => write!(f, "property {}", p.0),
            Self::Directive(d) => write!(f, "x:{}", d.name()),
            Self::Implicit(m) => write!(f, "{}", m.name()),
            Self::Unknown(name) => write!(f, "unknown member '{}'", name),
        }
    }
}

/// Markup extensions with writer-level semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    /// Resolves a resource key once, at write time.
    StaticResource,
    /// Resolves a resource key against every scope, themes included.
    ThemeResource,
    /// Produces the null value.
    Null,
    /// Evaluated by the external expression evaluator.
    Custom,
}

/// Structural facts about a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: String,
    /// Namespace URI the type was registered under.
    pub namespace: String,
    pub base: Option<TypeId>,
    pub content_property: Option<PropertyId>,
    /// Property that mirrors `x:Name`.
    pub runtime_name_property: Option<PropertyId>,
    /// Property whose value keys the object in a dictionary when no
    /// `x:Key` is present (a style's target type, for instance).
    pub implicit_key_property: Option<PropertyId>,
    pub extension: Option<ExtensionKind>,
    pub is_collection: bool,
    pub is_dictionary: bool,
    pub is_string: bool,
    /// The type can be built from text (`<Int32>42</Int32>`).
    pub text_syntax: bool,
    /// Whitespace between items of this collection is content.
    pub whitespace_significant: bool,
    /// Whitespace around elements of this type is trimmed.
    pub trim_surrounding_whitespace: bool,
    /// Never deferred when it appears as a dictionary entry.
    pub never_deferred: bool,
}

impl TypeInfo {
    pub fn new(id: TypeId, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            namespace: namespace.into(),
            base: None,
            content_property: None,
            runtime_name_property: None,
            implicit_key_property: None,
            extension: None,
            is_collection: false,
            is_dictionary: false,
            is_string: false,
            text_syntax: false,
            whitespace_significant: false,
            trim_surrounding_whitespace: false,
            never_deferred: false,
        }
    }

    pub fn is_markup_extension(&self) -> bool {
        self.extension.is_some()
    }

    /// Collections and dictionaries receive children through `Items`.
    pub fn is_container(&self) -> bool {
        self.is_collection || self.is_dictionary
    }

    /// Whether literal text can be assigned to a member of this type.
    pub fn accepts_text(&self) -> bool {
        self.is_string || self.text_syntax || self.is_container()
    }
}

/// Structural facts about a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub id: PropertyId,
    pub name: String,
    pub owner: TypeId,
    pub property_type: TypeId,
    pub read_only: bool,
    pub is_event: bool,
    pub attachable: bool,
}

impl PropertyInfo {
    pub fn new(id: PropertyId, owner: TypeId, name: impl Into<String>, property_type: TypeId) -> Self {
        Self {
            id,
            name: name.into(),
            owner,
            property_type,
            read_only: false,
            is_event: false,
            attachable: false,
        }
    }
}

/// Resolves and instantiates types.
pub trait TypeRegistry {
    /// Resolves `name` in the namespace identified by `namespace` (a URI).
    fn resolve_type(&self, namespace: &str, name: &str) -> Option<TypeId>;

    fn type_info(&self, ty: TypeId) -> Option<&TypeInfo>;

    /// Whether the registry serves any types from `namespace`. Ignorable
    /// namespaces are only skipped when this is false.
    fn knows_namespace(&self, namespace: &str) -> bool;

    /// Creates a fresh instance of `ty`.
    fn create(&self, ty: TypeId) -> Result<InstanceHandle, CollaboratorError>;
}

/// Resolves members of a type.
pub trait PropertyRegistry {
    /// Resolves `name` on `owner` (including inherited members).
    fn resolve(&self, owner: TypeId, name: &str) -> Option<PropertyId>;

    fn property_info(&self, property: PropertyId) -> Option<&PropertyInfo>;
}

/// Whether a value of type `source` can be assigned where `target` is expected.
pub fn is_assignable(types: &dyn TypeRegistry, target: TypeId, source: TypeId) -> bool {
    let mut current = Some(source);
    let mut guard = 0;
    while let Some(ty) = current {
        if ty == target {
            return true;
        }
        guard += 1;
        if guard > 256 {
            return false;
        }
        current = types.type_info(ty).and_then(|info| info.base);
    }
    false
}

/// Resolves a markup extension type name: `NameExtension` first, then `Name`.
pub fn resolve_extension_type(
    types: &dyn TypeRegistry,
    namespace: &str,
    name: &str,
) -> Option<TypeId> {
    types
        .resolve_type(namespace, &format!("{}Extension", name))
        .or_else(|| types.resolve_type(namespace, name))
}
