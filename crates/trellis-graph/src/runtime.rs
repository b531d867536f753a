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

//! Collaborator seams of the graph writer.
//!
//! Everything that touches real objects goes through these traits: creating
//! instances, setting members, converting text, resolving resources and
//! evaluating markup extensions and conditional predicates. The writer only
//! decides *when* each call happens.

use crate::dictionary::ResourceDictionary;
use std::fmt;
use std::rc::Rc;
use trellis_core::lex::Predicate;
use trellis_core::{
    CollaboratorError, Directive, InstanceHandle, MemberRef, PropertyId, PropertyRegistry,
    TrellisResult, TypeId, TypeRegistry, Value,
};

/// Key of a dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    /// An explicit `x:Key`.
    Name(Rc<str>),
    /// An implicit key derived from the entry's implicit key property,
    /// usually a target type name.
    Type(Rc<str>),
}

impl ResourceKey {
    pub fn name(key: impl AsRef<str>) -> Self {
        ResourceKey::Name(Rc::from(key.as_ref()))
    }

    pub fn of_type(name: impl AsRef<str>) -> Self {
        ResourceKey::Type(Rc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceKey::Name(s) | ResourceKey::Type(s) => s,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Name(name) => write!(f, "{}", name),
            ResourceKey::Type(name) => write!(f, "{{Type {}}}", name),
        }
    }
}

/// How far a resource lookup reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LookupScope {
    /// Only the dictionary's own entries, deferred ones included.
    SelfOnly,
    /// Own entries, then merged dictionaries.
    Local,
    /// Own entries, merged dictionaries, then the active theme.
    #[default]
    All,
}

impl LookupScope {
    pub fn includes_merged(self) -> bool {
        !matches!(self, LookupScope::SelfOnly)
    }

    pub fn includes_themes(self) -> bool {
        matches!(self, LookupScope::All)
    }
}

/// Arguments collected for a markup extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionArgs {
    pub positional: Vec<Value>,
    pub named: Vec<(MemberRef, Value)>,
}

impl ExtensionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, member: &MemberRef) -> Option<&Value> {
        self.named.iter().find(|(m, _)| m == member).map(|(_, v)| v)
    }

    pub fn property(&self, property: PropertyId) -> Option<&Value> {
        self.get(&MemberRef::Property(property))
    }

    /// The first positional argument, falling back to the first named one.
    pub fn first(&self) -> Option<&Value> {
        self.positional
            .first()
            .or_else(|| self.named.first().map(|(_, v)| v))
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Applies writes to live instances.
pub trait ObjectRuntime {
    fn set_value(
        &self,
        instance: InstanceHandle,
        property: PropertyId,
        value: Value,
    ) -> Result<(), CollaboratorError>;

    /// Reads a member; used for objects retrieved from read-only collection
    /// properties.
    fn get_value(
        &self,
        instance: InstanceHandle,
        property: PropertyId,
    ) -> Result<Value, CollaboratorError>;

    fn add_item(&self, collection: InstanceHandle, item: Value) -> Result<(), CollaboratorError>;

    /// Adds a keyed entry to a dictionary that is not backed by a
    /// [`ResourceDictionary`].
    fn add_entry(
        &self,
        dictionary: InstanceHandle,
        key: ResourceKey,
        value: Value,
    ) -> Result<(), CollaboratorError>;

    /// Receives directives without writer-level meaning (`x:Uid`, `x:Class`, ...).
    fn apply_directive(
        &self,
        _instance: InstanceHandle,
        _directive: Directive,
        _value: &Value,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }

    /// The resource dictionary owned by or backing `instance`, if any.
    fn resource_dictionary(&self, instance: InstanceHandle) -> Option<Rc<ResourceDictionary>>;
}

/// Converts literal text into a typed value.
pub trait ValueConverter {
    fn convert(&self, text: &str, target: TypeId) -> Result<Value, CollaboratorError>;
}

/// Resolves resource keys outside the writer's own dictionaries.
pub trait ResourceResolver {
    fn lookup(
        &self,
        key: &ResourceKey,
        scope: LookupScope,
        cx: &Collaborators<'_>,
    ) -> TrellisResult<Option<Value>>;
}

/// Evaluates custom markup extensions.
pub trait ExpressionEvaluator {
    fn provide_value(
        &self,
        extension: TypeId,
        args: &ExtensionArgs,
        cx: &Collaborators<'_>,
    ) -> Result<Value, CollaboratorError>;
}

/// Decides conditional namespace predicates.
pub trait ConditionEvaluator {
    fn evaluate(&self, predicate: &Predicate) -> Result<bool, CollaboratorError>;
}

/// A resolver with no resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

impl ResourceResolver for NoResources {
    fn lookup(
        &self,
        _key: &ResourceKey,
        _scope: LookupScope,
        _cx: &Collaborators<'_>,
    ) -> TrellisResult<Option<Value>> {
        Ok(None)
    }
}

/// Every collaborator the writer talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub types: &'a dyn TypeRegistry,
    pub properties: &'a dyn PropertyRegistry,
    pub runtime: &'a dyn ObjectRuntime,
    pub converter: &'a dyn ValueConverter,
    pub resources: &'a dyn ResourceResolver,
    pub evaluator: &'a dyn ExpressionEvaluator,
    pub conditions: &'a dyn ConditionEvaluator,
}

impl<'a> Collaborators<'a> {
    /// The same collaborators with a different resource resolver.
    pub fn with_resources(self, resources: &'a dyn ResourceResolver) -> Self {
        Self { resources, ..self }
    }

    /// Name of a type for messages.
    pub fn type_name(&self, ty: TypeId) -> String {
        self.types
            .type_info(ty)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| format!("type {}", ty.0))
    }

    /// Name of a member for messages.
    pub fn member_name(&self, member: &MemberRef) -> String {
        match member {
            MemberRef::Property(p) => self
                .properties
                .property_info(*p)
                .map(|info| info.name.clone())
                .unwrap_or_else(|| member.to_string()),
            other => other.to_string(),
        }
    }
}

impl fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
