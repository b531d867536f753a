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

//! An in-memory object runtime implementing every collaborator trait.

use crate::schema::TestSchema;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use trellis_core::lex::Predicate;
use trellis_core::{
    CollaboratorError, Directive, InstanceHandle, PropertyId, PropertyInfo, PropertyRegistry,
    TypeId, TypeInfo, TypeRegistry, Value,
};
use trellis_graph::{
    Collaborators, ConditionEvaluator, ExpressionEvaluator, ExtensionArgs, ObjectRuntime,
    ResourceDictionary, ResourceKey, ValueConverter,
};

/// One object owned by a [`TestRuntime`].
#[derive(Debug, Clone)]
pub struct TestObject {
    pub ty: TypeId,
    pub members: BTreeMap<PropertyId, Value>,
    pub items: Vec<Value>,
    /// Entries of dictionaries without a [`ResourceDictionary`] backing.
    pub entries: Vec<(ResourceKey, Value)>,
    pub directives: Vec<(Directive, Value)>,
    pub dictionary: Option<Rc<ResourceDictionary>>,
}

impl TestObject {
    pub fn new(ty: TypeId) -> Self {
        Self {
            ty,
            members: BTreeMap::new(),
            items: Vec::new(),
            entries: Vec::new(),
            directives: Vec::new(),
            dictionary: None,
        }
    }
}

/// Handle-independent view of an object graph, for comparing graphs built
/// along different paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Type(String),
    Object {
        ty: String,
        members: Vec<(String, Snapshot)>,
        items: Vec<Snapshot>,
        /// Materialized dictionary entries, sorted by key.
        entries: Vec<(String, Snapshot)>,
    },
    /// Depth limit reached.
    Truncated,
}

const SNAPSHOT_DEPTH: usize = 64;

/// Object runtime, converter, evaluator and condition evaluator in one.
///
/// Every instance lives in a vector indexed by its handle. Creation counts
/// are kept per type so tests can check that deferred entries are built at
/// most once.
pub struct TestRuntime {
    schema: TestSchema,
    objects: RefCell<Vec<TestObject>>,
    created: RefCell<HashMap<TypeId, usize>>,
    conversions: Cell<usize>,
    true_predicates: RefCell<HashSet<String>>,
    failing_types: RefCell<HashSet<TypeId>>,
    back_dictionaries: bool,
    app_resources: Rc<ResourceDictionary>,
}

impl TestRuntime {
    pub fn new(schema: TestSchema) -> Self {
        Self {
            schema,
            objects: RefCell::new(Vec::new()),
            created: RefCell::new(HashMap::new()),
            conversions: Cell::new(0),
            true_predicates: RefCell::new(HashSet::new()),
            failing_types: RefCell::new(HashSet::new()),
            back_dictionaries: true,
            app_resources: Rc::new(ResourceDictionary::new()),
        }
    }

    /// A runtime over [`TestSchema::ui`].
    pub fn ui() -> Self {
        Self::new(TestSchema::ui())
    }

    /// Dictionaries store entries through [`ObjectRuntime::add_entry`]
    /// instead of a [`ResourceDictionary`].
    pub fn without_dictionary_backing(mut self) -> Self {
        self.back_dictionaries = false;
        self
    }

    pub fn schema(&self) -> &TestSchema {
        &self.schema
    }

    /// Collaborators backed by this runtime, with the application
    /// resources as the outer resolver.
    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            types: self,
            properties: self,
            runtime: self,
            converter: self,
            resources: &*self.app_resources,
            evaluator: self,
            conditions: self,
        }
    }

    /// Application-level resources searched after every dictionary of the
    /// document.
    pub fn app_resources(&self) -> &Rc<ResourceDictionary> {
        &self.app_resources
    }

    /// Predicates with this name evaluate to true.
    pub fn enable_predicate(&self, name: &str) {
        self.true_predicates.borrow_mut().insert(name.to_string());
    }

    /// Creating an instance of `type_name` fails from now on.
    pub fn fail_creating(&self, type_name: &str) {
        let ty = self.schema.type_id(type_name);
        self.failing_types.borrow_mut().insert(ty);
    }

    // ===== Inspection =====

    /// Number of instances of `type_name` created through the type registry.
    pub fn created_count(&self, type_name: &str) -> usize {
        let ty = self.schema.type_id(type_name);
        self.created.borrow().get(&ty).copied().unwrap_or(0)
    }

    pub fn total_created(&self) -> usize {
        self.created.borrow().values().sum()
    }

    /// Number of values produced by text conversion.
    pub fn conversion_count(&self) -> usize {
        self.conversions.get()
    }

    pub fn object(&self, handle: InstanceHandle) -> Option<TestObject> {
        self.objects.borrow().get(handle.0 as usize).cloned()
    }

    pub fn type_of(&self, value: &Value) -> Option<String> {
        let handle = value.as_object()?;
        let object = self.object(handle)?;
        Some(self.schema.type_name(object.ty).to_string())
    }

    /// Value of the member called `name` on the object behind `value`.
    pub fn member(&self, value: &Value, name: &str) -> Option<Value> {
        let handle = value.as_object()?;
        let object = self.object(handle)?;
        let property = self.schema.resolve(object.ty, name)?;
        object.members.get(&property).cloned()
    }

    pub fn items(&self, value: &Value) -> Vec<Value> {
        value
            .as_object()
            .and_then(|h| self.object(h))
            .map(|o| o.items)
            .unwrap_or_default()
    }

    pub fn directives(&self, value: &Value) -> Vec<(Directive, Value)> {
        value
            .as_object()
            .and_then(|h| self.object(h))
            .map(|o| o.directives)
            .unwrap_or_default()
    }

    /// Dictionary behind `value`, or the one in its `Resources` member.
    pub fn dictionary(&self, value: &Value) -> Option<Rc<ResourceDictionary>> {
        self.resource_dictionary(value.as_object()?)
    }

    pub fn snapshot(&self, value: &Value) -> Snapshot {
        self.snapshot_at(value, 0)
    }

    fn snapshot_at(&self, value: &Value, depth: usize) -> Snapshot {
        if depth > SNAPSHOT_DEPTH {
            return Snapshot::Truncated;
        }
        match value {
            Value::Null => Snapshot::Null,
            Value::Bool(b) => Snapshot::Bool(*b),
            Value::Int(n) => Snapshot::Int(*n),
            Value::Float(n) => Snapshot::Float(*n),
            Value::String(s) => Snapshot::String(s.to_string()),
            Value::Type(ty) => Snapshot::Type(self.schema.type_name(*ty).to_string()),
            Value::Object(handle) => {
                let Some(object) = self.object(*handle) else {
                    return Snapshot::Null;
                };
                let members = object
                    .members
                    .iter()
                    .map(|(p, v)| {
                        (
                            self.schema.property_name(*p).to_string(),
                            self.snapshot_at(v, depth + 1),
                        )
                    })
                    .collect();
                let items = object
                    .items
                    .iter()
                    .map(|v| self.snapshot_at(v, depth + 1))
                    .collect();
                let mut entries: Vec<(String, Snapshot)> = object
                    .entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), self.snapshot_at(v, depth + 1)))
                    .collect();
                if let Some(dictionary) = &object.dictionary {
                    for key in dictionary.keys() {
                        if let Some(v) = dictionary.get(&key) {
                            entries.push((key.to_string(), self.snapshot_at(&v, depth + 1)));
                        }
                    }
                }
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Snapshot::Object {
                    ty: self.schema.type_name(object.ty).to_string(),
                    members,
                    items,
                    entries,
                }
            }
        }
    }

    // ===== Storage =====

    fn alloc(&self, ty: TypeId) -> InstanceHandle {
        let dictionary = self
            .schema
            .type_info(ty)
            .filter(|t| t.is_dictionary && self.back_dictionaries)
            .map(|_| Rc::new(ResourceDictionary::new()));
        let mut objects = self.objects.borrow_mut();
        let handle = InstanceHandle(objects.len() as u64);
        objects.push(TestObject {
            dictionary,
            ..TestObject::new(ty)
        });
        handle
    }

    fn with_object<T>(
        &self,
        handle: InstanceHandle,
        f: impl FnOnce(&mut TestObject) -> T,
    ) -> Result<T, CollaboratorError> {
        let mut objects = self.objects.borrow_mut();
        let object = objects
            .get_mut(handle.0 as usize)
            .ok_or_else(|| CollaboratorError::new(format!("no object {}", handle)))?;
        Ok(f(object))
    }
}

impl TypeRegistry for TestRuntime {
    fn resolve_type(&self, namespace: &str, name: &str) -> Option<TypeId> {
        self.schema.resolve_type(namespace, name)
    }

    fn type_info(&self, ty: TypeId) -> Option<&TypeInfo> {
        self.schema.type_info(ty)
    }

    fn knows_namespace(&self, namespace: &str) -> bool {
        self.schema.knows_namespace(namespace)
    }

    fn create(&self, ty: TypeId) -> Result<InstanceHandle, CollaboratorError> {
        if self.failing_types.borrow().contains(&ty) {
            return Err(CollaboratorError::new(format!(
                "cannot create {}",
                self.schema.type_name(ty)
            )));
        }
        *self.created.borrow_mut().entry(ty).or_insert(0) += 1;
        Ok(self.alloc(ty))
    }
}

impl PropertyRegistry for TestRuntime {
    fn resolve(&self, owner: TypeId, name: &str) -> Option<PropertyId> {
        self.schema.resolve(owner, name)
    }

    fn property_info(&self, property: PropertyId) -> Option<&PropertyInfo> {
        self.schema.property_info(property)
    }
}

impl ObjectRuntime for TestRuntime {
    fn set_value(
        &self,
        instance: InstanceHandle,
        property: PropertyId,
        value: Value,
    ) -> Result<(), CollaboratorError> {
        self.with_object(instance, |o| {
            o.members.insert(property, value);
        })
    }

    fn get_value(
        &self,
        instance: InstanceHandle,
        property: PropertyId,
    ) -> Result<Value, CollaboratorError> {
        if let Some(value) = self.with_object(instance, |o| o.members.get(&property).cloned())? {
            return Ok(value);
        }
        // Container members are created on first access.
        let container = self
            .schema
            .property_info(property)
            .map(|p| p.property_type)
            .filter(|ty| self.schema.type_info(*ty).is_some_and(|t| t.is_container()));
        match container {
            Some(ty) => {
                let value = Value::Object(self.alloc(ty));
                self.set_value(instance, property, value.clone())?;
                Ok(value)
            }
            None => Ok(Value::Null),
        }
    }

    fn add_item(&self, collection: InstanceHandle, item: Value) -> Result<(), CollaboratorError> {
        self.with_object(collection, |o| o.items.push(item))
    }

    fn add_entry(
        &self,
        dictionary: InstanceHandle,
        key: ResourceKey,
        value: Value,
    ) -> Result<(), CollaboratorError> {
        self.with_object(dictionary, |o| {
            if o.entries.iter().any(|(k, _)| *k == key) {
                return Err(CollaboratorError::new(format!("duplicate key '{}'", key)));
            }
            o.entries.push((key, value));
            Ok(())
        })?
    }

    fn apply_directive(
        &self,
        instance: InstanceHandle,
        directive: Directive,
        value: &Value,
    ) -> Result<(), CollaboratorError> {
        self.with_object(instance, |o| o.directives.push((directive, value.clone())))
    }

    fn resource_dictionary(&self, instance: InstanceHandle) -> Option<Rc<ResourceDictionary>> {
        let object = self.object(instance)?;
        if let Some(dictionary) = object.dictionary {
            return Some(dictionary);
        }
        let resources = self.schema.resolve(object.ty, "Resources")?;
        let handle = object.members.get(&resources)?.as_object()?;
        self.object(handle)?.dictionary
    }
}

impl ValueConverter for TestRuntime {
    fn convert(&self, text: &str, target: TypeId) -> Result<Value, CollaboratorError> {
        let info = self
            .schema
            .type_info(target)
            .ok_or_else(|| CollaboratorError::new(format!("unknown type {}", target.0)))?;
        let fail = || {
            CollaboratorError::new(format!("cannot convert '{}' to {}", text, info.name))
        };
        let trimmed = text.trim();
        let value = match info.name.as_str() {
            _ if info.is_string => Value::string(text),
            "Object" => Value::string(text),
            "Int32" => Value::Int(trimmed.parse().map_err(|_| fail())?),
            "Double" => Value::Float(trimmed.parse().map_err(|_| fail())?),
            "Boolean" => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(fail()),
            },
            "Brush" | "Color" => {
                let valid = trimmed
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '#');
                if trimmed.is_empty() || !valid {
                    return Err(fail());
                }
                let handle = self.alloc(target);
                if let Some(color) = self.schema.resolve(target, "Color") {
                    self.set_value(handle, color, Value::string(trimmed))?;
                }
                Value::Object(handle)
            }
            _ => return Err(fail()),
        };
        self.conversions.set(self.conversions.get() + 1);
        Ok(value)
    }
}

impl ExpressionEvaluator for TestRuntime {
    fn provide_value(
        &self,
        extension: TypeId,
        args: &ExtensionArgs,
        _cx: &Collaborators<'_>,
    ) -> Result<Value, CollaboratorError> {
        let text = |v: &Value| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
        match self.schema.type_name(extension) {
            "BindingExtension" => {
                let path = self
                    .schema
                    .resolve(extension, "Path")
                    .and_then(|p| args.property(p))
                    .or_else(|| args.positional.first())
                    .map(text)
                    .unwrap_or_default();
                Ok(Value::string(format!("binding:{}", path)))
            }
            "FailExtension" => Err(CollaboratorError::new(
                args.first().map(text).unwrap_or_else(|| "failed".to_string()),
            )),
            other => Err(CollaboratorError::new(format!("no evaluator for {}", other))),
        }
    }
}

impl ConditionEvaluator for TestRuntime {
    fn evaluate(&self, predicate: &Predicate) -> Result<bool, CollaboratorError> {
        if predicate.name == "Broken" {
            return Err(CollaboratorError::new("predicate cannot be evaluated"));
        }
        Ok(self.true_predicates.borrow().contains(&predicate.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_counts_per_type() {
        let rt = TestRuntime::ui();
        let button = rt.schema().type_id("Button");
        rt.create(button).unwrap();
        rt.create(button).unwrap();
        assert_eq!(rt.created_count("Button"), 2);
        assert_eq!(rt.created_count("Rect"), 0);
        assert_eq!(rt.total_created(), 2);
    }

    #[test]
    fn test_failing_type() {
        let rt = TestRuntime::ui();
        rt.fail_creating("Rect");
        assert!(rt.create(rt.schema().type_id("Rect")).is_err());
    }

    #[test]
    fn test_container_member_created_on_first_read() {
        let rt = TestRuntime::ui();
        let panel = rt.create(rt.schema().type_id("StackPanel")).unwrap();
        let children = rt.schema().property_id("StackPanel", "Children");
        let first = rt.get_value(panel, children).unwrap();
        let second = rt.get_value(panel, children).unwrap();
        assert!(first.as_object().is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_dictionaries_are_backed() {
        let rt = TestRuntime::ui();
        let dict = rt.create(rt.schema().type_id("ResourceDictionary")).unwrap();
        assert!(rt.resource_dictionary(dict).is_some());

        let rt = TestRuntime::ui().without_dictionary_backing();
        let dict = rt.create(rt.schema().type_id("ResourceDictionary")).unwrap();
        assert!(rt.resource_dictionary(dict).is_none());
    }

    #[test]
    fn test_conversions() {
        let rt = TestRuntime::ui();
        let schema = rt.schema();
        assert_eq!(rt.convert("12", schema.type_id("Int32")).unwrap(), Value::Int(12));
        assert_eq!(rt.convert("1.5", schema.type_id("Double")).unwrap(), Value::Float(1.5));
        assert_eq!(rt.convert("True", schema.type_id("Boolean")).unwrap(), Value::Bool(true));
        assert!(rt.convert("wide", schema.type_id("Double")).is_err());

        let brush = rt.convert("Red", schema.type_id("Brush")).unwrap();
        assert_eq!(rt.member(&brush, "Color"), Some(Value::string("Red")));
        assert_eq!(rt.conversion_count(), 4);
    }

    #[test]
    fn test_predicates() {
        let rt = TestRuntime::ui();
        let p = Predicate::new("IsApiPresent", vec!["A".to_string()]);
        assert!(!rt.evaluate(&p).unwrap());
        rt.enable_predicate("IsApiPresent");
        assert!(rt.evaluate(&p).unwrap());
        assert!(rt.evaluate(&Predicate::new("Broken", Vec::new())).is_err());
    }

    #[test]
    fn test_snapshot_ignores_handles() {
        let rt = TestRuntime::ui();
        let a = rt.convert("Red", rt.schema().type_id("Brush")).unwrap();
        let b = rt.convert("Red", rt.schema().type_id("Brush")).unwrap();
        assert_ne!(a, b);
        assert_eq!(rt.snapshot(&a), rt.snapshot(&b));
    }
}
