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

//! A declarative schema for tests.
//!
//! [`TestSchema::ui`] is a small UI-flavoured type system: panels with a
//! read-only child collection, buttons and text blocks, brushes with text
//! syntax, styles keyed by their target type, resource dictionaries and the
//! resource markup extensions. Tests that need something else build their
//! own with [`SchemaBuilder`].

use trellis_core::lex::LANGUAGE_NAMESPACE;
use trellis_core::{
    CollaboratorError, ExtensionKind, InstanceHandle, PropertyId, PropertyInfo, PropertyRegistry,
    TypeId, TypeInfo, TypeRegistry,
};

/// Namespace URI of the UI types.
pub const UI_NAMESPACE: &str = "urn:trellis:ui";

/// Builder for [`TestSchema`].
///
/// # Examples
///
/// ```
/// use trellis_test::SchemaBuilder;
///
/// let mut builder = SchemaBuilder::new();
/// let string = builder.ty("urn:t", "String", |t| t.is_string = true);
/// let label = builder.ty("urn:t", "Label", |_| {});
/// let text = builder.property(label, "Text", string, |_| {});
/// builder.content(label, text);
/// let schema = builder.build();
/// assert_eq!(schema.type_id("Label"), label);
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<TypeInfo>,
    properties: Vec<PropertyInfo>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type and lets `configure` adjust its flags.
    pub fn ty(
        &mut self,
        namespace: &str,
        name: &str,
        configure: impl FnOnce(&mut TypeInfo),
    ) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        let mut info = TypeInfo::new(id, namespace, name);
        configure(&mut info);
        self.types.push(info);
        id
    }

    /// Registers a property of `owner` and lets `configure` adjust it.
    pub fn property(
        &mut self,
        owner: TypeId,
        name: &str,
        property_type: TypeId,
        configure: impl FnOnce(&mut PropertyInfo),
    ) -> PropertyId {
        let id = PropertyId(self.properties.len() as u32);
        let mut info = PropertyInfo::new(id, owner, name, property_type);
        configure(&mut info);
        self.properties.push(info);
        id
    }

    pub fn content(&mut self, owner: TypeId, property: PropertyId) {
        if let Some(info) = self.types.get_mut(owner.0 as usize) {
            info.content_property = Some(property);
        }
    }

    pub fn configure(&mut self, ty: TypeId, configure: impl FnOnce(&mut TypeInfo)) {
        if let Some(info) = self.types.get_mut(ty.0 as usize) {
            configure(info);
        }
    }

    /// Finishes the schema. Types without their own content, runtime-name
    /// or implicit-key property inherit the one of their base type.
    pub fn build(mut self) -> TestSchema {
        for i in 0..self.types.len() {
            let Some(base) = self.types[i].base.filter(|b| (b.0 as usize) < i) else {
                continue;
            };
            let inherited = self.types[base.0 as usize].clone();
            let info = &mut self.types[i];
            info.content_property = info.content_property.or(inherited.content_property);
            info.runtime_name_property =
                info.runtime_name_property.or(inherited.runtime_name_property);
            info.implicit_key_property =
                info.implicit_key_property.or(inherited.implicit_key_property);
        }
        TestSchema {
            types: self.types,
            properties: self.properties,
        }
    }
}

/// An immutable set of types and properties.
#[derive(Debug, Clone)]
pub struct TestSchema {
    types: Vec<TypeInfo>,
    properties: Vec<PropertyInfo>,
}

impl TestSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// The standard UI schema used across the workspace tests.
    pub fn ui() -> Self {
        let mut b = SchemaBuilder::new();
        let ui = UI_NAMESPACE;

        let object = b.ty(ui, "Object", |t| t.text_syntax = true);
        let string = b.ty(ui, "String", |t| {
            t.is_string = true;
            t.base = Some(object);
        });
        let int = b.ty(ui, "Int32", |t| {
            t.text_syntax = true;
            t.base = Some(object);
        });
        let double = b.ty(ui, "Double", |t| {
            t.text_syntax = true;
            t.base = Some(object);
        });
        let boolean = b.ty(ui, "Boolean", |t| {
            t.text_syntax = true;
            t.base = Some(object);
        });

        let brush = b.ty(ui, "Brush", |t| {
            t.text_syntax = true;
            t.base = Some(object);
        });
        b.property(brush, "Color", string, |_| {});
        b.ty(ui, "Color", |t| {
            t.text_syntax = true;
            t.never_deferred = true;
            t.base = Some(object);
        });

        let dictionary = b.ty(ui, "ResourceDictionary", |t| {
            t.is_dictionary = true;
            t.base = Some(object);
        });
        b.property(dictionary, "Source", string, |_| {});

        let element = b.ty(ui, "UIElement", |t| t.base = Some(object));
        let name = b.property(element, "Name", string, |_| {});
        b.configure(element, |t| t.runtime_name_property = Some(name));
        b.property(element, "Width", double, |_| {});
        b.property(element, "Height", double, |_| {});
        b.property(element, "Tag", object, |_| {});
        b.property(element, "IsEnabled", boolean, |_| {});
        b.property(element, "Resources", dictionary, |_| {});
        b.property(element, "Column", int, |p| p.attachable = true);
        b.property(element, "Click", string, |p| p.is_event = true);

        let collection = b.ty(ui, "UIElementCollection", |t| {
            t.is_collection = true;
            t.base = Some(object);
        });

        let panel = b.ty(ui, "Panel", |t| t.base = Some(element));
        let children = b.property(panel, "Children", collection, |p| p.read_only = true);
        b.content(panel, children);
        b.property(panel, "Background", brush, |_| {});
        b.ty(ui, "StackPanel", |t| {
            t.base = Some(panel);
            t.content_property = Some(children);
        });
        let grid = b.ty(ui, "Grid", |t| {
            t.base = Some(panel);
            t.content_property = Some(children);
        });
        b.property(grid, "Row", int, |p| p.attachable = true);

        let page = b.ty(ui, "Page", |t| t.base = Some(element));
        let page_content = b.property(page, "Content", element, |_| {});
        b.content(page, page_content);

        let button = b.ty(ui, "Button", |t| t.base = Some(element));
        let button_content = b.property(button, "Content", object, |_| {});
        b.content(button, button_content);
        b.property(button, "Background", brush, |_| {});

        let text_block = b.ty(ui, "TextBlock", |t| t.base = Some(element));
        let text = b.property(text_block, "Text", string, |_| {});
        b.content(text_block, text);
        b.property(text_block, "Foreground", brush, |_| {});

        let rect = b.ty(ui, "Rect", |t| t.base = Some(element));
        b.property(rect, "Fill", brush, |_| {});
        b.property(rect, "Stroke", brush, |_| {});

        let style = b.ty(ui, "Style", |t| t.base = Some(object));
        let target = b.property(style, "TargetType", string, |_| {});
        b.configure(style, |t| t.implicit_key_property = Some(target));
        b.property(style, "BasedOn", style, |_| {});
        b.property(style, "Background", brush, |_| {});

        let inlines = b.ty(ui, "InlineCollection", |t| {
            t.is_collection = true;
            t.whitespace_significant = true;
            t.base = Some(object);
        });
        let paragraph = b.ty(ui, "Paragraph", |t| t.base = Some(object));
        let paragraph_inlines = b.property(paragraph, "Inlines", inlines, |p| p.read_only = true);
        b.content(paragraph, paragraph_inlines);
        let run = b.ty(ui, "Run", |t| t.base = Some(object));
        let run_text = b.property(run, "Text", string, |_| {});
        b.content(run, run_text);
        b.ty(ui, "LineBreak", |t| {
            t.trim_surrounding_whitespace = true;
            t.base = Some(object);
        });

        let static_resource = b.ty(ui, "StaticResourceExtension", |t| {
            t.extension = Some(ExtensionKind::StaticResource);
        });
        b.property(static_resource, "ResourceKey", string, |_| {});
        let theme_resource = b.ty(ui, "ThemeResourceExtension", |t| {
            t.extension = Some(ExtensionKind::ThemeResource);
        });
        b.property(theme_resource, "ResourceKey", string, |_| {});
        let binding = b.ty(ui, "BindingExtension", |t| {
            t.extension = Some(ExtensionKind::Custom);
        });
        b.property(binding, "Path", string, |_| {});
        b.property(binding, "Mode", string, |_| {});
        let failing = b.ty(ui, "FailExtension", |t| {
            t.extension = Some(ExtensionKind::Custom);
        });
        b.property(failing, "Reason", string, |_| {});
        b.ty(LANGUAGE_NAMESPACE, "NullExtension", |t| {
            t.extension = Some(ExtensionKind::Null);
        });

        b.build()
    }

    /// Id of the type called `name`. Panics when there is none.
    pub fn type_id(&self, name: &str) -> TypeId {
        self.find_type(name)
            .unwrap_or_else(|| panic!("test schema has no type '{}'", name))
    }

    pub fn find_type(&self, name: &str) -> Option<TypeId> {
        self.types.iter().find(|t| t.name == name).map(|t| t.id)
    }

    /// Id of `owner.name`, inherited members included. Panics when there is
    /// none.
    pub fn property_id(&self, owner: &str, name: &str) -> PropertyId {
        self.resolve(self.type_id(owner), name)
            .unwrap_or_else(|| panic!("test schema has no property '{}.{}'", owner, name))
    }

    pub fn type_name(&self, ty: TypeId) -> &str {
        self.types
            .get(ty.0 as usize)
            .map(|t| t.name.as_str())
            .unwrap_or("?")
    }

    pub fn property_name(&self, property: PropertyId) -> &str {
        self.properties
            .get(property.0 as usize)
            .map(|p| p.name.as_str())
            .unwrap_or("?")
    }

    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }
}

impl TypeRegistry for TestSchema {
    fn resolve_type(&self, namespace: &str, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .find(|t| t.namespace == namespace && t.name == name)
            .map(|t| t.id)
    }

    fn type_info(&self, ty: TypeId) -> Option<&TypeInfo> {
        self.types.get(ty.0 as usize)
    }

    fn knows_namespace(&self, namespace: &str) -> bool {
        self.types.iter().any(|t| t.namespace == namespace)
    }

    fn create(&self, ty: TypeId) -> Result<InstanceHandle, CollaboratorError> {
        Err(CollaboratorError::new(format!(
            "schema alone cannot create {}",
            self.type_name(ty)
        )))
    }
}

impl PropertyRegistry for TestSchema {
    fn resolve(&self, owner: TypeId, name: &str) -> Option<PropertyId> {
        let mut current = Some(owner);
        while let Some(ty) = current {
            if let Some(p) = self
                .properties
                .iter()
                .find(|p| p.owner == ty && p.name == name)
            {
                return Some(p.id);
            }
            current = self.type_info(ty).and_then(|t| t.base);
        }
        None
    }

    fn property_info(&self, property: PropertyId) -> Option<&PropertyInfo> {
        self.properties.get(property.0 as usize)
    }
}
