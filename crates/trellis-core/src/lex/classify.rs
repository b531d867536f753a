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

//! Attribute classification.
//!
//! Attributes of one element are sorted into fixed-priority buckets so that
//! later stages see namespaces, load strategy, uid and name before any
//! ordinary property, whatever order the author wrote them in. Inside a
//! bucket attributes are ordered by local name, then prefix, so the result
//! is identical for every permutation of the same attribute set.

use super::node::{LexicalNode, NodeKind};
use crate::error::{ErrorCode, TrellisError, TrellisResult};
use crate::schema::{Directive, MemberRef, PropertyRegistry, TypeId, TypeRegistry};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Buckets in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeBucket {
    Namespace,
    DeferLoad,
    Uid,
    Name,
    Directive,
    XmlSpace,
    Event,
    Property,
    Unknown,
}

const BUCKET_COUNT: usize = 9;

impl AttributeBucket {
    pub const ALL: [AttributeBucket; BUCKET_COUNT] = [
        Self::Namespace,
        Self::DeferLoad,
        Self::Uid,
        Self::Name,
        Self::Directive,
        Self::XmlSpace,
        Self::Event,
        Self::Property,
        Self::Unknown,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Determines the bucket of an attribute-like node on an element of type `ty`.
///
/// Returns `None` for nodes that are not attribute-like.
pub fn bucket_of(
    node: &LexicalNode,
    ty: TypeId,
    types: &dyn TypeRegistry,
    properties: &dyn PropertyRegistry,
) -> Option<AttributeBucket> {
    Some(match &node.kind {
        NodeKind::PrefixDefinition(_) => AttributeBucket::Namespace,
        NodeKind::Directive(d) => match d.directive {
            Directive::DeferLoadStrategy | Directive::Load => AttributeBucket::DeferLoad,
            Directive::Uid => AttributeBucket::Uid,
            Directive::Name => AttributeBucket::Name,
            Directive::XmlSpace => AttributeBucket::XmlSpace,
            _ => AttributeBucket::Directive,
        },
        NodeKind::Attribute(a) => match &a.member {
            MemberRef::Unknown(_) => AttributeBucket::Unknown,
            MemberRef::Property(p) => {
                let runtime_name = types.type_info(ty).and_then(|t| t.runtime_name_property);
                if runtime_name == Some(*p) {
                    AttributeBucket::Name
                } else if properties.property_info(*p).is_some_and(|info| info.is_event) {
                    AttributeBucket::Event
                } else {
                    AttributeBucket::Property
                }
            }
            MemberRef::Directive(_) | MemberRef::Implicit(_) => AttributeBucket::Property,
        },
        _ => return None,
    })
}

fn sort_key(node: &LexicalNode) -> (&str, &str) {
    match &node.kind {
        NodeKind::PrefixDefinition(p) => (p.prefix.as_ref(), ""),
        NodeKind::Directive(d) => (d.local_name.as_ref(), d.prefix.as_ref()),
        NodeKind::Attribute(a) => (a.local_name.as_ref(), a.prefix.as_ref()),
        _ => ("", ""),
    }
}

/// The attributes of one element, bucketed.
#[derive(Debug, Clone, Default)]
pub struct SortedAttributes {
    buckets: [SmallVec<[LexicalNode; 4]>; BUCKET_COUNT],
}

impl SortedAttributes {
    /// Classifies attribute-like nodes of an element of type `ty`.
    ///
    /// Any other node kind is a structural error.
    pub fn classify(
        nodes: impl IntoIterator<Item = LexicalNode>,
        ty: TypeId,
        types: &dyn TypeRegistry,
        properties: &dyn PropertyRegistry,
    ) -> TrellisResult<Self> {
        let mut sorted = Self::default();
        for node in nodes {
            let bucket = bucket_of(&node, ty, types, properties).ok_or_else(|| {
                TrellisError::structural(
                    ErrorCode::UnexpectedNode,
                    format!("{:?} is not an attribute", node.tag()),
                    node.pos,
                )
            })?;
            sorted.buckets[bucket.index()].push(node);
        }
        for bucket in sorted.buckets.iter_mut() {
            bucket.sort_by(|a, b| match sort_key(a).cmp(&sort_key(b)) {
                Ordering::Equal => a.pos.cmp(&b.pos),
                other => other,
            });
        }
        Ok(sorted)
    }

    pub fn bucket(&self, bucket: AttributeBucket) -> &[LexicalNode] {
        &self.buckets[bucket.index()]
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns the namespace declarations.
    pub fn take_namespaces(&mut self) -> SmallVec<[LexicalNode; 4]> {
        std::mem::take(&mut self.buckets[AttributeBucket::Namespace.index()])
    }

    /// Consumes the buckets in priority order.
    pub fn into_nodes(self) -> impl Iterator<Item = LexicalNode> {
        self.buckets.into_iter().flatten()
    }
}
