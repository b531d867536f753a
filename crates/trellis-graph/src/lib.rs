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

//! Object graph construction for Trellis.
//!
//! [`GraphWriter`] consumes canonical events, live from the pull parser or
//! replayed from a [`NodeStream`](trellis_stream::NodeStream), and drives the
//! collaborators in [`runtime`] to build objects. Dictionary content can be
//! recorded and materialized on demand through [`DeferredMaterializer`] and
//! [`ResourceDictionary`].
//!
//! # Examples
//!
//! ```ignore
//! use trellis_graph::{Collaborators, GraphWriter, WriterSettings};
//!
//! let mut writer = GraphWriter::new(collaborators, WriterSettings::default());
//! for event in &events {
//!     writer.write(event)?;
//! }
//! let root = writer.finish()?;
//! ```

mod cache;
mod deferred;
mod dictionary;
pub mod runtime;
mod scope;
mod settings;
mod writer;

pub use cache::NegativeLookupCache;
pub use deferred::{DeferredMaterializer, Lookup};
pub use dictionary::ResourceDictionary;
pub use runtime::{
    Collaborators, ConditionEvaluator, ExpressionEvaluator, ExtensionArgs, LookupScope,
    NoResources, ObjectRuntime, ResourceKey, ResourceResolver, ValueConverter,
};
pub use scope::ScopeChain;
pub use settings::{DeferralPolicy, WriterSettings};
pub use writer::GraphWriter;
