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

//! Context helpers for results.
//!
//! # Examples
//!
//! ```rust
//! use trellis::{load_markup, ParseOptions, TrellisResultExt, WriterSettings};
//! use trellis_test::TestRuntime;
//!
//! let rt = TestRuntime::ui();
//! let err = load_markup(
//!     r#"<Button xmlns="urn:trellis:ui" Width="wide"/>"#,
//!     rt.collaborators(),
//!     &ParseOptions::default(),
//!     WriterSettings::default(),
//! )
//! .context("in Page.xaml")
//! .unwrap_err();
//! assert!(err.context.unwrap().starts_with("in Page.xaml; "));
//! ```

use crate::{CollaboratorError, SourcePos, StreamError, TrellisError};
use std::fmt;

/// Adds context to failing results as they propagate.
///
/// New context is prepended to any context the error already carries, so
/// the outermost caller reads first.
pub trait TrellisResultExt<T> {
    fn context<C>(self, context: C) -> Result<T, TrellisError>
    where
        C: fmt::Display;

    /// Like [`context`](TrellisResultExt::context), but only builds the
    /// message on the error path.
    fn with_context<C, F>(self, f: F) -> Result<T, TrellisError>
    where
        C: fmt::Display,
        F: FnOnce() -> C;
}

impl<T> TrellisResultExt<T> for Result<T, TrellisError> {
    fn context<C>(self, context: C) -> Result<T, TrellisError>
    where
        C: fmt::Display,
    {
        self.map_err(|e| add_context(e, context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, TrellisError>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| add_context(e, f().to_string()))
    }
}

impl<T> TrellisResultExt<T> for Result<T, StreamError> {
    fn context<C>(self, context: C) -> Result<T, TrellisError>
    where
        C: fmt::Display,
    {
        self.map_err(|e| add_context(e.into(), context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, TrellisError>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| add_context(e.into(), f().to_string()))
    }
}

/// Collaborator failures carry no position; they become runtime errors at
/// the default position.
impl<T> TrellisResultExt<T> for Result<T, CollaboratorError> {
    fn context<C>(self, context: C) -> Result<T, TrellisError>
    where
        C: fmt::Display,
    {
        self.map_err(|e| {
            TrellisError::runtime(e.message, SourcePos::default()).with_context(context.to_string())
        })
    }

    fn with_context<C, F>(self, f: F) -> Result<T, TrellisError>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| {
            TrellisError::runtime(e.message, SourcePos::default()).with_context(f().to_string())
        })
    }
}

fn add_context(mut error: TrellisError, context: String) -> TrellisError {
    if context.is_empty() {
        return error;
    }
    error.context = Some(match error.context.take() {
        Some(existing) => format!("{}; {}", context, existing),
        None => context,
    });
    error
}
