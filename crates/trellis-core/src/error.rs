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

//! Error types shared by every Trellis stage.
//!
//! Every failure carries the [`SourcePos`] of the markup (or replayed event)
//! that caused it. Errors abort the current parse or write; nothing here is
//! recovered from silently.

use crate::lex::SourcePos;
use std::fmt;
use thiserror::Error;

/// The kind of error that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed markup source.
    Scan,
    /// Malformed `{...}` markup extension.
    ExpressionSyntax,
    /// Unknown namespace prefix, type or member.
    UnresolvedName,
    /// Text could not be converted to the target type.
    Conversion,
    /// The same member (or dictionary key) was assigned twice.
    DuplicateAssignment,
    /// Unbalanced or otherwise ill-formed event structure.
    Structural,
    /// A resource reference that no scope could resolve.
    Resource,
    /// Any other collaborator failure.
    Runtime,
    /// A configured limit was exceeded.
    Security,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan => write!(f, "ScanError"),
            Self::ExpressionSyntax => write!(f, "ExpressionSyntaxError"),
            Self::UnresolvedName => write!(f, "UnresolvedNameError"),
            Self::Conversion => write!(f, "ConversionError"),
            Self::DuplicateAssignment => write!(f, "DuplicateAssignmentError"),
            Self::Structural => write!(f, "StructuralError"),
            Self::Resource => write!(f, "ResourceError"),
            Self::Runtime => write!(f, "RuntimeError"),
            Self::Security => write!(f, "SecurityError"),
        }
    }
}

/// Stable code refining an error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MalformedMarkup,
    DoctypeProhibited,
    PropertyElementAtRoot,
    PropertyOnPropertyElement,
    NestedPropertyElement,
    UndeclaredPrefix,
    UnknownDirective,
    InvalidContent,
    UnexpectedNode,
    UnexpectedEof,
    MultipleRoots,
    UnbalancedEvents,
    WriterPoisoned,
    StreamSealed,
    CorruptStream,
}

/// An error produced while scanning, parsing, encoding or writing.
#[derive(Debug, Clone, Error)]
#[error("{kind} at {pos}: {message}")]
pub struct TrellisError {
    /// The kind of error.
    pub kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Where in the markup the error originated.
    pub pos: SourcePos,
    /// Optional refinement of `kind`.
    pub code: Option<ErrorCode>,
    /// Additional context (e.g., "while loading resource 'r'").
    pub context: Option<String>,
}

impl TrellisError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>, pos: SourcePos) -> Self {
        Self {
            kind,
            message: message.into(),
            pos,
            code: None,
            context: None,
        }
    }

    /// Attach a refining code.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Add context information.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    // Convenience constructors for each error kind
    pub fn scan(code: ErrorCode, message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::Scan, message, pos).with_code(code)
    }

    pub fn expression(message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::ExpressionSyntax, message, pos)
    }

    pub fn unresolved(message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::UnresolvedName, message, pos)
    }

    pub fn conversion(message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::Conversion, message, pos)
    }

    pub fn duplicate(message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::DuplicateAssignment, message, pos)
    }

    pub fn structural(code: ErrorCode, message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::Structural, message, pos).with_code(code)
    }

    pub fn resource(message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::Resource, message, pos)
    }

    pub fn runtime(message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::Runtime, message, pos)
    }

    pub fn security(message: impl Into<String>, pos: SourcePos) -> Self {
        Self::new(ErrorKind::Security, message, pos)
    }
}

/// Result type for Trellis operations.
pub type TrellisResult<T> = Result<T, TrellisError>;

/// Failure reported by an external collaborator.
///
/// Collaborators know nothing about source positions; the caller wraps this
/// into a [`TrellisError`] of the appropriate kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CollaboratorError {
    pub message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for CollaboratorError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for CollaboratorError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
