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

//! Trellis node stream codec.
//!
//! A [`NodeStream`] stores canonical events as compact binary records that
//! reference per-stream intern tables. Streams are appended to while a
//! region of markup is recorded, then sealed and replayed any number of
//! times through independent [`Cursor`]s, each able to seek to a
//! [`StreamOffset`] captured during encoding.
//!
//! # Examples
//!
//! ```rust
//! use trellis_core::{CanonicalEvent, SourcePos, TypeId};
//! use trellis_stream::NodeStream;
//!
//! let pos = SourcePos::new(1, 1);
//! let events = vec![
//!     CanonicalEvent::start_object(TypeId(0), pos),
//!     CanonicalEvent::end_object(pos),
//! ];
//! let mut stream = NodeStream::new();
//! let first = stream.encode(&events[0]).unwrap();
//! stream.encode(&events[1]).unwrap();
//!
//! let mut cursor = stream.read_cursor();
//! cursor.seek(first).unwrap();
//! assert_eq!(cursor.next_event().unwrap(), Some(events[0].clone()));
//! ```

mod codec;
mod error;
pub mod intern;
pub mod varint;

pub use codec::{Cursor, NodeStream, StreamOffset, TableSizes};
pub use error::{StreamError, StreamResult};
