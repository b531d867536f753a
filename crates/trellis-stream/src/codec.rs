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

//! The node stream: canonical events as an appendable byte buffer.
//!
//! # Record layout
//!
//! ```text
//! [tag:u8] [flags:u8]? [line delta:zigzag varint] [column delta:zigzag varint] [payload:varint*]
//! ```
//!
//! Bit 7 of the tag announces the flags byte; it is omitted when no flag is
//! set. Positions are deltas against the previous record, so decoding a
//! record needs the position of its predecessor; a [`StreamOffset`] carries
//! that base along with the byte position.
//!
//! Payloads are indices into the stream's own intern tables:
//!
//! | record | payload |
//! |---|---|
//! | StartObject | type |
//! | StartMember | member |
//! | Namespace | prefix string, URI string, predicate + 1 (0 for none) |
//! | Value | value |
//! | StartConditionalScope | predicate |
//!
//! The stream is write-once, read-many: creating the first cursor seals it.

use crate::error::{StreamError, StreamResult};
use crate::intern::InternTable;
use crate::varint::{decode_signed, decode_unsigned, encode_signed, encode_unsigned};
use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use tracing::trace;
use trellis_core::lex::{Predicate, XmlNamespace};
use trellis_core::{CanonicalEvent, EventKind, MemberRef, SourcePos, TypeId};

const TAG_START_OBJECT: u8 = 0x01;
const TAG_END_OBJECT: u8 = 0x02;
const TAG_START_MEMBER: u8 = 0x03;
const TAG_END_MEMBER: u8 = 0x04;
const TAG_NAMESPACE: u8 = 0x05;
const TAG_VALUE: u8 = 0x06;
const TAG_START_CONDITIONAL: u8 = 0x07;
const TAG_END_CONDITIONAL: u8 = 0x08;

const HAS_FLAGS: u8 = 0x80;
const FLAG_RETRIEVED: u8 = 0x01;

/// A seek target inside a [`NodeStream`].
///
/// Equality, ordering and hashing consider the byte position only.
#[derive(Debug, Clone, Copy)]
pub struct StreamOffset {
    position: usize,
    base: SourcePos,
}

impl StreamOffset {
    /// Offset of the first record of any stream.
    pub const START: StreamOffset = StreamOffset {
        position: 0,
        base: SourcePos::new(0, 0),
    };

    pub fn position(&self) -> usize {
        self.position
    }

    /// Source position the record at this offset is delta-encoded against.
    pub fn base(&self) -> SourcePos {
        self.base
    }
}

impl PartialEq for StreamOffset {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}

impl Eq for StreamOffset {}

impl PartialOrd for StreamOffset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StreamOffset {
    fn cmp(&self, other: &Self) -> Ordering {
        self.position.cmp(&other.position)
    }
}

impl Hash for StreamOffset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.position.hash(state);
    }
}

impl fmt::Display for StreamOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.position)
    }
}

/// Entry counts of the intern tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableSizes {
    pub types: usize,
    pub members: usize,
    pub strings: usize,
    pub predicates: usize,
    pub values: usize,
}

/// An encoded canonical event stream with its intern tables.
#[derive(Debug, Default)]
pub struct NodeStream {
    bytes: Vec<u8>,
    types: InternTable<TypeId>,
    members: InternTable<MemberRef>,
    strings: InternTable<Rc<str>>,
    predicates: InternTable<Rc<Predicate>>,
    values: InternTable<Rc<str>>,
    last_pos: SourcePos,
    records: usize,
    sealed: Cell<bool>,
}

impl NodeStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes every event of a sequence into a fresh stream.
    pub fn from_events<'e>(
        events: impl IntoIterator<Item = &'e CanonicalEvent>,
    ) -> StreamResult<Self> {
        let mut stream = Self::new();
        for event in events {
            stream.encode(event)?;
        }
        Ok(stream)
    }

    /// Offset at which the next record will be written.
    pub fn offset(&self) -> StreamOffset {
        StreamOffset {
            position: self.bytes.len(),
            base: self.last_pos,
        }
    }

    /// Appends one event and returns the offset of its record.
    pub fn encode(&mut self, event: &CanonicalEvent) -> StreamResult<StreamOffset> {
        if self.sealed.get() {
            return Err(StreamError::Sealed);
        }
        let offset = self.offset();
        let (tag, flags) = match &event.kind {
            EventKind::StartObject { retrieved, .. } => {
                (TAG_START_OBJECT, if *retrieved { FLAG_RETRIEVED } else { 0 })
            }
            EventKind::EndObject => (TAG_END_OBJECT, 0),
            EventKind::StartMember(_) => (TAG_START_MEMBER, 0),
            EventKind::EndMember => (TAG_END_MEMBER, 0),
            EventKind::Namespace { .. } => (TAG_NAMESPACE, 0),
            EventKind::Value(_) => (TAG_VALUE, 0),
            EventKind::StartConditionalScope(_) => (TAG_START_CONDITIONAL, 0),
            EventKind::EndConditionalScope => (TAG_END_CONDITIONAL, 0),
        };
        if flags != 0 {
            self.bytes.push(tag | HAS_FLAGS);
            self.bytes.push(flags);
        } else {
            self.bytes.push(tag);
        }
        encode_signed(
            &mut self.bytes,
            event.pos.line() as i64 - self.last_pos.line() as i64,
        );
        encode_signed(
            &mut self.bytes,
            event.pos.column() as i64 - self.last_pos.column() as i64,
        );

        match &event.kind {
            EventKind::StartObject { ty, .. } => {
                let id = self.types.intern(ty);
                encode_unsigned(&mut self.bytes, u64::from(id));
            }
            EventKind::StartMember(member) => {
                let id = self.members.intern(member);
                encode_unsigned(&mut self.bytes, u64::from(id));
            }
            EventKind::Namespace { prefix, namespace } => {
                let prefix_id = self.strings.intern(prefix);
                let uri_id = self.strings.intern(namespace.shared_uri());
                let predicate_id = namespace
                    .shared_predicate()
                    .map_or(0, |p| u64::from(self.predicates.intern(p)) + 1);
                encode_unsigned(&mut self.bytes, u64::from(prefix_id));
                encode_unsigned(&mut self.bytes, u64::from(uri_id));
                encode_unsigned(&mut self.bytes, predicate_id);
            }
            EventKind::Value(text) => {
                let id = self.values.intern(text);
                encode_unsigned(&mut self.bytes, u64::from(id));
            }
            EventKind::StartConditionalScope(predicate) => {
                let id = self.predicates.intern(predicate);
                encode_unsigned(&mut self.bytes, u64::from(id));
            }
            EventKind::EndObject
            | EventKind::EndMember
            | EventKind::EndConditionalScope => {}
        }

        self.last_pos = event.pos;
        self.records += 1;
        Ok(offset)
    }

    /// Creates an independent forward reader positioned at the first record.
    ///
    /// The stream accepts no further records afterwards.
    pub fn read_cursor(&self) -> Cursor<'_> {
        if !self.sealed.replace(true) {
            trace!(bytes = self.bytes.len(), records = self.records, "node stream sealed");
        }
        Cursor {
            stream: self,
            position: 0,
            last_pos: SourcePos::new(0, 0),
            failed: false,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.get()
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn table_sizes(&self) -> TableSizes {
        TableSizes {
            types: self.types.len(),
            members: self.members.len(),
            strings: self.strings.len(),
            predicates: self.predicates.len(),
            values: self.values.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn entry<'t, T: Eq + Hash + Clone>(
    table: &'t InternTable<T>,
    name: &'static str,
    index: u64,
    offset: usize,
) -> StreamResult<&'t T> {
    u32::try_from(index)
        .ok()
        .and_then(|i| table.get(i))
        .ok_or(StreamError::BadIndex {
            table: name,
            index,
            offset,
        })
}

fn apply_delta(base: usize, delta: i64) -> Option<usize> {
    i64::try_from(base)
        .ok()?
        .checked_add(delta)
        .and_then(|v| usize::try_from(v).ok())
}

/// A forward reader over a sealed [`NodeStream`].
///
/// Cursors only read the stream's bytes and tables, so any number of them
/// can be active at once.
#[derive(Debug, Clone)]
pub struct Cursor<'s> {
    stream: &'s NodeStream,
    position: usize,
    last_pos: SourcePos,
    failed: bool,
}

impl<'s> Cursor<'s> {
    /// Offset of the next record to be read.
    pub fn offset(&self) -> StreamOffset {
        StreamOffset {
            position: self.position,
            base: self.last_pos,
        }
    }

    /// Repositions the cursor at an offset obtained from the same stream.
    pub fn seek(&mut self, offset: StreamOffset) -> StreamResult<()> {
        if offset.position > self.stream.bytes.len() {
            return Err(StreamError::BadSeek {
                offset: offset.position,
                len: self.stream.bytes.len(),
            });
        }
        self.position = offset.position;
        self.last_pos = offset.base;
        self.failed = false;
        Ok(())
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.stream.bytes.len()
    }

    /// Decodes the next event.
    pub fn next_event(&mut self) -> StreamResult<Option<CanonicalEvent>> {
        Ok(self.next_with_offset()?.map(|(_, event)| event))
    }

    /// Decodes the next event together with the offset of its record.
    pub fn next_with_offset(&mut self) -> StreamResult<Option<(StreamOffset, CanonicalEvent)>> {
        let stream = self.stream;
        let bytes = &stream.bytes;
        let start = self.position;
        let Some(&head) = bytes.get(start) else {
            return Ok(None);
        };
        let offset = self.offset();
        let mut at = start + 1;
        let flags = if head & HAS_FLAGS != 0 {
            let flags = *bytes.get(at).ok_or(StreamError::Truncated { offset: start })?;
            at += 1;
            flags
        } else {
            0
        };
        let line_delta = decode_signed(bytes, &mut at)?;
        let column_delta = decode_signed(bytes, &mut at)?;
        let line = apply_delta(self.last_pos.line(), line_delta)
            .ok_or(StreamError::BadPosition { offset: start })?;
        let column = apply_delta(self.last_pos.column(), column_delta)
            .ok_or(StreamError::BadPosition { offset: start })?;
        let pos = SourcePos::new(line, column);

        let kind = match head & !HAS_FLAGS {
            TAG_START_OBJECT => {
                let index = decode_unsigned(bytes, &mut at)?;
                EventKind::StartObject {
                    ty: *entry(&stream.types, "type", index, start)?,
                    retrieved: flags & FLAG_RETRIEVED != 0,
                }
            }
            TAG_END_OBJECT => EventKind::EndObject,
            TAG_START_MEMBER => {
                let index = decode_unsigned(bytes, &mut at)?;
                EventKind::StartMember(entry(&stream.members, "member", index, start)?.clone())
            }
            TAG_END_MEMBER => EventKind::EndMember,
            TAG_NAMESPACE => {
                let prefix = decode_unsigned(bytes, &mut at)?;
                let uri = decode_unsigned(bytes, &mut at)?;
                let predicate = decode_unsigned(bytes, &mut at)?;
                let predicate = match predicate {
                    0 => None,
                    n => Some(entry(&stream.predicates, "predicate", n - 1, start)?.clone()),
                };
                EventKind::Namespace {
                    prefix: entry(&stream.strings, "string", prefix, start)?.clone(),
                    namespace: XmlNamespace::from_parts(
                        entry(&stream.strings, "string", uri, start)?.clone(),
                        predicate,
                    ),
                }
            }
            TAG_VALUE => {
                let index = decode_unsigned(bytes, &mut at)?;
                EventKind::Value(entry(&stream.values, "value", index, start)?.clone())
            }
            TAG_START_CONDITIONAL => {
                let index = decode_unsigned(bytes, &mut at)?;
                EventKind::StartConditionalScope(
                    entry(&stream.predicates, "predicate", index, start)?.clone(),
                )
            }
            TAG_END_CONDITIONAL => EventKind::EndConditionalScope,
            tag => return Err(StreamError::UnknownTag { tag, offset: start }),
        };

        self.position = at;
        self.last_pos = pos;
        Ok(Some((offset, CanonicalEvent::new(kind, pos))))
    }
}

impl<'s> Iterator for Cursor<'s> {
    type Item = StreamResult<CanonicalEvent>;

    /// Stops after the first decode error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_event().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{ImplicitMember, PropertyId};

    fn pos(line: usize, column: usize) -> SourcePos {
        SourcePos::new(line, column)
    }

    fn sample() -> Vec<CanonicalEvent> {
        vec![
            CanonicalEvent::start_object(TypeId(3), pos(1, 1)),
            CanonicalEvent::start_member(MemberRef::Implicit(ImplicitMember::Items), pos(1, 1)),
            CanonicalEvent::start_object(TypeId(4), pos(2, 5)),
            CanonicalEvent::start_member(MemberRef::Property(PropertyId(9)), pos(2, 11)),
            CanonicalEvent::value("Red", pos(2, 11)),
            CanonicalEvent::end_member(pos(2, 11)),
            CanonicalEvent::end_object(pos(2, 5)),
            CanonicalEvent::start_object(TypeId(4), pos(3, 5)),
            CanonicalEvent::start_member(MemberRef::Property(PropertyId(9)), pos(3, 11)),
            CanonicalEvent::value("Red", pos(3, 11)),
            CanonicalEvent::end_member(pos(3, 11)),
            CanonicalEvent::end_object(pos(3, 5)),
            CanonicalEvent::end_member(pos(4, 1)),
            CanonicalEvent::end_object(pos(4, 1)),
        ]
    }

    // ===== Encoding =====

    #[test]
    fn test_round_trip() {
        let events = sample();
        let stream = NodeStream::from_events(&events).unwrap();
        let decoded: Vec<_> = stream.read_cursor().collect::<StreamResult<_>>().unwrap();
        assert_eq!(decoded, events);
        assert_eq!(stream.record_count(), events.len());
    }

    #[test]
    fn test_repeated_values_are_interned_once() {
        let stream = NodeStream::from_events(&sample()).unwrap();
        let sizes = stream.table_sizes();
        assert_eq!(sizes.types, 2);
        assert_eq!(sizes.members, 2);
        assert_eq!(sizes.values, 1);
    }

    #[test]
    fn test_flags_byte_only_when_needed() {
        let mut stream = NodeStream::new();
        stream
            .encode(&CanonicalEvent::start_object(TypeId(0), pos(0, 0)))
            .unwrap();
        assert_eq!(stream.as_bytes(), &[TAG_START_OBJECT, 0, 0, 0]);

        let mut stream = NodeStream::new();
        stream
            .encode(&CanonicalEvent::new(
                EventKind::StartObject {
                    ty: TypeId(0),
                    retrieved: true,
                },
                pos(0, 0),
            ))
            .unwrap();
        assert_eq!(
            stream.as_bytes(),
            &[TAG_START_OBJECT | HAS_FLAGS, FLAG_RETRIEVED, 0, 0, 0]
        );
    }

    #[test]
    fn test_positions_are_deltas() {
        let mut stream = NodeStream::new();
        stream
            .encode(&CanonicalEvent::end_object(pos(10, 4)))
            .unwrap();
        let before = stream.len();
        stream
            .encode(&CanonicalEvent::end_object(pos(10, 2)))
            .unwrap();
        // tag, line delta 0, column delta -2
        assert_eq!(stream.len() - before, 3);
    }

    // ===== Sealing =====

    #[test]
    fn test_encode_after_cursor_is_rejected() {
        let mut stream = NodeStream::from_events(&sample()).unwrap();
        let _ = stream.read_cursor();
        assert!(stream.is_sealed());
        assert_eq!(
            stream.encode(&CanonicalEvent::end_object(pos(1, 1))),
            Err(StreamError::Sealed)
        );
    }

    // ===== Seeking =====

    #[test]
    fn test_seek_to_recorded_offset() {
        let events = sample();
        let mut stream = NodeStream::new();
        let offsets: Vec<_> = events.iter().map(|e| stream.encode(e).unwrap()).collect();
        let mut cursor = stream.read_cursor();
        cursor.seek(offsets[7]).unwrap();
        assert_eq!(cursor.next_event().unwrap(), Some(events[7].clone()));
        cursor.seek(offsets[2]).unwrap();
        let (offset, event) = cursor.next_with_offset().unwrap().unwrap();
        assert_eq!(offset, offsets[2]);
        assert_eq!(event, events[2]);
    }

    #[test]
    fn test_independent_cursors() {
        let events = sample();
        let stream = NodeStream::from_events(&events).unwrap();
        let mut a = stream.read_cursor();
        let mut b = stream.read_cursor();
        a.next_event().unwrap();
        a.next_event().unwrap();
        assert_eq!(b.next_event().unwrap(), Some(events[0].clone()));
        assert_eq!(a.next_event().unwrap(), Some(events[2].clone()));
    }

    #[test]
    fn test_seek_past_end() {
        let stream = NodeStream::from_events(&sample()).unwrap();
        let mut cursor = stream.read_cursor();
        let bogus = StreamOffset {
            position: stream.len() + 1,
            base: pos(0, 0),
        };
        assert!(matches!(cursor.seek(bogus), Err(StreamError::BadSeek { .. })));
    }

    #[test]
    fn test_offset_equality_ignores_base() {
        let a = StreamOffset {
            position: 4,
            base: pos(1, 1),
        };
        let b = StreamOffset {
            position: 4,
            base: pos(9, 9),
        };
        assert_eq!(a, b);
        assert!(StreamOffset::START < a);
    }

    // ===== Corruption =====

    #[test]
    fn test_unknown_tag() {
        let mut stream = NodeStream::new();
        stream.bytes = vec![0x3F, 0, 0];
        let mut cursor = stream.read_cursor();
        assert_eq!(
            cursor.next_event(),
            Err(StreamError::UnknownTag { tag: 0x3F, offset: 0 })
        );
    }

    #[test]
    fn test_bad_index_stops_iteration() {
        let mut stream = NodeStream::new();
        stream.bytes = vec![TAG_VALUE, 0, 0, 5];
        let mut cursor = stream.read_cursor();
        assert!(matches!(
            cursor.next(),
            Some(Err(StreamError::BadIndex { table: "value", .. }))
        ));
        assert!(cursor.next().is_none());
    }
}
