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

//! Decode errors for encoded node streams.
//!
//! A stream is only ever decoded by the process that encoded it, so every
//! variant here means either a defect or a seek target that did not come
//! from [`NodeStream::offset`](crate::NodeStream::offset). All of them convert
//! into a `Structural` [`TrellisError`].

use thiserror::Error;
use trellis_core::{ErrorCode, SourcePos, TrellisError};

/// Errors raised while encoding or decoding a node stream.
///
/// # Examples
///
/// ```rust
/// use trellis_stream::StreamError;
///
/// let err = StreamError::Truncated { offset: 12 };
/// assert_eq!(err.offset(), Some(12));
/// assert!(err.to_string().contains("byte 12"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The buffer ended inside a record.
    #[error("Truncated record at byte {offset}")]
    Truncated { offset: usize },

    /// A record started with a tag this codec does not write.
    #[error("Unknown record tag {tag:#04x} at byte {offset}")]
    UnknownTag { tag: u8, offset: usize },

    /// A varint ran past 64 bits.
    #[error("Varint overflow at byte {offset}")]
    VarintOverflow { offset: usize },

    /// A payload referenced an intern table slot that does not exist.
    #[error("Index {index} out of range for {table} table at byte {offset}")]
    BadIndex {
        table: &'static str,
        index: u64,
        offset: usize,
    },

    /// A delta moved the source position below line or column 0.
    #[error("Invalid source position delta at byte {offset}")]
    BadPosition { offset: usize },

    /// A seek target past the end of the buffer.
    #[error("Seek to byte {offset} outside stream of {len} bytes")]
    BadSeek { offset: usize, len: usize },

    /// An encode was attempted after a reader was created.
    #[error("Stream is sealed; no records can be appended once reading has begun")]
    Sealed,
}

impl StreamError {
    /// Byte offset the error refers to, if any.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Truncated { offset }
            | Self::UnknownTag { offset, .. }
            | Self::VarintOverflow { offset }
            | Self::BadIndex { offset, .. }
            | Self::BadPosition { offset }
            | Self::BadSeek { offset, .. } => Some(*offset),
            Self::Sealed => None,
        }
    }
}

impl From<StreamError> for TrellisError {
    fn from(err: StreamError) -> Self {
        let code = match err {
            StreamError::Sealed => ErrorCode::StreamSealed,
            _ => ErrorCode::CorruptStream,
        };
        TrellisError::structural(code, err.to_string(), SourcePos::default())
    }
}

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::ErrorKind;

    #[test]
    fn test_sealed_maps_to_stream_sealed() {
        let err: TrellisError = StreamError::Sealed.into();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert_eq!(err.code, Some(ErrorCode::StreamSealed));
    }

    #[test]
    fn test_decode_errors_map_to_corrupt_stream() {
        let err: TrellisError = StreamError::UnknownTag { tag: 0x7f, offset: 3 }.into();
        assert_eq!(err.code, Some(ErrorCode::CorruptStream));
        assert!(err.message.contains("0x7f"));
    }

    #[test]
    fn test_offset_accessor() {
        assert_eq!(StreamError::Sealed.offset(), None);
        assert_eq!(StreamError::BadSeek { offset: 9, len: 4 }.offset(), Some(9));
    }
}
