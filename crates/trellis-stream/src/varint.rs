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

//! Variable-length integers.
//!
//! Unsigned values use the 7-bit group encoding: least significant group
//! first, high bit set on every byte except the last. Signed values are
//! zigzag-mapped first so small deltas of either sign stay one byte.

use crate::error::{StreamError, StreamResult};

/// Appends `value` as an unsigned varint.
#[inline]
pub fn encode_unsigned(buf: &mut Vec<u8>, value: u64) {
    if value < 0x80 {
        buf.push(value as u8);
        return;
    }
    let mut v = value;
    loop {
        let low7 = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            buf.push(low7);
            break;
        }
        buf.push(0x80 | low7);
    }
}

/// Reads an unsigned varint at `*at`, advancing it past the value.
#[inline]
pub fn decode_unsigned(bytes: &[u8], at: &mut usize) -> StreamResult<u64> {
    let start = *at;
    let mut result = 0u64;
    let mut shift: u32 = 0;
    loop {
        let byte = *bytes
            .get(*at)
            .ok_or(StreamError::Truncated { offset: start })?;
        *at += 1;
        let data = u64::from(byte & 0x7F);
        // Only one data bit fits in the tenth byte.
        if shift == 63 && (data > 1 || byte & 0x80 != 0) {
            return Err(StreamError::VarintOverflow { offset: start });
        }
        result |= data << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

#[inline]
pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[inline]
pub fn encode_signed(buf: &mut Vec<u8>, value: i64) {
    encode_unsigned(buf, zigzag(value));
}

#[inline]
pub fn decode_signed(bytes: &[u8], at: &mut usize) -> StreamResult<i64> {
    decode_unsigned(bytes, at).map(unzigzag)
}
