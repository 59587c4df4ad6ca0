// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Byte-cursor primitives shared by the header, block and value decoders.
//!
//! A cursor is a `&mut &[u8]`: every successful read advances the slice past
//! the consumed bytes and nothing else is touched.

use crate::{AvroResult, error::Details};
use serde_json::{Map, Value};
use std::sync::{
    Once,
    atomic::{AtomicUsize, Ordering},
};

/// Maximum number of bytes that can be allocated when decoding
/// Avro-encoded values. This is a protection against ill-formed
/// data, whose length field might be interpreted as enormous.
/// See max_allocation_bytes to change this limit.
pub const DEFAULT_MAX_ALLOCATION_BYTES: usize = 512 * 1024 * 1024;
static MAX_ALLOCATION_BYTES: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_ALLOCATION_BYTES);
static MAX_ALLOCATION_BYTES_ONCE: Once = Once::new();

/// Set a new maximum number of bytes that can be allocated when decoding data.
/// Once called, the limit cannot be changed.
///
/// **NOTE** This function must be called before decoding **any** data. The
/// library leverages [`std::sync::Once`](https://doc.rust-lang.org/std/sync/struct.Once.html)
/// to set the limit either when calling this method, or when decoding for
/// the first time.
pub fn max_allocation_bytes(num_bytes: usize) -> usize {
    MAX_ALLOCATION_BYTES_ONCE.call_once(|| {
        MAX_ALLOCATION_BYTES.store(num_bytes, Ordering::Release);
    });
    MAX_ALLOCATION_BYTES.load(Ordering::Acquire)
}

pub fn safe_len(len: usize) -> AvroResult<usize> {
    let max_bytes = max_allocation_bytes(DEFAULT_MAX_ALLOCATION_BYTES);

    if len <= max_bytes {
        Ok(len)
    } else {
        Err(Details::MemoryAllocation {
            desired: len,
            maximum: max_bytes,
        }
        .into())
    }
}

pub trait MapHelper {
    fn string(&self, key: &str) -> Option<String>;

    fn name(&self) -> Option<String> {
        self.string("name")
    }
}

impl MapHelper for Map<String, Value> {
    fn string(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
    }
}

pub fn zag_i32(cursor: &mut &[u8]) -> AvroResult<i32> {
    let i = zag_i64(cursor)?;
    i32::try_from(i).map_err(|e| Details::ZagI32(e, i).into())
}

pub fn zag_i64(cursor: &mut &[u8]) -> AvroResult<i64> {
    let z = decode_variable(cursor)?;
    Ok(if z & 0x1 == 0 {
        (z >> 1) as i64
    } else {
        !(z >> 1) as i64
    })
}

/// Reads a zig-zag length prefix and checks it against the allocation limit.
pub fn read_len(cursor: &mut &[u8]) -> AvroResult<usize> {
    let len = zag_i64(cursor)?;
    let len = usize::try_from(len).map_err(|e| Details::ConvertI64ToUsize(e, len))?;
    safe_len(len)
}

/// Splits `len` bytes off the front of the cursor.
pub fn read_bytes<'a>(cursor: &mut &'a [u8], len: usize) -> AvroResult<&'a [u8]> {
    if cursor.len() < len {
        return Err(Details::Truncated {
            needed: len,
            available: cursor.len(),
        }
        .into());
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

pub fn read_array<const N: usize>(cursor: &mut &[u8]) -> AvroResult<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(read_bytes(cursor, N)?);
    Ok(out)
}

fn decode_variable(cursor: &mut &[u8]) -> AvroResult<u64> {
    let mut i = 0u64;

    let mut j = 0;
    loop {
        if j > 9 {
            // if j * 7 > 64
            return Err(Details::IntegerOverflow.into());
        }
        let [byte] = read_array::<1>(cursor)?;
        i |= (u64::from(byte & 0x7F)) << (j * 7);
        if (byte >> 7) == 0 {
            break;
        } else {
            j += 1;
        }
    }

    Ok(i)
}

#[cfg(test)]
pub(crate) fn zig_i64(n: i64, buffer: &mut Vec<u8>) {
    let mut z = ((n << 1) ^ (n >> 63)) as u64;
    loop {
        if z <= 0x7F {
            buffer.push((z & 0x7F) as u8);
            break;
        } else {
            buffer.push((0x80 | (z & 0x7F)) as u8);
            z >>= 7;
        }
    }
}

/// Length-prefixed bytes, as strings and bytes are written on the wire.
#[cfg(test)]
pub(crate) fn zig_bytes(bytes: &[u8], buffer: &mut Vec<u8>) {
    zig_i64(bytes.len() as i64, buffer);
    buffer.extend_from_slice(bytes);
}
