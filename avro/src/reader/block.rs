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

use crate::{
    AvroResult,
    decode::decode,
    error::Details,
    schema::{Names, Schema},
    types::Value,
    util,
};
use log::warn;

/// A block as laid out in the file, before decompression.
pub(super) struct Frame<'m> {
    pub(super) record_count: usize,
    pub(super) payload: &'m [u8],
}

/// Reads the next `count, size, payload, sync` frame from the front of `cursor`.
///
/// Returns `None` when the cursor is already empty.
pub(super) fn read_frame<'m>(
    cursor: &mut &'m [u8],
    sync: &[u8; 16],
) -> AvroResult<Option<Frame<'m>>> {
    if cursor.is_empty() {
        return Ok(None);
    }

    let record_count = util::zag_i64(cursor)?;
    let record_count = usize::try_from(record_count)
        .map_err(|e| Details::ConvertI64ToUsize(e, record_count))?;
    let payload_len = util::read_len(cursor)?;
    let payload = util::read_bytes(cursor, payload_len)?;

    let marker = util::read_array::<16>(cursor)?;
    if &marker != sync {
        return Err(Details::GetBlockMarker.into());
    }

    Ok(Some(Frame {
        record_count,
        payload,
    }))
}

/// The current block of a [`ContainerReader`](super::ContainerReader).
///
/// Records can only be decoded while the block is alive; the reader cannot
/// advance until it is dropped.
pub struct Block<'r> {
    record_count: usize,
    to_read: usize,
    compressed: &'r [u8],
    data: &'r [u8],
    schema: &'r Schema,
    names: &'r Names,
}

impl<'r> Block<'r> {
    pub(super) fn new(
        record_count: usize,
        to_read: usize,
        compressed: &'r [u8],
        data: &'r [u8],
        schema: &'r Schema,
        names: &'r Names,
    ) -> Self {
        Self {
            record_count,
            to_read,
            compressed,
            data,
            schema,
            names,
        }
    }

    /// Number of records the block declares.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Payload as stored in the file.
    pub fn compressed(&self) -> &'r [u8] {
        self.compressed
    }

    /// Payload after decompression.
    pub fn data(&self) -> &'r [u8] {
        self.data
    }

    /// Decodes the records of this block, up to the reader's record limit.
    pub fn records(&self) -> BlockRecords<'r> {
        BlockRecords {
            cursor: self.data,
            remaining: self.to_read,
            complete: self.to_read == self.record_count,
            schema: self.schema,
            names: self.names,
        }
    }
}

/// Iterator over the records of a [`Block`].
///
/// After the last declared record the block must be fully consumed;
/// leftover bytes are reported as one final error.
pub struct BlockRecords<'r> {
    cursor: &'r [u8],
    remaining: usize,
    complete: bool,
    schema: &'r Schema,
    names: &'r Names,
}

impl BlockRecords<'_> {
    fn stop(&mut self) {
        self.remaining = 0;
        self.complete = false;
        self.cursor = &[];
    }
}

impl<'r> Iterator for BlockRecords<'r> {
    type Item = AvroResult<Value<'r>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            if self.complete && !self.cursor.is_empty() {
                let left = self.cursor.len();
                warn!("{left} bytes left over after the last record of the block");
                self.stop();
                return Some(Err(Details::BlockTrailingBytes(left).into()));
            }
            return None;
        }

        let before = self.cursor.len();
        match decode(self.schema, self.names, &mut self.cursor) {
            Ok(_) if before != 0 && before == self.cursor.len() => {
                // nothing consumed: stop instead of yielding the same record forever
                self.stop();
                Some(Err(Details::ReadBlock.into()))
            }
            Ok(value) => {
                self.remaining -= 1;
                Some(Ok(value))
            }
            Err(e) => {
                self.stop();
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining + usize::from(self.complete)))
    }
}
