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

//! Logic handling reading from Avro Object Container Files.

mod block;
mod header;

pub use block::{Block, BlockRecords};
pub use header::{Header, MAGIC};

use crate::{
    AvroResult, Codec,
    codec::{BlockBuffer, DEFAULT_CHUNK_SIZE},
    error::Details,
    schema::Schema,
    types::Value,
};
use bon::bon;
use log::debug;
use memmap2::Mmap;
use std::{
    collections::HashMap,
    fs::File,
    path::{Path, PathBuf},
};

/// Where a [`ContainerReader`] is in its life cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    /// The header was parsed, no block was read yet.
    HeaderRead,
    /// At least one block was read and more may follow.
    Streaming,
    /// End of data, or the record limit was reached.
    Exhausted,
    /// A framing or decoding error stopped the stream.
    Failed,
}

/// Reads the records of one memory-mapped container file.
///
/// Decoded values borrow from the reader, so a block has to be dropped
/// before the next one can be read.
pub struct ContainerReader {
    path: PathBuf,
    mmap: Mmap,
    header: Header,
    position: usize,
    buffer: BlockBuffer,
    max_records: Option<usize>,
    records_read: usize,
    state: ReaderState,
}

#[bon]
impl ContainerReader {
    /// Opens `path` with the default options.
    ///
    /// **NOTE** The header is read and validated before this returns.
    pub fn open<P: AsRef<Path>>(path: P) -> AvroResult<ContainerReader> {
        ContainerReader::builder(path).build()
    }

    /// Opens `path`, stopping after `max_records` records if given and
    /// inflating blocks in steps of `chunk_size` bytes.
    #[builder(finish_fn = build)]
    pub fn builder<P: AsRef<Path>>(
        #[builder(start_fn)] path: P,
        max_records: Option<usize>,
        #[builder(default = DEFAULT_CHUNK_SIZE)] chunk_size: usize,
    ) -> AvroResult<ContainerReader> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Details::OpenFile {
            path: path.clone(),
            source,
        })?;
        // SAFETY: the mapping is read-only and private to this reader. Slices
        // into it never outlive the reader.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|source| Details::MapFile {
            path: path.clone(),
            source,
        })?;

        let mut cursor: &[u8] = &mmap;
        let header = Header::read(&mut cursor)?;
        let position = mmap.len() - cursor.len();
        debug!(
            "Opened {}: {} bytes, blocks start at {position}",
            path.display(),
            mmap.len()
        );

        Ok(ContainerReader {
            path,
            mmap,
            header,
            position,
            buffer: BlockBuffer::with_chunk_size(chunk_size),
            max_records,
            records_read: 0,
            state: ReaderState::HeaderRead,
        })
    }
}

impl ContainerReader {
    /// Reads, checks and decompresses the next block.
    ///
    /// Returns `Ok(None)` once the reader is exhausted or has failed.
    pub fn next_block(&mut self) -> AvroResult<Option<Block<'_>>> {
        if matches!(self.state, ReaderState::Exhausted | ReaderState::Failed) {
            return Ok(None);
        }
        let budget = match self.max_records {
            Some(max) if self.records_read >= max => {
                self.state = ReaderState::Exhausted;
                return Ok(None);
            }
            Some(max) => max - self.records_read,
            None => usize::MAX,
        };

        let mut cursor = &self.mmap[self.position..];
        let frame = match block::read_frame(&mut cursor, self.header.sync_marker()) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Reached the end of {}", self.path.display());
                self.state = ReaderState::Exhausted;
                return Ok(None);
            }
            Err(e) => {
                self.state = ReaderState::Failed;
                return Err(e);
            }
        };
        self.position = self.mmap.len() - cursor.len();

        let data = match self.buffer.decompress(self.header.codec(), frame.payload) {
            Ok(data) => data,
            Err(e) => {
                self.state = ReaderState::Failed;
                return Err(e);
            }
        };
        debug!(
            "Block of {} records, {} bytes ({} stored)",
            frame.record_count,
            data.len(),
            frame.payload.len()
        );

        let to_read = frame.record_count.min(budget);
        self.records_read += to_read;
        self.state = if to_read < frame.record_count || Some(self.records_read) == self.max_records
        {
            ReaderState::Exhausted
        } else {
            ReaderState::Streaming
        };

        Ok(Some(Block::new(
            frame.record_count,
            to_read,
            frame.payload,
            data,
            self.header.schema(),
            self.header.names(),
        )))
    }

    /// Feeds every remaining record to `sink` and returns how many it accepted.
    ///
    /// The first error, from decoding or from `sink`, stops the stream and
    /// leaves the reader [`Failed`](ReaderState::Failed).
    pub fn for_each<F>(&mut self, mut sink: F) -> AvroResult<usize>
    where
        F: FnMut(Value<'_>) -> AvroResult<()>,
    {
        let mut yielded = 0;
        let result = loop {
            let block = match self.next_block() {
                Ok(Some(block)) => block,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            let delivered = block.records().try_for_each(|record| -> AvroResult<()> {
                sink(record?)?;
                yielded += 1;
                Ok(())
            });
            if let Err(e) = delivered {
                break Err(e);
            }
        };

        match result {
            Ok(()) => Ok(yielded),
            Err(e) => {
                self.state = ReaderState::Failed;
                Err(e)
            }
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The writer schema embedded in the file.
    #[inline]
    pub fn schema(&self) -> &Schema {
        self.header.schema()
    }

    #[inline]
    pub fn codec(&self) -> Codec {
        self.header.codec()
    }

    /// Get a reference to the user metadata
    #[inline]
    pub fn user_metadata(&self) -> &HashMap<String, Vec<u8>> {
        self.header.user_metadata()
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Records handed out by [`next_block`](Self::next_block) so far,
    /// counted against the record limit.
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the mapping and the block buffer.
    pub fn close(self) {
        debug!("Closing {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_helper::TestResult,
        util::{zig_bytes, zig_i64},
    };
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SYNC: [u8; 16] = *b"syncsyncsyncsync";

    fn container(schema: &str, blocks: &[&[i64]]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        zig_i64(1, &mut out);
        zig_bytes(b"avro.schema", &mut out);
        zig_bytes(schema.as_bytes(), &mut out);
        out.push(0);
        out.extend_from_slice(&SYNC);
        for block in blocks {
            let mut payload = Vec::new();
            for n in *block {
                zig_i64(*n, &mut payload);
            }
            zig_i64(block.len() as i64, &mut out);
            zig_bytes(&payload, &mut out);
            out.extend_from_slice(&SYNC);
        }
        out
    }

    fn write_temp(bytes: &[u8]) -> anyhow::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(file)
    }

    fn collect(reader: &mut ContainerReader) -> AvroResult<Vec<Value<'static>>> {
        let mut values = Vec::new();
        reader.for_each(|value| {
            values.push(value.into_owned());
            Ok(())
        })?;
        Ok(values)
    }

    #[test]
    fn test_reads_all_blocks() -> TestResult {
        let file = write_temp(&container(r#""long""#, &[&[1, 2], &[3]]))?;
        let mut reader = ContainerReader::open(file.path())?;
        assert_eq!(reader.state(), ReaderState::HeaderRead);
        assert_eq!(reader.codec(), Codec::Null);

        let values = collect(&mut reader)?;
        assert_eq!(values, vec![Value::Long(1), Value::Long(2), Value::Long(3)]);
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert_eq!(reader.records_read(), 3);
        Ok(())
    }

    #[test]
    fn test_max_records_spans_blocks() -> TestResult {
        let file = write_temp(&container(r#""long""#, &[&[1, 2, 3], &[4, 5]]))?;
        let mut reader = ContainerReader::builder(file.path())
            .max_records(4)
            .build()?;
        let values = collect(&mut reader)?;
        assert_eq!(values.len(), 4);
        assert_eq!(values[3], Value::Long(4));
        assert_eq!(reader.state(), ReaderState::Exhausted);
        Ok(())
    }

    #[test]
    fn test_block_iteration() -> TestResult {
        let file = write_temp(&container(r#""long""#, &[&[7, 8], &[9]]))?;
        let mut reader = ContainerReader::builder(file.path())
            .chunk_size(16)
            .build()?;

        let block = reader.next_block()?.expect("first block");
        assert_eq!(block.record_count(), 2);
        assert_eq!(block.data(), block.compressed());
        assert_eq!(block.records().count(), 2);
        assert_eq!(reader.state(), ReaderState::Streaming);

        let block = reader.next_block()?.expect("second block");
        assert_eq!(block.record_count(), 1);
        assert!(reader.next_block()?.is_none());
        assert_eq!(reader.state(), ReaderState::Exhausted);
        Ok(())
    }

    #[test]
    fn test_sync_mismatch_fails_the_reader() -> TestResult {
        let mut bytes = container(r#""long""#, &[&[1], &[2]]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let file = write_temp(&bytes)?;
        let mut reader = ContainerReader::open(file.path())?;

        let mut seen = 0;
        let err = reader
            .for_each(|_| {
                seen += 1;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err.details(), Details::GetBlockMarker));
        assert_eq!(seen, 1);
        assert_eq!(reader.state(), ReaderState::Failed);
        assert_eq!(reader.for_each(|_| Ok(()))?, 0);
        Ok(())
    }

    #[test]
    fn test_sink_error_stops_the_stream() -> TestResult {
        let file = write_temp(&container(r#""long""#, &[&[1, 2, 3]]))?;
        let mut reader = ContainerReader::open(file.path())?;
        let err = reader
            .for_each(|_| Err(Details::DispatchClosed.into()))
            .unwrap_err();
        assert!(matches!(err.details(), Details::DispatchClosed));
        assert_eq!(reader.state(), ReaderState::Failed);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = ContainerReader::open("/definitely/not/here.avro")
            .err()
            .expect("an error");
        assert!(matches!(err.details(), Details::OpenFile { .. }));
    }

    #[test]
    fn test_empty_file_has_no_magic() -> TestResult {
        let file = write_temp(&[])?;
        let err = ContainerReader::open(file.path()).err().expect("an error");
        assert!(matches!(err.details(), Details::HeaderMagic));
        Ok(())
    }
}
