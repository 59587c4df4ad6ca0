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

//! Block compression codecs and the buffer blocks are inflated into.

use crate::{AvroResult, error::Details, util};
use log::trace;
use miniz_oxide::{
    DataFormat, MZError, MZFlush, MZStatus, StreamResult,
    inflate::stream::{InflateState, inflate},
};
use std::io;
use strum_macros::{EnumString, IntoStaticStr};

/// Default size of one growth step of a [`BlockBuffer`].
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// The compression codec used to compress blocks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab_case")]
pub enum Codec {
    /// The `Null` codec simply passes through data uncompressed.
    #[default]
    #[strum(to_string = "null", serialize = "none")]
    Null,
    /// The `Deflate` codec writes the data block using the deflate algorithm
    /// as specified in RFC 1951, and typically implemented using the zlib library.
    /// Note that this format (unlike the "zlib format" in RFC 1950) does not have a checksum.
    Deflate,
}

/// Owned output area for decompressed blocks.
///
/// The allocation is kept between blocks and only ever grows: it starts at
/// one chunk and doubles whenever less than half a chunk of headroom is left
/// while inflating.
#[derive(Debug)]
pub struct BlockBuffer {
    data: Vec<u8>,
    filled: usize,
    chunk_size: usize,
}

impl Default for BlockBuffer {
    fn default() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }
}

impl BlockBuffer {
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            data: Vec::new(),
            filled: 0,
            chunk_size: chunk_size.max(2),
        }
    }

    /// Bytes currently allocated for decompressed output.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the uncompressed form of `input`.
    ///
    /// For [`Codec::Null`] this is `input` itself.
    pub fn decompress<'a>(&'a mut self, codec: Codec, input: &'a [u8]) -> AvroResult<&'a [u8]> {
        match codec {
            Codec::Null => Ok(input),
            Codec::Deflate => {
                self.inflate_raw(input)?;
                Ok(&self.data[..self.filled])
            }
        }
    }

    fn inflate_raw(&mut self, mut input: &[u8]) -> AvroResult<()> {
        let mut state = InflateState::new_boxed(DataFormat::Raw);
        self.filled = 0;

        loop {
            self.reserve_headroom()?;
            let StreamResult {
                bytes_consumed,
                bytes_written,
                status,
            } = inflate(
                &mut state,
                input,
                &mut self.data[self.filled..],
                MZFlush::None,
            );
            input = &input[bytes_consumed..];
            self.filled += bytes_written;

            match status {
                Ok(MZStatus::StreamEnd) => break,
                Ok(MZStatus::Ok) if bytes_consumed > 0 || bytes_written > 0 => {}
                Ok(MZStatus::Ok) | Err(MZError::Buf) => {
                    return Err(Details::DeflateDecompress(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "deflate stream ended before its final block",
                    ))
                    .into());
                }
                Ok(MZStatus::NeedDict) => {
                    return Err(Details::DeflateDecompress(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "deflate stream requires a preset dictionary",
                    ))
                    .into());
                }
                Err(e) => {
                    return Err(Details::DeflateDecompress(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{e:?}"),
                    ))
                    .into());
                }
            }
        }

        trace!(
            "Inflated {} bytes into a buffer of {}",
            self.filled,
            self.data.len()
        );
        Ok(())
    }

    fn reserve_headroom(&mut self) -> AvroResult<()> {
        if self.data.len() - self.filled >= self.chunk_size / 2 {
            return Ok(());
        }
        let grown = if self.data.is_empty() {
            self.chunk_size
        } else {
            self.data.len().saturating_mul(2)
        };
        let grown = util::safe_len(grown)?;
        self.data.resize(grown, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::TestResult;
    use miniz_oxide::deflate::compress_to_vec;
    use pretty_assertions::{assert_eq, assert_ne};
    use std::str::FromStr;

    const INPUT: &[u8] = b"theanswertolifetheuniverseandeverythingis42theanswertolifetheuniverseandeverythingis4theanswertolifetheuniverseandeverythingis2";

    fn payload() -> Vec<u8> {
        INPUT.iter().cycle().take(10_000).copied().collect()
    }

    #[test]
    fn null_passes_input_through() -> TestResult {
        let mut buffer = BlockBuffer::default();
        let out = buffer.decompress(Codec::Null, INPUT)?;
        assert_eq!(out.as_ptr(), INPUT.as_ptr());
        assert_eq!(buffer.capacity(), 0);
        Ok(())
    }

    #[test]
    fn deflate_decompress() -> TestResult {
        let original = payload();
        let compressed = compress_to_vec(&original, 6);
        assert_ne!(compressed, original);

        let mut buffer = BlockBuffer::default();
        assert_eq!(buffer.decompress(Codec::Deflate, &compressed)?, original);
        assert_eq!(buffer.capacity(), DEFAULT_CHUNK_SIZE);
        Ok(())
    }

    #[test]
    fn growth_does_not_change_output() -> TestResult {
        let original = payload();
        let compressed = compress_to_vec(&original, 6);

        let mut small = BlockBuffer::with_chunk_size(64);
        let mut large = BlockBuffer::with_chunk_size(1 << 20);
        let from_small = small.decompress(Codec::Deflate, &compressed)?.to_vec();
        let from_large = large.decompress(Codec::Deflate, &compressed)?.to_vec();

        assert_eq!(from_small, original);
        assert_eq!(from_small, from_large);
        assert!(small.capacity() >= original.len());
        assert!(small.capacity().is_power_of_two());
        Ok(())
    }

    #[test]
    fn buffer_is_reused_across_blocks() -> TestResult {
        let mut buffer = BlockBuffer::with_chunk_size(256);
        let first = compress_to_vec(&payload(), 6);
        let second = compress_to_vec(b"short", 6);

        buffer.decompress(Codec::Deflate, &first)?;
        let capacity = buffer.capacity();
        assert_eq!(buffer.decompress(Codec::Deflate, &second)?, b"short");
        assert_eq!(buffer.capacity(), capacity);
        Ok(())
    }

    #[test]
    fn truncated_deflate_stream() {
        let compressed = compress_to_vec(&payload(), 6);
        let short = &compressed[..compressed.len() / 2];

        let err = BlockBuffer::default()
            .decompress(Codec::Deflate, short)
            .unwrap_err();
        assert!(matches!(err.details(), Details::DeflateDecompress(_)));
    }

    #[test]
    fn corrupt_deflate_stream() {
        // BTYPE 11 is reserved
        let err = BlockBuffer::default()
            .decompress(Codec::Deflate, &[0xFF, 0xFF, 0xFF])
            .unwrap_err();
        assert!(matches!(err.details(), Details::DeflateDecompress(_)));
    }

    #[test]
    fn codec_to_str() {
        assert_eq!(<&str>::from(Codec::Null), "null");
        assert_eq!(<&str>::from(Codec::Deflate), "deflate");
    }

    #[test]
    fn codec_from_str() {
        assert_eq!(Codec::from_str("null").unwrap(), Codec::Null);
        assert_eq!(Codec::from_str("none").unwrap(), Codec::Null);
        assert_eq!(Codec::from_str("deflate").unwrap(), Codec::Deflate);
        assert!(Codec::from_str("snappy").is_err());
        assert!(Codec::from_str("not a codec").is_err());
    }
}
