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
    AvroResult, Codec,
    decode::decode,
    error::Details,
    schema::{Names, Schema, resolve_names},
    types::Value,
    util,
};
use log::{debug, warn};
use std::{collections::HashMap, str::FromStr};

/// The four bytes every container file starts with.
pub const MAGIC: [u8; 4] = [b'O', b'b', b'j', 1u8];

const SCHEMA_KEY: &str = "avro.schema";
const CODEC_KEY: &str = "avro.codec";
/// Written by some writers next to `avro.codec`; only relevant when compressing.
const COMPRESSION_LEVEL_KEY: &str = "avro.codec.compression_level";

/// The parsed header of a container file.
#[derive(Debug, Clone)]
pub struct Header {
    schema: Schema,
    names: Names,
    codec: Codec,
    sync: [u8; 16],
    metadata: HashMap<String, Vec<u8>>,
}

impl Header {
    /// Reads the magic, the metadata map and the sync marker from the front
    /// of `cursor`.
    pub(crate) fn read(cursor: &mut &[u8]) -> AvroResult<Self> {
        let magic = util::read_array::<4>(cursor).map_err(|_| Details::HeaderMagic)?;
        if magic != MAGIC {
            return Err(Details::HeaderMagic.into());
        }

        let meta_schema = Schema::map(Schema::Bytes);
        let meta_names = Names::new();
        let data: &[u8] = *cursor;
        let mut rest: &[u8] = data;
        let Value::Map(entries) = decode(&meta_schema, &meta_names, &mut rest)? else {
            return Err(Details::GetHeaderMetadata.into());
        };

        let mut schema_json = None;
        let mut codec_name = None;
        let mut metadata = HashMap::new();
        for (key, value) in entries {
            let Value::Bytes(bytes) = value else {
                return Err(Details::GetHeaderMetadata.into());
            };
            let slot = match &*key {
                SCHEMA_KEY => &mut schema_json,
                CODEC_KEY => &mut codec_name,
                COMPRESSION_LEVEL_KEY => continue,
                reserved if reserved.starts_with("avro.") => {
                    warn!("Ignoring unknown metadata key: {reserved}");
                    continue;
                }
                _ => {
                    if metadata
                        .insert(key.clone().into_owned(), bytes.into_owned())
                        .is_some()
                    {
                        return Err(Details::DuplicateMetadataKey(key.into_owned()).into());
                    }
                    continue;
                }
            };
            if slot.replace(bytes).is_some() {
                return Err(Details::DuplicateMetadataKey(key.into_owned()).into());
            }
        }

        let schema_json = schema_json.ok_or(Details::GetHeaderMetadata)?;
        let schema = Schema::parse_slice(&schema_json)?;
        let mut names = Names::new();
        resolve_names(&schema, &mut names)?;

        let codec = match codec_name {
            Some(bytes) => {
                let name =
                    String::from_utf8(bytes.into_owned()).map_err(Details::ConvertToUtf8)?;
                Codec::from_str(&name).map_err(|_| Details::CodecNotSupported(name))?
            }
            None => Codec::Null,
        };

        let sync = util::read_array::<16>(&mut rest)?;
        *cursor = &data[data.len() - rest.len()..];
        debug!(
            "Read container header: codec {}, {} user metadata entries",
            <&str>::from(codec),
            metadata.len()
        );

        Ok(Header {
            schema,
            names,
            codec,
            sync,
            metadata,
        })
    }

    /// The writer schema embedded in the file.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Named types defined by [`schema`](Self::schema), by full name.
    pub fn names(&self) -> &Names {
        &self.names
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn sync_marker(&self) -> &[u8; 16] {
        &self.sync
    }

    /// Metadata entries whose key does not start with `avro.`.
    pub fn user_metadata(&self) -> &HashMap<String, Vec<u8>> {
        &self.metadata
    }
}
