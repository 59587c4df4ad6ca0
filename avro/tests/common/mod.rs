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

//! Hand-encoded container files for the integration tests.

#![allow(dead_code)]

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};
use tempfile::NamedTempFile;

pub type TestResult = anyhow::Result<()>;

pub const PERSON_SCHEMA: &str = r#"
{
    "type": "record",
    "name": "Person",
    "fields": [
        {"name": "name", "type": "string"},
        {"name": "age", "type": "int"}
    ]
}
"#;

pub const SYNC: [u8; 16] = [
    0x4f, 0x62, 0x6a, 0x01, 0xde, 0xad, 0xbe, 0xef, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77,
];

pub fn zig_i64(n: i64, out: &mut Vec<u8>) {
    let mut z = ((n << 1) ^ (n >> 63)) as u64;
    while z & !0x7F != 0 {
        out.push((z & 0x7F) as u8 | 0x80);
        z >>= 7;
    }
    out.push(z as u8);
}

pub fn zig_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    zig_i64(bytes.len() as i64, out);
    out.extend_from_slice(bytes);
}

pub fn person(name: &str, age: i64) -> Vec<u8> {
    let mut out = Vec::new();
    zig_bytes(name.as_bytes(), &mut out);
    zig_i64(age, &mut out);
    out
}

/// Builds a container file block by block.
pub struct ContainerBuilder {
    schema: String,
    codec: Option<String>,
    metadata: Vec<(String, Vec<u8>)>,
    blocks: Vec<(i64, Vec<u8>)>,
}

impl ContainerBuilder {
    pub fn new(schema: &str) -> Self {
        Self {
            schema: schema.to_string(),
            codec: None,
            metadata: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn codec(mut self, codec: &str) -> Self {
        self.codec = Some(codec.to_string());
        self
    }

    pub fn metadata(mut self, key: &str, value: &[u8]) -> Self {
        self.metadata.push((key.to_string(), value.to_vec()));
        self
    }

    /// Adds a block of `count` records whose encodings are concatenated in `payload`.
    pub fn block(mut self, count: i64, payload: Vec<u8>) -> Self {
        self.blocks.push((count, payload));
        self
    }

    /// Adds one block holding `records`.
    pub fn records(self, records: &[Vec<u8>]) -> Self {
        let count = records.len() as i64;
        self.block(count, records.concat())
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut out = b"Obj\x01".to_vec();

        let mut entries = vec![("avro.schema".to_string(), self.schema.as_bytes().to_vec())];
        if let Some(codec) = &self.codec {
            entries.push(("avro.codec".to_string(), codec.as_bytes().to_vec()));
        }
        entries.extend(self.metadata.iter().cloned());
        zig_i64(entries.len() as i64, &mut out);
        for (key, value) in &entries {
            zig_bytes(key.as_bytes(), &mut out);
            zig_bytes(value, &mut out);
        }
        out.push(0);
        out.extend_from_slice(&SYNC);

        for (count, payload) in &self.blocks {
            let stored = match self.codec.as_deref() {
                Some("deflate") => miniz_oxide::deflate::compress_to_vec(payload, 6),
                _ => payload.clone(),
            };
            zig_i64(*count, &mut out);
            zig_bytes(&stored, &mut out);
            out.extend_from_slice(&SYNC);
        }
        out
    }

    pub fn write(&self) -> anyhow::Result<NamedTempFile> {
        write_file(&self.bytes())
    }
}

pub fn write_file(bytes: &[u8]) -> anyhow::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// A clonable in-memory writer for [`avro_peek::OutputSink`].
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
