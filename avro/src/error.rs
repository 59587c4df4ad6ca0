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

use crate::schema::Name;
use std::{error::Error as _, fmt, path::PathBuf};

/// Errors encountered while reading a container file or dispatching its records.
///
/// To inspect the details of the error use [`details`](Self::details) or [`into_details`](Self::into_details)
/// to get a [`Details`] which contains more precise error information.
///
/// See [`Details`] for all possible errors.
#[derive(thiserror::Error, Debug)]
#[repr(transparent)]
#[error(transparent)]
pub struct Error {
    details: Box<Details>,
}

impl Error {
    pub fn new(details: Details) -> Self {
        Self {
            details: Box::new(details),
        }
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn into_details(self) -> Details {
        *self.details
    }
}

impl From<Details> for Error {
    fn from(details: Details) -> Self {
        Self::new(details)
    }
}

#[derive(thiserror::Error)]
pub enum Details {
    #[error("Failed to open {}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to memory-map {}", path.display())]
    MapFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("wrong magic in header")]
    HeaderMagic,

    #[error("no `avro.schema` entry in header metadata")]
    GetHeaderMetadata,

    #[error("Duplicate header metadata key: {0}")]
    DuplicateMetadataKey(String),

    #[error("Invalid utf-8 string")]
    ConvertToUtf8(#[source] std::string::FromUtf8Error),

    #[error("Codec '{0}' is not supported")]
    CodecNotSupported(String),

    #[error("Failed to decompress with flate: {0}")]
    DeflateDecompress(#[source] std::io::Error),

    #[error("Unable to allocate {desired} bytes (maximum allowed: {maximum})")]
    MemoryAllocation { desired: usize, maximum: usize },

    #[error("Overflow when decoding integer value")]
    IntegerOverflow,

    #[error("Decoded integer out of range for i32: {1}: {0}")]
    ZagI32(#[source] std::num::TryFromIntError, i64),

    #[error("Cannot convert i64 to usize: {1}")]
    ConvertI64ToUsize(#[source] std::num::TryFromIntError, i64),

    #[error("Cannot convert u64 to usize: {1}")]
    ConvertU64ToUsize(#[source] std::num::TryFromIntError, u64),

    #[error("Unexpected end of data: needed {needed} bytes but only {available} remain")]
    Truncated { needed: usize, available: usize },

    #[error("Invalid u8 for bool: {0}")]
    BoolValue(u8),

    #[error("Union index {index} out of bounds: {num_variants}")]
    GetUnionVariant { index: i64, num_variants: usize },

    #[error("Enum symbol index {index} out of bounds: {num_variants}")]
    EnumSymbolIndex { index: i64, num_variants: usize },

    #[error("Unresolved schema reference: {0}")]
    SchemaResolutionError(Name),

    #[error("block marker does not match header marker")]
    GetBlockMarker,

    #[error("unable to read block")]
    ReadBlock,

    #[error("{0} bytes left over after the last record of a block")]
    BlockTrailingBytes(usize),

    #[error("Failed to parse schema from JSON")]
    ParseSchemaJson(#[source] serde_json::Error),

    #[error("Must be a JSON string, object or array")]
    ParseSchemaFromValidJson,

    #[error("Unknown primitive type: {0}")]
    ParsePrimitive(String),

    #[error("Unknown complex type: {0}")]
    GetComplexType(serde_json::Value),

    #[error("No `type` in complex type")]
    GetComplexTypeField,

    #[error("No `name` field")]
    GetNameField,

    #[error("No `name` in record field")]
    GetNameFieldFromRecord,

    #[error("Invalid schema name {0}")]
    InvalidSchemaName(String),

    #[error("No `fields` in record")]
    GetRecordFieldsJson,

    #[error("Duplicate field name {0}")]
    FieldNameDuplicate(String),

    #[error("No `symbols` field in enum")]
    GetEnumSymbolsField,

    #[error("Unable to parse `symbols` in enum")]
    GetEnumSymbols,

    #[error("Duplicate enum symbol {0}")]
    EnumSymbolDuplicate(String),

    #[error("No `items` in array")]
    GetArrayItemsField,

    #[error("No `values` in map")]
    GetMapValuesField,

    #[error("Fixed schema `size` value must be a positive integer: {0}")]
    GetFixedSizeFieldPositive(serde_json::Value),

    #[error("Fixed schema has no `size`")]
    GetFixedSizeField,

    #[error("Unions may not directly contain a union")]
    GetNestedUnion,

    #[error("Unions cannot contain duplicate types")]
    GetUnionDuplicate,

    #[error("Two named schema defined for same fullname: {0}.")]
    AmbiguousSchemaDefinition(Name),

    #[error("Handler `{0}` requires a parameter")]
    MissingHandlerParam(&'static str),

    #[error("Unknown handler `{0}`")]
    UnknownHandler(String),

    #[error("Invalid input pattern `{pattern}`")]
    InputPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Failed to read script {}", path.display())]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Script error: {0}")]
    Script(String),

    #[error("Scripting handlers are not available in this build (enable the `lua` feature)")]
    ScriptingUnavailable,

    #[error("Failed to serialize value to JSON")]
    SerializeValueToJson(#[source] serde_json::Error),

    #[error("Failed to write output")]
    WriteOutput(#[source] std::io::Error),

    #[error("Failed to spawn worker thread")]
    SpawnWorker(#[source] std::io::Error),

    #[error("A worker thread panicked")]
    WorkerPanicked,

    #[error("All workers stopped before the stream was drained")]
    DispatchClosed,
}

impl fmt::Debug for Details {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut msg = self.to_string();
        if let Some(e) = self.source() {
            msg.extend([": ", &e.to_string()]);
        }
        write!(f, "{msg}")
    }
}

/// Failure to resolve a [`FieldPath`](crate::path::FieldPath) against a value.
///
/// These never abort a stream: each one renders as an inline marker in place
/// of the value it stands for.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("field `{0}` not found")]
    FieldNotFound(String),

    #[error("index {index} out of range for a container of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("union resolved to null before the path was exhausted")]
    NullBranch,
}

impl PathError {
    /// The inline marker printed in place of an unresolvable field.
    pub fn marker(&self) -> &'static str {
        match self {
            PathError::FieldNotFound(_) => "<field not found>",
            PathError::IndexOutOfRange { .. } => "<invalid array index>",
            PathError::NullBranch => "<null branch>",
        }
    }
}
