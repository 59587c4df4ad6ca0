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

//! **avro-peek** reads [Apache Avro](https://avro.apache.org/) Object Container Files and
//! hands every record to a handler: a pretty printer, a JSON dump, a field selector or a script.
//!
//! Files are memory mapped. Each block is decompressed into a buffer owned by the
//! [`ContainerReader`] and records are decoded into the generic [`Value`](types::Value) type,
//! which borrows strings and bytes from that buffer instead of copying them.
//!
//! ```no_run
//! use avro_peek::{ContainerReader, path::{FieldPath, resolve}};
//!
//! # fn main() -> Result<(), avro_peek::Error> {
//! let name = FieldPath::parse("name");
//! let mut reader = ContainerReader::builder("people.avro").max_records(10).build()?;
//! reader.for_each(|person| {
//!     if let Ok(value) = resolve(&person, &name) {
//!         println!("{}", avro_peek::printer::render(value, 0));
//!     }
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `lua`: enable the `script_inline` and `script_file` handlers, backed by LuaJIT
//!
//! # MSRV
//!
//! The current MSRV is 1.88.0.

mod codec;

pub mod decode;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod path;
pub mod printer;
pub mod reader;
pub mod schema;
pub mod types;
pub mod util;

pub use codec::{BlockBuffer, Codec, DEFAULT_CHUNK_SIZE};
pub use dispatch::{
    DispatchConfig, Dispatcher, Handler, HandlerKind, OutputSink, process_file,
};
pub use error::{Error, PathError};
pub use reader::{ContainerReader, ReaderState};
pub use schema::Schema;

/// A convenience type alias for `Result`s with `Error`s.
pub type AvroResult<T> = Result<T, Error>;

#[cfg(test)]
pub(crate) mod test_helper {
    pub type TestResult = anyhow::Result<()>;
}
