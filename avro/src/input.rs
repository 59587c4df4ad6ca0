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

//! Expansion of the `--input` argument into file paths.

use crate::{AvroResult, error::Details};
use log::warn;
use std::path::PathBuf;

/// Expands `pattern` into the sorted list of matching paths.
///
/// A pattern that matches nothing is returned as the only path, so that
/// opening it reports why it cannot be read.
pub fn expand_input(pattern: &str) -> AvroResult<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|source| Details::InputPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!("Skipping unreadable path: {e}"),
        }
    }

    if paths.is_empty() {
        return Ok(vec![PathBuf::from(pattern)]);
    }
    paths.sort();
    Ok(paths)
}
