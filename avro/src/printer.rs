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

//! Human readable rendering of decoded values.

use crate::types::Value;
use std::fmt;

const NULL: &str = "<null>";

/// Renders `value` as an indented brace block.
///
/// Containers open with `{`, list one `key: value` line per child indented
/// one space deeper than `indent`, and close with `}` at `indent`. Array
/// children are keyed by position.
pub fn render(value: &Value<'_>, indent: usize) -> String {
    Indented::new(value, indent).to_string()
}

/// [`Display`](fmt::Display) adapter behind [`render`].
#[derive(Clone, Copy, Debug)]
pub struct Indented<'v, 'a> {
    value: &'v Value<'a>,
    indent: usize,
}

impl<'v, 'a> Indented<'v, 'a> {
    pub fn new(value: &'v Value<'a>, indent: usize) -> Self {
        Self { value, indent }
    }

    fn child(&self, value: &'v Value<'a>) -> Self {
        Self::new(value, self.indent + 1)
    }

    fn entries<K: fmt::Display>(
        &self,
        f: &mut fmt::Formatter<'_>,
        entries: impl Iterator<Item = (K, &'v Value<'a>)>,
    ) -> fmt::Result {
        writeln!(f, "{{")?;
        for (key, value) in entries {
            writeln!(
                f,
                "{:width$}{key}: {}",
                "",
                self.child(value),
                width = self.indent + 1
            )?;
        }
        write!(f, "{:width$}}}", "", width = self.indent)
    }
}

impl fmt::Display for Indented<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Null => f.write_str(NULL),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Long(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Double(x) => write!(f, "{x}"),
            Value::Bytes(bytes) | Value::String(bytes) | Value::Fixed(bytes) => {
                f.write_str(&String::from_utf8_lossy(bytes))
            }
            Value::Enum(_, symbol) => f.write_str(symbol),
            Value::Union(_, inner) => fmt::Display::fmt(&Indented::new(inner, self.indent), f),
            Value::Array(items) => self.entries(f, items.iter().enumerate()),
            Value::Map(entries) | Value::Record(entries) => {
                self.entries(f, entries.iter().map(|(key, value)| (key, value)))
            }
        }
    }
}
