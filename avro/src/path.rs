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

//! Dotted field paths such as `address.lines.0` and their evaluation
//! against decoded values.
//!
//! A path is split on any of its delimiters (`.` and `:` by default). A
//! segment made only of ASCII digits selects a child by position, anything
//! else selects a record field or map entry by name. A backslash makes the
//! next character part of the name, so `a\.b` is the single field `a.b` and
//! `\1` is the field called `1`.
//!
//! ```
//! use avro_peek::{path::{FieldPath, resolve}, types::Value};
//!
//! let value = Value::Record(vec![("tags".into(), vec![Value::from("x"), Value::from("y")].into())]);
//! let path = FieldPath::parse("tags.1");
//! assert_eq!(resolve(&value, &path), Ok(&Value::from("y")));
//! ```

use crate::{error::PathError, types::Value};
use std::{convert::Infallible, fmt, str::FromStr};

/// Delimiters accepted by [`FieldPath::parse`].
pub const DEFAULT_DELIMITERS: &[char] = &['.', ':'];

const ESCAPE: char = '\\';

/// One step of a [`FieldPath`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Record field name or map key.
    Name(String),
    /// Position in an array, record or map.
    Index(usize),
}

/// A parsed field path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
    text: String,
}

impl FieldPath {
    pub fn parse(text: &str) -> Self {
        Self::parse_with(text, DEFAULT_DELIMITERS)
    }

    /// Parses `text` splitting on any character in `delimiters`.
    ///
    /// A leading delimiter is skipped and a trailing one is ignored. Empty
    /// segments in between are kept as empty names, which never match.
    pub fn parse_with(text: &str, delimiters: &[char]) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut escaped = false;
        let mut chars = text.chars().peekable();

        if chars.peek().is_some_and(|c| delimiters.contains(c)) {
            chars.next();
        }

        while let Some(c) = chars.next() {
            if c == ESCAPE {
                if let Some(next) = chars.next() {
                    current.push(next);
                } else {
                    current.push(ESCAPE);
                }
                escaped = true;
            } else if delimiters.contains(&c) {
                segments.push(Self::segment(std::mem::take(&mut current), escaped));
                escaped = false;
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() || escaped {
            segments.push(Self::segment(current, escaped));
        }

        FieldPath {
            segments,
            text: text.to_string(),
        }
    }

    fn segment(text: String, escaped: bool) -> Segment {
        if escaped || text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Segment::Name(text);
        }
        // too large for any container
        Segment::Index(text.parse().unwrap_or(usize::MAX))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The text this path was parsed from.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for FieldPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Walks `path` down from `value`.
///
/// Unions are looked through at every step and in the result. Stepping into
/// a union whose branch is `null` while segments remain is a
/// [`PathError::NullBranch`].
pub fn resolve<'v, 'a>(value: &'v Value<'a>, path: &FieldPath) -> Result<&'v Value<'a>, PathError> {
    let mut current = value;
    for segment in path.segments() {
        if let Value::Union(..) = current {
            current = current.unwrap_union();
            if *current == Value::Null {
                return Err(PathError::NullBranch);
            }
        }
        current = match segment {
            Segment::Index(index) => current.child_at(*index).ok_or_else(|| {
                PathError::IndexOutOfRange {
                    index: *index,
                    size: current.child_count(),
                }
            })?,
            Segment::Name(name) => current
                .child_named(name)
                .ok_or_else(|| PathError::FieldNotFound(name.clone()))?,
        };
    }
    Ok(current.unwrap_union())
}
