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

//! Logic handling the intermediate representation of decoded Avro values.

use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};
use std::borrow::Cow;
use strum_macros::EnumDiscriminants;

/// Represents any valid Avro value.
///
/// Byte payloads borrow from the block they were decoded from and field
/// names and enum symbols borrow from the schema. Use
/// [`into_owned`](Self::into_owned) to detach a value from both.
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(ValueKind))]
pub enum Value<'a> {
    /// A `null` Avro value.
    Null,
    /// A `boolean` Avro value.
    Boolean(bool),
    /// A `int` Avro value.
    Int(i32),
    /// A `long` Avro value.
    Long(i64),
    /// A `float` Avro value.
    Float(f32),
    /// A `double` Avro value.
    Double(f64),
    /// A `bytes` Avro value.
    Bytes(Cow<'a, [u8]>),
    /// A `string` Avro value.
    ///
    /// The bytes are kept as written; see [`Value::as_str`].
    String(Cow<'a, [u8]>),
    /// A `fixed` Avro value.
    Fixed(Cow<'a, [u8]>),
    /// An `enum` Avro value.
    ///
    /// An Enum is represented by a symbol and its position in the symbols list
    /// of its corresponding schema.
    Enum(u32, Cow<'a, str>),
    /// An `union` Avro value.
    ///
    /// A Union is represented by the value it holds and its position in the type list
    /// of its corresponding schema
    Union(u32, Box<Value<'a>>),
    /// An `array` Avro value.
    Array(Vec<Value<'a>>),
    /// A `map` Avro value, entries in the order they were written.
    Map(Vec<(Cow<'a, str>, Value<'a>)>),
    /// A `record` Avro value, fields in schema order.
    Record(Vec<(Cow<'a, str>, Value<'a>)>),
}

impl<'a> Value<'a> {
    /// Deep copy that no longer borrows from the block or the schema.
    pub fn into_owned(self) -> Value<'static> {
        fn owned_bytes(bytes: Cow<'_, [u8]>) -> Cow<'static, [u8]> {
            Cow::Owned(bytes.into_owned())
        }
        fn owned_entries(
            entries: Vec<(Cow<'_, str>, Value<'_>)>,
        ) -> Vec<(Cow<'static, str>, Value<'static>)> {
            entries
                .into_iter()
                .map(|(key, value)| (Cow::Owned(key.into_owned()), value.into_owned()))
                .collect()
        }

        match self {
            Value::Null => Value::Null,
            Value::Boolean(b) => Value::Boolean(b),
            Value::Int(i) => Value::Int(i),
            Value::Long(i) => Value::Long(i),
            Value::Float(f) => Value::Float(f),
            Value::Double(f) => Value::Double(f),
            Value::Bytes(bytes) => Value::Bytes(owned_bytes(bytes)),
            Value::String(bytes) => Value::String(owned_bytes(bytes)),
            Value::Fixed(bytes) => Value::Fixed(owned_bytes(bytes)),
            Value::Enum(index, symbol) => Value::Enum(index, Cow::Owned(symbol.into_owned())),
            Value::Union(index, value) => Value::Union(index, Box::new(value.into_owned())),
            Value::Array(items) => Value::Array(items.into_iter().map(Value::into_owned).collect()),
            Value::Map(entries) => Value::Map(owned_entries(entries)),
            Value::Record(fields) => Value::Record(owned_entries(fields)),
        }
    }

    /// Best-effort text view of a `string` value; invalid UTF-8 is replaced.
    pub fn as_str(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::String(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }

    /// Follows union wrappers down to the resolved branch payload.
    pub fn unwrap_union(&self) -> &Value<'a> {
        let mut current = self;
        while let Value::Union(_, inner) = current {
            current = inner;
        }
        current
    }

    /// Number of children addressable by position.
    ///
    /// Zero for anything that is not an array, map or record.
    pub fn child_count(&self) -> usize {
        match self {
            Value::Array(items) => items.len(),
            Value::Map(entries) | Value::Record(entries) => entries.len(),
            _ => 0,
        }
    }

    /// Child at `index` of an array, map or record.
    pub fn child_at(&self, index: usize) -> Option<&Value<'a>> {
        match self {
            Value::Array(items) => items.get(index),
            Value::Map(entries) | Value::Record(entries) => entries.get(index).map(|(_, v)| v),
            _ => None,
        }
    }

    /// First record field or map entry called `name`.
    pub fn child_named(&self, name: &str) -> Option<&Value<'a>> {
        match self {
            Value::Map(entries) | Value::Record(entries) => entries
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(value: &'a str) -> Self {
        Self::String(Cow::Borrowed(value.as_bytes()))
    }
}

impl From<String> for Value<'_> {
    fn from(value: String) -> Self {
        Self::String(Cow::Owned(value.into_bytes()))
    }
}

impl From<bool> for Value<'_> {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for Value<'_> {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for Value<'_> {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f32> for Value<'_> {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for Value<'_> {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl<'a> From<Vec<Value<'a>>> for Value<'a> {
    fn from(value: Vec<Value<'a>>) -> Self {
        Self::Array(value)
    }
}

/// JSON rendering used by the `json` handler.
///
/// Unions are transparent and byte payloads are written as (lossy) strings.
impl Serialize for Value<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i32(*i),
            Value::Long(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f32(*f),
            Value::Double(f) => serializer.serialize_f64(*f),
            Value::Bytes(bytes) | Value::String(bytes) | Value::Fixed(bytes) => {
                serializer.serialize_str(&String::from_utf8_lossy(bytes))
            }
            Value::Enum(_, symbol) => serializer.serialize_str(symbol),
            Value::Union(_, value) => value.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) | Value::Record(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&**key, value)?;
                }
                map.end()
            }
        }
    }
}
