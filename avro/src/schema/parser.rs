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

use crate::error::Details;
use crate::schema::{
    ArraySchema, EnumSchema, FixedSchema, MapSchema, Name, NamespaceRef, RecordField,
    RecordSchema, Schema, UnionSchema,
};
use crate::util::MapHelper;
use crate::{AvroResult, Error};
use log::{debug, error, warn};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Logical types whose underlying representation is decoded as-is.
const KNOWN_LOGICAL_TYPES: &[&str] = &[
    "decimal",
    "big-decimal",
    "uuid",
    "date",
    "time-millis",
    "time-micros",
    "timestamp-millis",
    "timestamp-micros",
    "timestamp-nanos",
    "local-timestamp-millis",
    "local-timestamp-micros",
    "local-timestamp-nanos",
    "duration",
];

#[derive(Default)]
pub(crate) struct Parser {
    /// Names whose definition is currently being parsed, i.e. when a
    /// field's type is a reference to its record's type
    resolving_schemas: HashSet<Name>,
    /// Names already defined in this document
    parsed_schemas: HashSet<Name>,
}

impl Parser {
    /// Create a `Schema` from a string representing a JSON Avro schema.
    pub(super) fn parse_str(&mut self, input: &str) -> AvroResult<Schema> {
        let value = serde_json::from_str(input).map_err(Details::ParseSchemaJson)?;
        self.parse(&value, None)
    }

    pub(super) fn parse_slice(&mut self, input: &[u8]) -> AvroResult<Schema> {
        let value = serde_json::from_slice(input).map_err(Details::ParseSchemaJson)?;
        self.parse(&value, None)
    }

    /// Create a `Schema` from a `serde_json::Value` representing a JSON Avro schema.
    pub(super) fn parse(
        &mut self,
        value: &Value,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        match *value {
            Value::String(ref t) => self.parse_known_schema(t.as_str(), enclosing_namespace),
            Value::Object(ref data) => self.parse_complex(data, enclosing_namespace),
            Value::Array(ref data) => self.parse_union(data, enclosing_namespace),
            _ => Err(Details::ParseSchemaFromValidJson.into()),
        }
    }

    /// Parse a string as a primitive type or reference to an already defined name.
    fn parse_known_schema(
        &mut self,
        name: &str,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        match name {
            "null" => Ok(Schema::Null),
            "boolean" => Ok(Schema::Boolean),
            "int" => Ok(Schema::Int),
            "long" => Ok(Schema::Long),
            "double" => Ok(Schema::Double),
            "float" => Ok(Schema::Float),
            "bytes" => Ok(Schema::Bytes),
            "string" => Ok(Schema::String),
            _ => self.fetch_schema_ref(name, enclosing_namespace),
        }
    }

    /// Given a name, returns a reference to a schema that is either fully
    /// parsed or currently being parsed.
    fn fetch_schema_ref(
        &mut self,
        name: &str,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::new_with_enclosing_namespace(name, enclosing_namespace)?;

        if self.parsed_schemas.contains(&fully_qualified_name)
            || self.resolving_schemas.contains(&fully_qualified_name)
        {
            return Ok(Schema::Ref {
                name: fully_qualified_name,
            });
        }

        // A bare name may also refer to a type in the null namespace.
        if enclosing_namespace.is_some() && !name.contains('.') {
            let global = Name::new(name)?;
            if self.parsed_schemas.contains(&global) || self.resolving_schemas.contains(&global) {
                return Ok(Schema::Ref { name: global });
            }
        }

        Err(Details::ParsePrimitive(fully_qualified_name.fullname().to_string()).into())
    }

    /// Parse a `serde_json::Value` representing a complex Avro type into a `Schema`.
    ///
    /// Avro supports "recursive" definition of types.
    /// e.g: `{"type": {"type": "string"}}`
    fn parse_complex(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        match complex.get("logicalType") {
            Some(Value::String(t)) if !KNOWN_LOGICAL_TYPES.contains(&t.as_str()) => {
                warn!("Ignoring unknown logical type '{t}'");
            }
            Some(Value::String(_)) | None => {}
            Some(other) => {
                warn!("Ignoring logicalType that is not a string: {other}");
            }
        }

        match complex.get("type") {
            Some(Value::String(t)) => match t.as_str() {
                "record" | "error" => self.parse_record(complex, enclosing_namespace),
                "enum" => self.parse_enum(complex, enclosing_namespace),
                "array" => self.parse_array(complex, enclosing_namespace),
                "map" => self.parse_map(complex, enclosing_namespace),
                "fixed" => self.parse_fixed(complex, enclosing_namespace),
                other => self.parse_known_schema(other, enclosing_namespace),
            },
            Some(Value::Object(data)) => self.parse_complex(data, enclosing_namespace),
            Some(Value::Array(variants)) => self.parse_union(variants, enclosing_namespace),
            Some(unknown) => Err(Details::GetComplexType(unknown.clone()).into()),
            None => Err(Details::GetComplexTypeField.into()),
        }
    }

    fn register_parsed_schema(&mut self, fully_qualified_name: &Name) -> AvroResult<()> {
        self.resolving_schemas.remove(fully_qualified_name);
        if !self.parsed_schemas.insert(fully_qualified_name.clone()) {
            return Err(Details::AmbiguousSchemaDefinition(fully_qualified_name.clone()).into());
        }
        Ok(())
    }

    fn parse_record(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::parse(complex, enclosing_namespace)?;
        if self.parsed_schemas.contains(&fully_qualified_name)
            || !self.resolving_schemas.insert(fully_qualified_name.clone())
        {
            return Err(Details::AmbiguousSchemaDefinition(fully_qualified_name).into());
        }

        debug!("Going to parse record schema: {:?}", &fully_qualified_name);

        let fields: Vec<RecordField> = complex
            .get("fields")
            .and_then(|fields| fields.as_array())
            .ok_or_else(|| Error::new(Details::GetRecordFieldsJson))
            .and_then(|fields| {
                fields
                    .iter()
                    .filter_map(|field| field.as_object())
                    .enumerate()
                    .map(|(position, field)| {
                        self.parse_record_field(field, position, &fully_qualified_name)
                    })
                    .collect::<Result<_, _>>()
            })?;

        let mut lookup = BTreeMap::new();
        for field in &fields {
            if let Some(_old) = lookup.insert(field.name.clone(), field.position) {
                return Err(Details::FieldNameDuplicate(field.name.clone()).into());
            }
        }

        self.register_parsed_schema(&fully_qualified_name)?;
        Ok(Schema::Record(RecordSchema {
            name: fully_qualified_name,
            fields,
            lookup,
        }))
    }

    fn parse_record_field(
        &mut self,
        field: &Map<String, Value>,
        position: usize,
        record: &Name,
    ) -> AvroResult<RecordField> {
        let name = field.name().ok_or(Details::GetNameFieldFromRecord)?;
        let ty = field.get("type").ok_or(Details::GetComplexTypeField)?;
        let schema = self.parse(ty, record.namespace())?;
        Ok(RecordField {
            name,
            schema,
            position,
        })
    }

    fn parse_enum(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::parse(complex, enclosing_namespace)?;

        let symbols: Vec<String> = complex
            .get("symbols")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::from(Details::GetEnumSymbolsField))
            .and_then(|symbols| {
                symbols
                    .iter()
                    .map(|symbol| symbol.as_str().map(|s| s.to_string()))
                    .collect::<Option<_>>()
                    .ok_or_else(|| Error::from(Details::GetEnumSymbols))
            })?;

        let mut existing_symbols: HashSet<&String> = HashSet::with_capacity(symbols.len());
        for symbol in symbols.iter() {
            if !existing_symbols.insert(symbol) {
                return Err(Details::EnumSymbolDuplicate(symbol.to_string()).into());
            }
        }

        self.register_parsed_schema(&fully_qualified_name)?;
        Ok(Schema::Enum(EnumSchema {
            name: fully_qualified_name,
            symbols,
        }))
    }

    fn parse_array(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        complex
            .get("items")
            .ok_or_else(|| Details::GetArrayItemsField.into())
            .and_then(|items| self.parse(items, enclosing_namespace))
            .map(|items| {
                Schema::Array(ArraySchema {
                    items: Box::new(items),
                })
            })
    }

    fn parse_map(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        complex
            .get("values")
            .ok_or_else(|| Details::GetMapValuesField.into())
            .and_then(|types| self.parse(types, enclosing_namespace))
            .map(|types| {
                Schema::Map(MapSchema {
                    types: Box::new(types),
                })
            })
    }

    fn parse_union(
        &mut self,
        items: &[Value],
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        items
            .iter()
            .map(|v| self.parse(v, enclosing_namespace))
            .collect::<Result<Vec<_>, _>>()
            .and_then(|schemas| {
                if schemas.is_empty() {
                    error!(
                        "Union schemas should have at least two members! \
                    Please enable debug logging to find out which Record schema \
                    declares the union with 'RUST_LOG=avro_peek::schema=debug'."
                    );
                } else if schemas.len() == 1 {
                    warn!(
                        "Union schema with just one member! Consider dropping the union! \
                    Please enable debug logging to find out which Record schema \
                    declares the union with 'RUST_LOG=avro_peek::schema=debug'."
                    );
                }
                Ok(Schema::Union(UnionSchema::new(schemas)?))
            })
    }

    fn parse_fixed(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let size = match complex.get("size") {
            Some(size) => size
                .as_u64()
                .ok_or_else(|| Details::GetFixedSizeFieldPositive(size.clone())),
            None => Err(Details::GetFixedSizeField),
        }?;
        let size = usize::try_from(size)
            .map_err(|e| Details::ConvertU64ToUsize(e, size))?;

        let fully_qualified_name = Name::parse(complex, enclosing_namespace)?;
        self.register_parsed_schema(&fully_qualified_name)?;

        Ok(Schema::Fixed(FixedSchema {
            name: fully_qualified_name,
            size,
        }))
    }
}
