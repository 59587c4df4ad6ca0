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

//! Logic for parsing the writer schema embedded in a container header.

mod name;
mod parser;

pub use crate::schema::name::{Name, Names, NamespaceRef};
use crate::{AvroResult, error::Details, schema::parser::Parser};
use std::collections::{BTreeMap, HashSet};
use strum_macros::EnumDiscriminants;

/// Represents any valid Avro schema
/// More information about Avro schemas can be found in the
/// [Avro Specification](https://avro.apache.org/docs/++version++/specification/#schema-declaration)
///
/// Logical type annotations are not represented: a schema carrying one is
/// the schema of its underlying type.
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(SchemaKind), derive(Hash, Ord, PartialOrd))]
pub enum Schema {
    /// A `null` Avro schema.
    Null,
    /// A `boolean` Avro schema.
    Boolean,
    /// An `int` Avro schema.
    Int,
    /// A `long` Avro schema.
    Long,
    /// A `float` Avro schema.
    Float,
    /// A `double` Avro schema.
    Double,
    /// A `bytes` Avro schema.
    ///
    /// `Bytes` represents a sequence of 8-bit unsigned bytes.
    Bytes,
    /// A `string` Avro schema.
    String,
    /// An `array` Avro schema.
    ///
    /// All items will have the same schema.
    Array(ArraySchema),
    /// A `map` Avro schema.
    ///
    /// Keys are always strings and all values will have the same schema.
    Map(MapSchema),
    /// A `union` Avro schema.
    Union(UnionSchema),
    /// A `record` Avro schema.
    Record(RecordSchema),
    /// An `enum` Avro schema.
    Enum(EnumSchema),
    /// A `fixed` Avro schema.
    Fixed(FixedSchema),
    /// A reference to a named schema defined earlier in the same document.
    Ref { name: Name },
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapSchema {
    pub types: Box<Schema>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArraySchema {
    pub items: Box<Schema>,
}

/// A description of a Record schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordSchema {
    /// The name of the schema
    pub name: Name,
    /// The set of fields of the schema
    pub fields: Vec<RecordField>,
    /// The `lookup` table maps field names to their position in the `Vec`
    /// of `fields`.
    pub lookup: BTreeMap<String, usize>,
}

/// Represents a `field` in a `record` Avro schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordField {
    /// Name of the field.
    pub name: String,
    /// Schema of the field.
    pub schema: Schema,
    /// Position of the field in the list of `field` of its parent `Schema`
    pub position: usize,
}

/// A description of an Enum schema.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumSchema {
    /// The name of the schema
    pub name: Name,
    /// The set of symbols of the schema
    pub symbols: Vec<String>,
}

/// A description of a Fixed schema.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedSchema {
    /// The name of the schema
    pub name: Name,
    /// The size of the fixed schema
    pub size: usize,
}

/// A description of a Union schema
#[derive(Clone, Debug, PartialEq)]
pub struct UnionSchema {
    /// The schemas that make up this union
    pub(crate) schemas: Vec<Schema>,
}

impl UnionSchema {
    /// Creates a new UnionSchema from a vector of schemas.
    ///
    /// # Errors
    /// Will return an error if `schemas` has duplicate unnamed schemas, duplicate
    /// named schemas or if `schemas` contains a union.
    pub fn new(schemas: Vec<Schema>) -> AvroResult<Self> {
        let mut kinds = HashSet::new();
        let mut names = HashSet::new();
        for schema in &schemas {
            if let Schema::Union(_) = schema {
                return Err(Details::GetNestedUnion.into());
            }
            let unique = match schema.name() {
                Some(name) => names.insert(name),
                None => kinds.insert(SchemaKind::from(schema)),
            };
            if !unique {
                return Err(Details::GetUnionDuplicate.into());
            }
        }
        Ok(UnionSchema { schemas })
    }

    /// Returns a slice to all variants of this schema.
    pub fn variants(&self) -> &[Schema] {
        &self.schemas
    }

    /// Returns true if the any of the variants of this `UnionSchema` is `Null`.
    pub fn is_nullable(&self) -> bool {
        self.schemas.iter().any(|x| matches!(x, Schema::Null))
    }
}

impl Schema {
    /// Create a `Schema` from a string representing a JSON Avro schema.
    pub fn parse_str(input: &str) -> AvroResult<Schema> {
        let mut parser = Parser::default();
        parser.parse_str(input)
    }

    /// Create a `Schema` from raw JSON bytes, as stored in a container header.
    pub fn parse_slice(input: &[u8]) -> AvroResult<Schema> {
        let mut parser = Parser::default();
        parser.parse_slice(input)
    }

    /// Returns a `Schema::Map` with the given types.
    pub fn map(types: Schema) -> Self {
        Schema::Map(MapSchema {
            types: Box::new(types),
        })
    }

    /// Returns a `Schema::Array` with the given items.
    pub fn array(items: Schema) -> Self {
        Schema::Array(ArraySchema {
            items: Box::new(items),
        })
    }

    /// Returns whether the schema represents a named type according to the avro specification
    pub fn is_named(&self) -> bool {
        self.name().is_some()
    }

    /// Returns the name of the schema if it has one.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Schema::Ref { name, .. }
            | Schema::Record(RecordSchema { name, .. })
            | Schema::Enum(EnumSchema { name, .. })
            | Schema::Fixed(FixedSchema { name, .. }) => Some(name),
            _ => None,
        }
    }
}

/// Collects every named type defined in `schema` into `names`.
///
/// Fails if a name is defined twice or if a reference points at a name that
/// was not defined before it.
pub fn resolve_names(schema: &Schema, names: &mut Names) -> AvroResult<()> {
    match schema {
        Schema::Array(schema) => resolve_names(&schema.items, names),
        Schema::Map(schema) => resolve_names(&schema.types, names),
        Schema::Union(UnionSchema { schemas }) => {
            for schema in schemas {
                resolve_names(schema, names)?
            }
            Ok(())
        }
        Schema::Enum(EnumSchema { name, .. }) | Schema::Fixed(FixedSchema { name, .. }) => {
            if names.insert(name.clone(), schema.clone()).is_some() {
                Err(Details::AmbiguousSchemaDefinition(name.clone()).into())
            } else {
                Ok(())
            }
        }
        Schema::Record(RecordSchema { name, fields, .. }) => {
            if names.insert(name.clone(), schema.clone()).is_some() {
                Err(Details::AmbiguousSchemaDefinition(name.clone()).into())
            } else {
                for field in fields {
                    resolve_names(&field.schema, names)?
                }
                Ok(())
            }
        }
        Schema::Ref { name } => names
            .get(name)
            .map(|_| ())
            .ok_or_else(|| Details::SchemaResolutionError(name.clone()).into()),
        _ => Ok(()),
    }
}
