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

//! Schema-driven decoding of a single datum from a byte cursor.

use crate::{
    AvroResult,
    error::Details,
    schema::{
        ArraySchema, EnumSchema, FixedSchema, MapSchema, Names, RecordSchema, Schema, UnionSchema,
    },
    types::Value,
    util::{read_array, read_bytes, read_len, safe_len, zag_i32, zag_i64},
};
use std::borrow::Cow;

/// Decode one datum of `schema` from the front of `cursor`.
///
/// On success the cursor is advanced past exactly the bytes the datum
/// occupies. Byte payloads in the returned value borrow from the cursor's
/// underlying slice and names borrow from `schema`/`names`.
pub fn decode<'a>(
    schema: &'a Schema,
    names: &'a Names,
    cursor: &mut &'a [u8],
) -> AvroResult<Value<'a>> {
    match schema {
        Schema::Null => Ok(Value::Null),
        Schema::Boolean => match read_array::<1>(cursor)? {
            [0u8] => Ok(Value::Boolean(false)),
            [1u8] => Ok(Value::Boolean(true)),
            [other] => Err(Details::BoolValue(other).into()),
        },
        Schema::Int => zag_i32(cursor).map(Value::Int),
        Schema::Long => zag_i64(cursor).map(Value::Long),
        Schema::Float => {
            read_array::<4>(cursor).map(|bytes| Value::Float(f32::from_le_bytes(bytes)))
        }
        Schema::Double => {
            read_array::<8>(cursor).map(|bytes| Value::Double(f64::from_le_bytes(bytes)))
        }
        Schema::Bytes => decode_len_prefixed(cursor).map(|b| Value::Bytes(Cow::Borrowed(b))),
        Schema::String => decode_len_prefixed(cursor).map(|b| Value::String(Cow::Borrowed(b))),
        Schema::Fixed(FixedSchema { size, .. }) => {
            read_bytes(cursor, *size).map(|b| Value::Fixed(Cow::Borrowed(b)))
        }
        Schema::Array(ArraySchema { items }) => {
            decode_blocks(cursor, |cursor| decode(items, names, cursor)).map(Value::Array)
        }
        Schema::Map(MapSchema { types }) => decode_blocks(cursor, |cursor| {
            let key = String::from_utf8_lossy(decode_len_prefixed(cursor)?);
            let value = decode(types, names, cursor)?;
            Ok((key, value))
        })
        .map(Value::Map),
        Schema::Record(RecordSchema { fields, .. }) => fields
            .iter()
            .map(|field| {
                decode(&field.schema, names, cursor)
                    .map(|value| (Cow::Borrowed(field.name.as_str()), value))
            })
            .collect::<AvroResult<Vec<_>>>()
            .map(Value::Record),
        Schema::Enum(EnumSchema { symbols, .. }) => {
            let index = zag_i64(cursor)?;
            let (position, symbol) = u32::try_from(index)
                .ok()
                .and_then(|i| symbols.get(i as usize).map(|symbol| (i, symbol)))
                .ok_or(Details::EnumSymbolIndex {
                    index,
                    num_variants: symbols.len(),
                })?;
            Ok(Value::Enum(position, Cow::Borrowed(symbol.as_str())))
        }
        Schema::Union(UnionSchema { schemas }) => {
            let index = zag_i64(cursor)?;
            let (position, variant) = u32::try_from(index)
                .ok()
                .and_then(|i| schemas.get(i as usize).map(|variant| (i, variant)))
                .ok_or(Details::GetUnionVariant {
                    index,
                    num_variants: schemas.len(),
                })?;
            let value = decode(variant, names, cursor)?;
            Ok(Value::Union(position, Box::new(value)))
        }
        Schema::Ref { name } => {
            let resolved = names
                .get(name)
                .ok_or_else(|| Details::SchemaResolutionError(name.clone()))?;
            decode(resolved, names, cursor)
        }
    }
}

fn decode_len_prefixed<'a>(cursor: &mut &'a [u8]) -> AvroResult<&'a [u8]> {
    let len = read_len(cursor)?;
    read_bytes(cursor, len)
}

/// Drives the block encoding shared by arrays and maps.
///
/// Each block starts with an item count. A negative count is followed by the
/// block's size in bytes, which is read and discarded, and its absolute value
/// is the number of items. A zero count ends the sequence.
fn decode_blocks<'a, T, F>(cursor: &mut &'a [u8], mut decode_item: F) -> AvroResult<Vec<T>>
where
    F: FnMut(&mut &'a [u8]) -> AvroResult<T>,
{
    let mut collected = Vec::new();
    let mut total = 0usize;
    loop {
        let raw = zag_i64(cursor)?;
        if raw == 0 {
            return Ok(collected);
        }
        if raw < 0 {
            let _block_size = zag_i64(cursor)?;
        }
        let count = raw.unsigned_abs();
        let count = usize::try_from(count).map_err(|e| Details::ConvertU64ToUsize(e, count))?;
        // `null` items occupy no input, so the cap applies to the collected values
        total = total.saturating_add(count);
        safe_len(total.saturating_mul(size_of::<T>()))?;
        collected.reserve(count.min(cursor.len()));
        for _ in 0..count {
            collected.push(decode_item(cursor)?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::Name,
        test_helper::TestResult,
        util::{DEFAULT_MAX_ALLOCATION_BYTES, zig_bytes, zig_i64},
    };
    use pretty_assertions::assert_eq;

    fn decode_all<'a>(
        schema: &'a Schema,
        names: &'a Names,
        input: &'a [u8],
    ) -> AvroResult<Value<'a>> {
        let mut cursor = input;
        let value = decode(schema, names, &mut cursor)?;
        assert!(cursor.is_empty(), "{} bytes left over", cursor.len());
        Ok(value)
    }

    #[test]
    fn test_decode_primitives() -> TestResult {
        let names = Names::new();
        assert_eq!(decode_all(&Schema::Null, &names, &[])?, Value::Null);
        assert_eq!(decode_all(&Schema::Boolean, &names, &[1])?, Value::Boolean(true));
        assert_eq!(decode_all(&Schema::Int, &names, &[0x54])?, Value::Int(42));
        assert_eq!(decode_all(&Schema::Long, &names, &[0x01])?, Value::Long(-1));
        assert_eq!(
            decode_all(&Schema::Float, &names, &1.5f32.to_le_bytes())?,
            Value::Float(1.5)
        );
        assert_eq!(
            decode_all(&Schema::Double, &names, &(-0.25f64).to_le_bytes())?,
            Value::Double(-0.25)
        );
        assert_eq!(
            decode_all(&Schema::String, &names, &[0x06, b'f', b'o', b'o'])?,
            Value::from("foo")
        );
        Ok(())
    }

    #[test]
    fn test_decode_bool_rejects_other_bytes() {
        let err = decode(&Schema::Boolean, &Names::new(), &mut &[2u8][..]).unwrap_err();
        assert!(matches!(err.details(), Details::BoolValue(2)));
    }

    #[test]
    fn test_decode_string_is_not_validated() -> TestResult {
        let names = Names::new();
        let input = [0x04, 0xC3, 0x28];
        let value = decode_all(&Schema::String, &names, &input)?;
        assert_eq!(value, Value::String(Cow::Borrowed(&[0xC3, 0x28][..])));
        Ok(())
    }

    #[test]
    fn test_decode_string_borrows_input() -> TestResult {
        let names = Names::new();
        let input = [0x06, b'b', b'a', b'r'];
        let Value::String(Cow::Borrowed(bytes)) = decode_all(&Schema::String, &names, &input)?
        else {
            panic!("Expected a borrowed string");
        };
        assert_eq!(bytes.as_ptr(), input[1..].as_ptr());
        Ok(())
    }

    #[test]
    fn test_decode_truncated_string() {
        let err = decode(&Schema::String, &Names::new(), &mut &[0x06, b'a'][..]).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::Truncated {
                needed: 3,
                available: 1
            }
        ));
    }

    #[test]
    fn test_decode_negative_length() {
        let err = decode(&Schema::Bytes, &Names::new(), &mut &[0x03][..]).unwrap_err();
        assert!(matches!(err.details(), Details::ConvertI64ToUsize(_, -2)));
    }

    #[test]
    fn test_decode_array_without_size() -> TestResult {
        let names = Names::new();
        let schema = Schema::array(Schema::Int);
        let input = [6u8, 2, 4, 6, 0];
        assert_eq!(
            decode_all(&schema, &names, &input)?,
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        Ok(())
    }

    #[test]
    fn test_decode_array_with_size() -> TestResult {
        let names = Names::new();
        let schema = Schema::array(Schema::Int);
        // -3 items in a block of 6 bytes, then 1 more item in a positive block
        let input = [5u8, 6, 2, 4, 6, 2, 8, 0];
        assert_eq!(
            decode_all(&schema, &names, &input)?,
            Value::Array(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::Int(4)
            ])
        );
        Ok(())
    }

    #[test]
    fn test_decode_map_with_size() -> TestResult {
        let names = Names::new();
        let schema = Schema::map(Schema::Int);
        let input = [0x01, 0x0C, 0x08, 0x74, 0x65, 0x73, 0x74, 0x02, 0x00];
        assert_eq!(
            decode_all(&schema, &names, &input)?,
            Value::Map(vec![("test".into(), Value::Int(1))])
        );
        Ok(())
    }

    #[test]
    fn test_decode_map_keeps_wire_order() -> TestResult {
        let names = Names::new();
        let schema = Schema::map(Schema::Boolean);
        let mut input = Vec::new();
        zig_i64(2, &mut input);
        zig_bytes(b"zeta", &mut input);
        input.push(1);
        zig_bytes(b"alpha", &mut input);
        input.push(0);
        input.push(0);
        assert_eq!(
            decode_all(&schema, &names, &input)?,
            Value::Map(vec![
                ("zeta".into(), Value::Boolean(true)),
                ("alpha".into(), Value::Boolean(false)),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_decode_union_branches() -> TestResult {
        let names = Names::new();
        let schema = Schema::Union(UnionSchema::new(vec![Schema::Null, Schema::String])?);
        assert_eq!(
            decode_all(&schema, &names, &[0x00])?,
            Value::Union(0, Box::new(Value::Null))
        );
        assert_eq!(
            decode_all(&schema, &names, &[0x02, 0x02, b'x'])?,
            Value::Union(1, Box::new(Value::from("x")))
        );
        Ok(())
    }

    #[test]
    fn test_decode_union_index_out_of_range() -> TestResult {
        let schema = Schema::Union(UnionSchema::new(vec![Schema::Null, Schema::Int])?);
        let err = decode(&schema, &Names::new(), &mut &[0x04][..]).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::GetUnionVariant {
                index: 2,
                num_variants: 2
            }
        ));

        let err = decode(&schema, &Names::new(), &mut &[0x01][..]).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::GetUnionVariant { index: -1, .. }
        ));
        Ok(())
    }

    #[test]
    fn test_decode_enum() -> TestResult {
        let names = Names::new();
        let schema = Schema::Enum(EnumSchema {
            name: Name::new("Suit")?,
            symbols: vec!["SPADES".into(), "HEARTS".into()],
        });
        assert_eq!(
            decode_all(&schema, &names, &[0x02])?,
            Value::Enum(1, "HEARTS".into())
        );

        let err = decode(&schema, &names, &mut &[0x04][..]).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::EnumSymbolIndex {
                index: 2,
                num_variants: 2
            }
        ));
        Ok(())
    }

    #[test]
    fn test_decode_fixed() -> TestResult {
        let names = Names::new();
        let schema = Schema::Fixed(FixedSchema {
            name: Name::new("Pair")?,
            size: 2,
        });
        let mut cursor = &[7u8, 8, 9][..];
        assert_eq!(
            decode(&schema, &names, &mut cursor)?,
            Value::Fixed(Cow::Borrowed(&[7, 8][..]))
        );
        assert_eq!(cursor, &[9]);
        Ok(())
    }

    #[test]
    fn test_decode_record_in_field_order() -> TestResult {
        let names = Names::new();
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "Person", "fields": [
                {"name": "name", "type": "string"},
                {"name": "age", "type": "int"}
            ]}"#,
        )?;
        let mut input = Vec::new();
        zig_bytes(b"Ann", &mut input);
        zig_i64(30, &mut input);
        assert_eq!(
            decode_all(&schema, &names, &input)?,
            Value::Record(vec![
                ("name".into(), Value::from("Ann")),
                ("age".into(), Value::Int(30)),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_decode_recursive_schema() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "Node", "fields": [
                {"name": "value", "type": "long"},
                {"name": "next", "type": ["null", "Node"]}
            ]}"#,
        )?;
        let mut names = Names::new();
        crate::schema::resolve_names(&schema, &mut names)?;

        // 1 -> 2 -> null
        let input = [0x02, 0x02, 0x04, 0x00];
        let node = |value, next| {
            Value::Record(vec![
                ("value".into(), Value::Long(value)),
                ("next".into(), next),
            ])
        };
        assert_eq!(
            decode_all(&schema, &names, &input)?,
            node(
                1,
                Value::Union(1, Box::new(node(2, Value::Union(0, Box::new(Value::Null)))))
            )
        );
        Ok(())
    }

    #[test]
    fn test_decode_unresolved_ref() -> TestResult {
        let schema = Schema::Ref {
            name: Name::new("Nowhere")?,
        };
        let err = decode(&schema, &Names::new(), &mut &[0u8][..]).unwrap_err();
        assert!(matches!(err.details(), Details::SchemaResolutionError(_)));
        Ok(())
    }

    #[test]
    fn test_decode_huge_block_count() {
        let schema = Schema::array(Schema::Null);
        let mut input = Vec::new();
        zig_i64(i64::MAX, &mut input);
        let err = decode(&schema, &Names::new(), &mut input.as_slice()).unwrap_err();
        assert!(matches!(err.details(), Details::MemoryAllocation { .. }));
    }

    #[test]
    fn test_decode_block_count_capped_by_value_size() {
        // few enough items to pass a per-item check, too many bytes of values
        let schema = Schema::array(Schema::Null);
        let items = DEFAULT_MAX_ALLOCATION_BYTES / size_of::<Value>() + 1;
        let mut input = Vec::new();
        zig_i64(items as i64, &mut input);
        zig_i64(0, &mut input);
        let err = decode(&schema, &Names::new(), &mut input.as_slice()).unwrap_err();
        assert!(matches!(err.details(), Details::MemoryAllocation { .. }));
    }
}
