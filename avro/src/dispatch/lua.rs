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

//! LuaJIT scripting through `mlua`.
//!
//! Values map to Lua as follows: `null` is `nil`, numbers are Lua numbers,
//! strings, bytes and fixed values are Lua strings, enums are their symbol,
//! arrays are tables indexed from 1 and records and maps are tables keyed
//! by name. Unions are replaced by their branch.

use super::script::{ScriptEngine, ScriptHost, ScriptSource};
use crate::{AvroResult, error::Details, types::Value};
use log::debug;
use mlua::{Function, Lua, Value as LuaValue};

fn script_error(e: mlua::Error) -> crate::Error {
    Details::Script(e.to_string()).into()
}

/// Starts one Lua state per [`ScriptHost`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LuaEngine;

impl ScriptEngine for LuaEngine {
    fn load(&self, source: &ScriptSource) -> AvroResult<Box<dyn ScriptHost>> {
        Ok(Box::new(LuaHost::new(source)?))
    }
}

pub struct LuaHost {
    lua: Lua,
    name: String,
    entrypoint: Option<Function>,
}

impl LuaHost {
    pub fn new(source: &ScriptSource) -> AvroResult<Self> {
        let lua = Lua::new();
        let name = source.name();
        let entrypoint = match source {
            ScriptSource::Inline(_) => None,
            ScriptSource::File { code, .. } => {
                debug!("Loading script {name}");
                let entrypoint = lua
                    .load(code.as_str())
                    .set_name(name.clone())
                    .eval::<Function>()
                    .map_err(script_error)?;
                Some(entrypoint)
            }
        };
        Ok(LuaHost {
            lua,
            name,
            entrypoint,
        })
    }
}

impl ScriptHost for LuaHost {
    fn set_global(&mut self, name: &str, value: &Value<'_>) -> AvroResult<()> {
        let value = to_lua(&self.lua, value).map_err(script_error)?;
        self.lua.globals().set(name, value).map_err(script_error)
    }

    fn exec(&mut self, chunk: &str) -> AvroResult<()> {
        self.lua
            .load(chunk)
            .set_name(self.name.clone())
            .exec()
            .map_err(script_error)
    }

    fn call_entrypoint(&mut self, value: &Value<'_>) -> AvroResult<()> {
        let entrypoint = self.entrypoint.as_ref().ok_or_else(|| {
            Details::Script(format!("{} does not provide a record function", self.name))
        })?;
        let value = to_lua(&self.lua, value).map_err(script_error)?;
        entrypoint.call::<()>(value).map_err(script_error)
    }
}

fn to_lua(lua: &Lua, value: &Value<'_>) -> mlua::Result<LuaValue> {
    Ok(match value {
        Value::Null => LuaValue::Nil,
        Value::Boolean(b) => LuaValue::Boolean(*b),
        Value::Int(i) => LuaValue::Number(f64::from(*i)),
        Value::Long(i) => LuaValue::Number(*i as f64),
        Value::Float(x) => LuaValue::Number(f64::from(*x)),
        Value::Double(x) => LuaValue::Number(*x),
        Value::Bytes(bytes) | Value::String(bytes) | Value::Fixed(bytes) => {
            LuaValue::String(lua.create_string(&**bytes)?)
        }
        Value::Enum(_, symbol) => LuaValue::String(lua.create_string(symbol.as_bytes())?),
        Value::Union(_, inner) => to_lua(lua, inner)?,
        Value::Array(items) => {
            let table = lua.create_table_with_capacity(items.len(), 0)?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
        Value::Map(entries) | Value::Record(entries) => {
            let table = lua.create_table_with_capacity(0, entries.len())?;
            for (key, item) in entries {
                table.raw_set(&**key, to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::TestResult;
    use pretty_assertions::assert_eq;

    fn person() -> Value<'static> {
        Value::Record(vec![
            ("name".into(), Value::from("Ann")),
            ("age".into(), Value::Int(30)),
            ("tags".into(), Value::Array(vec!["x".into(), "y".into()])),
            ("nick".into(), Value::Union(0, Box::new(Value::Null))),
        ])
    }

    #[test]
    fn inline_script_sees_the_record() -> TestResult {
        let mut host = LuaHost::new(&ScriptSource::Inline(String::new()))?;
        host.set_global("r", &person())?;
        host.exec("out = r.name .. ':' .. r.age .. ':' .. r.tags[1] .. ':' .. tostring(r.nick)")?;
        let out: String = host.lua.globals().get("out")?;
        assert_eq!(out, "Ann:30:x:nil");
        Ok(())
    }

    #[test]
    fn script_file_returns_a_function() -> TestResult {
        let source = ScriptSource::File {
            path: "count.lua".into(),
            code: "total = 0\nreturn function(r) total = total + r.age end".into(),
        };
        let mut host = LuaHost::new(&source)?;
        host.call_entrypoint(&person())?;
        host.call_entrypoint(&person())?;
        let total: f64 = host.lua.globals().get("total")?;
        assert_eq!(total, 60.0);
        Ok(())
    }

    #[test]
    fn script_errors_are_reported() {
        let source = ScriptSource::File {
            path: "broken.lua".into(),
            code: "return 42".into(),
        };
        let err = LuaHost::new(&source).err().expect("an error");
        assert!(matches!(err.details(), Details::Script(_)));
    }
}
