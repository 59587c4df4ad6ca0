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

//! The boundary between record dispatch and an embedded scripting runtime.
//!
//! An inline script sees the current record as the global [`RECORD_GLOBAL`]
//! and runs once per record. A script file runs once per runtime and must
//! evaluate to a function, which is then called with every record.

use crate::{AvroResult, error::Details, types::Value};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Name of the global an inline script reads the record from.
pub const RECORD_GLOBAL: &str = "r";

/// Script code and where it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptSource {
    Inline(String),
    File { path: PathBuf, code: String },
}

impl ScriptSource {
    /// Reads the script at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> AvroResult<Self> {
        let path = path.as_ref().to_path_buf();
        let code = fs::read_to_string(&path).map_err(|source| Details::ReadScript {
            path: path.clone(),
            source,
        })?;
        Ok(ScriptSource::File { path, code })
    }

    /// Display name used for chunk names in script errors.
    pub fn name(&self) -> String {
        match self {
            ScriptSource::Inline(_) => "inline".to_string(),
            ScriptSource::File { path, .. } => path.display().to_string(),
        }
    }
}

/// One scripting runtime.
///
/// Hosts are created and used on a single thread.
pub trait ScriptHost {
    /// Binds `value` to the global `name`.
    fn set_global(&mut self, name: &str, value: &Value<'_>) -> AvroResult<()>;

    /// Runs `chunk` in this runtime.
    fn exec(&mut self, chunk: &str) -> AvroResult<()>;

    /// Calls the function the script file evaluated to.
    fn call_entrypoint(&mut self, value: &Value<'_>) -> AvroResult<()>;
}

/// Creates [`ScriptHost`]s; shared by every worker.
pub trait ScriptEngine: Send + Sync {
    fn load(&self, source: &ScriptSource) -> AvroResult<Box<dyn ScriptHost>>;
}

/// Per-runtime state of a script handler.
pub struct ScriptCallback {
    source: ScriptSource,
    host: Box<dyn ScriptHost>,
}

impl ScriptCallback {
    pub fn new(source: &ScriptSource, engine: &dyn ScriptEngine) -> AvroResult<Self> {
        Ok(Self {
            host: engine.load(source)?,
            source: source.clone(),
        })
    }

    pub fn call(&mut self, value: &Value<'_>) -> AvroResult<()> {
        match &self.source {
            ScriptSource::Inline(code) => {
                self.host.set_global(RECORD_GLOBAL, value)?;
                self.host.exec(code)
            }
            ScriptSource::File { .. } => self.host.call_entrypoint(value),
        }
    }
}

/// Engine used when the crate is built without a scripting runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoScriptEngine;

impl ScriptEngine for NoScriptEngine {
    fn load(&self, _source: &ScriptSource) -> AvroResult<Box<dyn ScriptHost>> {
        Err(Details::ScriptingUnavailable.into())
    }
}

/// The scripting runtime compiled into this build.
pub fn default_script_engine() -> Arc<dyn ScriptEngine> {
    #[cfg(feature = "lua")]
    {
        Arc::new(super::lua::LuaEngine)
    }
    #[cfg(not(feature = "lua"))]
    {
        Arc::new(NoScriptEngine)
    }
}
