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

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};

use crate::{AvroResult, Schema, error::Details, util::MapHelper};

/// Represents names for `record`, `enum` and `fixed` Avro schemas.
///
/// Each of these `Schema`s have a `fullname` composed of two parts:
///   * a name
///   * a namespace
///
/// A `Name` is always stored fully qualified: the enclosing namespace is
/// applied when it is created.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct Name {
    /// The full name
    namespace_and_name: String,
    /// Start byte of the name part
    ///
    /// If this is zero, then there is no namespace.
    index_of_name: usize,
}

/// Represents Schema lookup within a schema env
pub type Names = HashMap<Name, Schema>;
/// Represents the namespace for Named Schema
pub type NamespaceRef<'a> = Option<&'a str>;

impl Name {
    /// Create a new `Name`.
    /// Parses the optional `namespace` from the `name` string.
    pub fn new(name: &str) -> AvroResult<Self> {
        Self::new_with_enclosing_namespace(name, None)
    }

    /// Create a new `Name` using the namespace from `enclosing_namespace` if absent.
    ///
    /// A leading dot places the name in the null namespace.
    pub fn new_with_enclosing_namespace(
        name: &str,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Self> {
        let (name, explicit_null_namespace) = match name.strip_prefix('.') {
            Some(rest) => (rest, true),
            None => (name, false),
        };
        if name.is_empty() || name.ends_with('.') || name.contains("..") {
            return Err(Details::InvalidSchemaName(name.to_string()).into());
        }

        if let Some(dot) = name.rfind('.') {
            return Ok(Self {
                namespace_and_name: name.to_string(),
                index_of_name: dot + 1,
            });
        }

        match enclosing_namespace {
            Some(namespace) if !namespace.is_empty() && !explicit_null_namespace => Ok(Self {
                namespace_and_name: format!("{namespace}.{name}"),
                index_of_name: namespace.len() + 1,
            }),
            _ => Ok(Self {
                namespace_and_name: name.to_string(),
                index_of_name: 0,
            }),
        }
    }

    /// Parse a `serde_json::Value` into a `Name`.
    pub(crate) fn parse(
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Self> {
        let name_field = complex.name().ok_or(Details::GetNameField)?;
        let namespace = complex.string("namespace");
        Self::new_with_enclosing_namespace(
            &name_field,
            namespace.as_deref().or(enclosing_namespace),
        )
    }

    pub fn name(&self) -> &str {
        &self.namespace_and_name[self.index_of_name..]
    }

    pub fn namespace(&self) -> NamespaceRef<'_> {
        if self.index_of_name == 0 {
            None
        } else {
            Some(&self.namespace_and_name[..(self.index_of_name - 1)])
        }
    }

    /// Return the `fullname` of this `Name`
    pub fn fullname(&self) -> &str {
        &self.namespace_and_name
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Name({})", self.namespace_and_name)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.namespace_and_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::TestResult;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn name_without_namespace() -> TestResult {
        let name = Name::new("Person")?;
        assert_eq!(name.name(), "Person");
        assert_eq!(name.namespace(), None);
        assert_eq!(name.fullname(), "Person");
        Ok(())
    }

    #[test]
    fn name_with_inline_namespace_ignores_enclosing() -> TestResult {
        let name = Name::new_with_enclosing_namespace("a.b.Person", Some("other"))?;
        assert_eq!(name.name(), "Person");
        assert_eq!(name.namespace(), Some("a.b"));
        Ok(())
    }

    #[test]
    fn name_inherits_enclosing_namespace() -> TestResult {
        let name = Name::new_with_enclosing_namespace("Person", Some("com.example"))?;
        assert_eq!(name.fullname(), "com.example.Person");
        assert_eq!(name.namespace(), Some("com.example"));
        Ok(())
    }

    #[test]
    fn leading_dot_means_null_namespace() -> TestResult {
        let name = Name::new_with_enclosing_namespace(".Person", Some("com.example"))?;
        assert_eq!(name.fullname(), "Person");
        assert_eq!(name.namespace(), None);
        Ok(())
    }

    #[test]
    fn invalid_names() {
        for bad in ["", ".", "a.", "a..b"] {
            assert!(Name::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn parse_prefers_own_namespace() -> TestResult {
        let json = json!({"name": "Inner", "namespace": "own"});
        let name = Name::parse(json.as_object().unwrap(), Some("outer"))?;
        assert_eq!(name.fullname(), "own.Inner");

        let json = json!({"name": "Inner"});
        let name = Name::parse(json.as_object().unwrap(), Some("outer"))?;
        assert_eq!(name.fullname(), "outer.Inner");
        Ok(())
    }
}
