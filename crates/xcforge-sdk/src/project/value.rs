//! Raw values stored in a project file.
//!
//! The on-disk format only knows strings, arrays and dictionaries. Booleans
//! and numbers are stored as strings (`YES`/`NO`, decimal digits), so the
//! conversions below produce strings and the round trip through the text
//! format stays exact.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One record: field name to value, in file order.
pub type Record = IndexMap<String, Value>;

/// A value in a project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Array(Vec<Value>),
    Dict(IndexMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Converts a JSON document (as produced by `plutil -convert json`).
    ///
    /// Numbers and booleans become their project-file spelling.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::String(String::new()),
            serde_json::Value::Bool(b) => Value::from(b),
            serde_json::Value::Number(n) => Value::String(n.to_string()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Dict(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::String(if value { "YES" } else { "NO" }.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Dict(map)
    }
}

impl From<&crate::project::identifier::Identifier> for Value {
    fn from(id: &crate::project::identifier::Identifier) -> Self {
        Value::String(id.to_string())
    }
}

/// Builds a [`Record`] from literal pairs.
///
/// ```
/// use xcforge_sdk::project::value::{record, Value};
///
/// let group = record([("isa", Value::from("PBXGroup")), ("children", Value::Array(vec![]))]);
/// assert_eq!(group["isa"], Value::from("PBXGroup"));
/// ```
pub fn record<const N: usize>(pairs: [(&str, Value); N]) -> Record {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn booleans_use_project_spelling() {
        assert_eq!(Value::from(true), Value::from("YES"));
        assert_eq!(Value::from(false), Value::from("NO"));
    }

    #[test]
    fn converts_plutil_json() {
        let value = Value::from_json(json!({
            "objectVersion": 46,
            "flags": [true, "x"],
        }));
        let dict = value.as_dict().unwrap();
        assert_eq!(dict["objectVersion"], Value::from("46"));
        assert_eq!(
            dict["flags"],
            Value::Array(vec![Value::from("YES"), Value::from("x")])
        );
    }
}
