//! Tagged value type shared by normalized requests and predicate operands.
//!
//! Every request field and every predicate operand is one of three shapes:
//! a scalar, an ordered sequence, or a keyed mapping. Operators are written as
//! a case analysis over these shapes instead of probing runtime types.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Keyed mapping. Key order carries no meaning; `BTreeMap` keeps iteration deterministic.
pub type Mapping = BTreeMap<String, Value>;

/// A leaf value.
///
/// Text is what protocol adapters produce. Numbers and booleans only appear when a
/// selector extracts them from an embedded document, or when a predicate operand
/// is written as a JSON number/boolean.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl Scalar {
    /// Canonical text form, used whenever a scalar meets a text operator.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Scalar::Text(s) => Cow::Borrowed(s),
            Scalar::Number(n) => Cow::Owned(n.to_string()),
            Scalar::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        }
    }
}

/// Request field value or predicate operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// Convert a JSON document into a `Value`.
    ///
    /// `null` has no counterpart and returns `None`; nulls nested inside arrays and
    /// objects are dropped, so a key holding `null` reads as absent.
    pub fn from_json(json: serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Scalar(Scalar::Bool(b))),
            serde_json::Value::Number(n) => Some(Value::Scalar(Scalar::Number(n))),
            serde_json::Value::String(s) => Some(Value::Scalar(Scalar::Text(s))),
            serde_json::Value::Array(items) => Some(Value::Sequence(
                items.into_iter().filter_map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(Value::Mapping(
                map.into_iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    /// Convert back into JSON (used for reports and embedded document handling).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Scalar(Scalar::Text(s)) => serde_json::Value::String(s.clone()),
            Value::Scalar(Scalar::Number(n)) => serde_json::Value::Number(n.clone()),
            Value::Scalar(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Mapping(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Empty text, an empty sequence and an empty mapping all count as "not present"
    /// for the `exists` operator.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(Scalar::Text(s)) => s.is_empty(),
            Value::Scalar(_) => false,
            Value::Sequence(items) => items.is_empty(),
            Value::Mapping(map) => map.is_empty(),
        }
    }

    /// Look up a mapping key, falling back to a case-insensitive scan when
    /// `case_sensitive` is false. Returns `None` for non-mappings.
    pub fn get(&self, key: &str, case_sensitive: bool) -> Option<&Value> {
        match self {
            Value::Mapping(map) => lookup(map, key, case_sensitive),
            _ => None,
        }
    }
}

/// Key lookup honoring case sensitivity.
pub fn lookup<'a>(map: &'a Mapping, key: &str, case_sensitive: bool) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    if case_sensitive {
        return None;
    }
    let wanted = key.to_lowercase();
    map.iter()
        .find(|(k, _)| k.to_lowercase() == wanted)
        .map(|(_, v)| v)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => f.write_str(&s.to_text()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Scalar(Scalar::Text(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Scalar(Scalar::Text(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Scalar(Scalar::Number(value.into()))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Mapping(map)
    }
}
