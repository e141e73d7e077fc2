//! Protocol-agnostic request consumed by predicate evaluation.
//!
//! Protocol adapters flatten what they receive into named fields: plain text
//! (`method`, `path`, `body`), multi-valued mappings (`headers`, `query`) whose
//! repeated keys hold sequences, or nested mappings. Embedded documents such as
//! JSON or XML bodies stay raw text until a selector asks for them.

use crate::predicate::{lookup, Mapping, Value};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A normalized request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub struct Request {
    fields: Mapping,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Field lookup; names are matched case-insensitively unless `case_sensitive`.
    pub fn get(&self, name: &str, case_sensitive: bool) -> Option<&Value> {
        lookup(&self.fields, name, case_sensitive)
    }

    pub fn fields(&self) -> &Mapping {
        &self.fields
    }
}

/// Error converting a JSON document into a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("request must be a JSON object, got {0}")]
pub struct InvalidRequest(&'static str);

impl TryFrom<serde_json::Value> for Request {
    type Error = InvalidRequest;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        let kind = match &json {
            serde_json::Value::Object(_) => None,
            serde_json::Value::Null => Some("null"),
            serde_json::Value::Bool(_) => Some("a boolean"),
            serde_json::Value::Number(_) => Some("a number"),
            serde_json::Value::String(_) => Some("a string"),
            serde_json::Value::Array(_) => Some("an array"),
        };
        if let Some(kind) = kind {
            return Err(InvalidRequest(kind));
        }

        match Value::from_json(json) {
            Some(Value::Mapping(fields)) => Ok(Self { fields }),
            _ => Ok(Self::default()),
        }
    }
}

impl From<Request> for serde_json::Value {
    fn from(request: Request) -> Self {
        Value::Mapping(request.fields).to_json()
    }
}

impl From<Mapping> for Request {
    fn from(fields: Mapping) -> Self {
        Self { fields }
    }
}

/// Parse one request (a JSON/YAML object) or several (an array of objects).
pub fn requests_from_str(content: &str, yaml: bool) -> anyhow::Result<Vec<Request>> {
    let document: serde_json::Value = if yaml {
        serde_yaml::from_str(content).context("Failed to parse YAML requests")?
    } else {
        serde_json::from_str(content).context("Failed to parse JSON requests")?
    };

    let documents = match document {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };
    documents
        .into_iter()
        .enumerate()
        .map(|(i, doc)| Request::try_from(doc).with_context(|| format!("Invalid request #{i}")))
        .collect()
}

/// Load requests from a `.json`, `.yaml` or `.yml` file.
pub fn load_requests(path: &Path) -> anyhow::Result<Vec<Request>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    requests_from_str(&content, crate::imposter::is_yaml(path))
        .with_context(|| format!("Failed to load requests from {}", path.display()))
}

/// Parse a raw query string into a mapping.
///
/// Keys and values are URL-decoded. A key that appears more than once holds a
/// sequence of its values in order of appearance.
pub fn parse_query_string(query: Option<&str>) -> Mapping {
    let mut params = Mapping::new();
    let Some(q) = query else {
        return params;
    };

    for pair in q.trim_start_matches('?').split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key);
        let value = Value::from(decode(value));

        match params.remove(&key) {
            None => {
                params.insert(key, value);
            }
            Some(Value::Sequence(mut values)) => {
                values.push(value);
                params.insert(key, Value::Sequence(values));
            }
            Some(previous) => {
                params.insert(key, Value::Sequence(vec![previous, value]));
            }
        }
    }
    params
}

fn decode(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(raw)
}
