//! Predicate options for modifying matching behavior.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options that modify predicate matching behavior.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredicateOptions {
    /// Whether matching is case-sensitive (Mountebank default: false)
    #[serde(default)]
    pub case_sensitive: bool,

    /// Regex pattern to strip from values before matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except: Option<String>,

    /// Embedded document selector applied to request fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
}

/// Embedded-document selector.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Selector {
    /// JSONPath (RFC 9535) over a JSON document
    #[serde(rename = "jsonpath")]
    JsonPath { selector: String },
    /// XPath 1.0 over an XML document, with optional prefix -> namespace URI bindings
    #[serde(rename = "xpath")]
    XPath {
        selector: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        ns: BTreeMap<String, String>,
    },
}

impl Selector {
    pub fn expression(&self) -> &str {
        match self {
            Selector::JsonPath { selector } | Selector::XPath { selector, .. } => selector,
        }
    }
}

/// How text fields are encoded. Imposters in binary mode carry base64 text,
/// which is decoded to bytes before text operators run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Base64,
}
