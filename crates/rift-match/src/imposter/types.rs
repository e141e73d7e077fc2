//! Type definitions for Mountebank-compatible imposter configuration.

use super::cycler::HasRepeatBehavior;
use crate::predicate::PredicateError;
use anyhow::Context;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;

// ============================================================================
// Stub Types
// ============================================================================

/// Stub definition as written in an imposter document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
    /// Stable identifier reported in match reports (Rift extension)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Raw predicates, parsed and validated when the imposter is built
    #[serde(default)]
    pub predicates: Vec<serde_json::Value>,
    #[serde(default)]
    pub responses: Vec<StubResponse>,
}

/// One of a stub's responses.
///
/// The payload is opaque here; protocol adapters and behaviors interpret it.
/// Only `_behaviors.repeat` matters to resolution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ResponseDocument")]
pub enum StubResponse {
    Is {
        is: serde_json::Value,
        /// Behaviors merged into a single object
        behaviors: Option<serde_json::Value>,
    },
    Proxy {
        proxy: serde_json::Value,
    },
    Inject {
        inject: String,
    },
    Fault {
        fault: String,
    },
}

impl Default for StubResponse {
    /// An empty `is` response, which protocol adapters fill with their defaults.
    fn default() -> Self {
        StubResponse::Is {
            is: serde_json::Value::Object(serde_json::Map::new()),
            behaviors: None,
        }
    }
}

impl StubResponse {
    pub fn response_type(&self) -> &'static str {
        match self {
            StubResponse::Is { .. } => "is",
            StubResponse::Proxy { .. } => "proxy",
            StubResponse::Inject { .. } => "inject",
            StubResponse::Fault { .. } => "fault",
        }
    }

    pub fn behaviors(&self) -> Option<&serde_json::Value> {
        match self {
            StubResponse::Is { behaviors, .. } => behaviors.as_ref(),
            _ => None,
        }
    }
}

impl HasRepeatBehavior for StubResponse {
    /// `_behaviors.repeat`: serve this response N times before moving on.
    fn repeat(&self) -> Option<u32> {
        self.behaviors()
            .and_then(|b| b.get("repeat"))
            .and_then(serde_json::Value::as_u64)
            .map(|r| u32::try_from(r).unwrap_or(u32::MAX))
    }
}

/// A response as it appears in a document. Behaviors may be spelled
/// `_behaviors` or `behaviors`, as an object or as an array of one-key objects.
/// `proxy: null` next to `is` is ignored.
#[derive(Deserialize)]
struct ResponseDocument {
    is: Option<serde_json::Value>,
    proxy: Option<serde_json::Value>,
    inject: Option<String>,
    fault: Option<String>,
    #[serde(rename = "_behaviors")]
    mb_behaviors: Option<serde_json::Value>,
    behaviors: Option<serde_json::Value>,
}

impl From<ResponseDocument> for StubResponse {
    fn from(doc: ResponseDocument) -> Self {
        match doc {
            ResponseDocument {
                is: Some(is),
                mb_behaviors,
                behaviors,
                ..
            } => StubResponse::Is {
                is,
                behaviors: mb_behaviors.or(behaviors).and_then(merge_behaviors),
            },
            ResponseDocument {
                proxy: Some(proxy), ..
            } if !proxy.is_null() => StubResponse::Proxy { proxy },
            ResponseDocument {
                inject: Some(inject),
                ..
            } => StubResponse::Inject { inject },
            ResponseDocument {
                fault: Some(fault), ..
            } => StubResponse::Fault { fault },
            _ => StubResponse::default(),
        }
    }
}

/// Written back in Mountebank's output shape, with behaviors as an array.
impl Serialize for StubResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            StubResponse::Is { is, behaviors } => {
                let listed: Vec<serde_json::Value> = behaviors
                    .iter()
                    .filter_map(serde_json::Value::as_object)
                    .flatten()
                    .map(|(name, config)| {
                        let single = serde_json::Map::from_iter([(name.clone(), config.clone())]);
                        serde_json::Value::Object(single)
                    })
                    .collect();
                if !listed.is_empty() {
                    map.serialize_entry("behaviors", &listed)?;
                }
                map.serialize_entry("is", is)?;
            }
            StubResponse::Proxy { proxy } => map.serialize_entry("proxy", proxy)?,
            StubResponse::Inject { inject } => map.serialize_entry("inject", inject)?,
            StubResponse::Fault { fault } => map.serialize_entry("fault", fault)?,
        }
        map.end()
    }
}

/// Fold either behaviors spelling into one object; empty or malformed input is `None`.
fn merge_behaviors(value: serde_json::Value) -> Option<serde_json::Value> {
    let merged: serde_json::Map<String, serde_json::Value> = match value {
        serde_json::Value::Object(obj) => obj,
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::Object(obj) => Some(obj),
                _ => None,
            })
            .flatten()
            .collect(),
        _ => return None,
    };
    (!merged.is_empty()).then_some(serde_json::Value::Object(merged))
}

// ============================================================================
// Imposter Config
// ============================================================================

/// Imposter mode (Mountebank compatible). Binary imposters carry base64 text
/// in their request fields and predicate operands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Fields are UTF-8 text (default)
    #[default]
    Text,
    /// Fields are base64-encoded binary data
    Binary,
}

fn default_protocol() -> String {
    "http".to_string()
}

fn is_text_mode(mode: &ResponseMode) -> bool {
    *mode == ResponseMode::Text
}

/// Protocols whose adapters produce requests for this engine.
pub const PROTOCOLS: [&str; 4] = ["http", "https", "tcp", "smtp"];

/// Configuration for creating an imposter
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImposterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "is_text_mode")]
    pub mode: ResponseMode,
    #[serde(default)]
    pub stubs: Vec<StubConfig>,
}

impl ImposterConfig {
    /// Load an imposter definition from a JSON or YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read imposter file: {}", path.display()))?;

        let config = if is_yaml(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML imposter: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON imposter: {}", path.display()))?
        };
        Ok(config)
    }
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

// ============================================================================
// Match Reports
// ============================================================================

/// Outcome of one resolution, suitable for printing or returning from a debug
/// endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub matched: bool,
    /// 1-based count of requests seen by the imposter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stub_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stub_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<StubResponse>,
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while building an imposter from its configuration
#[derive(Debug, thiserror::Error)]
pub enum ImposterError {
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),
    #[error("Invalid predicate at {0}")]
    InvalidPredicate(#[from] PredicateError),
    #[error("'matches' predicates are not allowed in binary mode (at {0})")]
    MatchesInBinaryMode(String),
}
