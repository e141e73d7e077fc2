//! Parsing and validation of Mountebank JSON predicates.
//!
//! ```json
//! {"equals": {"method": "GET"}, "caseSensitive": true}
//! {"contains": {"body": "x"}, "jsonpath": {"selector": "$..title"}}
//! {"or": [{"startsWith": {"path": "/a"}}, {"not": {"exists": {"query": {"q": true}}}}]}
//! ```
//!
//! Everything that can go wrong with a predicate is reported here, when the
//! imposter is created. Errors carry the location of the offending predicate
//! (`predicates[0].or[1].not`).

use super::logical::{Leaf, Predicate};
use super::operator::{Operator, UnknownOperator};
use super::options::{PredicateOptions, Selector};
use super::selector::SelectorError;
use super::value::{Mapping, Value};
use serde::Deserialize;
use serde_json::Map;
use std::collections::BTreeMap;

/// Keys that modify a predicate instead of naming its operator.
const MODIFIER_KEYS: [&str; 4] = ["caseSensitive", "except", "jsonpath", "xpath"];

/// A predicate rejected at creation time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{location}: {kind}")]
pub struct PredicateError {
    pub location: String,
    pub kind: PredicateErrorKind,
}

impl PredicateError {
    fn at(location: &str, kind: impl Into<PredicateErrorKind>) -> Self {
        Self {
            location: location.to_string(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredicateErrorKind {
    #[error("predicate must be an object")]
    NotAnObject,
    #[error("predicate has no operator")]
    MissingOperator,
    #[error("predicate has more than one operator: {}", .0.join(", "))]
    MultipleOperators(Vec<String>),
    #[error(transparent)]
    UnknownOperator(#[from] UnknownOperator),
    #[error("'{0}' operand must be an object of request fields")]
    OperandNotObject(Operator),
    #[error("'exists' operand values must be booleans")]
    ExistsNotBoolean,
    #[error("invalid matches pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("invalid except pattern '{pattern}': {message}")]
    InvalidExcept { pattern: String, message: String },
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("predicate cannot use both jsonpath and xpath selectors")]
    ConflictingSelectors,
    #[error("invalid '{name}' option: {message}")]
    InvalidOption { name: String, message: String },
    #[error("'{0}' requires an array of predicates")]
    CombinatorNotArray(String),
    #[error("'not' requires exactly one predicate")]
    NotArity,
}

/// Parse a single predicate; `location` prefixes error locations.
pub fn parse_predicate(json: &serde_json::Value, location: &str) -> Result<Predicate, PredicateError> {
    let object = json
        .as_object()
        .ok_or_else(|| PredicateError::at(location, PredicateErrorKind::NotAnObject))?;

    let operator_keys: Vec<&String> = object
        .keys()
        .filter(|key| !MODIFIER_KEYS.contains(&key.as_str()))
        .collect();

    let key = match operator_keys.as_slice() {
        [] => {
            return Err(PredicateError::at(
                location,
                PredicateErrorKind::MissingOperator,
            ))
        }
        [key] => key.as_str(),
        keys => {
            return Err(PredicateError::at(
                location,
                PredicateErrorKind::MultipleOperators(keys.iter().map(|k| k.to_string()).collect()),
            ))
        }
    };
    let operand = &object[key];

    match key {
        "and" | "or" => {
            let children = operand.as_array().ok_or_else(|| {
                PredicateError::at(location, PredicateErrorKind::CombinatorNotArray(key.to_string()))
            })?;
            let children = children
                .iter()
                .enumerate()
                .map(|(i, child)| parse_predicate(child, &format!("{location}.{key}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if key == "and" {
                Predicate::And(children)
            } else {
                Predicate::Or(children)
            })
        }
        "not" => {
            let inner = match operand {
                serde_json::Value::Object(_) => parse_predicate(operand, &format!("{location}.not"))?,
                serde_json::Value::Array(items) if items.len() == 1 => {
                    parse_predicate(&items[0], &format!("{location}.not[0]"))?
                }
                _ => return Err(PredicateError::at(location, PredicateErrorKind::NotArity)),
            };
            Ok(Predicate::Not(Box::new(inner)))
        }
        name => {
            let operator: Operator = name
                .parse()
                .map_err(|e: UnknownOperator| PredicateError::at(location, e))?;
            let fields = operand_fields(operator, operand)
                .map_err(|kind| PredicateError::at(location, kind))?;
            let options =
                parse_options(object).map_err(|kind| PredicateError::at(location, kind))?;
            let leaf = Leaf::new(operator, fields, options)
                .map_err(|kind| PredicateError::at(location, kind))?;
            Ok(Predicate::Leaf(leaf))
        }
    }
}

/// Parse a stub's predicate list (implicitly AND-ed).
pub fn parse_predicates(
    json: &[serde_json::Value],
    location: &str,
) -> Result<Vec<Predicate>, PredicateError> {
    json.iter()
        .enumerate()
        .map(|(i, predicate)| parse_predicate(predicate, &format!("{location}[{i}]")))
        .collect()
}

fn operand_fields(
    operator: Operator,
    operand: &serde_json::Value,
) -> Result<Mapping, PredicateErrorKind> {
    if !operand.is_object() {
        return Err(PredicateErrorKind::OperandNotObject(operator));
    }
    match Value::from_json(operand.clone()) {
        Some(Value::Mapping(fields)) => Ok(fields),
        _ => Err(PredicateErrorKind::OperandNotObject(operator)),
    }
}

#[derive(Deserialize)]
struct SelectorDoc {
    selector: String,
    #[serde(default)]
    ns: BTreeMap<String, String>,
}

fn parse_options(object: &Map<String, serde_json::Value>) -> Result<PredicateOptions, PredicateErrorKind> {
    let invalid = |name: &str, message: String| PredicateErrorKind::InvalidOption {
        name: name.to_string(),
        message,
    };

    let case_sensitive = match object.get("caseSensitive") {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(other) => return Err(invalid("caseSensitive", format!("expected a boolean, got {other}"))),
    };

    let except = match object.get("except") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(other) => return Err(invalid("except", format!("expected a string, got {other}"))),
    };

    let selector_doc = |name: &str| -> Result<Option<SelectorDoc>, PredicateErrorKind> {
        object
            .get(name)
            .filter(|v| !v.is_null())
            .map(|v| serde_json::from_value::<SelectorDoc>(v.clone()))
            .transpose()
            .map_err(|e| invalid(name, e.to_string()))
    };

    let selector = match (selector_doc("jsonpath")?, selector_doc("xpath")?) {
        (Some(_), Some(_)) => return Err(PredicateErrorKind::ConflictingSelectors),
        (Some(doc), None) => Some(Selector::JsonPath {
            selector: doc.selector,
        }),
        (None, Some(doc)) => Some(Selector::XPath {
            selector: doc.selector,
            ns: doc.ns,
        }),
        (None, None) => None,
    };

    Ok(PredicateOptions {
        case_sensitive,
        except,
        selector,
    })
}

impl TryFrom<serde_json::Value> for Predicate {
    type Error = PredicateError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        parse_predicate(&json, "predicate")
    }
}
