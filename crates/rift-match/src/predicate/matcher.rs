//! Value matching for a single predicate operator.
//!
//! `matches` compares a predicate operand against an actual request value and
//! never fails: anything it cannot interpret (an absent field, undecodable
//! base64, a regex that does not compile) is simply a non-match.
//!
//! Shapes are handled as follows:
//! - mapping vs mapping recurses key by key (keys looked up case-insensitively
//!   unless `caseSensitive`)
//! - mapping vs text parses the text as an embedded JSON document
//! - scalar or mapping vs sequence is satisfied by any element
//! - sequence operands are positional for `equals`, existential for text operators
//! - text operators read a mapping actual as its JSON text
//! - `deepEquals` lives in [`super::deep_equals`]

use super::deep_equals::deep_equals;
use super::operator::Operator;
use super::options::Encoding;
use super::value::{lookup, Scalar, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Precompiled `matches` patterns, keyed by the operand text as written.
pub type PatternTable = HashMap<String, Arc<Regex>>;

/// Everything a leaf passes down to the value matcher.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub case_sensitive: bool,
    /// Stripped from both sides before comparing (from the actual value only for `matches`)
    pub except: Option<&'a Regex>,
    pub encoding: Encoding,
    pub patterns: &'a PatternTable,
}

impl<'a> MatchContext<'a> {
    pub fn new(patterns: &'a PatternTable) -> Self {
        Self {
            case_sensitive: false,
            except: None,
            encoding: Encoding::Utf8,
            patterns,
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn except(mut self, except: Option<&'a Regex>) -> Self {
        self.except = except;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    fn strip<'s>(&self, text: &'s str) -> std::borrow::Cow<'s, str> {
        match self.except {
            Some(re) => re.replace_all(text, ""),
            None => std::borrow::Cow::Borrowed(text),
        }
    }
}

/// Compare `expected` (the predicate operand) against `actual` (`None` when the
/// field is missing or a selector found nothing).
pub fn matches(
    operator: Operator,
    expected: &Value,
    actual: Option<&Value>,
    ctx: &MatchContext<'_>,
) -> bool {
    if operator == Operator::Exists {
        return exists(expected, actual, ctx);
    }
    let Some(actual) = actual else {
        return false;
    };
    if operator == Operator::DeepEquals {
        return deep_equals(expected, actual, ctx);
    }
    compare(operator, expected, actual, ctx)
}

fn compare(operator: Operator, expected: &Value, actual: &Value, ctx: &MatchContext<'_>) -> bool {
    match (expected, actual) {
        (Value::Mapping(fields), Value::Mapping(actual_fields)) => {
            fields.iter().all(|(key, operand)| {
                matches(
                    operator,
                    operand,
                    lookup(actual_fields, key, ctx.case_sensitive),
                    ctx,
                )
            })
        }
        (Value::Mapping(_), Value::Scalar(Scalar::Text(raw))) => match embedded_document(raw) {
            Some(document) => compare(operator, expected, &document, ctx),
            None => false,
        },
        (Value::Mapping(_) | Value::Scalar(_), Value::Sequence(items)) => items
            .iter()
            .any(|item| compare(operator, expected, item, ctx)),
        (Value::Sequence(operands), actual) => {
            let items = match actual {
                Value::Sequence(items) => items.as_slice(),
                other => std::slice::from_ref(other),
            };
            if operator == Operator::Equals {
                operands.len() == items.len()
                    && operands
                        .iter()
                        .zip(items)
                        .all(|(operand, item)| compare(operator, operand, item, ctx))
            } else {
                operands
                    .iter()
                    .all(|operand| items.iter().any(|item| compare(operator, operand, item, ctx)))
            }
        }
        (Value::Scalar(operand), Value::Scalar(value)) => {
            compare_scalars(operator, operand, value, ctx)
        }
        (Value::Scalar(operand), document @ Value::Mapping(_)) if operator.is_text_operator() => {
            let text = Scalar::Text(document.to_json().to_string());
            compare_scalars(operator, operand, &text, ctx)
        }
        (Value::Mapping(_), Value::Scalar(_)) | (Value::Scalar(_), Value::Mapping(_)) => false,
    }
}

fn compare_scalars(
    operator: Operator,
    operand: &Scalar,
    value: &Scalar,
    ctx: &MatchContext<'_>,
) -> bool {
    match operator {
        Operator::Equals | Operator::DeepEquals => scalar_equals(operand, value, ctx),
        Operator::Contains => text_op(operand, value, ctx, Atom::contains),
        Operator::StartsWith => text_op(operand, value, ctx, Atom::starts_with),
        Operator::EndsWith => text_op(operand, value, ctx, Atom::ends_with),
        Operator::Matches => regex_matches(operand, value, ctx),
        Operator::Exists => exists(
            &Value::Scalar(operand.clone()),
            Some(&Value::Scalar(value.clone())),
            ctx,
        ),
    }
}

/// Scalar equality. Booleans and numbers on both sides compare natively; any
/// other pairing compares canonical text after `except` and case folding.
pub(crate) fn scalar_equals(operand: &Scalar, value: &Scalar, ctx: &MatchContext<'_>) -> bool {
    match (operand, value) {
        (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
        (Scalar::Number(a), Scalar::Number(b)) => {
            a == b || matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
        }
        _ => text_op(operand, value, ctx, |expected, actual| actual == expected),
    }
}

fn text_op(
    operand: &Scalar,
    value: &Scalar,
    ctx: &MatchContext<'_>,
    op: impl Fn(&Atom, &Atom) -> bool,
) -> bool {
    match (Atom::prepare(operand, ctx), Atom::prepare(value, ctx)) {
        (Some(expected), Some(actual)) => op(&expected, &actual),
        _ => false,
    }
}

fn regex_matches(operand: &Scalar, value: &Scalar, ctx: &MatchContext<'_>) -> bool {
    let pattern = operand.to_text();
    let actual = ctx.strip(&value.to_text()).into_owned();
    if ctx.encoding == Encoding::Base64 {
        return false;
    }

    match ctx.patterns.get(pattern.as_ref()) {
        Some(regex) => regex.is_match(&actual),
        None => match compile_pattern(&pattern, ctx.case_sensitive) {
            Ok(regex) => regex.is_match(&actual),
            Err(e) => {
                warn!("Ignoring invalid matches pattern '{}': {}", pattern, e);
                false
            }
        },
    }
}

/// Compile a `matches` or `except` pattern honoring case sensitivity.
pub fn compile_pattern(pattern: &str, case_sensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
}

fn exists(expected: &Value, actual: Option<&Value>, ctx: &MatchContext<'_>) -> bool {
    match expected {
        Value::Mapping(fields) => match actual {
            Some(Value::Mapping(actual_fields)) => fields.iter().all(|(key, operand)| {
                exists(operand, lookup(actual_fields, key, ctx.case_sensitive), ctx)
            }),
            Some(Value::Sequence(items)) => {
                items.iter().any(|item| exists(expected, Some(item), ctx))
            }
            Some(Value::Scalar(Scalar::Text(raw))) => match embedded_document(raw) {
                Some(document @ Value::Mapping(_)) => exists(expected, Some(&document), ctx),
                _ => fields.values().all(|operand| exists(operand, None, ctx)),
            },
            _ => fields.values().all(|operand| exists(operand, None, ctx)),
        },
        Value::Sequence(operands) => operands.iter().any(|operand| exists(operand, actual, ctx)),
        Value::Scalar(flag) => {
            let should_exist = match flag {
                Scalar::Bool(b) => *b,
                other => other.to_text().eq_ignore_ascii_case("true"),
            };
            should_exist == is_present(actual, ctx)
        }
    }
}

fn is_present(actual: Option<&Value>, ctx: &MatchContext<'_>) -> bool {
    match actual {
        None => false,
        Some(Value::Scalar(Scalar::Text(text))) => !ctx.strip(text).is_empty(),
        Some(value) => !value.is_empty(),
    }
}

/// Parse a text field as an embedded JSON document.
pub(crate) fn embedded_document(raw: &str) -> Option<Value> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(Value::from_json)
}

/// A scalar after `except` stripping, case folding and decoding.
#[derive(Debug, PartialEq)]
enum Atom {
    Text(String),
    Bytes(Vec<u8>),
}

impl Atom {
    fn prepare(scalar: &Scalar, ctx: &MatchContext<'_>) -> Option<Self> {
        let text = scalar.to_text();
        let text = ctx.strip(&text);
        match ctx.encoding {
            Encoding::Base64 => STANDARD.decode(text.as_bytes()).ok().map(Atom::Bytes),
            Encoding::Utf8 if ctx.case_sensitive => Some(Atom::Text(text.into_owned())),
            Encoding::Utf8 => Some(Atom::Text(text.to_lowercase())),
        }
    }

    fn as_bytes(&self) -> &[u8] {
        match self {
            Atom::Text(s) => s.as_bytes(),
            Atom::Bytes(b) => b,
        }
    }

    // `self` is the operand, `actual` the request value.

    fn contains(&self, actual: &Atom) -> bool {
        let needle = self.as_bytes();
        needle.is_empty()
            || actual
                .as_bytes()
                .windows(needle.len())
                .any(|window| window == needle)
    }

    fn starts_with(&self, actual: &Atom) -> bool {
        actual.as_bytes().starts_with(self.as_bytes())
    }

    fn ends_with(&self, actual: &Atom) -> bool {
        actual.as_bytes().ends_with(self.as_bytes())
    }
}
