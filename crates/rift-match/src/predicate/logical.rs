//! Predicate trees and their evaluation against a request.
//!
//! Supports Mountebank's logical operators: NOT, OR, AND. Leaves carry an
//! operator, the fields it applies to and the compiled forms of their options
//! (regexes, selector), so evaluation never parses or compiles anything.

use super::matcher::{compile_pattern, matches, MatchContext, PatternTable};
use super::operator::Operator;
use super::options::{Encoding, PredicateOptions};
use super::parse::PredicateErrorKind;
use super::selector::{CompiledSelector, Selection};
use super::value::{lookup, Mapping, Scalar, Value};
use crate::request::Request;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

/// A predicate: a leaf condition or a boolean combination of predicates.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum Predicate {
    /// A single operator applied to one or more request fields
    Leaf(Leaf),
    /// Matches if ALL of the inner predicates match
    And(Vec<Predicate>),
    /// Matches if ANY of the inner predicates match
    Or(Vec<Predicate>),
    /// Negates the inner predicate
    Not(Box<Predicate>),
}

impl Predicate {
    /// Evaluate against a text-mode request.
    pub fn evaluate(&self, request: &Request) -> bool {
        self.evaluate_encoded(request, Encoding::Utf8)
    }

    /// Evaluate with an explicit field encoding (base64 for binary-mode imposters).
    pub fn evaluate_encoded(&self, request: &Request, encoding: Encoding) -> bool {
        match self {
            Predicate::Leaf(leaf) => leaf.evaluate(request, encoding),
            Predicate::And(children) => children
                .iter()
                .all(|child| child.evaluate_encoded(request, encoding)),
            Predicate::Or(children) => children
                .iter()
                .any(|child| child.evaluate_encoded(request, encoding)),
            Predicate::Not(inner) => !inner.evaluate_encoded(request, encoding),
        }
    }

    /// Whether any leaf in the tree uses `operator`.
    pub fn uses_operator(&self, operator: Operator) -> bool {
        match self {
            Predicate::Leaf(leaf) => leaf.operator == operator,
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().any(|child| child.uses_operator(operator))
            }
            Predicate::Not(inner) => inner.uses_operator(operator),
        }
    }
}

/// Compiled leaf predicate.
#[derive(Debug, Clone)]
pub struct Leaf {
    operator: Operator,
    fields: Mapping,
    options: PredicateOptions,
    except: Option<Arc<Regex>>,
    selector: Option<CompiledSelector>,
    patterns: PatternTable,
}

impl Leaf {
    /// Compile a leaf, validating its operand and options.
    pub fn new(
        operator: Operator,
        fields: Mapping,
        options: PredicateOptions,
    ) -> Result<Self, PredicateErrorKind> {
        let case_sensitive = options.case_sensitive;

        if operator == Operator::Exists && !fields.values().all(only_booleans) {
            return Err(PredicateErrorKind::ExistsNotBoolean);
        }

        let except = options
            .except
            .as_deref()
            .map(|pattern| {
                compile_pattern(pattern, case_sensitive)
                    .map(Arc::new)
                    .map_err(|e| PredicateErrorKind::InvalidExcept {
                        pattern: pattern.to_string(),
                        message: e.to_string(),
                    })
            })
            .transpose()?;

        let selector = options
            .selector
            .as_ref()
            .map(|selector| CompiledSelector::compile(selector, case_sensitive))
            .transpose()?;

        let mut patterns = PatternTable::new();
        if operator == Operator::Matches {
            let mut sources = Vec::new();
            for operand in fields.values() {
                collect_text(operand, &mut sources);
            }
            for pattern in sources {
                let regex = compile_pattern(&pattern, case_sensitive).map_err(|e| {
                    PredicateErrorKind::InvalidPattern {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    }
                })?;
                patterns.insert(pattern, Arc::new(regex));
            }
        }

        Ok(Self {
            operator,
            fields,
            options,
            except,
            selector,
            patterns,
        })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn fields(&self) -> &Mapping {
        &self.fields
    }

    pub fn options(&self) -> &PredicateOptions {
        &self.options
    }

    /// All named fields must satisfy the operator.
    pub fn evaluate(&self, request: &Request, encoding: Encoding) -> bool {
        let ctx = MatchContext::new(&self.patterns)
            .case_sensitive(self.options.case_sensitive)
            .except(self.except.as_deref())
            .encoding(encoding);

        self.fields.iter().all(|(name, operand)| {
            self.field_matches(operand, request.get(name, ctx.case_sensitive), &ctx)
        })
    }

    fn field_matches(
        &self,
        operand: &Value,
        actual: Option<&Value>,
        ctx: &MatchContext<'_>,
    ) -> bool {
        let Some(selector) = &self.selector else {
            return matches(self.operator, operand, actual, ctx);
        };

        // The selector applies to the text found where the operand stops
        // nesting, e.g. `body` in `{"equals": {"body": "x"}}`.
        match (operand, actual) {
            (Value::Mapping(operands), Some(Value::Mapping(actual_fields))) => {
                operands.iter().all(|(key, inner)| {
                    self.field_matches(inner, lookup(actual_fields, key, ctx.case_sensitive), ctx)
                })
            }
            (_, Some(Value::Scalar(Scalar::Text(raw)))) => match selector.select(raw) {
                Selection::Found(selected) => matches(self.operator, operand, Some(&selected), ctx),
                Selection::Empty => matches(self.operator, operand, None, ctx),
                Selection::ParseError => false,
            },
            // An already-parsed document is selected from its JSON text.
            (_, Some(document @ Value::Mapping(_))) => {
                let raw = Value::from(document.to_json().to_string());
                self.field_matches(operand, Some(&raw), ctx)
            }
            (_, Some(Value::Sequence(items))) => items
                .iter()
                .any(|item| self.field_matches(operand, Some(item), ctx)),
            (_, None) => matches(self.operator, operand, None, ctx),
            (_, Some(Value::Scalar(_))) => false,
        }
    }
}

fn only_booleans(value: &Value) -> bool {
    match value {
        Value::Scalar(Scalar::Bool(_)) => true,
        Value::Scalar(_) => false,
        Value::Sequence(items) => items.iter().all(only_booleans),
        Value::Mapping(map) => map.values().all(only_booleans),
    }
}

fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Scalar(scalar) => out.push(scalar.to_text().into_owned()),
        Value::Sequence(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Mapping(map) => map.values().for_each(|item| collect_text(item, out)),
    }
}
