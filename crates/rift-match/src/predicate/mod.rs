//! Mountebank-compatible predicate system for request matching.
//!
//! This module supports all Mountebank predicate operators (equals, deepEquals,
//! contains, startsWith, endsWith, matches, exists) with logical operators
//! (and, or, not) and predicate parameters (caseSensitive, except, jsonpath,
//! xpath).
//!
//! # Module Structure
//!
//! - `value` - Tagged value type shared by requests and operands
//! - `operator` - The closed set of leaf operators
//! - `options` - Predicate options (caseSensitive, except, selectors)
//! - `matcher` - Per-operator value comparison
//! - `deep_equals` - Structural equality for `deepEquals`
//! - `selector` - JSONPath / XPath extraction from embedded documents
//! - `logical` - Predicate trees and evaluation
//! - `parse` - Creation-time parsing and validation

mod deep_equals;
mod logical;
mod matcher;
mod operator;
mod options;
mod parse;
mod selector;
mod value;

pub use deep_equals::deep_equals;
pub use logical::{Leaf, Predicate};
pub use matcher::{compile_pattern, matches, MatchContext, PatternTable};
pub use operator::{Operator, UnknownOperator};
pub use options::{Encoding, PredicateOptions, Selector};
pub use parse::{parse_predicate, parse_predicates, PredicateError, PredicateErrorKind};
pub use selector::{CompiledSelector, Selection, SelectorError};
pub use value::{lookup, Mapping, Scalar, Value};
