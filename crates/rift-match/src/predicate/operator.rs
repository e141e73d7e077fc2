//! Predicate operators.
//!
//! Operator names are resolved once, when a predicate is parsed. Matching code
//! only ever sees this closed enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Leaf predicate operator (Mountebank names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Exact equality; mappings match when every predicate key matches
    Equals,
    /// Exact structural equality; no extra keys or elements allowed
    DeepEquals,
    /// Predicate text is a substring of the actual text
    Contains,
    /// Actual text begins with the predicate text
    StartsWith,
    /// Actual text ends with the predicate text
    EndsWith,
    /// Predicate text is a regular expression the actual text must match
    Matches,
    /// Field presence (`true`) or absence (`false`)
    Exists,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Equals,
        Operator::DeepEquals,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Matches,
        Operator::Exists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::DeepEquals => "deepEquals",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Matches => "matches",
            Operator::Exists => "exists",
        }
    }

    /// Operators that compare text and coerce native scalars to strings.
    pub fn is_text_operator(&self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith | Operator::Matches
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name is not one of the seven operators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown predicate operator: {0}")]
pub struct UnknownOperator(pub String);

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}
