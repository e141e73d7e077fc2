//! Deep equality matcher.
//!
//! Unlike regular `equals`, `deepEquals` requires an EXACT match:
//! - mappings must have the same keys, no extras on either side
//! - sequences must hold the same multiset of elements, in any order
//! - the comparison recurses through nested mappings and sequences
//!
//! Scalars compare exactly like `equals`, honoring `caseSensitive` and `except`.

use super::matcher::{embedded_document, scalar_equals, MatchContext};
use super::value::{lookup, Scalar, Value};

/// Structural equality between a predicate operand and an actual value.
pub fn deep_equals(expected: &Value, actual: &Value, ctx: &MatchContext<'_>) -> bool {
    match (expected, actual) {
        (Value::Mapping(fields), Value::Mapping(actual_fields)) => {
            fields.len() == actual_fields.len()
                && fields.iter().all(|(key, operand)| {
                    lookup(actual_fields, key, ctx.case_sensitive)
                        .is_some_and(|value| deep_equals(operand, value, ctx))
                })
        }
        (Value::Mapping(_), Value::Scalar(Scalar::Text(raw))) => match embedded_document(raw) {
            Some(document @ Value::Mapping(_)) => deep_equals(expected, &document, ctx),
            _ => false,
        },
        (Value::Sequence(operands), Value::Sequence(items)) => same_multiset(operands, items, ctx),
        (Value::Sequence(operands), other) => {
            same_multiset(operands, std::slice::from_ref(other), ctx)
        }
        (Value::Scalar(operand), Value::Scalar(value)) => scalar_equals(operand, value, ctx),
        _ => false,
    }
}

/// Order-insensitive comparison; every actual element is consumed at most once,
/// so duplicates must appear the same number of times on both sides.
fn same_multiset(operands: &[Value], items: &[Value], ctx: &MatchContext<'_>) -> bool {
    if operands.len() != items.len() {
        return false;
    }

    let mut used = vec![false; items.len()];
    operands.iter().all(|operand| {
        let found = items
            .iter()
            .enumerate()
            .position(|(i, item)| !used[i] && deep_equals(operand, item, ctx));
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}
