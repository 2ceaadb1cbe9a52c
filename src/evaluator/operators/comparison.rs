// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `< <= > >=` (spec.md §4.7). Every comparison can be undecidable — mixed
//! precision or zoned-vs-unzoned temporals, incompatible Quantity units —
//! in which case the result is the empty collection rather than a type error.

use super::{Numeric, promote};
use crate::ast::BinaryOperator;
use crate::error::{FhirPathError, Result};
use crate::model::Value;
use std::cmp::Ordering;

/// Evaluate a singleton ordering comparison. `Ok(None)` means undecidable
/// (empty result); `Err` means the operand kinds can never be compared.
pub fn eval_comparison(op: BinaryOperator, left: &Value, right: &Value) -> Result<Option<bool>> {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => a.partial_compare(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.partial_compare(b),
        (Value::Time(a), Value::Time(b)) => a.partial_compare(b),
        (Value::Quantity(a), Value::Quantity(b)) => a.partial_compare(b),
        _ => match (Numeric::from_value(left), Numeric::from_value(right)) {
            (Some(a), Some(b)) => {
                let (a, b) = promote(a, b);
                Some(a.as_decimal().cmp(&b.as_decimal()))
            }
            _ => {
                return Err(FhirPathError::type_error(format!(
                    "operator {} is not defined for {} and {}",
                    op.as_str(),
                    left.type_of(),
                    right.type_of()
                )));
            }
        },
    };

    let Some(ordering) = ordering else {
        return Ok(None);
    };

    Ok(Some(match op {
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterOrEqual => ordering != Ordering::Less,
        _ => unreachable!("eval_comparison called with a non-ordering operator"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_less_than_decimal() {
        let result =
            eval_comparison(BinaryOperator::LessThan, &Value::Integer(1), &Value::Decimal(rust_decimal::Decimal::new(15, 1)))
                .unwrap();
        assert_eq!(result, Some(true));
    }

    #[test]
    fn string_ordering_is_codepoint_based() {
        let result = eval_comparison(BinaryOperator::LessThan, &Value::string("a"), &Value::string("b")).unwrap();
        assert_eq!(result, Some(true));
    }

    #[test]
    fn incompatible_kinds_error() {
        let result = eval_comparison(BinaryOperator::LessThan, &Value::Boolean(true), &Value::Integer(1));
        assert!(result.is_err());
    }
}
