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

//! `= != ~ !~` (spec.md §4.6). `=` is strict and can be undecidable
//! (`None`, propagating to the empty collection); `~` never is — it always
//! resolves to `true` or `false`, treating imprecise or incompatible
//! operands as simply unequal.

use super::{Numeric, promote};
use crate::model::temporal::{dates_equal, datetimes_equal, times_equal};
use crate::model::{Collection, Value};

/// Pairwise `=` between two values of (possibly) differing kinds. `None`
/// means the comparison is undecidable at the available precision.
pub fn value_equal(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Boolean(x), Value::Boolean(y)) => Some(x == y),
        (Value::String(x), Value::String(y)) => Some(x.as_ref() == y.as_ref()),
        (Value::Date(x), Value::Date(y)) => dates_equal(x, y),
        (Value::DateTime(x), Value::DateTime(y)) => datetimes_equal(x, y),
        (Value::Time(x), Value::Time(y)) => times_equal(x, y),
        (Value::Quantity(x), Value::Quantity(y)) => x.equals(y),
        (Value::Node(x), Value::Node(y)) => Some(x.json == y.json),
        _ => match (Numeric::from_value(a), Numeric::from_value(b)) {
            (Some(x), Some(y)) => {
                let (x, y) = promote(x, y);
                Some(x.as_decimal() == y.as_decimal())
            }
            _ => Some(false),
        },
    }
}

/// Pairwise `~`: always decidable, normalizing strings and rounding
/// decimals to the less-precise operand's scale, never empty.
pub fn value_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::String(x), Value::String(y)) => normalize_string(x) == normalize_string(y),
        (Value::Date(x), Value::Date(y)) => x.precision == y.precision && dates_equal(x, y) == Some(true),
        (Value::DateTime(x), Value::DateTime(y)) => {
            x.precision == y.precision && x.is_zoned() == y.is_zoned() && datetimes_equal(x, y) == Some(true)
        }
        (Value::Time(x), Value::Time(y)) => x.precision == y.precision && times_equal(x, y) == Some(true),
        (Value::Quantity(x), Value::Quantity(y)) => x.equivalent(y),
        (Value::Node(x), Value::Node(y)) => x.json == y.json,
        _ => match (Numeric::from_value(a), Numeric::from_value(b)) {
            (Some(x), Some(y)) => decimal_equal_at_shared_precision(x, y),
            _ => false,
        },
    }
}

fn decimal_equal_at_shared_precision(a: Numeric, b: Numeric) -> bool {
    let (a, b) = promote(a, b);
    let da = a.as_decimal();
    let db = b.as_decimal();
    let scale = da.scale().min(db.scale());
    da.round_dp(scale) == db.round_dp(scale)
}

fn normalize_string(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// `=` over whole collections: any known-false pair makes the whole
/// collection unequal; otherwise any undecidable pair makes the whole
/// comparison empty; only all-true-and-decided collapses to `true`.
pub fn collections_equal(a: &Collection, b: &Collection) -> Option<bool> {
    if a.len() != b.len() {
        return Some(false);
    }
    let mut undecidable = false;
    for (x, y) in a.iter().zip(b.iter()) {
        match value_equal(x, y) {
            Some(false) => return Some(false),
            Some(true) => {}
            None => undecidable = true,
        }
    }
    if undecidable { None } else { Some(true) }
}

/// `~` over whole collections: an unordered multiset match, never empty.
pub fn collections_equivalent(a: &Collection, b: &Collection) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut remaining: Vec<&Value> = b.iter().collect();
    for item in a.iter() {
        let Some(position) = remaining.iter().position(|candidate| value_equivalent(item, candidate)) else {
            return false;
        };
        remaining.remove(position);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_equality_is_value_exact() {
        assert_eq!(value_equal(&Value::Decimal(dec!(1.0)), &Value::Decimal(dec!(1.00))), Some(true));
        assert_eq!(value_equal(&Value::Decimal(dec!(1.4)), &Value::Decimal(dec!(1))), Some(false));
        assert_eq!(value_equal(&Value::Decimal(dec!(1.11)), &Value::Decimal(dec!(1.1))), Some(false));
    }

    #[test]
    fn decimal_equivalence_rounds_to_coarser_scale() {
        assert!(value_equivalent(&Value::Decimal(dec!(1.11)), &Value::Decimal(dec!(1.1))));
        assert!(value_equivalent(&Value::Decimal(dec!(1.4)), &Value::Decimal(dec!(1))));
    }

    #[test]
    fn string_equality_is_exact() {
        assert_eq!(value_equal(&Value::string("Ab"), &Value::string("ab")), Some(false));
    }

    #[test]
    fn string_equivalence_normalizes_case_and_whitespace() {
        assert!(value_equivalent(&Value::string("  Ab  c"), &Value::string("ab c")));
    }

    #[test]
    fn collections_equal_is_empty_when_any_pair_undecidable_and_none_false() {
        use crate::model::temporal::TemporalPrecision;
        use crate::model::PrecisionDate;
        use chrono::NaiveDate;

        let a: Collection = vec![Value::Date(PrecisionDate::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TemporalPrecision::Year,
        ))]
        .into_iter()
        .collect();
        let b: Collection = vec![Value::Date(PrecisionDate::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TemporalPrecision::Month,
        ))]
        .into_iter()
        .collect();
        assert_eq!(collections_equal(&a, &b), None);
    }

    #[test]
    fn collections_equivalent_ignores_order() {
        let a: Collection = vec![Value::Integer(1), Value::Integer(2)].into_iter().collect();
        let b: Collection = vec![Value::Integer(2), Value::Integer(1)].into_iter().collect();
        assert!(collections_equivalent(&a, &b));
    }

    #[test]
    fn collections_of_different_length_are_not_equivalent() {
        let a: Collection = vec![Value::Integer(1)].into_iter().collect();
        let b: Collection = vec![Value::Integer(1), Value::Integer(1)].into_iter().collect();
        assert!(!collections_equivalent(&a, &b));
    }
}
