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

//! `is` and `as` infix operators (spec.md §4.2). Both test the value's
//! *actual* runtime type, not what it implicitly converts to — `1 is
//! Decimal` is false even though `1` promotes to `Decimal` in arithmetic —
//! except that `as` additionally allows moving up the conversion lattice,
//! since `as` is a cast, not a type guard.

use crate::model::types::converts_to;
use crate::model::{PrecisionDateTime, Quantity, Value};
use chrono::NaiveTime;

/// `value is (namespace.)?name`.
pub fn eval_is(value: &Value, namespace: Option<&str>, name: &str) -> bool {
    let actual = value.type_of();
    match namespace {
        Some(ns) => ns == actual.namespace && name == actual.name,
        None => name == actual.name,
    }
}

/// `value as (namespace.)?name`: the value itself on an exact type match,
/// an explicit lattice conversion when one is defined, `None` otherwise.
pub fn eval_as(value: &Value, namespace: Option<&str>, name: &str) -> Option<Value> {
    if eval_is(value, namespace, name) {
        return Some(value.clone());
    }
    if namespace.is_some_and(|ns| ns != "System") {
        return None;
    }
    let actual = value.type_of();
    if !actual.is_system() || !converts_to(&actual.name, name) {
        return None;
    }
    convert_along_lattice(value, name)
}

fn convert_along_lattice(value: &Value, target: &str) -> Option<Value> {
    match (value, target) {
        (Value::Integer(i), "Long") => Some(Value::Long(*i as i64)),
        (Value::Integer(i), "Decimal") => Some(Value::Decimal((*i).into())),
        (Value::Integer(i), "Quantity") => Some(Value::quantity(Quantity::dimensionless((*i).into()))),
        (Value::Long(l), "Decimal") => Some(Value::Decimal((*l).into())),
        (Value::Long(l), "Quantity") => Some(Value::quantity(Quantity::dimensionless((*l).into()))),
        (Value::Decimal(d), "Quantity") => Some(Value::quantity(Quantity::dimensionless(*d))),
        (Value::Date(date), "DateTime") => Some(Value::DateTime(PrecisionDateTime::new(
            date.date,
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            None,
            date.precision,
        ))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_checks_exact_runtime_type() {
        assert!(eval_is(&Value::Integer(1), None, "Integer"));
        assert!(!eval_is(&Value::Integer(1), None, "Decimal"));
    }

    #[test]
    fn as_allows_widening_conversion() {
        let result = eval_as(&Value::Integer(1), None, "Decimal");
        assert_eq!(result, Some(Value::Decimal(1.into())));
    }

    #[test]
    fn as_rejects_unrelated_type() {
        assert_eq!(eval_as(&Value::Integer(1), None, "String"), None);
    }

    #[test]
    fn is_respects_explicit_namespace() {
        assert!(eval_is(&Value::Integer(1), Some("System"), "Integer"));
        assert!(!eval_is(&Value::Integer(1), Some("FHIR"), "Integer"));
    }
}
